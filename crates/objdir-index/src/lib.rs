//! ObjDir directory index
//!
//! Directory semantics (head/node/tail markers per level) layered over a
//! flat ordered key-value store. Producers submit adds and deletes; a
//! single background worker applies them, skipping marker writes that the
//! two-tier directory cache already knows about.

pub mod cache;
pub mod coalesce;
pub mod codec;
pub mod index;
mod lru;
pub mod meta;
pub mod meta_cache;
pub mod queue;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::{DirCache, DirCacheStats};
pub use coalesce::{CoalesceStats, Coalescer};
pub use index::{DirEntry, DirIndex};
pub use meta::{ObjectAttrs, ObjectCategory, ObjectEntry, ObjectEntryMeta};
pub use meta_cache::{MetaCache, MetaCacheStats};
pub use queue::{OperationQueue, WorkerState};
pub use worker::{AddItem, Operation, WorkerStats};
