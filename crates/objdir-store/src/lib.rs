//! ObjDir Store - Backing key-value store boundary
//!
//! The directory index only ever talks to a flat, byte-ordered key-value
//! store through [`KvStore`]. Two implementations live here:
//!
//! - [`MemoryStore`]: in-memory `BTreeMap`, used by tests and embedders
//! - [`RedbStore`]: persistent store backed by redb
//!
//! Keys are compared byte-lexicographically. Single-key operations are
//! linearizable; batch operations are not transactional from the caller's
//! point of view and there are no multi-key transactions.

mod durable;
mod error;
mod memory;

pub use durable::RedbStore;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreStats};

/// A key-value pair as returned by [`KvStore::scan`]
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Flat, lexically-ordered key-value store
pub trait KvStore: Send + Sync {
    /// Write a single key
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Write several keys
    fn put_batch(&self, entries: &[KvPair]) -> StoreResult<()>;

    /// Read a single key. An absent key is `Ok(None)`, never an error.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Return at most `limit` entries whose key starts with `prefix`,
    /// in ascending key order
    fn scan(&self, prefix: &[u8], limit: usize) -> StoreResult<Vec<KvPair>>;

    /// Delete a single key. Deleting an absent key succeeds.
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Delete several keys
    fn delete_batch(&self, keys: &[Vec<u8>]) -> StoreResult<()>;
}
