//! Operation processing
//!
//! Applies queued operations to the backing store. Every marker write and
//! delete is attempted independently. Failures are logged and counted but
//! never surfaced to the submitter; the index self-heals on the next write
//! that touches the same level.

use crate::cache::DirCache;
use crate::codec::{self, HEAD_VALUE, NODE_MARKER, PARENT_DIR_VALUE, TAIL_VALUE};
use bytes::Bytes;
use objdir_store::{KvStore, StoreResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, trace, warn};

/// One object to insert or overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItem {
    pub path: String,
    pub blob: Bytes,
}

impl AddItem {
    pub fn new(path: impl Into<String>, blob: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            blob: blob.into(),
        }
    }
}

/// Queued index mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Insert or overwrite a batch of objects
    Add { batch: Vec<AddItem> },
    /// Remove one object, optionally pruning emptied ancestors
    Delete { path: String, cascade: bool },
    /// Remove a bucket's own root entry
    DeleteBucketRoot { path: String },
}

/// Worker counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Operations taken off the queue
    pub operations: AtomicU64,
    /// Head, tail and ancestor markers written
    pub markers_written: AtomicU64,
    /// Marker writes skipped because the cache knew them
    pub markers_skipped: AtomicU64,
    /// Object metadata blobs written
    pub metadata_written: AtomicU64,
    /// Keys deleted
    pub keys_deleted: AtomicU64,
    /// Directory levels pruned by cascading deletes
    pub levels_pruned: AtomicU64,
    /// Store calls that failed
    pub store_failures: AtomicU64,
}

impl WorkerStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Applies operations against the store, consulting the directory cache
pub(crate) struct Worker {
    store: Arc<dyn KvStore>,
    cache: Arc<DirCache>,
    stats: WorkerStats,
}

impl Worker {
    pub(crate) fn new(store: Arc<dyn KvStore>, cache: Arc<DirCache>) -> Self {
        Self {
            store,
            cache,
            stats: WorkerStats::default(),
        }
    }

    pub(crate) const fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub(crate) fn process(&self, op: Operation) {
        WorkerStats::bump(&self.stats.operations);
        match op {
            Operation::Add { batch } => {
                for item in &batch {
                    self.apply_add(item);
                }
            }
            Operation::Delete { path, cascade } => self.apply_delete(&path, cascade),
            Operation::DeleteBucketRoot { path } => self.apply_delete_bucket_root(&path),
        }
    }

    fn apply_add(&self, item: &AddItem) {
        let own_key = codec::node_key(&item.path);
        let mut wrote_own = false;

        for level in codec::decompose_levels(&item.path) {
            self.put_marker(&level.head, HEAD_VALUE);
            if level.node == own_key {
                self.put_metadata(&own_key, &item.blob);
                wrote_own = true;
            } else {
                self.put_marker(&level.node, PARENT_DIR_VALUE);
            }
            self.put_marker(&level.tail, TAIL_VALUE);
        }

        // Objects directly under the bucket root have no level markers
        if !wrote_own {
            self.put_metadata(&own_key, &item.blob);
        }
    }

    fn put_marker(&self, key: &str, value: &[u8]) {
        if self.cache.observe(key) {
            WorkerStats::bump(&self.stats.markers_skipped);
            trace!(key, "marker known, skipping write");
            return;
        }
        match self.store.put(key.as_bytes(), value) {
            Ok(()) => WorkerStats::bump(&self.stats.markers_written),
            Err(e) => {
                WorkerStats::bump(&self.stats.store_failures);
                // Forget it so the next add retries the write
                self.cache.invalidate(key);
                warn!("Failed to write marker {}: {}", key, e);
            }
        }
    }

    fn put_metadata(&self, key: &str, blob: &[u8]) {
        match self.store.put(key.as_bytes(), blob) {
            Ok(()) => WorkerStats::bump(&self.stats.metadata_written),
            Err(e) => {
                WorkerStats::bump(&self.stats.store_failures);
                error!("Failed to write metadata {}: {}", key, e);
            }
        }
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        let result = self.store.delete(key.as_bytes());
        match &result {
            Ok(()) => {
                WorkerStats::bump(&self.stats.keys_deleted);
                self.cache.invalidate(key);
            }
            Err(e) => {
                WorkerStats::bump(&self.stats.store_failures);
                warn!("Failed to delete {}: {}", key, e);
            }
        }
        result
    }

    fn apply_delete(&self, path: &str, cascade: bool) {
        if self.delete_key(&codec::node_key(path)).is_err() || !cascade {
            return;
        }

        let mut level = codec::parent_prefix(path);
        while let Some(prefix) = level {
            if codec::is_bucket_root(prefix) {
                break;
            }
            match self.level_has_children(prefix) {
                Ok(false) => {}
                Ok(true) => {
                    trace!(prefix, "level still populated, cascade stops");
                    break;
                }
                Err(e) => {
                    WorkerStats::bump(&self.stats.store_failures);
                    warn!("Failed to scan {}: {}", prefix, e);
                    break;
                }
            }

            let markers = [
                codec::head_key(prefix),
                codec::tail_key(prefix),
                codec::node_key(prefix),
            ];
            if markers.iter().any(|key| self.delete_key(key).is_err()) {
                break;
            }
            WorkerStats::bump(&self.stats.levels_pruned);
            debug!(prefix, "pruned empty directory level");

            level = codec::parent_prefix(prefix);
        }
    }

    /// A level is populated while anything remains in its node range.
    ///
    /// Only the node range is scanned: sub-directories whose names sort
    /// below the head marker put their own markers ahead of `prefix-`.
    fn level_has_children(&self, prefix: &str) -> StoreResult<bool> {
        let node_range = format!("{prefix}{NODE_MARKER}");
        Ok(!self.store.scan(node_range.as_bytes(), 1)?.is_empty())
    }

    fn apply_delete_bucket_root(&self, path: &str) {
        let key = codec::node_key(path);
        if self.delete_key(&key).is_ok() {
            debug!(key, "deleted bucket root entry");
        }
    }
}
