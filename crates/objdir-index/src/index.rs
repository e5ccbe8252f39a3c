//! Producer-facing directory index
//!
//! Validates paths at the boundary, stages adds through the coalescer and
//! queues deletes directly. Reads go straight to the store, through the
//! metadata cache.
//!
//! Only object paths are cached. Directory node keys are rewritten and
//! pruned by the worker as siblings come and go, so directory paths always
//! read the store.

use crate::cache::DirCache;
use crate::codec;
use crate::coalesce::{CoalesceStats, Coalescer};
use crate::meta::ObjectAttrs;
use crate::meta_cache::MetaCache;
use crate::queue::{OperationQueue, WorkerState};
use crate::worker::{AddItem, Operation, WorkerStats};
use bytes::Bytes;
use objdir_common::{Config, Result};
use objdir_store::KvStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Directory index over a flat ordered key-value store
pub struct DirIndex {
    store: Arc<dyn KvStore>,
    cache: Arc<DirCache>,
    meta_cache: MetaCache,
    queue: Arc<OperationQueue>,
    coalescer: Coalescer,
}

impl DirIndex {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(DirCache::new(&config.cache));
        let queue = Arc::new(OperationQueue::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            &config.worker,
        ));
        let coalescer = Coalescer::new(Arc::clone(&queue), &config.coalesce);

        Ok(Self {
            store,
            cache,
            meta_cache: MetaCache::new(&config.meta_cache),
            queue,
            coalescer,
        })
    }

    /// Start the worker and coalescer threads
    pub fn start(&self) -> Result<()> {
        self.queue.start()?;
        self.coalescer.start()?;
        info!("Directory index started");
        Ok(())
    }

    /// Flush staged adds, then stop both threads once the queue drains
    pub fn stop(&self) {
        self.coalescer.stop();
        self.queue.stop();
        info!("Directory index stopped");
    }

    /// Queue an insert or overwrite of `path` with a raw metadata blob
    pub fn submit_add(&self, path: &str, blob: impl Into<Bytes>) -> Result<()> {
        codec::validate_path(path)?;
        let blob = blob.into();
        match ObjectAttrs::decode(&blob) {
            Ok(attrs) if is_cacheable(path) => self.meta_cache.put(path, attrs),
            _ => {
                self.meta_cache.remove(path);
            }
        }
        self.coalescer.submit(AddItem::new(path, blob));
        Ok(())
    }

    /// Queue an insert or overwrite of `path` with an attribute map
    pub fn submit_object(&self, path: &str, attrs: &ObjectAttrs) -> Result<()> {
        codec::validate_path(path)?;
        let blob = attrs.encode()?;
        if is_cacheable(path) {
            self.meta_cache.put(path, attrs.clone());
        }
        self.coalescer.submit(AddItem::new(path, blob));
        Ok(())
    }

    /// Queue removal of `path`; with `cascade`, emptied ancestors go too
    pub fn submit_delete(&self, path: &str, cascade: bool) -> Result<()> {
        codec::validate_path(path)?;
        self.meta_cache.remove(path);
        // Staged adds must reach the queue before the delete to keep FIFO order
        self.coalescer.flush();
        self.queue.enqueue(Operation::Delete {
            path: path.to_string(),
            cascade,
        });
        Ok(())
    }

    /// Queue removal of a bucket's root entry
    pub fn submit_delete_bucket_root(&self, path: &str) -> Result<()> {
        codec::validate_bucket_path(path)?;
        self.coalescer.flush();
        self.queue.enqueue(Operation::DeleteBucketRoot {
            path: path.to_string(),
        });
        Ok(())
    }

    /// Emit staged adds to the queue now. Returns the number emitted.
    pub fn flush(&self) -> usize {
        self.coalescer.flush()
    }

    /// Block until every submitted operation has been applied
    pub fn wait_for_empty(&self) {
        self.coalescer.flush();
        self.queue.wait_for_empty();
    }

    /// Stored blob of `path`, or `None` when absent or a placeholder
    pub fn get_blob(&self, path: &str) -> Result<Option<Bytes>> {
        codec::validate_path(path)?;
        let key = codec::node_key(path);
        Ok(self
            .store
            .get(key.as_bytes())?
            .filter(|value| !codec::is_placeholder(value))
            .map(Bytes::from))
    }

    /// Decoded attributes of `path`; empty when absent or a placeholder
    pub fn get_metadata(&self, path: &str) -> Result<ObjectAttrs> {
        codec::validate_path(path)?;
        let cacheable = is_cacheable(path);
        let cached = if cacheable {
            self.meta_cache.get(path)
        } else {
            None
        };
        if let Some(attrs) = cached {
            return Ok(attrs);
        }
        let Some(blob) = self.get_blob(path)? else {
            debug!(path, "no metadata stored");
            return Ok(ObjectAttrs::new());
        };
        let attrs = ObjectAttrs::decode(&blob)?;
        if cacheable {
            self.meta_cache.put(path, attrs.clone());
        }
        Ok(attrs)
    }

    /// Raw keys and values under `prefix`, at most `limit`, in key order
    pub fn scan_children(&self, prefix: &str, limit: usize) -> Result<BTreeMap<String, Bytes>> {
        Ok(self
            .store
            .scan(prefix.as_bytes(), limit)?
            .into_iter()
            .map(|(key, value)| (String::from_utf8_lossy(&key).into_owned(), Bytes::from(value)))
            .collect())
    }

    /// Direct children of a directory, in name order.
    ///
    /// `limit` bounds the number of node keys scanned.
    pub fn list_dir(&self, dir: &str, limit: usize) -> Result<Vec<DirEntry>> {
        let prefix = if dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        if codec::is_bucket_root(&prefix) {
            codec::validate_bucket_path(&prefix)?;
        } else {
            codec::validate_path(&prefix)?;
        }

        let node_range = format!("{prefix}{}", codec::NODE_MARKER);
        Ok(self
            .store
            .scan(node_range.as_bytes(), limit)?
            .iter()
            .filter_map(|(key, _)| codec::child_of(key, &prefix))
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    pub fn cache(&self) -> &DirCache {
        &self.cache
    }

    pub const fn meta_cache(&self) -> &MetaCache {
        &self.meta_cache
    }

    pub fn worker_state(&self) -> WorkerState {
        self.queue.state()
    }

    pub fn worker_stats(&self) -> &WorkerStats {
        self.queue.stats()
    }

    pub fn coalesce_stats(&self) -> &CoalesceStats {
        self.coalescer.stats()
    }
}

fn is_cacheable(path: &str) -> bool {
    !path.ends_with('/')
}

impl Drop for DirIndex {
    fn drop(&mut self) {
        self.coalescer.stop();
        self.queue.stop();
    }
}
