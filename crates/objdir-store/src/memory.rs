//! In-memory ordered store
//!
//! Uses Rust's `BTreeMap` so point lookups and prefix scans behave like a
//! byte-ordered remote store. Every call is counted in [`StoreStats`].

use crate::{KvPair, KvStore, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Keys written (single puts and batch entries)
    pub puts: AtomicU64,
    /// Point reads
    pub gets: AtomicU64,
    /// Prefix scans
    pub scans: AtomicU64,
    /// Keys deleted (single deletes and batch entries)
    pub deletes: AtomicU64,
}

impl StoreStats {
    /// Reset all counters
    pub fn reset(&self) {
        self.puts.store(0, Ordering::Relaxed);
        self.gets.store(0, Ordering::Relaxed);
        self.scans.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }
}

/// In-memory `KvStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    stats: StoreStats,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation counters
    pub const fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    /// Check if a key exists, without counting a read
    pub fn contains(&self, key: &[u8]) -> bool {
        self.tree.read().contains_key(key)
    }

    /// All keys in order, as lossy UTF-8
    pub fn keys(&self) -> Vec<String> {
        self.tree
            .read()
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }
}

impl KvStore for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tree.write().insert(key.to_vec(), value.to_vec());
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn put_batch(&self, entries: &[KvPair]) -> StoreResult<()> {
        let mut tree = self.tree.write();
        for (key, value) in entries {
            tree.insert(key.clone(), value.clone());
        }
        self.stats
            .puts
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.tree.read().get(key).cloned())
    }

    fn scan(&self, prefix: &[u8], limit: usize) -> StoreResult<Vec<KvPair>> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let tree = self.tree.read();
        Ok(tree
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.tree.write().remove(key);
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete_batch(&self, keys: &[Vec<u8>]) -> StoreResult<()> {
        let mut tree = self.tree.write();
        for key in keys {
            tree.remove(key);
        }
        self.stats
            .deletes
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"bucket/a/.x", b"meta").unwrap();

        assert_eq!(store.get(b"bucket/a/.x").unwrap(), Some(b"meta".to_vec()));
        assert_eq!(store.get(b"bucket/a/.y").unwrap(), None);

        store.delete(b"bucket/a/.x").unwrap();
        assert!(store.is_empty());

        // Absent keys delete cleanly
        store.delete(b"bucket/a/.x").unwrap();
    }

    #[test]
    fn test_scan_is_prefix_bounded_and_ordered() {
        let store = MemoryStore::new();
        store
            .put_batch(&[
                (b"bucket/a/~".to_vec(), b"tail".to_vec()),
                (b"bucket/a/.b/".to_vec(), b"parent_dir".to_vec()),
                (b"bucket/a/-".to_vec(), b"head".to_vec()),
                (b"bucket/ab".to_vec(), b"other".to_vec()),
                (b"bucket/.a/".to_vec(), b"parent_dir".to_vec()),
            ])
            .unwrap();

        let all = store.scan(b"bucket/a/", 10).unwrap();
        let keys: Vec<&[u8]> = all.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(
            keys,
            vec![&b"bucket/a/-"[..], &b"bucket/a/.b/"[..], &b"bucket/a/~"[..]]
        );

        let limited = store.scan(b"bucket/a/", 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].1, b"parent_dir".to_vec());
    }

    #[test]
    fn test_stats_count_calls() {
        let store = MemoryStore::new();
        store.put(b"k1", b"v").unwrap();
        store
            .put_batch(&[(b"k2".to_vec(), b"v".to_vec()), (b"k3".to_vec(), b"v".to_vec())])
            .unwrap();
        store.get(b"k1").unwrap();
        store.scan(b"k", 1).unwrap();
        store.delete_batch(&[b"k1".to_vec(), b"k2".to_vec()]).unwrap();

        assert_eq!(store.stats().puts.load(Ordering::Relaxed), 3);
        assert_eq!(store.stats().gets.load(Ordering::Relaxed), 1);
        assert_eq!(store.stats().scans.load(Ordering::Relaxed), 1);
        assert_eq!(store.stats().deletes.load(Ordering::Relaxed), 2);
        assert_eq!(store.keys(), vec!["k3".to_string()]);

        store.stats().reset();
        assert_eq!(store.stats().puts.load(Ordering::Relaxed), 0);
    }
}
