//! Persistent store backed by redb.
//!
//! All keys live in a single byte-keyed table, which redb keeps in
//! byte-lexicographic order. Every write is its own write transaction;
//! batch writes share one transaction.

use crate::{KvPair, KvStore, StoreResult};
use redb::{Database, TableDefinition};
use std::path::Path;
use tracing::{debug, info};

const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// Persistent `KvStore` backed by redb.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(ENTRIES)?;
        }
        write_txn.commit()?;

        info!("Opened redb store at {}", path.display());
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put_batch(&self, entries: &[KvPair]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            for (key, value) in entries {
                table.insert(key.as_slice(), value.as_slice())?;
            }
        }
        write_txn.commit()?;
        debug!("put_batch: {} entries", entries.len());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn scan(&self, prefix: &[u8], limit: usize) -> StoreResult<Vec<KvPair>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        let start: &[u8] = prefix;
        let mut result = Vec::new();
        for entry in table.range(start..)? {
            if result.len() >= limit {
                break;
            }
            let (key, value) = entry?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            result.push((key.to_vec(), value.value().to_vec()));
        }
        Ok(result)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_batch(&self, keys: &[Vec<u8>]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            for key in keys {
                table.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        debug!("delete_batch: {} keys", keys.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("index.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_redb_put_get_delete() {
        let (_dir, store) = open_temp();

        store.put(b"bucket/x/.y", b"blob").unwrap();
        assert_eq!(store.get(b"bucket/x/.y").unwrap(), Some(b"blob".to_vec()));

        store.delete(b"bucket/x/.y").unwrap();
        assert_eq!(store.get(b"bucket/x/.y").unwrap(), None);
    }

    #[test]
    fn test_redb_scan_prefix_limit() {
        let (_dir, store) = open_temp();
        store
            .put_batch(&[
                (b"bucket/x/-".to_vec(), b"head".to_vec()),
                (b"bucket/x/.a".to_vec(), b"m1".to_vec()),
                (b"bucket/x/.b".to_vec(), b"m2".to_vec()),
                (b"bucket/x/~".to_vec(), b"tail".to_vec()),
                (b"bucket/y/-".to_vec(), b"head".to_vec()),
            ])
            .unwrap();

        let entries = store.scan(b"bucket/x/", 10).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].0, b"bucket/x/-".to_vec());
        assert_eq!(entries[3].0, b"bucket/x/~".to_vec());

        let first_two = store.scan(b"bucket/x/", 2).unwrap();
        assert_eq!(first_two[1].0, b"bucket/x/.a".to_vec());
    }

    #[test]
    fn test_redb_delete_batch_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store
                .put_batch(&[
                    (b"a".to_vec(), b"1".to_vec()),
                    (b"b".to_vec(), b"2".to_vec()),
                    (b"c".to_vec(), b"3".to_vec()),
                ])
                .unwrap();
            store.delete_batch(&[b"a".to_vec(), b"c".to_vec()]).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        let entries = store.scan(b"", 10).unwrap();
        assert_eq!(entries, vec![(b"b".to_vec(), b"2".to_vec())]);
    }
}
