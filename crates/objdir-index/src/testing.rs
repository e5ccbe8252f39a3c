//! Store wrapper with injectable failures

use objdir_store::{KvPair, KvStore, MemoryStore, StoreError, StoreResult};
use parking_lot::Mutex;

#[derive(Default)]
struct Failures {
    puts: Vec<String>,
    deletes: Vec<String>,
    scans: bool,
}

/// `MemoryStore` that fails selected calls
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failures: Mutex<Failures>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub(crate) fn fail_puts_matching(&self, key: &str) {
        self.failures.lock().puts.push(key.to_string());
    }

    pub(crate) fn fail_deletes_matching(&self, key: &str) {
        self.failures.lock().deletes.push(key.to_string());
    }

    pub(crate) fn fail_scans(&self) {
        self.failures.lock().scans = true;
    }

    pub(crate) fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    fn injected(key: &[u8]) -> StoreError {
        StoreError::Backend(format!("injected failure for {}", String::from_utf8_lossy(key)))
    }
}

impl KvStore for FlakyStore {
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if self.failures.lock().puts.iter().any(|k| k.as_bytes() == key) {
            return Err(Self::injected(key));
        }
        self.inner.put(key, value)
    }

    fn put_batch(&self, entries: &[KvPair]) -> StoreResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn scan(&self, prefix: &[u8], limit: usize) -> StoreResult<Vec<KvPair>> {
        if self.failures.lock().scans {
            return Err(Self::injected(prefix));
        }
        self.inner.scan(prefix, limit)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        if self.failures.lock().deletes.iter().any(|k| k.as_bytes() == key) {
            return Err(Self::injected(key));
        }
        self.inner.delete(key)
    }

    fn delete_batch(&self, keys: &[Vec<u8>]) -> StoreResult<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }
}
