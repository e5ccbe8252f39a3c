//! Object metadata cache
//!
//! Single-tier LRU of decoded attribute maps keyed by object path, with a
//! per-entry TTL. Hits only re-touch their LRU slot once the insertion
//! clock has moved past the touch window, so hot reads mostly stay on the
//! shared lock.

use crate::lru::LruMap;
use crate::meta::ObjectAttrs;
use objdir_common::MetaCacheConfig;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metadata cache statistics
#[derive(Debug, Default)]
pub struct MetaCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
}

impl MetaCacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

struct CachedAttrs {
    attrs: ObjectAttrs,
    inserted: Instant,
    stamp: u64,
}

struct State {
    entries: LruMap<CachedAttrs>,
    clock: u64,
    enabled: bool,
}

/// Path-keyed cache of object attributes
pub struct MetaCache {
    state: RwLock<State>,
    max_entries: usize,
    ttl: Duration,
    touch_window: u64,
    stats: MetaCacheStats,
}

impl MetaCache {
    pub fn new(config: &MetaCacheConfig) -> Self {
        let max_entries = config.max_entries.max(1);
        Self {
            state: RwLock::new(State {
                entries: LruMap::new(),
                clock: 0,
                enabled: config.enabled,
            }),
            max_entries,
            ttl: config.ttl(),
            touch_window: max_entries as u64 / 2,
            stats: MetaCacheStats::default(),
        }
    }

    fn is_expired(&self, entry: &CachedAttrs) -> bool {
        !self.ttl.is_zero() && entry.inserted.elapsed() > self.ttl
    }

    /// Cached attributes of `path`, if present and unexpired
    pub fn get(&self, path: &str) -> Option<ObjectAttrs> {
        {
            let state = self.state.read();
            if !state.enabled {
                return None;
            }
            match state.entries.get(path) {
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry)
                    if !self.is_expired(entry)
                        && state.clock.saturating_sub(entry.stamp) < self.touch_window =>
                {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.attrs.clone());
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write();
        let Some(entry) = state.entries.get(path) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if self.is_expired(entry) {
            state.entries.remove(path);
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        state.clock += 1;
        let stamp = state.clock;
        state.entries.touch(path);
        let entry = state.entries.get_mut(path)?;
        entry.stamp = stamp;
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.attrs.clone())
    }

    /// Insert or replace the attributes of `path`
    pub fn put(&self, path: &str, attrs: ObjectAttrs) {
        let mut state = self.state.write();
        if !state.enabled {
            return;
        }
        state.clock += 1;
        let entry = CachedAttrs {
            attrs,
            inserted: Instant::now(),
            stamp: state.clock,
        };
        state.entries.insert(path, entry);
        let evicted = state.entries.evict_over(self.max_entries, path);
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Drop one path. Returns whether it was cached.
    pub fn remove(&self, path: &str) -> bool {
        self.state.write().entries.remove(path).is_some()
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.state.write().entries.clear();
    }

    /// Enable or disable the cache. Disabling drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.write();
        if !enabled {
            state.entries.clear();
        }
        state.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    /// Visit unexpired entries, least recently used first
    pub fn for_each(&self, mut f: impl FnMut(&str, &ObjectAttrs)) {
        let state = self.state.read();
        for (path, entry) in state.entries.iter() {
            if !self.is_expired(entry) {
                f(path, &entry.attrs);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn stats(&self) -> &MetaCacheStats {
        &self.stats
    }
}
