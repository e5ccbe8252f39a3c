//! Directory existence cache
//!
//! Two-tier admission filter in front of the store. A key must be observed
//! `promotion_threshold` times in the warm tier before it is promoted to
//! the hot tier, and only hot keys answer "already known". Hot entries
//! expire after a TTL so a marker removed behind our back is eventually
//! rewritten.
//!
//! Lookups run under a shared lock. The exclusive lock is only taken when
//! an entry needs to move, expire, or be admitted.

use crate::lru::LruMap;
use objdir_common::DirCacheConfig;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Cache statistics
#[derive(Debug, Default)]
pub struct DirCacheStats {
    /// Observations answered from the hot tier
    pub hits: AtomicU64,
    /// Observations that fell through to the warm tier
    pub misses: AtomicU64,
    /// Warm to hot promotions
    pub promotions: AtomicU64,
    /// Entries dropped by either tier's LRU bound
    pub evictions: AtomicU64,
    /// Hot entries found past their TTL
    pub expirations: AtomicU64,
}

impl DirCacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.promotions.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

struct WarmEntry {
    count: u64,
}

struct HotEntry {
    inserted: Instant,
    stamp: u64,
}

struct Tiers {
    warm: LruMap<WarmEntry>,
    hot: LruMap<HotEntry>,
    /// Incremented on every hot admission or re-touch
    hot_clock: u64,
    enabled: bool,
}

impl Tiers {
    fn new(enabled: bool) -> Self {
        Self {
            warm: LruMap::new(),
            hot: LruMap::new(),
            hot_clock: 0,
            enabled,
        }
    }
}

enum HotLookup {
    Hit,
    Expired,
    Miss,
    Disabled,
}

/// Two-tier directory existence cache
pub struct DirCache {
    tiers: RwLock<Tiers>,
    hot_max: usize,
    warm_max: usize,
    ttl: Duration,
    touch_window: u64,
    threshold: u64,
    stats: DirCacheStats,
}

impl DirCache {
    pub fn new(config: &DirCacheConfig) -> Self {
        Self {
            tiers: RwLock::new(Tiers::new(config.enabled)),
            hot_max: config.hot_max_entries.max(1),
            warm_max: config.warm_max_entries.max(1),
            ttl: config.hot_ttl(),
            touch_window: config.touch_window(),
            threshold: config.promotion_threshold.max(1),
            stats: DirCacheStats::default(),
        }
    }

    /// Record one observation of `key`.
    ///
    /// Returns `true` only when the key is live in the hot tier, meaning
    /// the caller may skip writing it.
    pub fn observe(&self, key: &str) -> bool {
        match self.lookup_hot(key) {
            HotLookup::Hit => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                true
            }
            HotLookup::Expired => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                false
            }
            HotLookup::Miss => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.record_warm(key);
                false
            }
            HotLookup::Disabled => false,
        }
    }

    fn is_expired(&self, entry: &HotEntry) -> bool {
        !self.ttl.is_zero() && entry.inserted.elapsed() > self.ttl
    }

    fn needs_touch(&self, clock: u64, entry: &HotEntry) -> bool {
        clock.saturating_sub(entry.stamp) >= self.touch_window
    }

    fn lookup_hot(&self, key: &str) -> HotLookup {
        {
            let tiers = self.tiers.read();
            if !tiers.enabled {
                return HotLookup::Disabled;
            }
            let Some(entry) = tiers.hot.get(key) else {
                return HotLookup::Miss;
            };
            if !self.is_expired(entry) && !self.needs_touch(tiers.hot_clock, entry) {
                return HotLookup::Hit;
            }
        }

        // Re-check under the write lock; another thread may have moved it
        let mut tiers = self.tiers.write();
        if !tiers.enabled {
            return HotLookup::Disabled;
        }
        let clock = tiers.hot_clock;
        let Some(entry) = tiers.hot.get(key) else {
            return HotLookup::Miss;
        };

        if self.is_expired(entry) {
            trace!(key, "hot entry expired");
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
            tiers.hot.remove(key);
            self.admit_hot(&mut tiers, key);
            return HotLookup::Expired;
        }

        if self.needs_touch(clock, entry) {
            tiers.hot_clock += 1;
            let stamp = tiers.hot_clock;
            if let Some(entry) = tiers.hot.get_mut(key) {
                entry.stamp = stamp;
            }
            tiers.hot.touch(key);
        }
        HotLookup::Hit
    }

    fn record_warm(&self, key: &str) {
        let mut tiers = self.tiers.write();
        if !tiers.enabled || tiers.hot.contains(key) {
            return;
        }

        let count = tiers.warm.get(key).map_or(0, |entry| entry.count) + 1;
        if count >= self.threshold {
            tiers.warm.remove(key);
            self.admit_hot(&mut tiers, key);
            self.stats.promotions.fetch_add(1, Ordering::Relaxed);
            trace!(key, count, "promoted to hot tier");
            return;
        }

        tiers.warm.insert(key, WarmEntry { count });
        let evicted = tiers.warm.evict_over(self.warm_max, key);
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    fn admit_hot(&self, tiers: &mut Tiers, key: &str) {
        tiers.hot_clock += 1;
        let entry = HotEntry {
            inserted: Instant::now(),
            stamp: tiers.hot_clock,
        };
        tiers.hot.insert(key, entry);
        let evicted = tiers.hot.evict_over(self.hot_max, key);
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Forget `key` in both tiers. Returns whether it was cached.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut tiers = self.tiers.write();
        let hot = tiers.hot.remove(key).is_some();
        let warm = tiers.warm.remove(key).is_some();
        hot || warm
    }

    /// Enable or disable the cache. Disabling drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        let mut tiers = self.tiers.write();
        if !enabled {
            tiers.hot.clear();
            tiers.warm.clear();
            tiers.hot_clock = 0;
        }
        tiers.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.tiers.read().enabled
    }

    /// Whether `key` is currently in the hot tier, ignoring TTL
    pub fn is_hot(&self, key: &str) -> bool {
        self.tiers.read().hot.contains(key)
    }

    /// Observation count of a warm entry
    pub fn warm_count(&self, key: &str) -> Option<u64> {
        self.tiers.read().warm.get(key).map(|entry| entry.count)
    }

    pub fn hot_len(&self) -> usize {
        self.tiers.read().hot.len()
    }

    pub fn warm_len(&self) -> usize {
        self.tiers.read().warm.len()
    }

    /// Cache statistics
    pub const fn stats(&self) -> &DirCacheStats {
        &self.stats
    }
}
