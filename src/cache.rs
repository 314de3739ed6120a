//! Cost-bounded response cache with TTL expiry and LRU eviction.
//!
//! Entries are keyed by request fingerprint and weighed by payload size.
//! When a store pushes the total cost over the configured maximum, the
//! least recently used entries are evicted until the cache is back under
//! budget. Expiry is checked on every lookup, so a stale entry is never
//! served no matter how much room the cache has.
//!
//! All time comes in through `now` arguments; the cache itself never reads
//! a clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on the summed cost, in payload bytes, of all entries.
    pub max_total_cost: usize,

    /// Freshness lifetime applied when a request sets no explicit TTL.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_cost: 4 * 1024 * 1024,
            default_ttl: Duration::from_secs(300),
        }
    }
}

/// A point-in-time snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Summed cost of all live entries, in bytes.
    pub total_cost: usize,
    /// Number of live entries.
    pub entry_count: usize,
}

struct CacheEntry {
    payload: Bytes,
    cost: usize,
    stored_at: Instant,
    ttl: Duration,
    last_used: u64,
}

#[derive(Default)]
struct CacheShared {
    entries: HashMap<String, CacheEntry>,
    // Monotone recency ticks to keys; the smallest tick is the eviction
    // candidate. Ticks are never reused, so eviction order is total.
    recency: BTreeMap<u64, String>,
    total_cost: usize,
    tick: u64,
}

impl CacheShared {
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
            self.total_cost -= entry.cost;
        }
    }
}

pub(crate) struct ResponseCache {
    config: CacheConfig,
    shared: Mutex<CacheShared>,
}

impl ResponseCache {
    pub(crate) fn new(config: CacheConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(CacheShared::default()),
        }
    }

    pub(crate) fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    fn locked(&self) -> MutexGuard<'_, CacheShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached payload if the entry exists and is still fresh.
    ///
    /// A hit refreshes the entry's recency. An expired entry is removed on
    /// the spot and reported as a miss.
    pub(crate) fn lookup(&self, key: &str, now: Instant) -> Option<Bytes> {
        let mut guard = self.locked();
        let shared = &mut *guard;

        let expired = {
            let entry = shared.entries.get(key)?;
            now.saturating_duration_since(entry.stored_at) >= entry.ttl
        };
        if expired {
            shared.remove(key);
            return None;
        }

        shared.tick += 1;
        let tick = shared.tick;
        let entry = shared.entries.get_mut(key)?;
        shared.recency.remove(&entry.last_used);
        entry.last_used = tick;
        shared.recency.insert(tick, key.to_owned());
        Some(entry.payload.clone())
    }

    /// Stores a payload, replacing any entry under the same key, then
    /// evicts least recently used entries until the total cost is within
    /// budget. A payload larger than the whole budget is evicted
    /// immediately, leaving the cache unchanged.
    pub(crate) fn store(&self, key: &str, payload: Bytes, ttl: Duration, now: Instant) {
        let mut guard = self.locked();
        let shared = &mut *guard;

        shared.remove(key);

        shared.tick += 1;
        let tick = shared.tick;
        let cost = payload.len();
        shared.entries.insert(
            key.to_owned(),
            CacheEntry {
                payload,
                cost,
                stored_at: now,
                ttl,
                last_used: tick,
            },
        );
        shared.recency.insert(tick, key.to_owned());
        shared.total_cost += cost;

        while shared.total_cost > self.config.max_total_cost {
            let Some((_, oldest)) = shared.recency.pop_first() else {
                break;
            };
            if let Some(entry) = shared.entries.remove(&oldest) {
                shared.total_cost -= entry.cost;
            }
        }
    }

    /// Drops a single entry. Absent keys are a no-op.
    pub(crate) fn invalidate(&self, key: &str) {
        self.locked().remove(key);
    }

    /// Drops every entry.
    pub(crate) fn invalidate_all(&self) {
        let mut guard = self.locked();
        guard.entries.clear();
        guard.recency.clear();
        guard.total_cost = 0;
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let guard = self.locked();
        CacheStats {
            total_cost: guard.total_cost,
            entry_count: guard.entries.len(),
        }
    }
}
