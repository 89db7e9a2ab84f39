//! TTL-bounded cache of fetched collections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::upstream::{Record, Records, ResourceKey};

/// The last successful fetch of one collection.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Records in upstream order.
    pub records: Records,
    /// When the fetch completed.
    pub fetched_at: Instant,
    /// Strictly increasing per key across puts.
    pub version: u64,
}

impl CacheEntry {
    /// Time since the records were retrieved.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.fetched_at)
    }

    /// Whether the entry may be served without consulting upstream.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

struct Slot {
    entry: CacheEntry,
    last_access: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
}

/// A concurrent cache serving collections while they are younger than the TTL.
///
/// Each key lives in one `DashMap` shard, so readers and the single writer
/// for a key only contend on that shard's lock, never across an upstream call.
pub struct FreshnessCache {
    entries: DashMap<ResourceKey, Slot>,
    ttl: Duration,
    capacity: usize,
    versions: AtomicU64,
    access_clock: AtomicU64,
}

impl FreshnessCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            versions: AtomicU64::new(0),
            access_clock: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.capacity)
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a fresh entry; expired or absent entries are a miss.
    pub fn get(&self, key: &ResourceKey) -> Option<CacheEntry> {
        let Some(slot) = self.entries.get(key) else {
            metrics::record_cache_event("miss");
            return None;
        };

        if !slot.entry.is_fresh(self.ttl) {
            tracing::debug!(key = %key, version = slot.entry.version, "Cache entry expired");
            metrics::record_cache_event("expired");
            return None;
        }

        slot.last_access.store(self.tick(), Ordering::Relaxed);
        metrics::record_cache_event("hit");
        Some(slot.entry.clone())
    }

    /// Look up an entry regardless of age.
    pub fn get_stale(&self, key: &ResourceKey) -> Option<CacheEntry> {
        let slot = self.entries.get(key)?;
        slot.last_access.store(self.tick(), Ordering::Relaxed);
        Some(slot.entry.clone())
    }

    /// Store a fresh fetch, replacing any previous entry for the key.
    pub fn put(&self, key: ResourceKey, records: Vec<Record>) -> CacheEntry {
        let entry = {
            // The version is drawn while the key's shard is locked, so two
            // writers for one key can never publish versions out of order.
            let slot = self.entries.entry(key.clone());
            let entry = CacheEntry {
                records: Arc::new(records),
                fetched_at: Instant::now(),
                version: self.versions.fetch_add(1, Ordering::SeqCst) + 1,
            };
            slot.insert(Slot {
                entry: entry.clone(),
                last_access: AtomicU64::new(self.tick()),
            });
            entry
        };

        tracing::debug!(
            key = %key,
            version = entry.version,
            records = entry.records.len(),
            "Cache entry stored"
        );

        self.evict_over_capacity();
        metrics::record_cache_size(self.entries.len());
        entry
    }

    /// Drop least recently used entries until the cache fits its capacity.
    fn evict_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|slot| slot.value().last_access.load(Ordering::Relaxed))
                .map(|slot| slot.key().clone());

            let Some(victim) = victim else { break };
            if self.entries.remove(&victim).is_some() {
                tracing::debug!(key = %victim, "Evicted least recently used cache entry");
                metrics::record_cache_event("eviction");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
