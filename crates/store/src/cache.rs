//! Risk-adaptive TTL cache.
//!
//! Concurrent map keyed by zone ID. The TTL of an entry is derived
//! from the risk assessed on the snapshot at write time: degrading
//! weather shortens the freshness window, calm weather stretches it so
//! quota is not wasted re-fetching a stable sky.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::config::CacheConfig;
use common::{risk, Clock, RiskLevel, WeatherSnapshot};
use dashmap::DashMap;
use tracing::debug;

/// One cached snapshot with its freshness window.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: WeatherSnapshot,
    pub risk: RiskLevel,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Seconds of freshness left, zero if expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Logical key for the plain current-conditions entry. Other keys
/// (e.g. `overlay:radar`) let derived layers share the same store.
pub const CURRENT_KEY: &str = "current";

/// In-memory weather cache keyed by `(zone, logical key)`. Lookups on
/// expired entries behave as misses and evict the entry; a periodic
/// sweep clears the rest. Concurrent puts are last-writer-wins.
pub struct WeatherCache {
    entries: DashMap<(String, String), CacheEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl WeatherCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    /// Fresh current-conditions entry for the zone, or `None`.
    pub fn get(&self, zone_id: &str) -> Option<CacheEntry> {
        self.get_keyed(zone_id, CURRENT_KEY)
    }

    /// Fresh entry under an explicit logical key. Expired entries are
    /// evicted on the way out.
    pub fn get_keyed(&self, zone_id: &str, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let map_key = (zone_id.to_string(), key.to_string());
        // Clone out and release the shard lock before evicting.
        let entry = self.entries.get(&map_key)?.clone();
        if entry.is_fresh(now) {
            Some(entry)
        } else {
            self.entries.remove(&map_key);
            None
        }
    }

    /// Store a current-conditions snapshot, assessing its risk to pick
    /// the TTL. Returns the assessed risk so the caller does not
    /// re-score.
    pub fn put(&self, zone_id: &str, snapshot: WeatherSnapshot) -> RiskLevel {
        self.put_keyed(zone_id, CURRENT_KEY, snapshot)
    }

    pub fn put_keyed(&self, zone_id: &str, key: &str, snapshot: WeatherSnapshot) -> RiskLevel {
        let level = risk::assess(&snapshot);
        let ttl = Duration::minutes(i64::from(self.config.ttl_minutes(level)));
        let stored_at = self.clock.now();

        debug!(
            "Cache put {zone_id}/{key}: risk={} ttl={}min",
            level.as_str(),
            ttl.num_minutes()
        );

        self.entries.insert(
            (zone_id.to_string(), key.to_string()),
            CacheEntry {
                snapshot,
                risk: level,
                stored_at,
                expires_at: stored_at + ttl,
            },
        );
        level
    }

    /// Drop every entry for the zone, all logical keys included.
    pub fn invalidate(&self, zone_id: &str) {
        self.entries.retain(|(zone, _), _| zone != zone_id);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
