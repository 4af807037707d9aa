//! Degradation cascade.
//!
//! Total resolution for "give me weather for this zone" when a live
//! call is off the table: fresh cache, then a recent backup, then a
//! climatology-generated snapshot, then the emergency constant. The
//! last level cannot fail, so neither can `resolve`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{risk, Clock, SourceTag, WeatherReport, WeatherSnapshot, ZoneRegistry};
use tracing::warn;

use crate::backup::BackupLog;
use crate::cache::WeatherCache;
use crate::synth;

/// Description carried by the emergency constant.
pub const EMERGENCY_DESCRIPTION: &str = "conditions tropicales normales";

/// Hardcoded typical-trade-wind snapshot, served when every other
/// level comes up empty.
pub fn emergency_snapshot(now: DateTime<Utc>) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature_c: 28.0,
        humidity_pct: 75,
        wind_speed_kmh: 15.0,
        wind_direction_deg: Some(90),
        pressure_hpa: Some(1013.0),
        precipitation_mm: 0.0,
        precipitation_probability: Some(20),
        visibility_km: Some(15.0),
        uv_index: None,
        description: EMERGENCY_DESCRIPTION.to_string(),
        icon: "02d".to_string(),
        observed_at: now,
    }
}

/// Walks the fallback levels in order of decreasing quality.
pub struct FallbackCascade {
    cache: Arc<WeatherCache>,
    backups: Arc<BackupLog>,
    registry: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
}

impl FallbackCascade {
    pub fn new(
        cache: Arc<WeatherCache>,
        backups: Arc<BackupLog>,
        registry: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            backups,
            registry,
            clock,
        }
    }

    /// Resolve a report without touching the upstream. Never fails;
    /// the source tag tells the consumer how degraded the answer is.
    pub fn resolve(&self, zone_id: &str) -> WeatherReport {
        let now = self.clock.now();

        if let Some(entry) = self.cache.get(zone_id) {
            return report(zone_id, entry.snapshot, SourceTag::Cache, now);
        }

        if let Some(record) = self.backups.latest(zone_id) {
            warn!(
                "Serving {zone_id} from backup, {}h old",
                record.age_hours(now)
            );
            return report(zone_id, record.snapshot, SourceTag::RecentBackup, now);
        }

        if let Some(zone) = self.registry.get(zone_id) {
            warn!("Serving {zone_id} from climatology model");
            return report(zone_id, synth::generate(zone, now), SourceTag::Generated, now);
        }

        // Unknown zone or totally empty stores: last resort.
        warn!("Serving {zone_id} from emergency constant");
        report(zone_id, emergency_snapshot(now), SourceTag::Emergency, now)
    }
}

fn report(
    zone_id: &str,
    snapshot: WeatherSnapshot,
    source: SourceTag,
    served_at: DateTime<Utc>,
) -> WeatherReport {
    let level = risk::assess(&snapshot);
    WeatherReport {
        zone_id: zone_id.to_string(),
        risk: level,
        is_live: false,
        source,
        snapshot,
        served_at,
    }
}
