//! Consumer-facing facade.
//!
//! `get_current` is the one entry point consumers see. It hides quota
//! accounting, TTL decisions, and degradation behind a single total
//! call: there is always a report, and the source tag says how good it
//! is. Nothing above this layer is allowed to talk to the provider or
//! the ledger directly.

use std::sync::Arc;

use common::{
    Clock, Error, Result, SourceTag, WeatherReport, ZoneRegistry,
};
use owm_client::WeatherProvider;
use quota::{Admission, DenyReason, QuotaLedger, QuotaStats, Reservation};
use serde::Serialize;
use serde_json::json;
use store::{BackupLog, FallbackCascade, WeatherCache};
use tracing::{debug, info, warn};

use crate::journal::{now_iso, EventJournal};

/// One-shot status summary for the CLI and journal.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub quota: QuotaStats,
    pub cached_zones: usize,
    pub backup_records: usize,
    pub zone_count: usize,
}

pub struct Orchestrator {
    ledger: Arc<QuotaLedger>,
    cache: Arc<WeatherCache>,
    backups: Arc<BackupLog>,
    cascade: Arc<FallbackCascade>,
    provider: Arc<dyn WeatherProvider>,
    registry: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
    journal: Arc<EventJournal>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<QuotaLedger>,
        cache: Arc<WeatherCache>,
        backups: Arc<BackupLog>,
        cascade: Arc<FallbackCascade>,
        provider: Arc<dyn WeatherProvider>,
        registry: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
        journal: Arc<EventJournal>,
    ) -> Self {
        Self {
            ledger,
            cache,
            backups,
            cascade,
            provider,
            registry,
            clock,
            journal,
        }
    }

    /// Current weather for a zone. Total: cache first, then a live
    /// call if quota admits one, otherwise the degradation cascade.
    pub async fn get_current(&self, zone_id: &str) -> WeatherReport {
        if let Some(entry) = self.cache.get(zone_id) {
            self.ledger.record_cache_hit().await;
            debug!(
                "Cache hit for {zone_id} ({}s left)",
                entry.remaining_secs(self.clock.now())
            );
            return WeatherReport {
                zone_id: zone_id.to_string(),
                snapshot: entry.snapshot,
                source: SourceTag::Cache,
                is_live: false,
                risk: entry.risk,
                served_at: self.clock.now(),
            };
        }
        self.ledger.record_cache_miss().await;

        let Some(zone) = self.registry.get(zone_id) else {
            warn!("Request for unknown zone {zone_id}");
            return self.cascade.resolve(zone_id);
        };

        // On-demand misses are gated by quota alone; the slot
        // eligibility list only shapes the background schedule.
        match self.ledger.reserve(zone_id, true).await {
            Admission::Allowed(token) => {
                self.fetch_live(zone_id, zone.lat, zone.lon, token).await
            }
            Admission::Denied(reason) => {
                debug!("Live call for {zone_id} denied: {reason}");
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "live_call_denied",
                    "zone": zone_id,
                    "reason": reason.to_string()
                }));
                self.cascade.resolve(zone_id)
            }
        }
    }

    async fn fetch_live(
        &self,
        zone_id: &str,
        lat: f64,
        lon: f64,
        token: Reservation,
    ) -> WeatherReport {
        match self.provider.fetch(lat, lon).await {
            Ok(snapshot) => {
                if let Err(e) = self.ledger.commit(token, true).await {
                    warn!("Ledger commit failed after live call: {e}");
                }
                let level = self.cache.put(zone_id, snapshot.clone());
                self.backups.append(zone_id, &snapshot, level);
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "live_fetch",
                    "zone": zone_id,
                    "risk": level.as_str()
                }));
                WeatherReport {
                    zone_id: zone_id.to_string(),
                    snapshot,
                    source: SourceTag::Live,
                    is_live: true,
                    risk: level,
                    served_at: self.clock.now(),
                }
            }
            Err(e) => {
                // Spent quota, got nothing back. Degrade.
                if let Err(commit_err) = self.ledger.commit(token, false).await {
                    warn!("Ledger commit failed after provider error: {commit_err}");
                }
                warn!("Live call for {zone_id} failed: {e}; degrading");
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "live_fetch_failed",
                    "zone": zone_id,
                    "error": e.to_string()
                }));
                self.cascade.resolve(zone_id)
            }
        }
    }

    /// Operator-triggered refresh. Bypasses slot eligibility but still
    /// spends quota; fails rather than degrade so the operator sees
    /// the true outcome.
    pub async fn force_refresh(&self, zone_id: &str) -> Result<WeatherReport> {
        let zone = self
            .registry
            .get(zone_id)
            .ok_or_else(|| Error::ZoneUnknown(zone_id.to_string()))?;

        let token = match self.ledger.reserve(zone_id, true).await {
            Admission::Allowed(token) => token,
            Admission::Denied(DenyReason::QuotaExhausted) => return Err(Error::QuotaExhausted),
            Admission::Denied(reason) => {
                return Err(Error::Other(format!("forced refresh denied: {reason}")))
            }
        };
        self.ledger.record_forced_refresh().await;

        let (lat, lon) = (zone.lat, zone.lon);
        match self.provider.fetch(lat, lon).await {
            Ok(snapshot) => {
                self.ledger.commit(token, true).await?;
                let level = self.cache.put(zone_id, snapshot.clone());
                self.backups.append(zone_id, &snapshot, level);
                info!("Forced refresh of {zone_id}: risk={}", level.as_str());
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "forced_refresh",
                    "zone": zone_id,
                    "risk": level.as_str()
                }));
                Ok(WeatherReport {
                    zone_id: zone_id.to_string(),
                    snapshot,
                    source: SourceTag::Live,
                    is_live: true,
                    risk: level,
                    served_at: self.clock.now(),
                })
            }
            Err(e) => {
                self.ledger.commit(token, false).await?;
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            quota: self.ledger.stats().await,
            cached_zones: self.cache.len(),
            backup_records: self.backups.len(),
            zone_count: self.registry.len(),
        }
    }
}
