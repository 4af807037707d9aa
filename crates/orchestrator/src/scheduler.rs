//! Background refresh scheduler.
//!
//! Three long-lived tasks keep the stores warm without operator input:
//! the refresh loop walks the current schedule slot and spends its
//! budget on eligible zones, the sweep loop evicts expired cache
//! entries and purges stale backups, and the rollover loop resets the
//! ledger at the UTC midnight boundary. All three stop on the shared
//! watch signal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::config::TimingConfig;
use common::{Clock, Error, Result, ZoneRegistry};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use owm_client::WeatherProvider;
use quota::{Admission, DenyReason, QuotaLedger, Reservation};
use serde::Serialize;
use serde_json::json;
use store::{BackupLog, WeatherCache};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::journal::{now_iso, EventJournal};

/// Lifecycle snapshot for the status surface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_tasks: usize,
}

pub struct RefreshScheduler {
    ledger: Arc<QuotaLedger>,
    cache: Arc<WeatherCache>,
    backups: Arc<BackupLog>,
    provider: Arc<dyn WeatherProvider>,
    registry: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
    journal: Arc<EventJournal>,
    // Paces consecutive upstream calls within a slot.
    limiter: DefaultDirectRateLimiter,
    active_tasks: AtomicUsize,
}

impl RefreshScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<QuotaLedger>,
        cache: Arc<WeatherCache>,
        backups: Arc<BackupLog>,
        provider: Arc<dyn WeatherProvider>,
        registry: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
        timing: TimingConfig,
        journal: Arc<EventJournal>,
    ) -> Result<Self> {
        let period = Duration::from_millis(timing.inter_call_delay_ms.max(1));
        let quota = Quota::with_period(period)
            .ok_or_else(|| Error::Config("inter_call_delay_ms must be non-zero".into()))?;

        Ok(Self {
            ledger,
            cache,
            backups,
            provider,
            registry,
            clock,
            timing,
            journal,
            limiter: RateLimiter::direct(quota),
            active_tasks: AtomicUsize::new(0),
        })
    }

    pub fn status(&self) -> SchedulerStatus {
        let active = self.active_tasks.load(Ordering::SeqCst);
        SchedulerStatus {
            running: active > 0,
            active_tasks: active,
        }
    }

    /// Spawn the three background loops. Each exits when `stop` flips.
    pub fn spawn(self: &Arc<Self>, stop: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        let refresher = self.clone();
        let mut refresh_stop = stop.clone();
        handles.push(tokio::spawn(async move {
            refresher.active_tasks.fetch_add(1, Ordering::SeqCst);
            loop {
                let wait = match refresher.run_slot_cycle().await {
                    Ok(()) => Duration::from_secs(refresher.timing.slot_check_interval_secs),
                    Err(e) => {
                        error!("Refresh cycle failed: {e}; backing off");
                        refresher.journal.write_event(json!({
                            "ts": now_iso(),
                            "kind": "refresh_cycle_error",
                            "error": e.to_string()
                        }));
                        Duration::from_secs(refresher.timing.error_backoff_secs)
                    }
                };
                tokio::select! {
                    _ = refresh_stop.changed() => break,
                    _ = sleep(wait) => {}
                }
            }
            refresher.active_tasks.fetch_sub(1, Ordering::SeqCst);
            info!("Refresh loop stopped");
        }));

        let sweeper = self.clone();
        let mut sweep_stop = stop.clone();
        handles.push(tokio::spawn(async move {
            sweeper.active_tasks.fetch_add(1, Ordering::SeqCst);
            loop {
                tokio::select! {
                    _ = sweep_stop.changed() => break,
                    _ = sleep(Duration::from_secs(sweeper.timing.sweep_interval_secs)) => {}
                }
                sweeper.run_sweep();
            }
            sweeper.active_tasks.fetch_sub(1, Ordering::SeqCst);
            info!("Sweep loop stopped");
        }));

        let roller = self.clone();
        let mut roll_stop = stop;
        handles.push(tokio::spawn(async move {
            roller.active_tasks.fetch_add(1, Ordering::SeqCst);
            let mut current_day = roller.clock.today();
            loop {
                tokio::select! {
                    _ = roll_stop.changed() => break,
                    _ = sleep(Duration::from_secs(60)) => {}
                }
                let today = roller.clock.today();
                if today != current_day {
                    match roller.ledger.rollover(today).await {
                        Ok(()) => {
                            info!("Midnight rollover to {today}");
                            roller.journal.write_event(json!({
                                "ts": now_iso(),
                                "kind": "quota_rollover",
                                "date": today.to_string()
                            }));
                            current_day = today;
                        }
                        Err(e) => error!("Rollover to {today} failed: {e}"),
                    }
                }
            }
            roller.active_tasks.fetch_sub(1, Ordering::SeqCst);
            info!("Rollover loop stopped");
        }));

        handles
    }

    /// One pass over the current schedule slot. Errors here are
    /// storage-level; provider failures are absorbed per zone.
    pub async fn run_slot_cycle(&self) -> Result<()> {
        let Some(slot) = self.ledger.current_slot().await else {
            return Ok(());
        };
        if slot.is_completed() {
            return Ok(());
        }

        let hour = slot.hour;
        let mut refreshed = 0u32;
        let mut failed = 0u32;
        let mut skipped = 0u32;
        let mut exhausted = false;

        for zone_id in &slot.zones {
            if !self.due_for_refresh(zone_id) {
                skipped += 1;
                continue;
            }

            let token = match self.ledger.reserve(zone_id, false).await {
                Admission::Allowed(token) => token,
                Admission::Denied(DenyReason::QuotaExhausted) => {
                    warn!("Daily quota exhausted mid-slot at {hour:02}:00");
                    exhausted = true;
                    break;
                }
                Admission::Denied(reason) => {
                    debug!("Skipping {zone_id}: {reason}");
                    skipped += 1;
                    continue;
                }
            };

            self.limiter.until_ready().await;
            if self.refresh_zone(zone_id, token).await? {
                refreshed += 1;
            } else {
                failed += 1;
            }
        }

        // Close the slot once every eligible zone is up to date; keep
        // it open while failures remain so the next pass can retry.
        if !exhausted && failed == 0 {
            self.ledger.finish_slot(hour).await;
        }

        if refreshed + failed > 0 {
            info!(
                "Slot {hour:02}:00 cycle: {refreshed} refreshed, {failed} failed, {skipped} skipped"
            );
            self.journal.write_event(json!({
                "ts": now_iso(),
                "kind": "slot_cycle",
                "hour": hour,
                "refreshed": refreshed,
                "failed": failed,
                "skipped": skipped
            }));
        }
        Ok(())
    }

    // A zone refreshed recently enough is not re-fetched even when the
    // slot lists it. The last refresh time comes from the backup log,
    // which is replayed from disk, so spacing holds across restarts.
    fn due_for_refresh(&self, zone_id: &str) -> bool {
        let Some(zone) = self.registry.get(zone_id) else {
            return false;
        };
        let Some(last) = self.backups.latest_any_age(zone_id) else {
            return true;
        };
        let spacing = chrono::Duration::hours(i64::from(zone.min_refresh_hours));
        self.clock.now() - last.saved_at >= spacing
    }

    async fn refresh_zone(&self, zone_id: &str, token: Reservation) -> Result<bool> {
        let Some(zone) = self.registry.get(zone_id) else {
            self.ledger.release(token).await;
            return Ok(false);
        };

        match self.provider.fetch(zone.lat, zone.lon).await {
            Ok(snapshot) => {
                self.ledger.commit(token, true).await?;
                let level = self.cache.put(zone_id, snapshot.clone());
                self.backups.append(zone_id, &snapshot, level);
                debug!("Refreshed {zone_id}: risk={}", level.as_str());
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "zone_refreshed",
                    "zone": zone_id,
                    "risk": level.as_str()
                }));
                Ok(true)
            }
            Err(e) => {
                // The call was made; it costs quota either way.
                self.ledger.commit(token, false).await?;
                warn!("Refresh of {zone_id} failed: {e}");
                self.journal.write_event(json!({
                    "ts": now_iso(),
                    "kind": "refresh_failed",
                    "zone": zone_id,
                    "error": e.to_string()
                }));
                Ok(false)
            }
        }
    }

    /// Evict expired cache entries and purge stale backups.
    pub fn run_sweep(&self) {
        let evicted = self.cache.sweep();
        let purged = self.backups.purge_stale();
        info!("Sweep: {evicted} cache entries evicted, {purged} backups purged");
        self.journal.write_event(json!({
            "ts": now_iso(),
            "kind": "sweep",
            "cache_evicted": evicted,
            "backups_purged": purged
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{calm_snapshot, fixture, ScriptedProvider};
    use chrono::Duration as ChronoDuration;
    use common::RiskLevel;

    #[tokio::test]
    async fn test_slot_cycle_refreshes_eligible_zones() {
        let provider = Arc::new(ScriptedProvider::ok(27.5));
        let fix = fixture(provider.clone(), 12, 1000);

        fix.scheduler.run_slot_cycle().await.unwrap();

        let slot = fix
            .ledger
            .stats()
            .await
            .schedule
            .get(&12)
            .cloned()
            .unwrap();
        assert_eq!(provider.calls(), slot.zones.len());
        assert_eq!(fix.ledger.stats().await.consumed as usize, slot.zones.len());
        for zone in &slot.zones {
            assert!(fix.cache.get(zone).is_some(), "{zone} not cached");
        }
        assert!(slot.is_completed(), "slot left open after full pass");
    }

    #[tokio::test]
    async fn test_completed_slot_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::ok(27.5));
        let fix = fixture(provider.clone(), 12, 1000);

        fix.scheduler.run_slot_cycle().await.unwrap();
        let after_first = provider.calls();
        fix.scheduler.run_slot_cycle().await.unwrap();
        assert_eq!(provider.calls(), after_first, "completed slot re-executed");
    }

    #[tokio::test]
    async fn test_min_refresh_spacing_skips_recent_zones() {
        let provider = Arc::new(ScriptedProvider::ok(27.5));
        let fix = fixture(provider.clone(), 12, 1000);

        fix.scheduler.run_slot_cycle().await.unwrap();
        let after_first = provider.calls();

        // One hour later: a new slot, but high-priority zones have a
        // 2-hour minimum spacing.
        fix.clock.advance(ChronoDuration::hours(1));
        fix.scheduler.run_slot_cycle().await.unwrap();
        assert_eq!(provider.calls(), after_first);

        fix.clock.advance(ChronoDuration::hours(2));
        fix.scheduler.run_slot_cycle().await.unwrap();
        assert!(provider.calls() > after_first, "spacing never released");
    }

    #[tokio::test]
    async fn test_replayed_backups_enforce_spacing_after_restart() {
        let provider = Arc::new(ScriptedProvider::ok(27.5));
        let fix = fixture(provider.clone(), 12, 1000);

        // Seed the backup log the way a previous process run leaves it
        // after refreshing the whole slot. Spacing is derived from
        // these records, not from in-process state.
        let slot = fix.ledger.stats().await.schedule.get(&12).cloned().unwrap();
        for zone in &slot.zones {
            fix.backups.append(zone, &calm_snapshot(), RiskLevel::Low);
        }

        fix.scheduler.run_slot_cycle().await.unwrap();
        assert_eq!(
            provider.calls(),
            0,
            "zones inside their refresh spacing were re-fetched"
        );
    }

    #[tokio::test]
    async fn test_provider_failure_consumes_quota_and_keeps_slot_open() {
        let provider = Arc::new(ScriptedProvider::failing());
        let fix = fixture(provider.clone(), 12, 1000);

        fix.scheduler.run_slot_cycle().await.unwrap();

        let stats = fix.ledger.stats().await;
        assert!(stats.consumed > 0, "failed calls must still consume quota");
        assert_eq!(stats.usage.live_calls, 0);
        assert!(stats.usage.failed_calls > 0);

        let slot = stats.schedule.get(&12).cloned().unwrap();
        assert!(
            !slot.is_completed(),
            "slot closed with failures outstanding"
        );
    }
}
