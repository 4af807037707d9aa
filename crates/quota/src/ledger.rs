//! Daily quota ledger.
//!
//! Single-writer accounting of upstream calls against the daily
//! ceiling. `reserve` places a hold on one unit and hands back a
//! `Reservation` token; `commit` (or `release`) takes the token back.
//! Holds count against the ceiling and the slot budget, so two workers
//! can never both spend the last unit of quota, and the token pins the
//! admitting slot so a call that straddles an hour or midnight
//! boundary is booked where it was admitted. One record exists per
//! calendar date; the day's record is persisted as
//! `quota-YYYY-MM-DD.json` under the data dir and past days are
//! archived, never destroyed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use common::config::QuotaConfig;
use common::{Clock, Error, Result, ZoneRegistry};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::schedule::{build_daily_schedule, next_available_hour, ScheduleSlot, SlotStatus};

/// Proof of one admitted upstream call. The date and hour are the
/// slot that granted admission; `commit` and `release` book against
/// them, not against the wall clock at completion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub date: NaiveDate,
    pub hour: u32,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed(Reservation),
    Denied(DenyReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

/// Why a reservation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// `consumed` has reached the daily ceiling.
    QuotaExhausted,
    /// The current hour's slot already ran to completion.
    SlotCompleted { hour: u32 },
    /// The zone is not in the current slot's eligibility list.
    NotEligible { zone: String },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::QuotaExhausted => write!(f, "daily quota exhausted"),
            DenyReason::SlotCompleted { hour } => write!(f, "slot {hour:02}:00 already completed"),
            DenyReason::NotEligible { zone } => {
                write!(f, "zone {zone} not eligible in the current slot")
            }
        }
    }
}

/// Secondary counters kept alongside the hard quota count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub live_calls: u32,
    #[serde(default)]
    pub failed_calls: u32,
    #[serde(default)]
    pub cache_hits: u32,
    #[serde(default)]
    pub cache_misses: u32,
    #[serde(default)]
    pub forced_refreshes: u32,
}

/// One calendar day's ledger record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub ceiling: u32,
    pub consumed: u32,
    pub schedule: BTreeMap<u32, ScheduleSlot>,
    #[serde(default)]
    pub usage: UsageCounters,
}

/// Snapshot of the day's accounting for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStats {
    pub date: NaiveDate,
    pub ceiling: u32,
    pub consumed: u32,
    pub remaining: u32,
    pub usage_percentage: f64,
    pub completed_slots: usize,
    pub total_slots: usize,
    pub next_available_hour: Option<u32>,
    pub usage: UsageCounters,
    pub schedule: BTreeMap<u32, ScheduleSlot>,
}

struct LedgerInner {
    current: DayRecord,
    /// Past days, kept for audit; never pruned during a process run.
    archive: BTreeMap<NaiveDate, DayRecord>,
    /// Outstanding reservations per admitting slot, not yet committed
    /// or released. Counted against the ceiling and the slot budget.
    pending: BTreeMap<(NaiveDate, u32), u32>,
}

/// The quota ledger. Cheap to clone via `Arc` by callers; internally a
/// single mutex makes reserve/commit linearizable.
pub struct QuotaLedger {
    inner: Mutex<LedgerInner>,
    config: QuotaConfig,
    registry: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
    data_dir: Option<PathBuf>,
}

impl QuotaLedger {
    /// Open the ledger, resuming today's record from disk when present.
    pub fn open(
        config: QuotaConfig,
        registry: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = &data_dir {
            fs::create_dir_all(dir)?;
        }

        let today = clock.today();
        let current = load_or_build(&config, &registry, today, data_dir.as_deref());
        info!(
            "Quota ledger open for {}: {}/{} consumed",
            today, current.consumed, current.ceiling
        );

        Ok(Self {
            inner: Mutex::new(LedgerInner {
                current,
                archive: BTreeMap::new(),
                pending: BTreeMap::new(),
            }),
            config,
            registry,
            clock,
            data_dir,
        })
    }

    /// Admission check for one upstream call. On success the returned
    /// token holds one unit of quota until `commit` or `release`.
    ///
    /// `forced` bypasses the eligibility list only; the ceiling,
    /// completed-slot, and slot-budget checks still apply, so a forced
    /// refresh cannot silently exceed the daily budget.
    pub async fn reserve(&self, zone_id: &str, forced: bool) -> Admission {
        let mut inner = self.inner.lock().await;
        self.roll_day(&mut inner);

        let date = inner.current.date;
        let hour = self.clock.current_hour();
        let pending_today: u32 = inner
            .pending
            .iter()
            .filter(|((d, _), _)| *d == date)
            .map(|(_, n)| *n)
            .sum();
        let slot_pending = inner.pending.get(&(date, hour)).copied().unwrap_or(0);

        let record = &inner.current;
        if record.consumed + pending_today >= record.ceiling {
            debug!("reserve({zone_id}): denied, quota exhausted");
            return Admission::Denied(DenyReason::QuotaExhausted);
        }

        match record.schedule.get(&hour) {
            Some(slot) if slot.is_completed() => {
                debug!("reserve({zone_id}): denied, slot {hour} completed");
                return Admission::Denied(DenyReason::SlotCompleted { hour });
            }
            Some(slot) if slot.executed + slot_pending >= slot.planned => {
                debug!("reserve({zone_id}): denied, slot {hour} budget fully reserved");
                return Admission::Denied(DenyReason::SlotCompleted { hour });
            }
            Some(slot) if !forced && !slot.zones.iter().any(|z| z == zone_id) => {
                debug!("reserve({zone_id}): denied, not in slot {hour} eligibility");
                return Admission::Denied(DenyReason::NotEligible {
                    zone: zone_id.to_string(),
                });
            }
            Some(_) => {}
            // Hours past the ceiling cut-off have no slot: empty
            // eligibility, so only a forced refresh passes.
            None if forced => {}
            None => {
                return Admission::Denied(DenyReason::NotEligible {
                    zone: zone_id.to_string(),
                })
            }
        }

        *inner.pending.entry((date, hour)).or_insert(0) += 1;
        Admission::Allowed(Reservation { date, hour })
    }

    /// Record an upstream call that was actually made. Success and
    /// failure both consume quota — the provider was contacted either
    /// way. The token's slot gets the accounting, even when the day
    /// has rolled over since the reservation.
    pub async fn commit(&self, token: Reservation, success: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.roll_day(&mut inner);
        take_pending(&mut inner, token);

        let is_current = inner.current.date == token.date;
        let record = if is_current {
            &mut inner.current
        } else {
            match inner.archive.get_mut(&token.date) {
                Some(record) => record,
                None => {
                    warn!("Commit against unknown ledger day {}; dropped", token.date);
                    return Ok(());
                }
            }
        };

        record.consumed += 1;
        if record.consumed > record.ceiling {
            // Unreachable through reserve: every commit carries a hold
            // that was already counted against the ceiling.
            error!(
                "Ledger invariant breach on {}: consumed {} exceeds ceiling {}",
                record.date, record.consumed, record.ceiling
            );
            debug_assert!(record.consumed <= record.ceiling);
        }
        if success {
            record.usage.live_calls += 1;
        } else {
            record.usage.failed_calls += 1;
        }

        let mut corrupted = false;
        if let Some(slot) = record.schedule.get_mut(&token.hour) {
            slot.executed += 1;
            if slot.executed > slot.planned {
                corrupted = true;
            } else if slot.executed == slot.planned {
                slot.status = SlotStatus::Completed;
            } else if slot.status == SlotStatus::Pending {
                slot.status = SlotStatus::Active;
            }
        }

        if corrupted {
            // executed > planned means accounting went wrong somewhere;
            // rebuild the day's schedule instead of crashing. Consumed
            // is the hard invariant and is preserved. An archived day
            // gets no rebuild, its schedule will never run again.
            error!(
                "Schedule corruption in slot {:02}:00 on {}; rebuilding schedule",
                token.hour, record.date
            );
            if is_current {
                let mut fresh =
                    build_daily_schedule(record.ceiling, &self.registry, &self.config);
                let now_hour = self.clock.current_hour();
                for (h, slot) in fresh.iter_mut() {
                    if *h < now_hour {
                        slot.status = SlotStatus::Completed;
                    }
                }
                record.schedule = fresh;
            }
        }

        self.persist(record)
            .map_err(|e| Error::Storage(format!("failed to persist quota ledger: {e}")))
    }

    /// Give back a reservation that will not be spent. The held unit
    /// becomes available again; nothing is booked.
    pub async fn release(&self, token: Reservation) {
        let mut inner = self.inner.lock().await;
        take_pending(&mut inner, token);
    }

    /// Mark the slot completed once its eligible zones are processed,
    /// even if budget is left over.
    pub async fn finish_slot(&self, hour: u32) {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.current.schedule.get_mut(&hour) {
            if !slot.is_completed() {
                slot.status = SlotStatus::Completed;
            }
        }
        let record = inner.current.clone();
        if let Err(e) = self.persist(&record) {
            warn!("Ledger persist after slot completion failed: {e}");
        }
    }

    /// Eligible work for the current hour, if any.
    pub async fn current_slot(&self) -> Option<ScheduleSlot> {
        let mut inner = self.inner.lock().await;
        self.roll_day(&mut inner);
        let hour = self.clock.current_hour();
        inner.current.schedule.get(&hour).cloned()
    }

    pub async fn record_cache_hit(&self) {
        self.inner.lock().await.current.usage.cache_hits += 1;
    }

    pub async fn record_cache_miss(&self) {
        self.inner.lock().await.current.usage.cache_misses += 1;
    }

    pub async fn record_forced_refresh(&self) {
        self.inner.lock().await.current.usage.forced_refreshes += 1;
    }

    /// Snapshot of today's accounting.
    pub async fn stats(&self) -> QuotaStats {
        let mut inner = self.inner.lock().await;
        self.roll_day(&mut inner);
        let hour = self.clock.current_hour();
        snapshot_stats(&inner.current, hour)
    }

    /// Accounting for an arbitrary date, if this process has seen it.
    pub async fn stats_for(&self, date: NaiveDate) -> Option<QuotaStats> {
        let inner = self.inner.lock().await;
        if inner.current.date == date {
            return Some(snapshot_stats(&inner.current, self.clock.current_hour()));
        }
        inner
            .archive
            .get(&date)
            .map(|record| snapshot_stats(record, 24))
    }

    /// Roll the ledger to `date`. Idempotent: calling it twice for the
    /// same date neither duplicates records nor resets counters.
    pub async fn rollover(&self, date: NaiveDate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.current.date == date {
            return Ok(());
        }

        let previous = std::mem::replace(
            &mut inner.current,
            load_or_build(&self.config, &self.registry, date, self.data_dir.as_deref()),
        );
        info!(
            "Quota rollover: {} ({} consumed) -> {}",
            previous.date, previous.consumed, date
        );
        inner.archive.insert(previous.date, previous);

        let record = inner.current.clone();
        self.persist(&record)
            .map_err(|e| Error::Storage(format!("failed to persist new ledger: {e}")))
    }

    // Lazy day roll on the hot paths; persistence failures here only
    // warn, the in-memory record stays authoritative.
    fn roll_day(&self, inner: &mut LedgerInner) {
        let today = self.clock.today();
        if inner.current.date == today {
            return;
        }

        let previous = std::mem::replace(
            &mut inner.current,
            load_or_build(&self.config, &self.registry, today, self.data_dir.as_deref()),
        );
        info!(
            "Quota rollover: {} ({} consumed) -> {}",
            previous.date, previous.consumed, today
        );
        inner.archive.insert(previous.date, previous);

        if let Err(e) = self.persist(&inner.current) {
            warn!("Ledger persist after rollover failed: {e}");
        }
    }

    fn persist(&self, record: &DayRecord) -> std::io::Result<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(record_path(dir, record.date), data)
    }
}

fn take_pending(inner: &mut LedgerInner, token: Reservation) {
    if let Some(count) = inner.pending.get_mut(&(token.date, token.hour)) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            inner.pending.remove(&(token.date, token.hour));
        }
    }
}

fn record_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("quota-{date}.json"))
}

fn load_or_build(
    config: &QuotaConfig,
    registry: &ZoneRegistry,
    date: NaiveDate,
    data_dir: Option<&Path>,
) -> DayRecord {
    if let Some(dir) = data_dir {
        let path = record_path(dir, date);
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(Error::Io)
                .and_then(|raw| serde_json::from_str::<DayRecord>(&raw).map_err(Error::Json))
            {
                Ok(record) if record.date == date => {
                    if validate_record(&record) {
                        return record;
                    }
                    warn!("Persisted ledger for {date} violates invariants; rebuilding");
                }
                Ok(_) => warn!("Persisted ledger at {} has wrong date; rebuilding", path.display()),
                Err(e) => warn!("Could not read persisted ledger for {date}: {e}"),
            }
        }
    }

    DayRecord {
        date,
        ceiling: config.daily_call_limit,
        consumed: 0,
        schedule: build_daily_schedule(config.daily_call_limit, registry, config),
        usage: UsageCounters::default(),
    }
}

fn validate_record(record: &DayRecord) -> bool {
    record.consumed <= record.ceiling
        && record
            .schedule
            .values()
            .all(|slot| slot.executed <= slot.planned)
}

fn snapshot_stats(record: &DayRecord, hour: u32) -> QuotaStats {
    let completed = record
        .schedule
        .values()
        .filter(|s| s.is_completed())
        .count();
    QuotaStats {
        date: record.date,
        ceiling: record.ceiling,
        consumed: record.consumed,
        remaining: record.ceiling.saturating_sub(record.consumed),
        usage_percentage: if record.ceiling == 0 {
            0.0
        } else {
            f64::from(record.consumed) / f64::from(record.ceiling) * 100.0
        },
        completed_slots: completed,
        total_slots: record.schedule.len(),
        next_available_hour: next_available_hour(&record.schedule, hour),
        usage: record.usage,
        schedule: record.schedule.clone(),
    }
}
