//! Orchestration layer: facade, refresh scheduler, event journal.
//!
//! `build` wires the whole stack (ledger, cache, backups, cascade,
//! journal) from one config and one provider, so the binary and the
//! tests construct the system the same way.

pub mod facade;
pub mod journal;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testutil;

use std::path::PathBuf;
use std::sync::Arc;

use common::{AppConfig, Clock, Result, ZoneRegistry};
use owm_client::WeatherProvider;
use quota::QuotaLedger;
use store::{BackupLog, FallbackCascade, WeatherCache};

pub use facade::{Orchestrator, StatusReport};
pub use journal::EventJournal;
pub use scheduler::{RefreshScheduler, SchedulerStatus};

/// Fully wired system. The binary spawns `scheduler` loops and serves
/// reads through `orchestrator`.
pub struct System {
    pub registry: Arc<ZoneRegistry>,
    pub ledger: Arc<QuotaLedger>,
    pub cache: Arc<WeatherCache>,
    pub backups: Arc<BackupLog>,
    pub journal: Arc<EventJournal>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<RefreshScheduler>,
}

/// Construct the system. `data_dir: None` keeps every store in
/// memory, which is what tests and dry runs want.
pub fn build(
    config: &AppConfig,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    data_dir: Option<PathBuf>,
) -> Result<System> {
    let registry = Arc::new(ZoneRegistry::guadeloupe());

    let journal = Arc::new(match &data_dir {
        Some(dir) => EventJournal::open(dir)?,
        None => EventJournal::disabled(),
    });

    let ledger = Arc::new(QuotaLedger::open(
        config.quota.clone(),
        registry.clone(),
        clock.clone(),
        data_dir.clone(),
    )?);
    let cache = Arc::new(WeatherCache::new(config.cache.clone(), clock.clone()));
    let backups = Arc::new(BackupLog::open(
        config.backup.clone(),
        clock.clone(),
        data_dir,
    )?);
    let cascade = Arc::new(FallbackCascade::new(
        cache.clone(),
        backups.clone(),
        registry.clone(),
        clock.clone(),
    ));

    let scheduler = Arc::new(RefreshScheduler::new(
        ledger.clone(),
        cache.clone(),
        backups.clone(),
        provider.clone(),
        registry.clone(),
        clock.clone(),
        config.timing.clone(),
        journal.clone(),
    )?);
    let orchestrator = Arc::new(Orchestrator::new(
        ledger.clone(),
        cache.clone(),
        backups.clone(),
        cascade,
        provider,
        registry.clone(),
        clock,
        journal.clone(),
    ));

    Ok(System {
        registry,
        ledger,
        cache,
        backups,
        journal,
        orchestrator,
        scheduler,
    })
}
