//! Shared fixtures for scheduler and facade tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::config::AppConfig;
use common::{Clock, Error, ManualClock, Result, WeatherSnapshot, ZoneRegistry};
use owm_client::WeatherProvider;
use quota::QuotaLedger;
use store::{BackupLog, FallbackCascade, WeatherCache};

use crate::facade::Orchestrator;
use crate::journal::EventJournal;
use crate::scheduler::RefreshScheduler;

enum Behavior {
    Ok(f64),
    Fail,
}

/// Provider double with a fixed behavior and a call counter.
pub(crate) struct ScriptedProvider {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn ok(temperature_c: f64) -> Self {
        Self {
            behavior: Behavior::Ok(temperature_c),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<WeatherSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Ok(temp) => Ok(WeatherSnapshot {
                temperature_c: temp,
                humidity_pct: 74,
                wind_speed_kmh: 12.0,
                wind_direction_deg: Some(90),
                pressure_hpa: Some(1012.0),
                precipitation_mm: 0.0,
                precipitation_probability: Some(10),
                visibility_km: Some(10.0),
                uv_index: Some(8.0),
                description: "ensoleillé".into(),
                icon: "01d".into(),
                observed_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
            }),
            Behavior::Fail => Err(Error::UpstreamUnavailable("scripted outage".into())),
        }
    }
}

/// Benign conditions, handy as backup or cache seed data.
pub(crate) fn calm_snapshot() -> WeatherSnapshot {
    WeatherSnapshot {
        temperature_c: 26.0,
        humidity_pct: 70,
        wind_speed_kmh: 10.0,
        wind_direction_deg: Some(80),
        pressure_hpa: Some(1013.0),
        precipitation_mm: 0.0,
        precipitation_probability: Some(10),
        visibility_km: Some(12.0),
        uv_index: None,
        description: "calme".into(),
        icon: "01d".into(),
        observed_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
    }
}

pub(crate) struct Fixture {
    pub ledger: Arc<QuotaLedger>,
    pub cache: Arc<WeatherCache>,
    pub backups: Arc<BackupLog>,
    pub registry: Arc<ZoneRegistry>,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<RefreshScheduler>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Wire a full in-memory stack at the given hour with the given daily
/// ceiling.
pub(crate) fn fixture(
    provider: Arc<ScriptedProvider>,
    hour: u32,
    ceiling: u32,
) -> Fixture {
    let mut config = AppConfig::default();
    config.quota.daily_call_limit = ceiling;
    config.timing.inter_call_delay_ms = 1;

    let clock: Arc<ManualClock> = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 15, hour, 5, 0).unwrap(),
    ));
    let clock_dyn: Arc<dyn Clock> = clock.clone();

    let registry = Arc::new(ZoneRegistry::guadeloupe());
    let ledger = Arc::new(
        QuotaLedger::open(
            config.quota.clone(),
            registry.clone(),
            clock_dyn.clone(),
            None,
        )
        .unwrap(),
    );
    let cache = Arc::new(WeatherCache::new(config.cache.clone(), clock_dyn.clone()));
    let backups = Arc::new(
        BackupLog::open(config.backup.clone(), clock_dyn.clone(), None).unwrap(),
    );
    let cascade = Arc::new(FallbackCascade::new(
        cache.clone(),
        backups.clone(),
        registry.clone(),
        clock_dyn.clone(),
    ));
    let journal = Arc::new(EventJournal::disabled());

    let provider_dyn: Arc<dyn WeatherProvider> = provider;
    let scheduler = Arc::new(
        RefreshScheduler::new(
            ledger.clone(),
            cache.clone(),
            backups.clone(),
            provider_dyn.clone(),
            registry.clone(),
            clock_dyn.clone(),
            config.timing.clone(),
            journal.clone(),
        )
        .unwrap(),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        ledger.clone(),
        cache.clone(),
        backups.clone(),
        cascade,
        provider_dyn,
        registry.clone(),
        clock_dyn,
        journal,
    ));

    Fixture {
        ledger,
        cache,
        backups,
        registry,
        clock,
        scheduler,
        orchestrator,
    }
}
