//! Sentinelle-bot: quota-aware weather orchestrator for Guadeloupe.
//!
//! Single-binary Tokio application that:
//! 1. Builds a daily call schedule under the provider's free-tier ceiling
//! 2. Refreshes commune weather on a priority-driven hourly cadence
//! 3. Caches snapshots with risk-adaptive TTLs
//! 4. Degrades through backups and climatology when calls are denied
//! 5. Journals every decision as JSONL for replay

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info};

use common::{Clock, SystemClock};
use orchestrator::journal::now_iso;
use owm_client::{OpenWeatherClient, WeatherProvider};

/// Quota-aware weather cache orchestrator
#[derive(Parser)]
#[command(name = "sentinelle-bot", about = "Quota-aware weather cache orchestrator")]
struct Cli {
    /// Fetch one zone directly from the provider and exit.
    #[arg(long)]
    check_provider: bool,

    /// Print today's quota and store statistics as JSON, then exit.
    #[arg(long)]
    stats: bool,

    /// Run a single in-memory refresh cycle and exit (dry-run).
    #[arg(long)]
    dry_run: bool,

    /// Force-refresh one zone (spends quota), print the report, exit.
    #[arg(long, value_name = "ZONE_ID")]
    force_refresh: Option<String>,

    /// Path to the TOML config file (default: ./config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sentinelle_bot=info,orchestrator=info,quota=info,store=info,owm_client=info"
                    .into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🌦️  Sentinelle bot starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Quota: ceiling={}/day, peak_hours={:?}",
        cfg.quota.daily_call_limit, cfg.quota.peak_hours
    );
    info!(
        "Cache TTLs: critical={}m, high={}m, moderate={}m, low={}m",
        cfg.cache.ttl_critical_min,
        cfg.cache.ttl_high_min,
        cfg.cache.ttl_moderate_min,
        cfg.cache.ttl_low_min
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider: Arc<dyn WeatherProvider> =
        match OpenWeatherClient::new(&cfg.provider, cfg.api_key.clone()) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                error!("Provider client initialization failed: {}", e);
                std::process::exit(1);
            }
        };

    // Dry runs stay in memory; everything else persists under data_dir.
    let data_dir = if cli.dry_run {
        None
    } else {
        Some(PathBuf::from(&cfg.data_dir))
    };

    let system = match orchestrator::build(&cfg, provider.clone(), clock, data_dir) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build orchestrator: {}", e);
            std::process::exit(1);
        }
    };
    info!("Monitoring {} zones", system.registry.len());

    // ── Check-provider mode ──────────────────────────────────────────
    if cli.check_provider {
        let Some(zone) = system.registry.all().first() else {
            error!("Zone registry is empty");
            std::process::exit(1);
        };
        info!("Checking provider with {}...", zone.name);
        match provider.fetch(zone.lat, zone.lon).await {
            Ok(snapshot) => {
                info!(
                    "✅ Provider OK: {} — {:.1}°C, {}",
                    zone.name, snapshot.temperature_c, snapshot.description
                );
            }
            Err(e) => {
                error!("❌ Provider check failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Force-refresh mode ───────────────────────────────────────────
    if let Some(zone_id) = &cli.force_refresh {
        match system.orchestrator.force_refresh(zone_id).await {
            Ok(report) => {
                info!(
                    "✅ Forced refresh of {}: {:.1}°C, risk={}, source={}",
                    report.zone_id,
                    report.snapshot.temperature_c,
                    report.risk.as_str(),
                    report.source.as_str()
                );
            }
            Err(e) => {
                error!("❌ Forced refresh of {} failed: {}", zone_id, e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Stats mode ───────────────────────────────────────────────────
    if cli.stats {
        let status = json!({
            "scheduler": system.scheduler.status(),
            "status": system.orchestrator.status().await,
        });
        match serde_json::to_string_pretty(&status) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                error!("Failed to serialize status: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Dry-run mode ─────────────────────────────────────────────────
    if cli.dry_run {
        info!("Running single refresh cycle (dry-run, in-memory)...");
        if let Err(e) = system.scheduler.run_slot_cycle().await {
            error!("Dry-run cycle failed: {}", e);
            std::process::exit(1);
        }
        let status = system.orchestrator.status().await;
        info!(
            "Dry-run complete: {}/{} calls used, {} zones cached",
            status.quota.consumed, status.quota.ceiling, status.cached_zones
        );
        return;
    }

    // ── Long-running mode ────────────────────────────────────────────
    system.journal.write_event(json!({
        "ts": now_iso(),
        "kind": "bot_start",
        "bot": "sentinelle-bot",
        "zones": system.registry.len(),
        "daily_call_limit": cfg.quota.daily_call_limit,
        "peak_hours": cfg.quota.peak_hours,
        "timing": {
            "slot_check_interval_secs": cfg.timing.slot_check_interval_secs,
            "sweep_interval_secs": cfg.timing.sweep_interval_secs,
            "error_backoff_secs": cfg.timing.error_backoff_secs
        }
    }));

    let (stop_tx, stop_rx) = watch::channel(false);
    let handles = system.scheduler.spawn(stop_rx);

    info!("🚀 Sentinelle bot is running. Press Ctrl+C to stop.");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = stop_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    system.journal.write_event(json!({
        "ts": now_iso(),
        "kind": "bot_shutdown",
        "reason": "ctrl_c"
    }));

    info!("Sentinelle bot shut down.");
}
