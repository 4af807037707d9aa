//! Bot configuration types.

use serde::{Deserialize, Serialize};

use crate::types::RiskLevel;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenWeather API key (normally injected from env).
    #[serde(default)]
    pub api_key: String,

    /// Directory for ledger / backup / journal files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Upstream provider parameters.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Daily quota and schedule parameters.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Cache TTL table, minutes per risk level.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Backup log parameters.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Loop timing parameters.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Upstream provider (OpenWeather One Call) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,
}

/// Daily quota and schedule parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Hard daily ceiling on upstream calls.
    #[serde(default = "default_daily_limit")]
    pub daily_call_limit: u32,

    /// Hours of day that get the largest slot budgets.
    #[serde(default = "default_peak_hours")]
    pub peak_hours: Vec<u32>,

    /// Off-peak cadence: hours divisible by this get a medium budget.
    #[serde(default = "default_cadence")]
    pub offpeak_cadence_hours: u32,

    /// Planned calls for a peak slot.
    #[serde(default = "default_peak_slot_calls")]
    pub peak_slot_calls: u32,

    /// Planned calls for a cadence slot.
    #[serde(default = "default_cadence_slot_calls")]
    pub cadence_slot_calls: u32,

    /// Planned calls for any other slot.
    #[serde(default = "default_offpeak_slot_calls")]
    pub offpeak_slot_calls: u32,
}

/// Cache TTL by assessed risk, in minutes. Higher risk must never get
/// a longer TTL than lower risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_critical")]
    pub ttl_critical_min: u32,
    #[serde(default = "default_ttl_high")]
    pub ttl_high_min: u32,
    #[serde(default = "default_ttl_moderate")]
    pub ttl_moderate_min: u32,
    #[serde(default = "default_ttl_low")]
    pub ttl_low_min: u32,
}

impl CacheConfig {
    /// TTL for a snapshot written at the given risk level.
    pub fn ttl_minutes(&self, risk: RiskLevel) -> u32 {
        match risk {
            RiskLevel::Critical => self.ttl_critical_min,
            RiskLevel::High => self.ttl_high_min,
            RiskLevel::Moderate => self.ttl_moderate_min,
            RiskLevel::Low => self.ttl_low_min,
        }
    }
}

/// Backup log parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// How far back `latest()` will reach, in hours.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,

    /// Records kept per zone; oldest pruned on insert.
    #[serde(default = "default_max_per_zone")]
    pub max_per_zone: usize,

    /// Records older than this are purged by the sweep, in days.
    #[serde(default = "default_purge_days")]
    pub purge_days: u32,
}

/// Loop timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How often the execution loop checks for a slot boundary (secs).
    #[serde(default = "default_slot_check")]
    pub slot_check_interval_secs: u64,

    /// Cache sweep interval (secs).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Backoff after a loop-level error (secs).
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    /// Delay between consecutive upstream calls within a slot (ms).
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_data_dir() -> String {
    "data".into()
}

fn default_api_base() -> String {
    "https://api.openweathermap.org/data/3.0".into()
}

fn default_provider_timeout() -> u64 {
    10_000
}

fn default_daily_limit() -> u32 {
    1_000
}

fn default_peak_hours() -> Vec<u32> {
    vec![6, 8, 12, 16, 18, 20]
}

fn default_cadence() -> u32 {
    3
}

fn default_peak_slot_calls() -> u32 {
    50
}

fn default_cadence_slot_calls() -> u32 {
    35
}

fn default_offpeak_slot_calls() -> u32 {
    20
}

fn default_ttl_critical() -> u32 {
    5
}
fn default_ttl_high() -> u32 {
    15
}
fn default_ttl_moderate() -> u32 {
    30
}
fn default_ttl_low() -> u32 {
    60
}

fn default_retention_hours() -> u32 {
    24
}
fn default_max_per_zone() -> usize {
    10
}
fn default_purge_days() -> u32 {
    7
}

fn default_slot_check() -> u64 {
    60
}
fn default_sweep_interval() -> u64 {
    4 * 3600
}
fn default_error_backoff() -> u64 {
    300
}
fn default_inter_call_delay() -> u64 {
    1_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_ms: default_provider_timeout(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_call_limit: default_daily_limit(),
            peak_hours: default_peak_hours(),
            offpeak_cadence_hours: default_cadence(),
            peak_slot_calls: default_peak_slot_calls(),
            cadence_slot_calls: default_cadence_slot_calls(),
            offpeak_slot_calls: default_offpeak_slot_calls(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_critical_min: default_ttl_critical(),
            ttl_high_min: default_ttl_high(),
            ttl_moderate_min: default_ttl_moderate(),
            ttl_low_min: default_ttl_low(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            max_per_zone: default_max_per_zone(),
            purge_days: default_purge_days(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            slot_check_interval_secs: default_slot_check(),
            sweep_interval_secs: default_sweep_interval(),
            error_backoff_secs: default_error_backoff(),
            inter_call_delay_ms: default_inter_call_delay(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            data_dir: default_data_dir(),
            provider: ProviderConfig::default(),
            quota: QuotaConfig::default(),
            cache: CacheConfig::default(),
            backup: BackupConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}
