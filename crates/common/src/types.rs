//! Domain types shared across the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Weather payload ───────────────────────────────────────────────────

/// A single weather observation or short-range forecast snapshot.
///
/// Explicit named fields; optional where the upstream payload may omit
/// the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Current air temperature in °C.
    pub temperature_c: f64,
    /// Relative humidity in percent (0-100).
    pub humidity_pct: u8,
    /// Wind speed in km/h.
    pub wind_speed_kmh: f64,
    /// Wind direction in degrees, if reported.
    #[serde(default)]
    pub wind_direction_deg: Option<u16>,
    /// Sea-level pressure in hPa, if reported.
    #[serde(default)]
    pub pressure_hpa: Option<f64>,
    /// Precipitation over the last hour in mm.
    #[serde(default)]
    pub precipitation_mm: f64,
    /// Probability of precipitation in percent, if forecast.
    #[serde(default)]
    pub precipitation_probability: Option<u8>,
    /// Horizontal visibility in km, if reported.
    #[serde(default)]
    pub visibility_km: Option<f64>,
    /// UV index, if reported.
    #[serde(default)]
    pub uv_index: Option<f64>,
    /// Short human-readable description.
    #[serde(default)]
    pub description: String,
    /// Provider icon code (e.g. "02d").
    #[serde(default)]
    pub icon: String,
    /// When the observation was made.
    pub observed_at: DateTime<Utc>,
}

// ── Risk level ────────────────────────────────────────────────────────

/// Assessed weather risk. Ordering is by severity: `Low < Moderate <
/// High < Critical`. Higher risk means a shorter cache TTL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

// ── Provenance ────────────────────────────────────────────────────────

/// Where a returned payload came from. Every payload the facade hands
/// out carries one of these so consumers can tell observed data from
/// degraded or synthetic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// Fresh upstream call made for this request.
    Live,
    /// Served from a still-fresh cache entry.
    Cache,
    /// Most recent backup record, possibly stale.
    RecentBackup,
    /// Synthetic snapshot derived from zone climatology.
    Generated,
    /// Hardcoded emergency constant.
    Emergency,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Live => "live",
            SourceTag::Cache => "cache",
            SourceTag::RecentBackup => "recent-backup",
            SourceTag::Generated => "generated",
            SourceTag::Emergency => "emergency",
        }
    }
}

// ── Facade response ───────────────────────────────────────────────────

/// What `Orchestrator::get_current` returns. Never an error: worst
/// case the snapshot is the emergency constant.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub zone_id: String,
    pub snapshot: WeatherSnapshot,
    pub source: SourceTag,
    pub is_live: bool,
    pub risk: RiskLevel,
    pub served_at: DateTime<Utc>,
}

// ── Priority tier ─────────────────────────────────────────────────────

/// Refresh priority of a zone. High-priority zones appear in every
/// schedule slot; low-priority zones only in peak slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}
