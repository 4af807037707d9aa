//! Unified error type for sentinelle-bot.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Daily quota exhausted")]
    QuotaExhausted,

    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unknown zone: {0}")]
    ZoneUnknown(String),

    #[error("Schedule corruption: {0}")]
    ScheduleCorruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
