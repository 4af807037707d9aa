//! Shared types, config, clock, and error definitions for sentinelle-bot.

pub mod clock;
pub mod config;
pub mod error;
pub mod risk;
pub mod types;
pub mod zones;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::Error;
pub use types::*;
pub use zones::{ClimatePattern, Climatology, TerrainKind, Zone, ZoneRegistry};

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
