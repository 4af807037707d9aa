//! Storage tier: risk-adaptive cache, backup log, synthetic fallback.
//!
//! Three layers of decreasing quality stand between a consumer and an
//! empty answer. The cache serves recent live data, the backup log
//! serves the last known observation, and the generator fabricates a
//! plausible snapshot from zone climatology. The cascade walks them in
//! order and bottoms out on a hardcoded constant, so resolution is
//! total.

pub mod backup;
pub mod cache;
pub mod cascade;
pub mod synth;

pub use backup::{BackupLog, BackupRecord};
pub use cache::{CacheEntry, WeatherCache, CURRENT_KEY};
pub use cascade::FallbackCascade;
