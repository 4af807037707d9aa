//! Configuration loader — merges env vars, .env file, and config.toml.

use std::path::Path;

use common::{AppConfig, Error};

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.quota.daily_call_limit == 0 {
        issues.push("quota.daily_call_limit must be > 0".into());
    }
    if config.quota.peak_hours.iter().any(|h| *h > 23) {
        issues.push("quota.peak_hours entries must be in 0..=23".into());
    }
    if config.quota.peak_slot_calls == 0 {
        issues.push("quota.peak_slot_calls must be > 0".into());
    }
    if config.quota.offpeak_slot_calls == 0 {
        issues.push("quota.offpeak_slot_calls must be > 0".into());
    }

    if config.cache.ttl_critical_min == 0 {
        issues.push("cache.ttl_critical_min must be > 0".into());
    }
    if config.cache.ttl_critical_min > config.cache.ttl_high_min
        || config.cache.ttl_high_min > config.cache.ttl_moderate_min
        || config.cache.ttl_moderate_min > config.cache.ttl_low_min
    {
        issues.push("cache TTLs must not shrink as risk decreases".into());
    }

    if config.backup.retention_hours == 0 {
        issues.push("backup.retention_hours must be > 0".into());
    }
    if config.backup.max_per_zone == 0 {
        issues.push("backup.max_per_zone must be > 0".into());
    }
    if config.backup.purge_days == 0 {
        issues.push("backup.purge_days must be > 0".into());
    }

    if config.timing.slot_check_interval_secs == 0 {
        issues.push("timing.slot_check_interval_secs must be > 0".into());
    }
    if config.timing.sweep_interval_secs == 0 {
        issues.push("timing.sweep_interval_secs must be > 0".into());
    }
    if config.timing.error_backoff_secs == 0 {
        issues.push("timing.error_backoff_secs must be > 0".into());
    }
    if config.timing.inter_call_delay_ms == 0 {
        issues.push("timing.inter_call_delay_ms must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from environment and optional config file.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AppConfig::default();

    // 3. Load the TOML file: an explicit path must exist, the default
    //    path is optional.
    match config_path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
            config = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        }
        None => {
            let default_path = Path::new("config.toml");
            if default_path.exists() {
                let contents = std::fs::read_to_string(default_path)
                    .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
                config = toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
            }
        }
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(key) = std::env::var("OWM_API_KEY") {
        config.api_key = key;
    }
    if let Ok(dir) = std::env::var("SENTINELLE_DATA_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            config.data_dir = trimmed.to_string();
        }
    }
    if let Ok(raw) = std::env::var("SENTINELLE_DAILY_CALL_LIMIT") {
        config.quota.daily_call_limit = parse_positive_u32(&raw, "SENTINELLE_DAILY_CALL_LIMIT")?;
    }

    // 5. Validate required fields.
    if config.api_key.trim().is_empty() {
        return Err(Error::Config(
            "OWM_API_KEY is required (set in .env or environment)".into(),
        ));
    }

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_ttls() {
        let mut config = AppConfig::default();
        config.cache.ttl_critical_min = 120;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("TTLs"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }
}
