//! Weather risk assessment.
//!
//! Pure scoring over a snapshot; the only consumer is the cache write
//! path, which uses the level to pick a TTL.

use crate::types::{RiskLevel, WeatherSnapshot};

/// Score a snapshot into a risk level.
///
/// Additive scoring: wind speed, rain rate, precipitation probability
/// and temperature extremes each contribute, then the total maps onto
/// the four levels.
pub fn assess(snapshot: &WeatherSnapshot) -> RiskLevel {
    let mut score = 0u32;

    // Wind speed (km/h).
    if snapshot.wind_speed_kmh > 80.0 {
        score += 4;
    } else if snapshot.wind_speed_kmh > 60.0 {
        score += 3;
    } else if snapshot.wind_speed_kmh > 40.0 {
        score += 2;
    } else if snapshot.wind_speed_kmh > 25.0 {
        score += 1;
    }

    // Rain rate (mm/h).
    if snapshot.precipitation_mm > 50.0 {
        score += 3;
    } else if snapshot.precipitation_mm > 20.0 {
        score += 2;
    } else if snapshot.precipitation_mm > 10.0 {
        score += 1;
    }

    // Precipitation probability.
    if let Some(pop) = snapshot.precipitation_probability {
        if pop > 80 {
            score += 2;
        } else if pop > 60 {
            score += 1;
        }
    }

    // Temperature extremes for the tropics.
    if snapshot.temperature_c > 35.0 || snapshot.temperature_c < 15.0 {
        score += 1;
    }

    match score {
        0..=1 => RiskLevel::Low,
        2..=3 => RiskLevel::Moderate,
        4..=5 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// Human-readable factor labels for a snapshot, for alert text.
pub fn factors(snapshot: &WeatherSnapshot) -> Vec<&'static str> {
    let mut out = Vec::new();

    if snapshot.wind_speed_kmh > 60.0 {
        out.push("violent winds");
    } else if snapshot.wind_speed_kmh > 40.0 {
        out.push("strong winds");
    }

    if snapshot.precipitation_mm > 30.0 {
        out.push("torrential rain");
    } else if snapshot.precipitation_mm > 15.0 {
        out.push("heavy rain");
    }

    if snapshot.precipitation_probability.unwrap_or(0) > 80 {
        out.push("near-certain precipitation");
    }

    if snapshot.temperature_c > 35.0 {
        out.push("extreme heat");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(wind: f64, rain: f64, pop: Option<u8>, temp: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: temp,
            humidity_pct: 75,
            wind_speed_kmh: wind,
            wind_direction_deg: None,
            pressure_hpa: Some(1013.0),
            precipitation_mm: rain,
            precipitation_probability: pop,
            visibility_km: None,
            uv_index: None,
            description: String::new(),
            icon: String::new(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_calm_weather_is_low_risk() {
        assert_eq!(assess(&snapshot(10.0, 0.0, Some(10), 28.0)), RiskLevel::Low);
    }

    #[test]
    fn test_cyclonic_conditions_are_critical() {
        let s = snapshot(95.0, 60.0, Some(95), 27.0);
        assert_eq!(assess(&s), RiskLevel::Critical);
        let f = factors(&s);
        assert!(f.contains(&"violent winds"));
        assert!(f.contains(&"torrential rain"));
    }

    #[test]
    fn test_moderate_band() {
        // Strong-ish wind alone: score 2.
        assert_eq!(assess(&snapshot(45.0, 0.0, None, 28.0)), RiskLevel::Moderate);
    }

    #[test]
    fn test_high_band() {
        // 65 km/h wind (3) + 15 mm rain (1) = 4.
        assert_eq!(assess(&snapshot(65.0, 15.0, None, 28.0)), RiskLevel::High);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Moderate);
        assert!(RiskLevel::Moderate < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }
}
