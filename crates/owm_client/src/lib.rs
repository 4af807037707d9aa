//! OpenWeather One Call client.
//!
//! Fetches current conditions for a coordinate pair and converts them
//! into a `WeatherSnapshot`. The orchestrator talks to the provider
//! only through the `WeatherProvider` trait so tests can script the
//! upstream.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::config::ProviderConfig;
use common::{Error, Result, WeatherSnapshot};
use serde::Deserialize;
use tracing::debug;

/// Upstream weather provider seam.
///
/// A call may fail; timeout and retry policy live inside the
/// implementation and are opaque to the orchestrator.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot>;
}

// ── One Call response types ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OneCallResponse {
    pub current: CurrentConditions,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    /// Observation time, unix seconds UTC.
    pub dt: i64,
    /// Temperature in °C (we request metric units).
    pub temp: f64,
    pub humidity: u8,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_deg: Option<u16>,
    #[serde(default)]
    pub pressure: Option<f64>,
    /// Visibility in metres.
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub uvi: Option<f64>,
    #[serde(default)]
    pub rain: Option<Precipitation>,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default)]
    pub one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherCondition {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct DailyForecast {
    /// Probability of precipitation, 0.0-1.0.
    #[serde(default)]
    pub pop: f64,
}

// ── Implementation ────────────────────────────────────────────────────

/// OpenWeather HTTP client with connection pooling and a hard
/// per-request timeout.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Convert a One Call payload into our snapshot type.
    pub fn parse_snapshot(data: &OneCallResponse) -> WeatherSnapshot {
        let current = &data.current;
        let (description, icon) = current
            .weather
            .first()
            .map(|w| (w.description.clone(), w.icon.clone()))
            .unwrap_or_default();

        let precipitation_probability = data
            .daily
            .first()
            .map(|d| (d.pop * 100.0).round().clamp(0.0, 100.0) as u8);

        WeatherSnapshot {
            temperature_c: current.temp,
            humidity_pct: current.humidity,
            // m/s to km/h.
            wind_speed_kmh: current.wind_speed * 3.6,
            wind_direction_deg: current.wind_deg,
            pressure_hpa: current.pressure,
            precipitation_mm: current
                .rain
                .as_ref()
                .and_then(|r| r.one_hour)
                .unwrap_or(0.0),
            precipitation_probability,
            // metres to km.
            visibility_km: current.visibility.map(|v| v / 1000.0),
            uv_index: current.uvi,
            description,
            icon,
            observed_at: parse_observed_at(current.dt),
        }
    }
}

fn parse_observed_at(unix_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix_secs, 0).single().unwrap_or_else(Utc::now)
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot> {
        let url = format!("{}/onecall", self.base_url);

        debug!("Fetching OpenWeather data for ({:.4}, {:.4})", lat, lon);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", "fr".to_string()),
                ("exclude", "minutely".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::UpstreamUnavailable(format!("timeout for ({lat:.4}, {lon:.4})"))
                } else {
                    Error::UpstreamUnavailable(format!("HTTP error: {e}"))
                }
            })?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(300).collect();
            return Err(Error::UpstreamUnavailable(format!(
                "provider returned {status}: {preview}"
            )));
        }

        let data: OneCallResponse = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("JSON parse error: {e}")))?;

        Ok(Self::parse_snapshot(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "current": {
            "dt": 1724932800,
            "temp": 29.4,
            "humidity": 74,
            "wind_speed": 6.2,
            "wind_deg": 110,
            "pressure": 1012,
            "visibility": 10000,
            "uvi": 9.1,
            "rain": {"1h": 0.4},
            "weather": [{"description": "partiellement nuageux", "icon": "02d"}]
        },
        "daily": [{"pop": 0.35}]
    }"#;

    #[test]
    fn test_parse_one_call_payload() {
        let data: OneCallResponse = serde_json::from_str(SAMPLE).unwrap();
        let snap = OpenWeatherClient::parse_snapshot(&data);

        assert!((snap.temperature_c - 29.4).abs() < 1e-9);
        assert_eq!(snap.humidity_pct, 74);
        // 6.2 m/s → 22.32 km/h.
        assert!((snap.wind_speed_kmh - 22.32).abs() < 1e-9);
        assert_eq!(snap.wind_direction_deg, Some(110));
        assert_eq!(snap.visibility_km, Some(10.0));
        assert_eq!(snap.precipitation_probability, Some(35));
        assert!((snap.precipitation_mm - 0.4).abs() < 1e-9);
        assert_eq!(snap.icon, "02d");
    }

    #[test]
    fn test_parse_minimal_payload() {
        // Missing optional fields must not fail.
        let raw = r#"{"current": {"dt": 0, "temp": 28.0, "humidity": 75, "wind_speed": 4.0}}"#;
        let data: OneCallResponse = serde_json::from_str(raw).unwrap();
        let snap = OpenWeatherClient::parse_snapshot(&data);

        assert_eq!(snap.precipitation_mm, 0.0);
        assert_eq!(snap.precipitation_probability, None);
        assert_eq!(snap.pressure_hpa, None);
        assert!(snap.description.is_empty());
    }
}
