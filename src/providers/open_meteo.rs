use crate::core::config::{HttpConfig, LocationConfig};
use crate::core::weather::{MAX_FORECAST_DAYS, WeatherData, WeatherProvider};
use crate::providers::util::{get_with_retry, http_client};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const HOURLY_VARIABLES: &str =
    "temperature_2m,cloud_cover,direct_radiation,diffuse_radiation,wind_speed_10m,precipitation";
const TIMEZONE: &str = "Europe/Prague";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    hourly: Option<HourlySeries>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlySeries {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    direct_radiation: Vec<Option<f64>>,
    #[serde(default)]
    diffuse_radiation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

/// Missing or null samples count as zero.
fn value_at(series: &[Option<f64>], index: usize) -> f64 {
    series.get(index).copied().flatten().unwrap_or(0.0)
}

impl HourlySeries {
    fn into_weather(self) -> Vec<WeatherData> {
        self.time
            .iter()
            .enumerate()
            .filter_map(|(i, time)| {
                let Ok(time) = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M") else {
                    warn!("Skipping weather sample with invalid time: {}", time);
                    return None;
                };
                Some(WeatherData {
                    time,
                    temperature: value_at(&self.temperature_2m, i),
                    cloud_cover: value_at(&self.cloud_cover, i),
                    solar_radiation: value_at(&self.direct_radiation, i)
                        + value_at(&self.diffuse_radiation, i),
                    wind_speed: value_at(&self.wind_speed_10m, i),
                    precipitation: value_at(&self.precipitation, i),
                })
            })
            .collect()
    }
}

/// Hourly weather from the Open-Meteo forecast and archive APIs.
pub struct OpenMeteoProvider {
    forecast_url: String,
    archive_url: String,
    location: LocationConfig,
    http: HttpConfig,
    client: reqwest::Client,
}

impl OpenMeteoProvider {
    pub fn new(
        forecast_url: &str,
        archive_url: &str,
        location: LocationConfig,
        http: HttpConfig,
    ) -> Result<Self> {
        Ok(OpenMeteoProvider {
            forecast_url: forecast_url.trim_end_matches('/').to_string(),
            archive_url: archive_url.trim_end_matches('/').to_string(),
            location,
            client: http_client(&http)?,
            http,
        })
    }

    fn base_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.to_string()),
            ("timezone", TIMEZONE.to_string()),
            ("wind_speed_unit", "ms".to_string()),
        ]
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<WeatherData>> {
        debug!("Requesting weather from {}", url);
        let response = get_with_retry(&self.client, url, query, &self.http)
            .await
            .with_context(|| format!("Failed to fetch weather from {url}"))?;
        let text = response.text().await?;
        let data: WeatherResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse weather response from {}: {}", url, e))?;

        let weather = data.hourly.unwrap_or_default().into_weather();
        debug!("Received {} hourly weather samples", weather.len());
        Ok(weather)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    #[instrument(name = "WeatherForecastFetch", skip(self))]
    async fn forecast(&self, days_ahead: u32) -> Result<Vec<WeatherData>> {
        let url = format!("{}/v1/forecast", self.forecast_url);
        let mut query = self.base_query();
        query.push((
            "forecast_days",
            days_ahead.clamp(1, MAX_FORECAST_DAYS).to_string(),
        ));
        self.fetch(&url, &query).await
    }

    #[instrument(name = "WeatherArchiveFetch", skip(self))]
    async fn history(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WeatherData>> {
        let url = format!("{}/v1/archive", self.archive_url);
        let mut query = self.base_query();
        query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        self.fetch(&url, &query).await
    }
}
