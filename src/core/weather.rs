//! Weather data, its correlation with prices and weather-adjusted forecasts

use crate::core::forecast::Baseline;
use crate::core::stats::{mean, pearson};
use crate::store::PriceStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Open-Meteo does not forecast further ahead.
pub const MAX_FORECAST_DAYS: u32 = 16;

const MIN_PRICES: usize = 48;
const MIN_WEATHER_HOURS: usize = 48;
const MIN_PAIRS: usize = 24;

/// Weather of one hour at the configured location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherData {
    /// Local (Europe/Prague) start of the hour.
    pub time: NaiveDateTime,
    /// °C
    pub temperature: f64,
    /// %
    pub cloud_cover: f64,
    /// Direct plus diffuse radiation, W/m².
    pub solar_radiation: f64,
    /// m/s
    pub wind_speed: f64,
    /// mm
    pub precipitation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeatherType {
    Sunny,
    Cloudy,
    Windy,
    Mixed,
}

impl WeatherType {
    pub fn classify(avg_cloud_cover: f64, avg_wind_speed: f64) -> Self {
        if avg_cloud_cover < 30.0 && avg_wind_speed < 6.0 {
            WeatherType::Sunny
        } else if avg_wind_speed >= 8.0 {
            WeatherType::Windy
        } else if avg_cloud_cover >= 70.0 {
            WeatherType::Cloudy
        } else {
            WeatherType::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WeatherType::Sunny => "sunny",
            WeatherType::Cloudy => "cloudy",
            WeatherType::Windy => "windy",
            WeatherType::Mixed => "mixed",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            WeatherType::Sunny => "☀️",
            WeatherType::Cloudy => "☁️",
            WeatherType::Windy => "💨",
            WeatherType::Mixed => "⛅",
        }
    }
}

/// Daily summary of hourly weather.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherForecast {
    pub date: NaiveDate,
    pub hourly: Vec<WeatherData>,
    pub avg_temperature: f64,
    pub avg_cloud_cover: f64,
    pub total_solar_radiation: f64,
    pub avg_wind_speed: f64,
    pub weather_type: WeatherType,
}

impl WeatherForecast {
    pub fn from_hourly(date: NaiveDate, hourly: Vec<WeatherData>) -> Option<Self> {
        let avg = |f: fn(&WeatherData) -> f64| mean(&hourly.iter().map(f).collect::<Vec<_>>());
        let avg_temperature = avg(|h| h.temperature)?;
        let avg_cloud_cover = avg(|h| h.cloud_cover)?;
        let avg_wind_speed = avg(|h| h.wind_speed)?;
        let total_solar_radiation = hourly.iter().map(|h| h.solar_radiation).sum();

        Some(WeatherForecast {
            date,
            avg_temperature,
            avg_cloud_cover,
            total_solar_radiation,
            avg_wind_speed,
            weather_type: WeatherType::classify(avg_cloud_cover, avg_wind_speed),
            hourly,
        })
    }
}

/// Groups hourly data into daily forecasts, oldest day first.
pub fn group_by_day(hourly: Vec<WeatherData>) -> Vec<WeatherForecast> {
    let mut days: BTreeMap<NaiveDate, Vec<WeatherData>> = BTreeMap::new();
    for hour in hourly {
        days.entry(hour.time.date()).or_default().push(hour);
    }
    days.into_iter()
        .filter_map(|(date, hours)| WeatherForecast::from_hourly(date, hours))
        .collect()
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Hourly forecast from today for `days_ahead` days (at most 16).
    async fn forecast(&self, days_ahead: u32) -> Result<Vec<WeatherData>>;

    /// Observed hourly weather for `start..=end`.
    async fn history(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WeatherData>>;
}

pub async fn weather_forecast(
    provider: &dyn WeatherProvider,
    days_ahead: u32,
) -> Result<Vec<WeatherForecast>> {
    let hourly = provider.forecast(days_ahead.min(MAX_FORECAST_DAYS)).await?;
    Ok(group_by_day(hourly))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeatherFactor {
    Temperature,
    CloudCover,
    SolarRadiation,
    WindSpeed,
}

impl WeatherFactor {
    pub fn label(&self) -> &'static str {
        match self {
            WeatherFactor::Temperature => "temperature",
            WeatherFactor::CloudCover => "cloud cover",
            WeatherFactor::SolarRadiation => "solar radiation",
            WeatherFactor::WindSpeed => "wind speed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherCorrelation {
    pub temperature: f64,
    pub cloud_cover: f64,
    pub solar_radiation: f64,
    pub wind_speed: f64,
    pub strongest_factor: WeatherFactor,
    /// Square of the strongest correlation.
    pub r_squared: f64,
    pub sample_count: usize,
}

/// Pearson correlations between interval prices and the weather of their hour.
pub fn correlate(
    prices: &[(NaiveDateTime, f64)],
    weather: &[WeatherData],
) -> Option<WeatherCorrelation> {
    if prices.len() < MIN_PRICES || weather.len() < MIN_WEATHER_HOURS {
        return None;
    }

    let by_hour: HashMap<NaiveDateTime, &WeatherData> =
        weather.iter().map(|w| (w.time, w)).collect();
    let pairs: Vec<(&WeatherData, f64)> = prices
        .iter()
        .filter_map(|(time, price)| {
            let hour = time.date().and_hms_opt(time.hour(), 0, 0)?;
            by_hour.get(&hour).map(|w| (*w, *price))
        })
        .collect();
    if pairs.len() < MIN_PAIRS {
        return None;
    }

    let price_values: Vec<f64> = pairs.iter().map(|(_, p)| *p).collect();
    let factor = |f: fn(&WeatherData) -> f64| {
        let values: Vec<f64> = pairs.iter().map(|(w, _)| f(w)).collect();
        pearson(&values, &price_values)
    };
    let correlations = [
        (WeatherFactor::Temperature, factor(|w| w.temperature)),
        (WeatherFactor::CloudCover, factor(|w| w.cloud_cover)),
        (WeatherFactor::SolarRadiation, factor(|w| w.solar_radiation)),
        (WeatherFactor::WindSpeed, factor(|w| w.wind_speed)),
    ];
    let (strongest_factor, strongest) = correlations
        .iter()
        .copied()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;

    Some(WeatherCorrelation {
        temperature: correlations[0].1,
        cloud_cover: correlations[1].1,
        solar_radiation: correlations[2].1,
        wind_speed: correlations[3].1,
        strongest_factor,
        r_squared: strongest * strongest,
        sample_count: pairs.len(),
    })
}

/// Correlates the stored prices of the last `days_back` days with the
/// observed weather. `None` when there is not enough data.
pub async fn weather_price_correlation(
    store: &PriceStore,
    provider: &dyn WeatherProvider,
    today: NaiveDate,
    days_back: u32,
) -> Result<Option<WeatherCorrelation>> {
    let start = today - Duration::days(i64::from(days_back));
    let prices: Vec<(NaiveDateTime, f64)> = store
        .prices_for_range(start, today)?
        .into_iter()
        .map(|p| (p.time_from, p.price_czk))
        .collect();
    if prices.len() < MIN_PRICES {
        debug!("Only {} stored prices, skipping correlation", prices.len());
        return Ok(None);
    }

    let weather = provider.history(start, today).await?;
    Ok(correlate(&prices, &weather))
}

/// Multiplier applied to a historical base price for the given weather.
///
/// Sunshine and wind push prices down, calm overcast weather and extreme
/// temperatures push them up. Clamped to `[0.75, 1.25]`.
pub fn adjustment_factor(weather: &WeatherData) -> f64 {
    let mut factor = 1.0;

    if weather.cloud_cover < 30.0 && weather.solar_radiation > 300.0 {
        factor *= 0.85;
    } else if weather.cloud_cover < 50.0 {
        factor *= 0.92;
    }

    if weather.wind_speed >= 10.0 {
        factor *= 0.88;
    } else if weather.wind_speed >= 8.0 {
        factor *= 0.92;
    }

    if weather.cloud_cover >= 80.0 && weather.wind_speed < 4.0 {
        factor *= 1.10;
    }

    if weather.temperature < -5.0 || weather.temperature > 30.0 {
        factor *= 1.05;
    } else if weather.temperature < 0.0 || weather.temperature > 25.0 {
        factor *= 1.02;
    }

    f64::clamp(factor, 0.75, 1.25)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPrediction {
    pub hour: u32,
    pub price_czk: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    /// Adjustment applied, 1.0 when the hour had no weather data.
    pub adjustment: f64,
}

/// Historical weekday/hourly baseline for `target` scaled by the weather
/// adjustment of each hour. Hours without any history are skipped.
pub fn forecast_weather_enhanced(
    store: &PriceStore,
    today: NaiveDate,
    target: NaiveDate,
    weather: Option<&WeatherForecast>,
) -> Result<Vec<HourlyPrediction>> {
    let baseline = Baseline::load(store, today, target)?;
    let weather_by_hour: HashMap<u32, &WeatherData> = weather
        .map(|w| w.hourly.iter().map(|h| (h.time.hour(), h)).collect())
        .unwrap_or_default();

    let mut predictions = Vec::new();
    for hour in 0..24 {
        let Some(base) = baseline.base(hour) else {
            continue;
        };
        let adjustment = weather_by_hour
            .get(&hour)
            .map_or(1.0, |w| adjustment_factor(w));
        let price_czk = base.avg * adjustment;
        let (confidence_low, confidence_high) = baseline
            .band(hour, price_czk)
            .unwrap_or((price_czk * 0.7, price_czk * 1.3));

        predictions.push(HourlyPrediction {
            hour,
            price_czk,
            confidence_low,
            confidence_high,
            adjustment,
        });
    }
    Ok(predictions)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use anyhow::bail;

    pub fn hour(time: NaiveDateTime, cloud_cover: f64, wind_speed: f64) -> WeatherData {
        WeatherData {
            time,
            temperature: 15.0,
            cloud_cover,
            solar_radiation: 100.0,
            wind_speed,
            precipitation: 0.0,
        }
    }

    /// Serves `hours` for both forecast and history; `None` simulates an outage.
    pub struct FixedWeather(pub Option<Vec<WeatherData>>);

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn forecast(&self, _days_ahead: u32) -> Result<Vec<WeatherData>> {
            match &self.0 {
                Some(hours) => Ok(hours.clone()),
                None => bail!("weather unavailable"),
            }
        }

        async fn history(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WeatherData>> {
            Ok(self
                .forecast(0)
                .await?
                .into_iter()
                .filter(|h| start <= h.time.date() && h.time.date() <= end)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::store::test_support::day_prices;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    fn hours_of(date: NaiveDate, f: impl Fn(NaiveDateTime) -> WeatherData) -> Vec<WeatherData> {
        (0..24)
            .map(|h| f(date.and_hms_opt(h, 0, 0).unwrap()))
            .collect()
    }

    #[test]
    fn test_weather_type() {
        assert_eq!(WeatherType::classify(20.0, 3.0), WeatherType::Sunny);
        assert_eq!(WeatherType::classify(20.0, 9.0), WeatherType::Windy);
        assert_eq!(WeatherType::classify(90.0, 8.0), WeatherType::Windy);
        assert_eq!(WeatherType::classify(75.0, 4.0), WeatherType::Cloudy);
        assert_eq!(WeatherType::classify(50.0, 4.0), WeatherType::Mixed);
        assert_eq!(WeatherType::classify(20.0, 7.0), WeatherType::Mixed);
    }

    #[test]
    fn test_group_by_day() {
        let first = today().and_hms_opt(0, 0, 0).unwrap();
        let hourly: Vec<WeatherData> = (0..48)
            .map(|h| hour(first + Duration::hours(h), 10.0, 2.0))
            .collect();

        let days = group_by_day(hourly);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, today());
        assert_eq!(days[0].hourly.len(), 24);
        assert_eq!(days[0].avg_cloud_cover, 10.0);
        assert_eq!(days[0].total_solar_radiation, 2400.0);
        assert_eq!(days[0].weather_type, WeatherType::Sunny);
    }

    #[tokio::test]
    async fn test_weather_forecast_propagates_errors() {
        assert!(weather_forecast(&FixedWeather(None), 7).await.is_err());
    }

    #[test]
    fn test_adjustment_factor() {
        let time = today().and_hms_opt(12, 0, 0).unwrap();
        let neutral = WeatherData {
            cloud_cover: 60.0,
            ..hour(time, 60.0, 5.0)
        };
        assert_eq!(adjustment_factor(&neutral), 1.0);

        let sunny = WeatherData {
            solar_radiation: 600.0,
            ..hour(time, 10.0, 2.0)
        };
        assert!((adjustment_factor(&sunny) - 0.85).abs() < 1e-9);

        let stormy_clear = WeatherData {
            solar_radiation: 600.0,
            ..hour(time, 10.0, 12.0)
        };
        assert_eq!(adjustment_factor(&stormy_clear), 0.75);

        let dull = WeatherData {
            temperature: -10.0,
            ..hour(time, 95.0, 1.0)
        };
        assert!((adjustment_factor(&dull) - 1.155).abs() < 1e-9);
    }

    #[test]
    fn test_correlate_requires_enough_data() {
        let start = today().and_hms_opt(0, 0, 0).unwrap();
        let prices: Vec<(NaiveDateTime, f64)> =
            (0..24).map(|h| (start + Duration::hours(h), 1.0)).collect();
        let weather: Vec<WeatherData> = (0..48)
            .map(|h| hour(start + Duration::hours(h), 50.0, 5.0))
            .collect();
        assert!(correlate(&prices, &weather).is_none());
    }

    #[test]
    fn test_correlate_finds_strongest_factor() {
        let start = today().and_hms_opt(0, 0, 0).unwrap();
        let weather: Vec<WeatherData> = (0..72)
            .map(|h| {
                let wind = f64::from(h % 24);
                WeatherData {
                    temperature: 10.0 + f64::from(h % 5),
                    ..hour(start + Duration::hours(i64::from(h)), 50.0, wind)
                }
            })
            .collect();
        // quarter-hour prices fall exactly with the wind
        let prices: Vec<(NaiveDateTime, f64)> = weather
            .iter()
            .flat_map(|w| {
                (0..4).map(move |q| {
                    (w.time + Duration::minutes(15 * q), 3000.0 - 100.0 * w.wind_speed)
                })
            })
            .collect();

        let correlation = correlate(&prices, &weather).unwrap();
        assert_eq!(correlation.strongest_factor, WeatherFactor::WindSpeed);
        assert!((correlation.wind_speed + 1.0).abs() < 1e-9);
        assert!((correlation.r_squared - 1.0).abs() < 1e-9);
        // constant cloud cover has no variance
        assert_eq!(correlation.cloud_cover, 0.0);
        assert_eq!(correlation.sample_count, 288);
    }

    #[tokio::test]
    async fn test_weather_price_correlation() {
        let store = PriceStore::open_in_memory().unwrap();
        let mut weather = Vec::new();
        for i in 0..3 {
            let date = today() - Duration::days(i);
            store
                .save_prices(date, &day_prices(date, |h| 100.0 - f64::from(h)), 25.0)
                .unwrap();
            weather.extend(hours_of(date, |time| {
                hour(time, 50.0, f64::from(time.hour()))
            }));
        }

        let correlation = weather_price_correlation(&store, &FixedWeather(Some(weather)), today(), 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(correlation.strongest_factor, WeatherFactor::WindSpeed);

        let empty = PriceStore::open_in_memory().unwrap();
        let none = weather_price_correlation(&empty, &FixedWeather(None), today(), 7)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_forecast_weather_enhanced() {
        let store = PriceStore::open_in_memory().unwrap();
        for i in 0..7 {
            let date = today() - Duration::days(i);
            store.save_prices(date, &day_prices(date, |_| 40.0), 25.0).unwrap();
        }
        let target = today() + Duration::days(1);

        let plain = forecast_weather_enhanced(&store, today(), target, None).unwrap();
        assert_eq!(plain.len(), 24);
        assert!(plain.iter().all(|p| p.price_czk == 1000.0 && p.adjustment == 1.0));
        assert!(plain.iter().all(|p| p.confidence_low <= p.price_czk));

        let windy = WeatherForecast::from_hourly(
            target,
            hours_of(target, |time| hour(time, 60.0, 12.0)),
        )
        .unwrap();
        let adjusted = forecast_weather_enhanced(&store, today(), target, Some(&windy)).unwrap();
        assert!(adjusted.iter().all(|p| (p.price_czk - 880.0).abs() < 1e-9));
    }
}
