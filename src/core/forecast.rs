//! Historical-average price forecasts

use crate::core::currency::CurrencyRateProvider;
use crate::core::market::fetch_day_prices;
use crate::core::price::{DayPrices, SpotPriceProvider, interval_end};
use crate::core::stats;
use crate::store::{HourlyAggregate, PriceStore, WeekdayAggregate};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub const HOURLY_PATTERN_MIN_DAYS: usize = 7;
pub const STATISTICAL_MIN_DAYS: usize = 14;

/// Window of the hourly averages and of the spread estimate.
const HOURLY_WINDOW_DAYS: i64 = 30;
/// Window of the weekday-specific averages.
const WEEKDAY_WINDOW_DAYS: i64 = 60;
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForecastMethod {
    HourlyPattern,
    Statistical,
}

impl ForecastMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ForecastMethod::HourlyPattern => "hourly pattern",
            ForecastMethod::Statistical => "statistical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceForecast {
    pub time_from: NaiveDateTime,
    pub time_to: NaiveDateTime,
    pub price_czk: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub method: ForecastMethod,
}

/// Which forecasting methods the amount of stored history supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSufficiency {
    pub total_days: usize,
    /// Day-ahead prices come from the market operator, not from history.
    pub can_show_tomorrow: bool,
    pub can_show_hourly_patterns: bool,
    pub can_show_weekly_patterns: bool,
    pub can_show_statistical_forecast: bool,
}

impl DataSufficiency {
    pub fn from_days(total_days: usize) -> Self {
        DataSufficiency {
            total_days,
            can_show_tomorrow: true,
            can_show_hourly_patterns: total_days >= HOURLY_PATTERN_MIN_DAYS,
            can_show_weekly_patterns: total_days >= STATISTICAL_MIN_DAYS,
            can_show_statistical_forecast: total_days >= STATISTICAL_MIN_DAYS,
        }
    }
}

pub fn data_sufficiency(store: &PriceStore) -> Result<DataSufficiency> {
    Ok(DataSufficiency::from_days(store.data_days_count()?))
}

/// Historical baseline for a target day: weekday-specific averages with an
/// hourly fallback, plus the recent per-hour price samples used for bands.
pub(crate) struct Baseline {
    weekday: HashMap<u32, WeekdayAggregate>,
    hourly: HashMap<u32, HourlyAggregate>,
    samples: HashMap<u32, Vec<f64>>,
}

/// Base price of one hour and, when known, its observed min/max.
pub(crate) struct HourBase {
    pub avg: f64,
    pub range: Option<(f64, f64)>,
}

impl Baseline {
    pub(crate) fn load(store: &PriceStore, today: NaiveDate, target: NaiveDate) -> Result<Self> {
        let weekday_index = target.weekday().num_days_from_monday();
        let weekday = store
            .weekday_aggregates(today - Duration::days(WEEKDAY_WINDOW_DAYS))?
            .into_iter()
            .filter(|agg| agg.weekday == weekday_index)
            .map(|agg| (agg.hour, agg))
            .collect();

        let since = today - Duration::days(HOURLY_WINDOW_DAYS);
        let hourly = store
            .hourly_aggregates(since)?
            .into_iter()
            .map(|agg| (agg.hour, agg))
            .collect();

        let mut samples: HashMap<u32, Vec<f64>> = HashMap::new();
        for price in store.prices_for_range(since, today)? {
            samples
                .entry(price.time_from.hour())
                .or_default()
                .push(price.price_czk);
        }

        Ok(Baseline {
            weekday,
            hourly,
            samples,
        })
    }

    pub(crate) fn base(&self, hour: u32) -> Option<HourBase> {
        if let Some(agg) = self.weekday.get(&hour) {
            return Some(HourBase {
                avg: agg.avg_price,
                range: None,
            });
        }
        self.hourly.get(&hour).map(|agg| HourBase {
            avg: agg.avg_price,
            range: Some((agg.min_price, agg.max_price)),
        })
    }

    /// 95 % band around `center` from the hour's spread; `None` with fewer
    /// than two samples.
    pub(crate) fn band(&self, hour: u32, center: f64) -> Option<(f64, f64)> {
        let samples = self.samples.get(&hour).filter(|s| s.len() >= 2)?;
        let sigma = stats::std_dev(samples)?;
        Some(((center - Z_95 * sigma).max(0.0), center + Z_95 * sigma))
    }
}

fn quarter_hours(
    target: NaiveDate,
    hour: u32,
    price_czk: f64,
    (confidence_low, confidence_high): (f64, f64),
    method: ForecastMethod,
) -> impl Iterator<Item = PriceForecast> {
    (0..4u32).filter_map(move |quarter| {
        let time_from = target.and_hms_opt(hour, quarter * 15, 0)?;
        Some(PriceForecast {
            time_from,
            time_to: interval_end(time_from),
            price_czk,
            confidence_low,
            confidence_high,
            method,
        })
    })
}

/// Per-hour average of the last 30 days with the observed min/max as band,
/// emitted for every quarter-hour of `target`.
pub fn forecast_pattern_based(
    store: &PriceStore,
    today: NaiveDate,
    target: NaiveDate,
) -> Result<Vec<PriceForecast>> {
    let aggregates = store.hourly_aggregates(today - Duration::days(HOURLY_WINDOW_DAYS))?;
    let by_hour: HashMap<u32, &HourlyAggregate> =
        aggregates.iter().map(|agg| (agg.hour, agg)).collect();

    Ok((0..24)
        .filter_map(|hour| by_hour.get(&hour).map(|agg| (hour, *agg)))
        .flat_map(|(hour, agg)| {
            quarter_hours(
                target,
                hour,
                agg.avg_price,
                (agg.min_price, agg.max_price),
                ForecastMethod::HourlyPattern,
            )
        })
        .collect())
}

/// Weekday-specific average (hourly fallback) with a ±1.96σ band.
pub fn forecast_statistical(
    store: &PriceStore,
    today: NaiveDate,
    target: NaiveDate,
) -> Result<Vec<PriceForecast>> {
    let baseline = Baseline::load(store, today, target)?;

    let mut forecasts = Vec::new();
    for hour in 0..24 {
        let Some(base) = baseline.base(hour) else {
            continue;
        };
        let band = baseline
            .band(hour, base.avg)
            .or(base.range)
            .unwrap_or((base.avg * 0.8, base.avg * 1.2));
        forecasts.extend(quarter_hours(
            target,
            hour,
            base.avg,
            band,
            ForecastMethod::Statistical,
        ));
    }
    Ok(forecasts)
}

/// Forecasts for D+2 ..= D+`days_ahead` using the best method the stored
/// history allows. Days without any forecast are left out.
pub fn forecast_for_days(
    store: &PriceStore,
    today: NaiveDate,
    days_ahead: u32,
) -> Result<BTreeMap<NaiveDate, Vec<PriceForecast>>> {
    let sufficiency = data_sufficiency(store)?;
    debug!("Forecasting with {} days of history", sufficiency.total_days);

    let mut result = BTreeMap::new();
    for offset in 2..=i64::from(days_ahead) {
        let target = today + Duration::days(offset);
        let forecasts = if sufficiency.can_show_statistical_forecast {
            forecast_statistical(store, today, target)?
        } else if sufficiency.can_show_hourly_patterns {
            forecast_pattern_based(store, today, target)?
        } else {
            Vec::new()
        };
        if !forecasts.is_empty() {
            result.insert(target, forecasts);
        }
    }
    Ok(result)
}

/// Published day-ahead prices for tomorrow; `None` when not out yet or the
/// fetch fails.
pub async fn tomorrow_prices(
    spot: &dyn SpotPriceProvider,
    rates: &dyn CurrencyRateProvider,
    today: NaiveDate,
) -> Option<DayPrices> {
    let tomorrow = today + Duration::days(1);
    match fetch_day_prices(spot, rates, tomorrow).await {
        Ok(day) if !day.is_empty() => Some(day),
        Ok(_) => None,
        Err(err) => {
            warn!("Could not fetch prices for {}: {:#}", tomorrow, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::test_support::{FixedRate, FixedSpot, quotes};
    use crate::store::test_support::day_prices;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    /// Stores `days` days ending today; EUR price = 40 + hour, doubled on weekends.
    fn store_with_days(days: i64) -> PriceStore {
        let store = PriceStore::open_in_memory().unwrap();
        for offset in 0..days {
            let date = today() - Duration::days(offset);
            let weekend = date.weekday().num_days_from_monday() >= 5;
            let prices = day_prices(date, |hour| {
                let base = 40.0 + f64::from(hour);
                if weekend { base * 2.0 } else { base }
            });
            store.save_prices(date, &prices, 25.0).unwrap();
        }
        store
    }

    #[test]
    fn test_data_sufficiency_thresholds() {
        let none = DataSufficiency::from_days(0);
        assert!(none.can_show_tomorrow);
        assert!(!none.can_show_hourly_patterns);

        let week = DataSufficiency::from_days(7);
        assert!(week.can_show_hourly_patterns);
        assert!(!week.can_show_statistical_forecast);

        let two_weeks = DataSufficiency::from_days(14);
        assert!(two_weeks.can_show_weekly_patterns);
        assert!(two_weeks.can_show_statistical_forecast);
    }

    #[test]
    fn test_data_sufficiency_counts_days() {
        let store = store_with_days(8);
        let sufficiency = data_sufficiency(&store).unwrap();
        assert_eq!(sufficiency.total_days, 8);
        assert!(sufficiency.can_show_hourly_patterns);
    }

    #[test]
    fn test_forecast_pattern_based_quarter_hours() {
        let store = store_with_days(10);
        let target = today() + Duration::days(2);
        let forecasts = forecast_pattern_based(&store, today(), target).unwrap();

        assert_eq!(forecasts.len(), 96);
        assert!(forecasts.iter().all(|f| f.method == ForecastMethod::HourlyPattern));
        assert!(forecasts.iter().all(|f| f.time_from.date() == target));
        assert!(
            forecasts
                .iter()
                .all(|f| f.confidence_low <= f.price_czk && f.price_czk <= f.confidence_high)
        );
        assert_eq!(forecasts[4].time_from.hour(), 1);
        assert_eq!(forecasts[4].time_to, target.and_hms_opt(1, 14, 59).unwrap());
    }

    #[test]
    fn test_forecast_pattern_based_empty_store() {
        let store = PriceStore::open_in_memory().unwrap();
        let forecasts = forecast_pattern_based(&store, today(), today()).unwrap();
        assert!(forecasts.is_empty());
    }

    #[test]
    fn test_forecast_statistical_uses_weekday_average() {
        let store = store_with_days(21);
        // 2025-10-18 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2025, 10, 18).unwrap();
        let forecasts = forecast_statistical(&store, today(), saturday).unwrap();

        assert_eq!(forecasts.len(), 96);
        assert!(forecasts.iter().all(|f| f.method == ForecastMethod::Statistical));
        // hour 0 on weekends: 2 × 40 EUR × 25 CZK
        assert_eq!(forecasts[0].price_czk, 2000.0);
        assert!(forecasts.iter().all(|f| f.confidence_low >= 0.0));
        assert!(forecasts.iter().all(|f| f.confidence_low <= f.price_czk));
        assert!(forecasts.iter().all(|f| f.price_czk <= f.confidence_high));
    }

    #[test]
    fn test_forecast_for_days_range() {
        let store = store_with_days(14);
        let forecasts = forecast_for_days(&store, today(), 7).unwrap();

        let dates: Vec<NaiveDate> = forecasts.keys().copied().collect();
        let expected: Vec<NaiveDate> = (2..=7).map(|d| today() + Duration::days(d)).collect();
        assert_eq!(dates, expected);
        assert!(
            forecasts
                .values()
                .flatten()
                .all(|f| f.method == ForecastMethod::Statistical)
        );
    }

    #[test]
    fn test_forecast_for_days_falls_back_to_patterns() {
        let store = store_with_days(8);
        let forecasts = forecast_for_days(&store, today(), 3).unwrap();
        assert_eq!(forecasts.len(), 2);
        assert!(
            forecasts
                .values()
                .flatten()
                .all(|f| f.method == ForecastMethod::HourlyPattern)
        );
    }

    #[test]
    fn test_forecast_for_days_without_history() {
        let store = store_with_days(3);
        assert!(forecast_for_days(&store, today(), 7).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tomorrow_prices() {
        let published = FixedSpot(Some(quotes(&[50.0; 96])));
        let day = tomorrow_prices(&published, &FixedRate(25.0), today())
            .await
            .unwrap();
        assert_eq!(day.date, today() + Duration::days(1));
        assert_eq!(day.prices.len(), 96);

        let unpublished = FixedSpot(Some(vec![]));
        assert!(tomorrow_prices(&unpublished, &FixedRate(25.0), today()).await.is_none());

        let failing = FixedSpot(None);
        assert!(tomorrow_prices(&failing, &FixedRate(25.0), today()).await.is_none());
    }
}
