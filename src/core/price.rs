//! Spot price types and the provider abstraction

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Prague;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Length of one day-ahead delivery interval.
pub const INTERVAL_MINUTES: i64 = 15;

/// A single EUR price point as published by the market operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EurQuote {
    /// 1-based quarter-hour index within the delivery day.
    pub period: u32,
    pub price_eur: f64,
}

/// Spot price of one 15-minute interval, in EUR/MWh and CZK/MWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPrice {
    pub period: u32,
    pub time_from: NaiveDateTime,
    pub time_to: NaiveDateTime,
    pub price_eur: f64,
    pub price_czk: f64,
}

impl SpotPrice {
    /// Builds the interval for `quote` on `date`, converting with `eur_czk_rate`.
    ///
    /// Interval times are Prague wall-clock times. The period index counts real
    /// elapsed quarter-hours from local midnight, so DST days with 92 or 100
    /// periods map onto the correct local times.
    pub fn from_quote(date: NaiveDate, quote: EurQuote, eur_czk_rate: f64) -> Result<Self> {
        anyhow::ensure!(quote.period >= 1, "Invalid period 0 for {date}");

        let start = start_of_day(date)?;
        let offset = Duration::minutes(i64::from(quote.period - 1) * INTERVAL_MINUTES);
        let time_from = (start + offset).naive_local();

        Ok(Self {
            period: quote.period,
            time_from,
            time_to: interval_end(time_from),
            price_eur: quote.price_eur,
            price_czk: quote.price_eur * eur_czk_rate,
        })
    }

    /// Label such as `13:15 - 13:29`.
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            self.time_from.format("%H:%M"),
            self.time_to.format("%H:%M")
        )
    }
}

/// Last second of the interval starting at `time_from`.
pub fn interval_end(time_from: NaiveDateTime) -> NaiveDateTime {
    time_from + Duration::minutes(INTERVAL_MINUTES) - Duration::seconds(1)
}

/// Local midnight of `date` in Prague.
pub fn start_of_day(date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0).context("Invalid midnight")?;
    Prague
        .from_local_datetime(&midnight)
        .earliest()
        .with_context(|| format!("Local midnight does not exist for {date}"))
}

/// Current time in Prague. Keeps the UTC offset so the repeated hour of the
/// autumn clock change stays distinguishable.
pub fn prague_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Prague)
}

pub fn prague_today() -> NaiveDate {
    prague_now().date_naive()
}

/// 1-based quarter-hour period of the delivery day containing `now`.
pub fn period_at(now: DateTime<Tz>) -> Option<u32> {
    let start = start_of_day(now.date_naive()).ok()?;
    let elapsed = (now - start).num_minutes();
    u32::try_from(elapsed / INTERVAL_MINUTES + 1).ok()
}

/// Finds the interval containing `now`.
pub fn current_price(prices: &[SpotPrice], now: DateTime<Tz>) -> Option<&SpotPrice> {
    let today = now.date_naive();
    let period = period_at(now)?;
    prices
        .iter()
        .find(|p| p.period == period && p.time_from.date() == today)
}

/// All prices of one delivery day together with the rate used to convert them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPrices {
    pub date: NaiveDate,
    pub eur_czk_rate: f64,
    pub prices: Vec<SpotPrice>,
}

impl DayPrices {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn min_czk(&self) -> Option<f64> {
        self.prices.iter().map(|p| p.price_czk).reduce(f64::min)
    }

    pub fn max_czk(&self) -> Option<f64> {
        self.prices.iter().map(|p| p.price_czk).reduce(f64::max)
    }

    pub fn average_czk(&self) -> Option<f64> {
        if self.prices.is_empty() {
            return None;
        }
        let sum: f64 = self.prices.iter().map(|p| p.price_czk).sum();
        Some(sum / self.prices.len() as f64)
    }
}

#[async_trait]
pub trait SpotPriceProvider: Send + Sync {
    /// Returns the EUR quotes for `date`, or an empty list when the day is not
    /// published yet.
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EurQuote>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, min: u32, s: u32) -> NaiveDateTime {
        d.and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_from_quote_regular_day() {
        let d = date(2025, 10, 15);
        let first = SpotPrice::from_quote(d, EurQuote { period: 1, price_eur: 100.0 }, 24.5).unwrap();
        assert_eq!(first.time_from, at(d, 0, 0, 0));
        assert_eq!(first.time_to, at(d, 0, 14, 59));
        assert_eq!(first.price_czk, 2450.0);

        let last = SpotPrice::from_quote(d, EurQuote { period: 96, price_eur: 1.0 }, 1.0).unwrap();
        assert_eq!(last.time_from, at(d, 23, 45, 0));
        assert_eq!(last.time_range(), "23:45 - 23:59");
    }

    #[test]
    fn test_from_quote_spring_forward_skips_missing_hour() {
        // 2025-03-30: clocks jump from 02:00 to 03:00 in Prague
        let d = date(2025, 3, 30);
        let p9 = SpotPrice::from_quote(d, EurQuote { period: 9, price_eur: 1.0 }, 1.0).unwrap();
        assert_eq!(p9.time_from, at(d, 3, 0, 0));
        let p92 = SpotPrice::from_quote(d, EurQuote { period: 92, price_eur: 1.0 }, 1.0).unwrap();
        assert_eq!(p92.time_from, at(d, 23, 45, 0));
    }

    #[test]
    fn test_from_quote_fall_back_repeats_hour() {
        // 2025-10-26: clocks go back from 03:00 to 02:00 in Prague
        let d = date(2025, 10, 26);
        let p9 = SpotPrice::from_quote(d, EurQuote { period: 9, price_eur: 1.0 }, 1.0).unwrap();
        let p13 = SpotPrice::from_quote(d, EurQuote { period: 13, price_eur: 1.0 }, 1.0).unwrap();
        assert_eq!(p9.time_from, at(d, 2, 0, 0));
        assert_eq!(p13.time_from, at(d, 2, 0, 0));
        let p100 = SpotPrice::from_quote(d, EurQuote { period: 100, price_eur: 1.0 }, 1.0).unwrap();
        assert_eq!(p100.time_from, at(d, 23, 45, 0));
    }

    #[test]
    fn test_from_quote_rejects_period_zero() {
        let result = SpotPrice::from_quote(date(2025, 1, 1), EurQuote { period: 0, price_eur: 1.0 }, 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_current_price() {
        let d = date(2025, 10, 15);
        let prices: Vec<SpotPrice> = (1..=96)
            .map(|p| SpotPrice::from_quote(d, EurQuote { period: p, price_eur: p as f64 }, 1.0).unwrap())
            .collect();

        let local = |t: NaiveDateTime| Prague.from_local_datetime(&t).single().unwrap();
        let current = current_price(&prices, local(at(d, 13, 20, 0))).unwrap();
        assert_eq!(current.period, 54);
        assert_eq!(current_price(&prices, local(at(d, 13, 29, 59))).unwrap().period, 54);
        assert!(current_price(&prices, local(at(date(2025, 10, 16), 0, 5, 0))).is_none());
    }

    #[test]
    fn test_current_price_in_repeated_autumn_hour() {
        let d = date(2025, 10, 26);
        let prices: Vec<SpotPrice> = (1..=100)
            .map(|p| SpotPrice::from_quote(d, EurQuote { period: p, price_eur: p as f64 }, 1.0).unwrap())
            .collect();

        // 00:10 UTC is 02:10 CEST, 01:10 UTC is 02:10 CET
        let first_pass = Utc.with_ymd_and_hms(2025, 10, 26, 0, 10, 0).unwrap().with_timezone(&Prague);
        let second_pass = Utc.with_ymd_and_hms(2025, 10, 26, 1, 10, 0).unwrap().with_timezone(&Prague);
        assert_eq!(current_price(&prices, first_pass).unwrap().period, 9);
        assert_eq!(current_price(&prices, second_pass).unwrap().period, 13);

        let late = Utc.with_ymd_and_hms(2025, 10, 26, 22, 50, 0).unwrap().with_timezone(&Prague);
        assert_eq!(current_price(&prices, late).unwrap().period, 100);
    }

    #[test]
    fn test_period_at_spring_forward() {
        // 03:00 CEST directly follows 02:00 CET on 2025-03-30
        let after_jump = Utc.with_ymd_and_hms(2025, 3, 30, 1, 0, 0).unwrap().with_timezone(&Prague);
        assert_eq!(period_at(after_jump), Some(9));
    }

    #[test]
    fn test_day_prices_stats() {
        let d = date(2025, 10, 15);
        let day = DayPrices {
            date: d,
            eur_czk_rate: 2.0,
            prices: [10.0, -5.0, 25.0]
                .iter()
                .enumerate()
                .map(|(i, eur)| {
                    SpotPrice::from_quote(d, EurQuote { period: i as u32 + 1, price_eur: *eur }, 2.0)
                        .unwrap()
                })
                .collect(),
        };
        assert_eq!(day.min_czk(), Some(-10.0));
        assert_eq!(day.max_czk(), Some(50.0));
        assert_eq!(day.average_czk(), Some(20.0));

        let empty = DayPrices { date: d, eur_czk_rate: 2.0, prices: vec![] };
        assert!(empty.is_empty());
        assert_eq!(empty.average_czk(), None);
    }
}
