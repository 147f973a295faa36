//! Descriptive price analysis over the stored history.
//!
//! Every function looks at the `days_back` days up to and including `today`.

use crate::core::price::SpotPrice;
use crate::core::stats::{self, change_pct, mean, percentile, sorted, std_dev};
use crate::store::{HourlyAggregate, NegativePriceHour, PriceStore};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Classification and percentile statistics need at least this many samples.
pub const MIN_SAMPLES: usize = 10;
/// Hours with at least this many negative occurrences in 30 days are flagged.
const NEGATIVE_RISK_OCCURRENCES: usize = 3;
const HISTOGRAM_BINS: usize = 20;

pub const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub type HourlyPattern = HourlyAggregate;

fn since(today: NaiveDate, days_back: u32) -> NaiveDate {
    today - Duration::days(i64::from(days_back))
}

fn window_prices(store: &PriceStore, today: NaiveDate, days_back: u32) -> Result<Vec<SpotPrice>> {
    store.prices_for_range(since(today, days_back), today)
}

fn window_sample(store: &PriceStore, today: NaiveDate, days_back: u32) -> Result<Vec<f64>> {
    Ok(sorted(
        window_prices(store, today, days_back)?
            .into_iter()
            .map(|p| p.price_czk),
    ))
}

pub fn hourly_patterns(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<HourlyPattern>> {
    store.hourly_aggregates(since(today, days_back))
}

/// Cheapest hours of day by average price, cheapest first.
pub fn best_hours(
    store: &PriceStore,
    today: NaiveDate,
    top_n: usize,
    days_back: u32,
) -> Result<Vec<(u32, f64)>> {
    let mut patterns = hourly_patterns(store, today, days_back)?;
    patterns.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    Ok(patterns
        .into_iter()
        .take(top_n)
        .map(|p| (p.hour, p.avg_price))
        .collect())
}

/// Most expensive hours of day by average price, most expensive first.
pub fn worst_hours(
    store: &PriceStore,
    today: NaiveDate,
    top_n: usize,
    days_back: u32,
) -> Result<Vec<(u32, f64)>> {
    let mut patterns = hourly_patterns(store, today, days_back)?;
    patterns.sort_by(|a, b| b.avg_price.total_cmp(&a.avg_price));
    Ok(patterns
        .into_iter()
        .take(top_n)
        .map(|p| (p.hour, p.avg_price))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceLevel {
    VeryCheap,
    Cheap,
    Normal,
    Expensive,
    VeryExpensive,
    InsufficientData,
}

impl PriceLevel {
    /// Places `price` among the sorted historical `sample` using its
    /// 10/30/70/90th percentiles.
    pub fn classify(price: f64, sample: &[f64]) -> PriceLevel {
        if sample.len() < MIN_SAMPLES {
            return PriceLevel::InsufficientData;
        }
        let at = |q| percentile(sample, q).unwrap_or(f64::NAN);
        if price <= at(0.10) {
            PriceLevel::VeryCheap
        } else if price <= at(0.30) {
            PriceLevel::Cheap
        } else if price <= at(0.70) {
            PriceLevel::Normal
        } else if price <= at(0.90) {
            PriceLevel::Expensive
        } else {
            PriceLevel::VeryExpensive
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriceLevel::VeryCheap => "very cheap",
            PriceLevel::Cheap => "cheap",
            PriceLevel::Normal => "normal",
            PriceLevel::Expensive => "expensive",
            PriceLevel::VeryExpensive => "very expensive",
            PriceLevel::InsufficientData => "insufficient data",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            PriceLevel::VeryCheap => "#28a745",
            PriceLevel::Cheap => "#7cb342",
            PriceLevel::Normal => "#ffc107",
            PriceLevel::Expensive => "#ff9800",
            PriceLevel::VeryExpensive => "#dc3545",
            PriceLevel::InsufficientData => "#6c757d",
        }
    }
}

pub fn classify_price(
    store: &PriceStore,
    today: NaiveDate,
    price: f64,
    days_back: u32,
) -> Result<PriceLevel> {
    let sample = window_sample(store, today, days_back)?;
    Ok(PriceLevel::classify(price, &sample))
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapCell {
    pub weekday: u32,
    pub weekday_name: &'static str,
    pub hour: u32,
    pub avg_price: f64,
}

pub fn weekday_hour_heatmap(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<HeatmapCell>> {
    Ok(store
        .weekday_aggregates(since(today, days_back))?
        .into_iter()
        .map(|agg| HeatmapCell {
            weekday: agg.weekday,
            weekday_name: WEEKDAY_NAMES[agg.weekday as usize % 7],
            hour: agg.hour,
            avg_price: agg.avg_price,
        })
        .collect())
}

// Negative prices

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NegativePriceStats {
    /// Number of (day, hour) slots with a non-positive price.
    pub count: usize,
    pub avg_negative_price: Option<f64>,
    pub min_price: Option<f64>,
    pub hours_distribution: BTreeMap<u32, usize>,
}

pub fn negative_price_hours(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<NegativePriceHour>> {
    store.negative_price_hours(since(today, days_back))
}

pub fn negative_price_stats(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<NegativePriceStats> {
    let hours = negative_price_hours(store, today, days_back)?;
    let prices: Vec<f64> = hours.iter().map(|h| h.price_czk).collect();

    let mut hours_distribution = BTreeMap::new();
    for hour in &hours {
        *hours_distribution.entry(hour.hour).or_insert(0) += 1;
    }

    Ok(NegativePriceStats {
        count: hours.len(),
        avg_negative_price: mean(&prices),
        min_price: prices.iter().copied().reduce(f64::min),
        hours_distribution,
    })
}

/// Hours of day that had a non-positive price at least three times in the
/// last 30 days, ascending.
pub fn negative_price_forecast(store: &PriceStore, today: NaiveDate) -> Result<Vec<u32>> {
    let stats = negative_price_stats(store, today, 30)?;
    Ok(stats
        .hours_distribution
        .into_iter()
        .filter(|(_, count)| *count >= NEGATIVE_RISK_OCCURRENCES)
        .map(|(hour, _)| hour)
        .collect())
}

// Distribution and trends

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceDistribution {
    pub bins: Vec<String>,
    pub counts: Vec<usize>,
    /// `(name, value)` for p10, p25, p50, p75 and p90.
    pub percentiles: Vec<(&'static str, f64)>,
}

impl PriceDistribution {
    pub fn percentile(&self, name: &str) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// 20-bin histogram of prices. Empty with fewer than 10 samples.
pub fn price_distribution(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<PriceDistribution> {
    let sample = window_sample(store, today, days_back)?;
    Ok(histogram(&sample))
}

fn histogram(sample: &[f64]) -> PriceDistribution {
    let (Some(&min), Some(&max)) = (sample.first(), sample.last()) else {
        return PriceDistribution::default();
    };
    if sample.len() < MIN_SAMPLES {
        return PriceDistribution::default();
    }

    let percentiles = [
        ("p10", 0.10),
        ("p25", 0.25),
        ("p50", 0.50),
        ("p75", 0.75),
        ("p90", 0.90),
    ]
    .into_iter()
    .filter_map(|(name, q)| percentile(sample, q).map(|v| (name, v)))
    .collect();

    let width = if max > min {
        (max - min) / HISTOGRAM_BINS as f64
    } else {
        1.0
    };
    let bins = (0..HISTOGRAM_BINS)
        .map(|i| {
            let start = min + i as f64 * width;
            format!("{:.0}-{:.0}", start, start + width)
        })
        .collect();
    let mut counts = vec![0; HISTOGRAM_BINS];
    for price in sample {
        // Bins are half-open; the maximum itself belongs to the last one
        let index = ((price - min) / width).floor() as usize;
        counts[index.min(HISTOGRAM_BINS - 1)] += 1;
    }

    PriceDistribution {
        bins,
        counts,
        percentiles,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAverageDay {
    pub date: NaiveDate,
    pub daily_avg: f64,
    pub ma7: Option<f64>,
    pub ma30: Option<f64>,
}

/// Daily averages with 7- and 30-day trailing moving averages.
pub fn moving_averages(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<MovingAverageDay>> {
    let days = store.daily_averages(since(today, days_back))?;
    let averages: Vec<f64> = days.iter().map(|d| d.avg_price).collect();
    let trailing = |i: usize, n: usize| {
        if i + 1 >= n {
            mean(&averages[i + 1 - n..=i])
        } else {
            None
        }
    };

    Ok(days
        .iter()
        .enumerate()
        .map(|(i, day)| MovingAverageDay {
            date: day.date,
            daily_avg: day.avg_price,
            ma7: trailing(i, 7),
            ma30: trailing(i, 30),
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    fn from_change(change_percent: f64, threshold: f64) -> Self {
        if change_percent > threshold {
            TrendDirection::Rising
        } else if change_percent < -threshold {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Falling => "falling",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient data",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "↑",
            TrendDirection::Falling => "↓",
            TrendDirection::Stable => "→",
            TrendDirection::InsufficientData => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrend {
    pub direction: TrendDirection,
    pub change_percent: Option<f64>,
    pub current_avg: Option<f64>,
    pub previous_avg: Option<f64>,
}

/// Compares the mean daily average of the last `days_back` stored days with
/// the days before them (up to `days_back` more).
pub fn price_trend(store: &PriceStore, today: NaiveDate, days_back: u32) -> Result<PriceTrend> {
    let days = store.daily_averages(since(today, days_back * 2))?;
    let window = days_back as usize;
    let insufficient = |current_avg| PriceTrend {
        direction: TrendDirection::InsufficientData,
        change_percent: None,
        current_avg,
        previous_avg: None,
    };

    if window == 0 || days.len() < window {
        return Ok(insufficient(None));
    }

    let averages: Vec<f64> = days.iter().map(|d| d.avg_price).collect();
    let (previous, current) = averages.split_at(averages.len() - window);
    let current_avg = mean(current);
    let previous = &previous[previous.len().saturating_sub(window)..];
    let (Some(current_avg), Some(previous_avg)) = (current_avg, mean(previous)) else {
        return Ok(insufficient(current_avg));
    };

    let change_percent = change_pct(current_avg, previous_avg).unwrap_or(0.0);
    Ok(PriceTrend {
        direction: TrendDirection::from_change(change_percent, 5.0),
        change_percent: Some(change_percent),
        current_avg: Some(current_avg),
        previous_avg: Some(previous_avg),
    })
}

// Benchmark

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBenchmark {
    pub current_price: f64,
    pub avg_7d: f64,
    pub avg_30d: f64,
    /// Share of historical samples strictly below the price, 0-100.
    pub percentile_rank: u32,
    pub vs_yesterday_pct: Option<f64>,
    pub vs_last_week_pct: Option<f64>,
    pub classification: PriceLevel,
}

/// Puts `price` into the context of the recent history.
pub fn current_benchmark(
    store: &PriceStore,
    today: NaiveDate,
    price: f64,
    days_back: u32,
) -> Result<PriceBenchmark> {
    let sample = window_sample(store, today, days_back)?;
    let classification = PriceLevel::classify(price, &sample);
    if classification == PriceLevel::InsufficientData {
        return Ok(PriceBenchmark {
            current_price: price,
            avg_7d: 0.0,
            avg_30d: 0.0,
            percentile_rank: 0,
            vs_yesterday_pct: None,
            vs_last_week_pct: None,
            classification,
        });
    }

    let below = sample.iter().filter(|&&p| p < price).count();
    let percentile_rank = (below * 100 / sample.len()) as u32;

    let avg_since = |days: u32| -> Result<f64> {
        Ok(store
            .overall_stats(since(today, days))?
            .map(|s| s.avg)
            .unwrap_or(0.0))
    };
    let vs_day = |date: NaiveDate| -> Result<Option<f64>> {
        Ok(store
            .daily_stats(date)?
            .and_then(|s| change_pct(price, s.avg)))
    };

    Ok(PriceBenchmark {
        current_price: price,
        avg_7d: avg_since(7)?,
        avg_30d: avg_since(days_back)?,
        percentile_rank,
        vs_yesterday_pct: vs_day(today - Duration::days(1))?,
        vs_last_week_pct: vs_day(today - Duration::days(7))?,
        classification,
    })
}

// Consumption profiles

#[derive(Debug, Clone, Copy)]
pub struct ProfileDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub hours: &'static [u32],
}

pub const CONSUMPTION_PROFILES: [ProfileDefinition; 5] = [
    ProfileDefinition {
        key: "morning",
        name: "Morning",
        description: "Breakfast, showers and commuting preparations (06-09)",
        hours: &[6, 7, 8, 9],
    },
    ProfileDefinition {
        key: "home_office",
        name: "Home office",
        description: "Working from home during business hours (08-17)",
        hours: &[8, 9, 10, 11, 12, 13, 14, 15, 16, 17],
    },
    ProfileDefinition {
        key: "evening",
        name: "Evening",
        description: "Cooking, lighting and entertainment (17-22)",
        hours: &[17, 18, 19, 20, 21, 22],
    },
    ProfileDefinition {
        key: "night",
        name: "Night",
        description: "EV charging, heat pumps and storage heaters (22-05)",
        hours: &[22, 23, 0, 1, 2, 3, 4, 5],
    },
    ProfileDefinition {
        key: "midday",
        name: "Midday",
        description: "Appliances timed to solar production (10-15)",
        hours: &[10, 11, 12, 13, 14, 15],
    },
];

pub fn profile_definition(key: &str) -> Option<&'static ProfileDefinition> {
    CONSUMPTION_PROFILES.iter().find(|p| p.key == key)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionProfile {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub hours: Vec<u32>,
    pub avg_price_czk: f64,
    pub avg_price_eur: f64,
    /// Positive when the profile is cheaper than consuming evenly all day.
    pub savings_vs_flat_pct: f64,
    pub best_day: &'static str,
    pub worst_day: &'static str,
}

fn analyze_profile(definition: &ProfileDefinition, prices: &[SpotPrice]) -> Option<ConsumptionProfile> {
    let in_profile: Vec<&SpotPrice> = prices
        .iter()
        .filter(|p| definition.hours.contains(&p.time_from.hour()))
        .collect();
    let czk: Vec<f64> = in_profile.iter().map(|p| p.price_czk).collect();
    let eur: Vec<f64> = in_profile.iter().map(|p| p.price_eur).collect();
    let avg_price_czk = mean(&czk)?;
    let avg_price_eur = mean(&eur)?;

    let flat: Vec<f64> = prices.iter().map(|p| p.price_czk).collect();
    let savings_vs_flat_pct = mean(&flat)
        .and_then(|flat_avg| change_pct(avg_price_czk, flat_avg))
        .map(|change| -change)
        .unwrap_or(0.0);

    let mut by_weekday: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for price in &in_profile {
        by_weekday
            .entry(price.time_from.weekday().num_days_from_monday() as usize)
            .or_default()
            .push(price.price_czk);
    }
    let weekday_avgs: Vec<(usize, f64)> = by_weekday
        .iter()
        .filter_map(|(day, values)| mean(values).map(|avg| (*day, avg)))
        .collect();
    let name_of = |pick: Option<&(usize, f64)>| pick.map_or("N/A", |(day, _)| WEEKDAY_NAMES[*day]);
    let best_day = name_of(weekday_avgs.iter().min_by(|a, b| a.1.total_cmp(&b.1)));
    let worst_day = name_of(weekday_avgs.iter().max_by(|a, b| a.1.total_cmp(&b.1)));

    Some(ConsumptionProfile {
        key: definition.key,
        name: definition.name,
        description: definition.description,
        hours: definition.hours.to_vec(),
        avg_price_czk,
        avg_price_eur,
        savings_vs_flat_pct,
        best_day,
        worst_day,
    })
}

/// Average price paid by the profile `key`; `None` for unknown profiles or
/// without data.
pub fn analyze_consumption_profile(
    store: &PriceStore,
    today: NaiveDate,
    key: &str,
    days_back: u32,
) -> Result<Option<ConsumptionProfile>> {
    let Some(definition) = profile_definition(key) else {
        return Ok(None);
    };
    let prices = window_prices(store, today, days_back)?;
    Ok(analyze_profile(definition, &prices))
}

/// All profiles with data, cheapest first.
pub fn all_profiles(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<ConsumptionProfile>> {
    let prices = window_prices(store, today, days_back)?;
    let mut profiles: Vec<ConsumptionProfile> = CONSUMPTION_PROFILES
        .iter()
        .filter_map(|definition| analyze_profile(definition, &prices))
        .collect();
    profiles.sort_by(|a, b| a.avg_price_czk.total_cmp(&b.avg_price_czk));
    Ok(profiles)
}

/// Key of the cheapest profile.
pub fn optimal_profile(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Option<&'static str>> {
    Ok(all_profiles(store, today, days_back)?
        .first()
        .map(|p| p.key))
}

// Volatility

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityMetrics {
    /// Standard deviation of the daily averages.
    pub daily_volatility: f64,
    /// Mean of the per-day standard deviations.
    pub intraday_volatility: f64,
    pub max_daily_swing: f64,
    pub avg_daily_swing: f64,
    /// 95th percentile of interval prices.
    pub var_95: f64,
    pub var_99: f64,
    pub volatility_trend: TrendDirection,
}

impl Default for VolatilityMetrics {
    fn default() -> Self {
        VolatilityMetrics {
            daily_volatility: 0.0,
            intraday_volatility: 0.0,
            max_daily_swing: 0.0,
            avg_daily_swing: 0.0,
            var_95: 0.0,
            var_99: 0.0,
            volatility_trend: TrendDirection::InsufficientData,
        }
    }
}

pub fn volatility_metrics(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<VolatilityMetrics> {
    let prices = window_prices(store, today, days_back)?;

    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for price in &prices {
        by_day
            .entry(price.time_from.date())
            .or_default()
            .push(price.price_czk);
    }
    if by_day.len() < 2 {
        return Ok(VolatilityMetrics::default());
    }

    let daily_avgs: Vec<f64> = by_day.values().filter_map(|v| mean(v)).collect();
    let intraday: Vec<f64> = by_day.values().filter_map(|v| std_dev(v)).collect();
    let swings: Vec<f64> = by_day
        .values()
        .filter_map(|v| {
            let sample = sorted(v.iter().copied());
            Some(sample.last()? - sample.first()?)
        })
        .collect();
    let sample = sorted(prices.iter().map(|p| p.price_czk));

    let volatility_trend = if intraday.len() >= 4 {
        let (older, newer) = intraday.split_at(intraday.len() / 2);
        match (mean(older), mean(newer)) {
            (Some(older), Some(newer)) => change_pct(newer, older)
                .map_or(TrendDirection::Stable, |c| TrendDirection::from_change(c, 10.0)),
            _ => TrendDirection::InsufficientData,
        }
    } else {
        TrendDirection::InsufficientData
    };

    Ok(VolatilityMetrics {
        daily_volatility: std_dev(&daily_avgs).unwrap_or(0.0),
        intraday_volatility: mean(&intraday).unwrap_or(0.0),
        max_daily_swing: swings.iter().copied().fold(0.0, f64::max),
        avg_daily_swing: mean(&swings).unwrap_or(0.0),
        var_95: percentile(&sample, 0.95).unwrap_or(0.0),
        var_99: percentile(&sample, 0.99).unwrap_or(0.0),
        volatility_trend,
    })
}

// Peaks

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeakAnalysis {
    pub threshold_p90: f64,
    pub total_peaks: usize,
    pub peak_hours_distribution: BTreeMap<u32, usize>,
    /// Up to three hours with the most peaks, riskiest first.
    pub most_risky_hours: Vec<u32>,
    pub avg_peak_price: f64,
    pub max_peak_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.5 {
            RiskLevel::High
        } else if probability >= 0.2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakPrediction {
    pub hour: u32,
    pub probability: f64,
    pub expected_price: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub historical_peak_count: usize,
    pub risk_level: RiskLevel,
}

/// Interval prices of the window grouped by hour of day, plus the P90
/// threshold above which a price counts as a peak.
struct PeakWindow {
    threshold: Option<f64>,
    by_hour: BTreeMap<u32, Vec<f64>>,
}

impl PeakWindow {
    fn load(store: &PriceStore, today: NaiveDate, days_back: u32) -> Result<Self> {
        let prices = window_prices(store, today, days_back)?;
        let sample = sorted(prices.iter().map(|p| p.price_czk));
        let threshold = if sample.len() >= MIN_SAMPLES {
            percentile(&sample, 0.90)
        } else {
            None
        };

        let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for price in &prices {
            by_hour
                .entry(price.time_from.hour())
                .or_default()
                .push(price.price_czk);
        }
        Ok(PeakWindow { threshold, by_hour })
    }

    fn peaks_in(&self, hour: u32) -> usize {
        match (self.threshold, self.by_hour.get(&hour)) {
            (Some(threshold), Some(values)) => values.iter().filter(|&&p| p > threshold).count(),
            _ => 0,
        }
    }

    fn probability(&self, hour: u32) -> f64 {
        match self.by_hour.get(&hour) {
            Some(values) if !values.is_empty() => self.peaks_in(hour) as f64 / values.len() as f64,
            _ => 0.0,
        }
    }
}

pub fn peak_analysis(store: &PriceStore, today: NaiveDate, days_back: u32) -> Result<PeakAnalysis> {
    let window = PeakWindow::load(store, today, days_back)?;
    let Some(threshold) = window.threshold else {
        return Ok(PeakAnalysis::default());
    };

    let peaks: Vec<f64> = window
        .by_hour
        .values()
        .flatten()
        .copied()
        .filter(|&p| p > threshold)
        .collect();
    let peak_hours_distribution: BTreeMap<u32, usize> = (0..24)
        .map(|hour| (hour, window.peaks_in(hour)))
        .filter(|(_, count)| *count > 0)
        .collect();

    let mut ranked: Vec<(u32, usize)> = peak_hours_distribution
        .iter()
        .map(|(hour, count)| (*hour, *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    Ok(PeakAnalysis {
        threshold_p90: threshold,
        total_peaks: peaks.len(),
        peak_hours_distribution,
        most_risky_hours: ranked.into_iter().take(3).map(|(hour, _)| hour).collect(),
        avg_peak_price: mean(&peaks).unwrap_or(0.0),
        max_peak_price: peaks.iter().copied().reduce(f64::max).unwrap_or(0.0),
    })
}

/// Share of each hour's intervals that were peaks, indexed by hour.
pub fn peak_probability_by_hour(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<[f64; 24]> {
    let window = PeakWindow::load(store, today, days_back)?;
    let mut probabilities = [0.0; 24];
    for (hour, slot) in (0u32..).zip(probabilities.iter_mut()) {
        *slot = window.probability(hour);
    }
    Ok(probabilities)
}

/// Peak risk for each hour of tomorrow from the historical peak frequency.
pub fn predict_peaks_tomorrow(
    store: &PriceStore,
    today: NaiveDate,
    days_back: u32,
) -> Result<Vec<PeakPrediction>> {
    let window = PeakWindow::load(store, today, days_back)?;
    Ok((0..24)
        .map(|hour| {
            let values = window.by_hour.get(&hour).map(Vec::as_slice).unwrap_or(&[]);
            let expected_price = mean(values).unwrap_or(0.0);
            let spread = 1.96 * std_dev(values).unwrap_or(0.0);
            let probability = window.probability(hour);
            PeakPrediction {
                hour,
                probability,
                expected_price,
                confidence_low: expected_price - spread,
                confidence_high: expected_price + spread,
                historical_peak_count: window.peaks_in(hour),
                risk_level: RiskLevel::from_probability(probability),
            }
        })
        .collect())
}

/// Whether `price` exceeds the P90 of the window. Always false without
/// enough history.
pub fn is_price_peak(
    store: &PriceStore,
    today: NaiveDate,
    price: f64,
    days_back: u32,
) -> Result<bool> {
    let sample = window_sample(store, today, days_back)?;
    if sample.len() < MIN_SAMPLES {
        return Ok(false);
    }
    Ok(stats::percentile(&sample, 0.90).is_some_and(|threshold| price > threshold))
}
