//! Page templates and the code that fills them from the store and providers

use super::DashboardState;
use super::chart::{self, AMBER, BLUE, Band, GREEN, PURPLE, RED, Series};
use crate::core::analysis::{self, PriceLevel, WEEKDAY_NAMES};
use crate::core::forecast::{self, PriceForecast};
use crate::core::market::fetch_day_prices;
use crate::core::price::{SpotPrice, current_price};
use crate::core::weather::{self, WeatherForecast};
use anyhow::Result;
use askama::Template;
use chrono::{DateTime, Duration, NaiveDate, Timelike};
use chrono_tz::Tz;
use tracing::warn;

/// Window used by the analysis pages unless `?days=` says otherwise.
pub const DEFAULT_DAYS_BACK: u32 = 30;
const MAX_DAYS_BACK: u32 = 365;
const FORECAST_DAYS: u32 = 7;

fn czk(value: f64) -> String {
    format!("{value:.2}")
}

fn optional_czk(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), czk)
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:+.1} %"))
}

fn hours_list(hours: &[u32]) -> String {
    if hours.is_empty() {
        return "none".to_string();
    }
    hours
        .iter()
        .map(|h| format!("{h:02}:00"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Chart markup, or an empty string when rendering failed.
fn svg_or_empty(result: Result<String>) -> String {
    result.unwrap_or_else(|e| {
        warn!("Chart rendering failed: {:#}", e);
        String::new()
    })
}

pub fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid date '{v}', expected YYYY-MM-DD")),
        None => Ok(None),
    }
}

pub fn parse_days_back(value: Option<&str>) -> Result<u32> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => {
            let days: u32 = v
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid number of days '{v}'"))?;
            Ok(days.clamp(1, MAX_DAYS_BACK))
        }
        None => Ok(DEFAULT_DAYS_BACK),
    }
}

pub struct PriceRow {
    pub time_range: String,
    pub price_eur: String,
    pub price_czk: String,
    pub color: &'static str,
    pub is_current: bool,
}

fn row_color(price: f64, average: Option<f64>) -> &'static str {
    let color = chart::price_color(price, average);
    if color == BLUE {
        "#2196f3"
    } else if color == GREEN {
        "#28a745"
    } else if color == RED {
        "#dc3545"
    } else {
        "#ffc107"
    }
}

fn price_rows(prices: &[SpotPrice], current_period: Option<u32>) -> Vec<PriceRow> {
    let average = if prices.is_empty() {
        None
    } else {
        Some(prices.iter().map(|p| p.price_czk).sum::<f64>() / prices.len() as f64)
    };
    prices
        .iter()
        .map(|p| PriceRow {
            time_range: p.time_range(),
            price_eur: czk(p.price_eur),
            price_czk: czk(p.price_czk),
            color: row_color(p.price_czk, average),
            is_current: current_period == Some(p.period),
        })
        .collect()
}

pub struct LevelView {
    pub label: &'static str,
    pub color: &'static str,
}

impl From<PriceLevel> for LevelView {
    fn from(level: PriceLevel) -> Self {
        LevelView {
            label: level.label(),
            color: level.color(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub active: &'static str,
    pub message: String,
}

// Live prices

pub struct CurrentView {
    pub time_range: String,
    pub price_czk: String,
    pub price_eur: String,
    pub level: LevelView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub active: &'static str,
    pub date: String,
    pub date_label: String,
    pub prev_date: String,
    pub next_date: String,
    pub has_data: bool,
    pub rate: String,
    pub current: Option<CurrentView>,
    pub min: String,
    pub max: String,
    pub avg: String,
    pub chart_svg: String,
    pub rows: Vec<PriceRow>,
}

pub async fn index_page(
    state: &DashboardState,
    date: Option<NaiveDate>,
    now: DateTime<Tz>,
) -> Result<IndexTemplate> {
    let today = now.date_naive();
    let date = date.unwrap_or(today);
    let day = fetch_day_prices(state.spot.as_ref(), state.rates.as_ref(), date).await?;

    let current = if date == today {
        current_price(&day.prices, now)
    } else {
        None
    };
    let current_view = match current {
        Some(price) => Some(CurrentView {
            time_range: price.time_range(),
            price_czk: czk(price.price_czk),
            price_eur: czk(price.price_eur),
            level: analysis::classify_price(&state.store, today, price.price_czk, DEFAULT_DAYS_BACK)?
                .into(),
        }),
        None => None,
    };
    let current_period = current.map(|p| p.period);

    Ok(IndexTemplate {
        active: "index",
        date: date.to_string(),
        date_label: date.format("%A %d.%m.%Y").to_string(),
        prev_date: (date - Duration::days(1)).to_string(),
        next_date: (date + Duration::days(1)).to_string(),
        has_data: !day.is_empty(),
        rate: format!("{:.3}", day.eur_czk_rate),
        current: current_view,
        min: optional_czk(day.min_czk()),
        max: optional_czk(day.max_czk()),
        avg: optional_czk(day.average_czk()),
        chart_svg: svg_or_empty(chart::price_chart_svg(
            &format!("Spot prices {}", date.format("%d.%m.%Y")),
            &day.prices,
            current_period,
        )),
        rows: price_rows(&day.prices, current_period),
    })
}

// History

pub struct DayView {
    pub date_label: String,
    pub rate: String,
    pub count: usize,
    pub min: String,
    pub max: String,
    pub avg: String,
    pub chart_svg: String,
    pub rows: Vec<PriceRow>,
}

pub struct DailyRow {
    pub date: String,
    pub avg: String,
    pub min: String,
    pub max: String,
}

pub struct DateOption {
    pub date: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "history.html")]
pub struct HistoryTemplate {
    pub active: &'static str,
    pub dates: Vec<DateOption>,
    pub day: Option<DayView>,
    pub week_chart_svg: String,
    pub week_rows: Vec<DailyRow>,
}

pub fn history_page(
    state: &DashboardState,
    date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<HistoryTemplate> {
    let store = &state.store;
    let dates = store.available_dates()?;
    let selected = date.or_else(|| dates.first().copied());

    let day = match selected {
        Some(date) => match store.daily_stats(date)? {
            Some(stats) => {
                let prices = store.prices_for_date(date)?;
                Some(DayView {
                    date_label: date.format("%A %d.%m.%Y").to_string(),
                    rate: format!("{:.3}", stats.eur_czk_rate),
                    count: stats.count,
                    min: czk(stats.min),
                    max: czk(stats.max),
                    avg: czk(stats.avg),
                    chart_svg: svg_or_empty(chart::price_chart_svg(
                        &format!("Stored prices {}", date.format("%d.%m.%Y")),
                        &prices,
                        None,
                    )),
                    rows: price_rows(&prices, None),
                })
            }
            None => None,
        },
        None => None,
    };

    let week = store.daily_averages(today - Duration::days(6))?;
    let labels: Vec<String> = week.iter().map(|d| d.date.format("%a %d.%m.").to_string()).collect();
    let series = vec![
        Series {
            name: "average".to_string(),
            values: week.iter().map(|d| Some(d.avg_price)).collect(),
            color: BLUE,
        },
        Series {
            name: "minimum".to_string(),
            values: week.iter().map(|d| Some(d.min_price)).collect(),
            color: GREEN,
        },
        Series {
            name: "maximum".to_string(),
            values: week.iter().map(|d| Some(d.max_price)).collect(),
            color: RED,
        },
    ];

    Ok(HistoryTemplate {
        active: "history",
        dates: dates
            .iter()
            .map(|d| DateOption {
                date: d.to_string(),
                selected: selected == Some(*d),
            })
            .collect(),
        day,
        week_chart_svg: svg_or_empty(chart::line_chart_svg(
            "Last 7 days",
            "CZK/MWh",
            &labels,
            &series,
            None,
        )),
        week_rows: week
            .iter()
            .rev()
            .map(|d| DailyRow {
                date: d.date.format("%a %d.%m.%Y").to_string(),
                avg: czk(d.avg_price),
                min: czk(d.min_price),
                max: czk(d.max_price),
            })
            .collect(),
    })
}

// Analysis

pub struct HourPrice {
    pub hour: String,
    pub price: String,
}

fn hour_prices(hours: Vec<(u32, f64)>) -> Vec<HourPrice> {
    hours
        .into_iter()
        .map(|(hour, price)| HourPrice {
            hour: format!("{hour:02}:00 - {hour:02}:59"),
            price: czk(price),
        })
        .collect()
}

pub struct HeatCell {
    pub price: String,
    pub color: String,
}

pub struct HeatmapRow {
    pub weekday: &'static str,
    pub cells: Vec<HeatCell>,
}

/// Green for the cheapest cell through yellow to red for the most expensive.
fn heat_color(value: f64, min: f64, max: f64) -> String {
    let ratio = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let (r, g) = if ratio < 0.5 {
        ((ratio * 2.0 * 255.0) as u8, 200)
    } else {
        (255, ((1.0 - ratio) * 2.0 * 200.0) as u8)
    };
    format!("#{r:02x}{g:02x}50")
}

fn heatmap_rows(cells: &[analysis::HeatmapCell]) -> Vec<HeatmapRow> {
    let min = cells.iter().map(|c| c.avg_price).fold(f64::INFINITY, f64::min);
    let max = cells.iter().map(|c| c.avg_price).fold(f64::NEG_INFINITY, f64::max);
    (0..7u32)
        .map(|weekday| HeatmapRow {
            weekday: WEEKDAY_NAMES[weekday as usize],
            cells: (0..24u32)
                .map(|hour| {
                    match cells.iter().find(|c| c.weekday == weekday && c.hour == hour) {
                        Some(cell) => HeatCell {
                            price: format!("{:.0}", cell.avg_price),
                            color: heat_color(cell.avg_price, min, max),
                        },
                        None => HeatCell {
                            price: String::new(),
                            color: "#f1f3f5".to_string(),
                        },
                    }
                })
                .collect(),
        })
        .collect()
}

pub struct NegativeView {
    pub count: usize,
    pub avg: String,
    pub min: String,
    pub risky_hours: String,
}

pub struct TrendView {
    pub arrow: &'static str,
    pub label: &'static str,
    pub change: String,
    pub current_avg: String,
    pub previous_avg: String,
}

#[derive(Template)]
#[template(path = "analysis.html")]
pub struct AnalysisTemplate {
    pub active: &'static str,
    pub days_back: u32,
    pub current_price: Option<String>,
    pub level: Option<LevelView>,
    pub hourly_chart_svg: String,
    pub best: Vec<HourPrice>,
    pub worst: Vec<HourPrice>,
    pub heatmap: Vec<HeatmapRow>,
    pub hours: Vec<String>,
    pub negative: NegativeView,
    pub distribution_chart_svg: String,
    pub percentiles: Vec<(String, String)>,
    pub moving_avg_chart_svg: String,
    pub trend: TrendView,
}

/// Price of the running interval from the store, falling back to a live fetch.
async fn price_now(state: &DashboardState, now: DateTime<Tz>) -> Option<f64> {
    let today = now.date_naive();
    let stored = match state.store.prices_for_date(today) {
        Ok(prices) => current_price(&prices, now).map(|p| p.price_czk),
        Err(e) => {
            warn!("Could not read today's prices: {:#}", e);
            None
        }
    };
    if stored.is_some() {
        return stored;
    }
    match fetch_day_prices(state.spot.as_ref(), state.rates.as_ref(), today).await {
        Ok(day) => current_price(&day.prices, now).map(|p| p.price_czk),
        Err(e) => {
            warn!("Could not fetch today's prices: {:#}", e);
            None
        }
    }
}

pub async fn analysis_page(
    state: &DashboardState,
    days_back: u32,
    now: DateTime<Tz>,
) -> Result<AnalysisTemplate> {
    let today = now.date_naive();
    let current = price_now(state, now).await;
    let store = &state.store;

    let level = match current {
        Some(price) => Some(analysis::classify_price(store, today, price, days_back)?.into()),
        None => None,
    };

    let patterns = analysis::hourly_patterns(store, today, days_back)?;
    let hourly: Vec<(u32, f64)> = patterns.iter().map(|p| (p.hour, p.avg_price)).collect();

    let negative = analysis::negative_price_stats(store, today, days_back)?;
    let risky = analysis::negative_price_forecast(store, today)?;

    let distribution = analysis::price_distribution(store, today, days_back)?;
    let bars: Vec<chart::Bar> = distribution
        .bins
        .iter()
        .zip(&distribution.counts)
        .map(|(bin, count)| chart::Bar {
            label: bin.clone(),
            value: *count as f64,
            color: PURPLE,
        })
        .collect();

    let averages = analysis::moving_averages(store, today, days_back)?;
    let labels: Vec<String> = averages.iter().map(|d| d.date.format("%d.%m.").to_string()).collect();
    let series = vec![
        Series {
            name: "daily average".to_string(),
            values: averages.iter().map(|d| Some(d.daily_avg)).collect(),
            color: BLUE,
        },
        Series {
            name: "7-day MA".to_string(),
            values: averages.iter().map(|d| d.ma7).collect(),
            color: AMBER,
        },
        Series {
            name: "30-day MA".to_string(),
            values: averages.iter().map(|d| d.ma30).collect(),
            color: RED,
        },
    ];

    let trend = analysis::price_trend(store, today, 7)?;

    Ok(AnalysisTemplate {
        active: "analysis",
        days_back,
        current_price: current.map(czk),
        level,
        hourly_chart_svg: svg_or_empty(chart::hourly_chart_svg(
            &format!("Average price by hour, last {days_back} days"),
            &hourly,
        )),
        best: hour_prices(analysis::best_hours(store, today, 5, days_back)?),
        worst: hour_prices(analysis::worst_hours(store, today, 5, days_back)?),
        heatmap: heatmap_rows(&analysis::weekday_hour_heatmap(store, today, days_back)?),
        hours: (0..24).map(|h| format!("{h:02}")).collect(),
        negative: NegativeView {
            count: negative.count,
            avg: optional_czk(negative.avg_negative_price),
            min: optional_czk(negative.min_price),
            risky_hours: hours_list(&risky),
        },
        distribution_chart_svg: svg_or_empty(chart::bar_chart_svg(
            "Price distribution",
            "intervals",
            &bars,
            None,
        )),
        percentiles: distribution
            .percentiles
            .iter()
            .map(|(name, value)| (name.to_string(), czk(*value)))
            .collect(),
        moving_avg_chart_svg: svg_or_empty(chart::line_chart_svg(
            "Daily average and moving averages",
            "CZK/MWh",
            &labels,
            &series,
            None,
        )),
        trend: TrendView {
            arrow: trend.direction.arrow(),
            label: trend.direction.label(),
            change: percent(trend.change_percent),
            current_avg: optional_czk(trend.current_avg),
            previous_avg: optional_czk(trend.previous_avg),
        },
    })
}

// Profiles, volatility and peaks

pub struct BenchmarkView {
    pub current: String,
    pub avg_7d: String,
    pub avg_30d: String,
    pub percentile_rank: u32,
    pub vs_yesterday: String,
    pub vs_last_week: String,
    pub level: LevelView,
}

pub struct ProfileRow {
    pub name: &'static str,
    pub description: &'static str,
    pub hours: String,
    pub avg_czk: String,
    pub avg_eur: String,
    pub savings: String,
    pub best_day: &'static str,
    pub worst_day: &'static str,
    pub optimal: bool,
}

pub struct VolatilityView {
    pub daily: String,
    pub intraday: String,
    pub max_swing: String,
    pub avg_swing: String,
    pub var_95: String,
    pub var_99: String,
    pub trend: &'static str,
}

pub struct PeakView {
    pub threshold: String,
    pub total: usize,
    pub risky_hours: String,
    pub avg: String,
    pub max: String,
}

pub struct PeakRow {
    pub hour: String,
    pub probability: String,
    pub expected: String,
    pub range: String,
    pub count: usize,
    pub risk: &'static str,
}

#[derive(Template)]
#[template(path = "profiles.html")]
pub struct ProfilesTemplate {
    pub active: &'static str,
    pub days_back: u32,
    pub benchmark: Option<BenchmarkView>,
    pub profiles: Vec<ProfileRow>,
    pub volatility: VolatilityView,
    pub peaks: PeakView,
    pub predictions: Vec<PeakRow>,
}

pub async fn profiles_page(
    state: &DashboardState,
    days_back: u32,
    now: DateTime<Tz>,
) -> Result<ProfilesTemplate> {
    let today = now.date_naive();
    let current = price_now(state, now).await;
    let store = &state.store;

    let benchmark = match current {
        Some(price) => {
            let b = analysis::current_benchmark(store, today, price, days_back)?;
            Some(BenchmarkView {
                current: czk(b.current_price),
                avg_7d: czk(b.avg_7d),
                avg_30d: czk(b.avg_30d),
                percentile_rank: b.percentile_rank,
                vs_yesterday: percent(b.vs_yesterday_pct),
                vs_last_week: percent(b.vs_last_week_pct),
                level: b.classification.into(),
            })
        }
        None => None,
    };

    let optimal = analysis::optimal_profile(store, today, days_back)?;
    let profiles = analysis::all_profiles(store, today, days_back)?
        .into_iter()
        .map(|p| ProfileRow {
            name: p.name,
            description: p.description,
            hours: hours_list(&p.hours),
            avg_czk: czk(p.avg_price_czk),
            avg_eur: czk(p.avg_price_eur),
            savings: percent(Some(p.savings_vs_flat_pct)),
            best_day: p.best_day,
            worst_day: p.worst_day,
            optimal: optimal == Some(p.key),
        })
        .collect();

    let v = analysis::volatility_metrics(store, today, days_back)?;
    let peaks = analysis::peak_analysis(store, today, days_back)?;
    let predictions = analysis::predict_peaks_tomorrow(store, today, days_back)?
        .into_iter()
        .map(|p| PeakRow {
            hour: format!("{:02}:00", p.hour),
            probability: format!("{:.0} %", p.probability * 100.0),
            expected: czk(p.expected_price),
            range: format!("{} to {}", czk(p.confidence_low), czk(p.confidence_high)),
            count: p.historical_peak_count,
            risk: p.risk_level.label(),
        })
        .collect();

    Ok(ProfilesTemplate {
        active: "profiles",
        days_back,
        benchmark,
        profiles,
        volatility: VolatilityView {
            daily: czk(v.daily_volatility),
            intraday: czk(v.intraday_volatility),
            max_swing: czk(v.max_daily_swing),
            avg_swing: czk(v.avg_daily_swing),
            var_95: czk(v.var_95),
            var_99: czk(v.var_99),
            trend: v.volatility_trend.label(),
        },
        peaks: PeakView {
            threshold: czk(peaks.threshold_p90),
            total: peaks.total_peaks,
            risky_hours: hours_list(&peaks.most_risky_hours),
            avg: czk(peaks.avg_peak_price),
            max: czk(peaks.max_peak_price),
        },
        predictions,
    })
}

// Forecast

pub struct TomorrowView {
    pub date_label: String,
    pub min: String,
    pub max: String,
    pub avg: String,
    pub chart_svg: String,
}

pub struct ForecastDayView {
    pub date_label: String,
    pub method: &'static str,
    pub avg: String,
    pub min: String,
    pub max: String,
    pub chart_svg: String,
}

#[derive(Template)]
#[template(path = "forecast.html")]
pub struct ForecastTemplate {
    pub active: &'static str,
    pub tomorrow_label: String,
    pub tomorrow: Option<TomorrowView>,
    pub total_days: usize,
    pub can_show_hourly_patterns: bool,
    pub can_show_statistical_forecast: bool,
    pub days: Vec<ForecastDayView>,
}

/// One value per hour, taken from the first quarter-hour of each hour.
fn hourly_forecast(forecasts: &[PriceForecast]) -> Vec<&PriceForecast> {
    forecasts
        .iter()
        .filter(|f| f.time_from.minute() == 0)
        .collect()
}

fn forecast_day_view(date: NaiveDate, forecasts: &[PriceForecast]) -> Option<ForecastDayView> {
    let first = forecasts.first()?;
    let hourly = hourly_forecast(forecasts);
    let prices: Vec<f64> = hourly.iter().map(|f| f.price_czk).collect();
    let labels: Vec<String> = hourly.iter().map(|f| f.time_from.format("%H").to_string()).collect();
    let band = Band {
        low: hourly.iter().map(|f| f.confidence_low).collect(),
        high: hourly.iter().map(|f| f.confidence_high).collect(),
    };
    let series = vec![Series {
        name: "forecast".to_string(),
        values: prices.iter().copied().map(Some).collect(),
        color: BLUE,
    }];

    Some(ForecastDayView {
        date_label: date.format("%A %d.%m.%Y").to_string(),
        method: first.method.label(),
        avg: optional_czk(crate::core::stats::mean(&prices)),
        min: optional_czk(prices.iter().copied().reduce(f64::min)),
        max: optional_czk(prices.iter().copied().reduce(f64::max)),
        chart_svg: svg_or_empty(chart::line_chart_svg(
            &format!("Forecast {}", date.format("%d.%m.%Y")),
            "CZK/MWh",
            &labels,
            &series,
            Some(&band),
        )),
    })
}

pub async fn forecast_page(state: &DashboardState, today: NaiveDate) -> Result<ForecastTemplate> {
    let tomorrow_date = today + Duration::days(1);
    let tomorrow = forecast::tomorrow_prices(state.spot.as_ref(), state.rates.as_ref(), today)
        .await
        .map(|day| TomorrowView {
            date_label: day.date.format("%A %d.%m.%Y").to_string(),
            min: optional_czk(day.min_czk()),
            max: optional_czk(day.max_czk()),
            avg: optional_czk(day.average_czk()),
            chart_svg: svg_or_empty(chart::price_chart_svg(
                &format!("Day-ahead prices {}", day.date.format("%d.%m.%Y")),
                &day.prices,
                None,
            )),
        });

    let sufficiency = forecast::data_sufficiency(&state.store)?;
    let days = forecast::forecast_for_days(&state.store, today, FORECAST_DAYS)?
        .iter()
        .filter_map(|(date, forecasts)| forecast_day_view(*date, forecasts))
        .collect();

    Ok(ForecastTemplate {
        active: "forecast",
        tomorrow_label: tomorrow_date.format("%A %d.%m.%Y").to_string(),
        tomorrow,
        total_days: sufficiency.total_days,
        can_show_hourly_patterns: sufficiency.can_show_hourly_patterns,
        can_show_statistical_forecast: sufficiency.can_show_statistical_forecast,
        days,
    })
}

// Weather

pub struct WeatherDayView {
    pub date_label: String,
    pub icon: &'static str,
    pub label: &'static str,
    pub temperature: String,
    pub cloud_cover: String,
    pub wind_speed: String,
    pub solar: String,
}

impl From<&WeatherForecast> for WeatherDayView {
    fn from(day: &WeatherForecast) -> Self {
        WeatherDayView {
            date_label: day.date.format("%a %d.%m.").to_string(),
            icon: day.weather_type.icon(),
            label: day.weather_type.label(),
            temperature: format!("{:.1} °C", day.avg_temperature),
            cloud_cover: format!("{:.0} %", day.avg_cloud_cover),
            wind_speed: format!("{:.1} m/s", day.avg_wind_speed),
            solar: format!("{:.1} kWh/m²", day.total_solar_radiation / 1000.0),
        }
    }
}

pub struct CorrelationView {
    pub temperature: String,
    pub cloud_cover: String,
    pub solar_radiation: String,
    pub wind_speed: String,
    pub strongest: &'static str,
    pub r_squared: String,
    pub samples: usize,
}

pub struct PredictionRow {
    pub hour: String,
    pub price: String,
    pub range: String,
    pub adjustment: String,
}

#[derive(Template)]
#[template(path = "weather.html")]
pub struct WeatherTemplate {
    pub active: &'static str,
    pub notices: Vec<String>,
    pub forecast_days: Vec<WeatherDayView>,
    pub correlation: Option<CorrelationView>,
    pub tomorrow_label: String,
    pub prediction_chart_svg: String,
    pub predictions: Vec<PredictionRow>,
}

pub async fn weather_page(state: &DashboardState, today: NaiveDate) -> Result<WeatherTemplate> {
    let mut notices = Vec::new();
    let tomorrow = today + Duration::days(1);

    let forecasts = match weather::weather_forecast(state.weather.as_ref(), FORECAST_DAYS).await {
        Ok(days) => days,
        Err(e) => {
            warn!("Weather forecast failed: {:#}", e);
            notices.push(format!("Weather forecast unavailable: {e}"));
            Vec::new()
        }
    };

    let correlation = match weather::weather_price_correlation(
        &state.store,
        state.weather.as_ref(),
        today,
        DEFAULT_DAYS_BACK,
    )
    .await
    {
        Ok(Some(c)) => Some(CorrelationView {
            temperature: format!("{:+.2}", c.temperature),
            cloud_cover: format!("{:+.2}", c.cloud_cover),
            solar_radiation: format!("{:+.2}", c.solar_radiation),
            wind_speed: format!("{:+.2}", c.wind_speed),
            strongest: c.strongest_factor.label(),
            r_squared: format!("{:.2}", c.r_squared),
            samples: c.sample_count,
        }),
        Ok(None) => {
            notices.push("Not enough stored prices or weather history for a correlation".to_string());
            None
        }
        Err(e) => {
            warn!("Weather correlation failed: {:#}", e);
            notices.push(format!("Weather history unavailable: {e}"));
            None
        }
    };

    let tomorrow_weather = forecasts.iter().find(|f| f.date == tomorrow);
    let predictions =
        weather::forecast_weather_enhanced(&state.store, today, tomorrow, tomorrow_weather)?;
    let labels: Vec<String> = predictions.iter().map(|p| format!("{:02}", p.hour)).collect();
    let band = Band {
        low: predictions.iter().map(|p| p.confidence_low).collect(),
        high: predictions.iter().map(|p| p.confidence_high).collect(),
    };
    let series = vec![Series {
        name: "weather adjusted".to_string(),
        values: predictions.iter().map(|p| Some(p.price_czk)).collect(),
        color: BLUE,
    }];

    Ok(WeatherTemplate {
        active: "weather",
        notices,
        forecast_days: forecasts.iter().map(WeatherDayView::from).collect(),
        correlation,
        tomorrow_label: tomorrow.format("%A %d.%m.%Y").to_string(),
        prediction_chart_svg: svg_or_empty(chart::line_chart_svg(
            "Weather adjusted forecast",
            "CZK/MWh",
            &labels,
            &series,
            Some(&band),
        )),
        predictions: predictions
            .iter()
            .map(|p| PredictionRow {
                hour: format!("{:02}:00", p.hour),
                price: czk(p.price_czk),
                range: format!("{} to {}", czk(p.confidence_low), czk(p.confidence_high)),
                adjustment: format!("{:+.0} %", (p.adjustment - 1.0) * 100.0),
            })
            .collect(),
    })
}
