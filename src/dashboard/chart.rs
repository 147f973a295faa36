//! SVG charts rendered server side with plotters

use crate::core::price::SpotPrice;
use anyhow::Result;
use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use std::ops::Range;

const WIDTH: u32 = 960;
const HEIGHT: u32 = 360;

pub const BLUE: RGBColor = RGBColor(33, 150, 243);
pub const GREEN: RGBColor = RGBColor(40, 167, 69);
pub const AMBER: RGBColor = RGBColor(255, 193, 7);
pub const RED: RGBColor = RGBColor(220, 53, 69);
pub const GREY: RGBColor = RGBColor(108, 117, 125);
pub const PURPLE: RGBColor = RGBColor(111, 66, 193);
const HIGHLIGHT: RGBColor = RGBColor(33, 37, 41);

pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: RGBColor,
}

pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub color: RGBColor,
}

/// Shaded range drawn behind the line series.
pub struct Band {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

/// Bar color of a price relative to the average of the shown period.
pub fn price_color(price: f64, average: Option<f64>) -> RGBColor {
    if price <= 0.0 {
        return BLUE;
    }
    match average {
        Some(avg) if price < avg * 0.9 => GREEN,
        Some(avg) if price > avg * 1.1 => RED,
        _ => AMBER,
    }
}

/// Padded y range that always contains zero.
fn y_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = (max - min).max(1.0) * 0.1;
    let low = if min < 0.0 { min - pad } else { 0.0 };
    low..max + pad
}

/// Bar chart with one category per bar. `highlight` draws that bar dark.
pub fn bar_chart_svg(
    caption: &str,
    y_desc: &str,
    bars: &[Bar],
    highlight: Option<usize>,
) -> Result<String> {
    let mut svg = String::new();
    if bars.is_empty() {
        return Ok(svg);
    }

    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let count = bars.len() as u32;
        let label_step = (bars.len() / 12).max(1);
        let mut chart = ChartBuilder::on(&root)
            .caption(caption, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(60)
            .build_cartesian_2d(
                (0u32..count).into_segmented(),
                y_range(bars.iter().map(|b| b.value)),
            )?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(bars.len().min(24))
            .x_label_formatter(&|value| match value {
                SegmentValue::CenterOf(i) if (*i as usize) % label_step == 0 => bars
                    .get(*i as usize)
                    .map(|b| b.label.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .y_desc(y_desc)
            .label_style(("sans-serif", 11))
            .draw()?;

        chart.draw_series(bars.iter().zip(0u32..).map(|(bar, i)| {
            let color = if highlight == Some(i as usize) {
                HIGHLIGHT
            } else {
                bar.color
            };
            let mut rect = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), bar.value),
                ],
                color.filled(),
            );
            rect.set_margin(0, 0, 1, 1);
            rect
        }))?;

        root.present()?;
    }

    Ok(svg)
}

/// Line chart over categorical x labels with an optional shaded band.
pub fn line_chart_svg(
    caption: &str,
    y_desc: &str,
    labels: &[String],
    series: &[Series],
    band: Option<&Band>,
) -> Result<String> {
    let mut svg = String::new();
    if labels.is_empty() {
        return Ok(svg);
    }

    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let all_values = series
            .iter()
            .flat_map(|s| s.values.iter().flatten().copied())
            .chain(band.into_iter().flat_map(|b| b.low.iter().chain(&b.high).copied()));
        let x_max = (labels.len().saturating_sub(1)).max(1) as f64;
        let mut chart = ChartBuilder::on(&root)
            .caption(caption, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max, y_range(all_values))?;

        chart
            .configure_mesh()
            .x_labels(labels.len().min(12))
            .x_label_formatter(&|x| {
                if x.fract().abs() > f64::EPSILON {
                    return String::new();
                }
                labels.get(*x as usize).cloned().unwrap_or_default()
            })
            .y_desc(y_desc)
            .label_style(("sans-serif", 11))
            .draw()?;

        if let Some(band) = band {
            let upper = band.high.iter().enumerate().map(|(i, v)| (i as f64, *v));
            let lower = band.low.iter().enumerate().rev().map(|(i, v)| (i as f64, *v));
            chart.draw_series(std::iter::once(Polygon::new(
                upper.chain(lower).collect::<Vec<_>>(),
                BLUE.mix(0.15).filled(),
            )))?;
        }

        for line in series {
            let color = line.color;
            chart
                .draw_series(LineSeries::new(
                    line.values
                        .iter()
                        .enumerate()
                        .filter_map(|(i, v)| v.map(|v| (i as f64, v))),
                    color.stroke_width(2),
                ))?
                .label(line.name.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        if series.len() > 1 {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&GREY)
                .label_font(("sans-serif", 12))
                .draw()?;
        }

        root.present()?;
    }

    Ok(svg)
}

/// Interval prices of one day; bars colored against the day's average.
pub fn price_chart_svg(
    caption: &str,
    prices: &[SpotPrice],
    current_period: Option<u32>,
) -> Result<String> {
    let average = if prices.is_empty() {
        None
    } else {
        Some(prices.iter().map(|p| p.price_czk).sum::<f64>() / prices.len() as f64)
    };
    let bars: Vec<Bar> = prices
        .iter()
        .map(|p| Bar {
            label: p.time_from.format("%H:%M").to_string(),
            value: p.price_czk,
            color: price_color(p.price_czk, average),
        })
        .collect();
    let highlight = current_period.and_then(|period| prices.iter().position(|p| p.period == period));
    bar_chart_svg(caption, "CZK/MWh", &bars, highlight)
}

/// One bar per hour of day.
pub fn hourly_chart_svg(caption: &str, hourly: &[(u32, f64)]) -> Result<String> {
    let average = if hourly.is_empty() {
        None
    } else {
        Some(hourly.iter().map(|(_, v)| v).sum::<f64>() / hourly.len() as f64)
    };
    let bars: Vec<Bar> = hourly
        .iter()
        .map(|(hour, value)| Bar {
            label: format!("{hour:02}"),
            value: *value,
            color: price_color(*value, average),
        })
        .collect();
    bar_chart_svg(caption, "CZK/MWh", &bars, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::day_prices;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_chart_is_empty_string() {
        assert!(bar_chart_svg("Empty", "CZK", &[], None).unwrap().is_empty());
        assert!(line_chart_svg("Empty", "CZK", &[], &[], None).unwrap().is_empty());
    }

    #[test]
    fn test_price_chart_renders_svg() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let prices = day_prices(date, |hour| f64::from(hour) - 5.0);
        let svg = price_chart_svg("Prices", &prices, Some(10)).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Prices"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn test_line_chart_with_band_and_legend() {
        let labels: Vec<String> = (1..=5).map(|d| format!("10-{d:02}")).collect();
        let series = vec![
            Series {
                name: "daily".to_string(),
                values: vec![Some(1.0), Some(2.0), Some(3.0), Some(2.0), Some(1.0)],
                color: BLUE,
            },
            Series {
                name: "ma".to_string(),
                values: vec![None, None, Some(2.0), Some(2.3), Some(2.0)],
                color: RED,
            },
        ];
        let band = Band {
            low: vec![0.5; 5],
            high: vec![3.5; 5],
        };
        let svg = line_chart_svg("Trend", "CZK", &labels, &series, Some(&band)).unwrap();
        assert!(svg.contains("<polygon") || svg.contains("<path"));
        assert!(svg.contains("daily"));
    }

    #[test]
    fn test_price_color() {
        assert_eq!(price_color(-1.0, Some(100.0)), BLUE);
        assert_eq!(price_color(50.0, Some(100.0)), GREEN);
        assert_eq!(price_color(100.0, Some(100.0)), AMBER);
        assert_eq!(price_color(150.0, Some(100.0)), RED);
    }
}
