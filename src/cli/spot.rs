use super::ui;
use crate::core::market::fetch_day_prices;
use crate::core::price::{DayPrices, SpotPrice, current_price};
use crate::core::{CurrencyRateProvider, SpotPriceProvider};
use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Table};

/// Fetches and prints the spot prices of `date`.
///
/// For today only the interval containing `now` is shown unless `show_all` is
/// set. Any other day, or today without a matching interval, prints the full
/// table.
pub async fn run(
    spot: &dyn SpotPriceProvider,
    rates: &dyn CurrencyRateProvider,
    date: NaiveDate,
    show_all: bool,
    now: DateTime<Tz>,
) -> Result<()> {
    let pb = ui::new_spinner(format!("Fetching spot prices for {date}"))?;
    let result = fetch_day_prices(spot, rates, date).await;
    pb.finish_and_clear();
    let day = result?;

    if day.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("No data available for {date}"),
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }

    println!(
        "\n{}",
        ui::style_text(
            &format!("OTE spot prices for {}", date.format("%d.%m.%Y")),
            ui::StyleType::Title
        )
    );
    println!(
        "{} {:.3} CZK/EUR",
        ui::style_text("ČNB rate:", ui::StyleType::TotalLabel),
        day.eur_czk_rate
    );

    if let Some(price) = current_only(&day, show_all, now) {
        print_current(price);
        return Ok(());
    }

    let current = current_price(&day.prices, now).map(|p| p.period);
    println!("{}", build_price_table(&day, current));
    print_day_summary(&day);
    Ok(())
}

/// The interval to print on its own, or `None` when the full table is shown.
fn current_only(day: &DayPrices, show_all: bool, now: DateTime<Tz>) -> Option<&SpotPrice> {
    if show_all || day.date != now.date_naive() {
        return None;
    }
    current_price(&day.prices, now)
}

fn print_current(price: &SpotPrice) {
    println!(
        "{} {}",
        ui::style_text("Current interval:", ui::StyleType::TotalLabel),
        price.time_range()
    );
    println!(
        "{} {} CZK/MWh ({} EUR/MWh)",
        ui::style_text("Price:", ui::StyleType::TotalLabel),
        ui::style_text(&ui::format_price(price.price_czk), ui::StyleType::TotalValue),
        ui::format_price(price.price_eur)
    );
}

/// One row per interval; the row of `current_period` is bold and marked.
pub fn build_price_table(day: &DayPrices, current_period: Option<u32>) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Interval"),
        ui::header_cell("EUR/MWh"),
        ui::header_cell("CZK/MWh"),
    ]);

    let average = day.average_czk();
    for price in &day.prices {
        let is_current = current_period == Some(price.period);
        let mut interval = Cell::new(if is_current {
            format!("▶ {}", price.time_range())
        } else {
            price.time_range()
        });
        let mut czk = ui::price_cell(price.price_czk, average);
        if is_current {
            interval = interval.fg(Color::Yellow).add_attribute(Attribute::Bold);
            czk = czk.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![
            interval,
            ui::format_optional_cell(Some(price.price_eur), ui::format_price),
            czk,
        ]);
    }
    table
}

/// Min, max and average line printed under a day table.
pub fn print_day_summary(day: &DayPrices) {
    let fmt = |v: Option<f64>| v.map_or("N/A".to_string(), ui::format_price);
    println!(
        "{} {}   {} {}   {} {}  CZK/MWh",
        ui::style_text("Min:", ui::StyleType::TotalLabel),
        fmt(day.min_czk()),
        ui::style_text("Max:", ui::StyleType::TotalLabel),
        fmt(day.max_czk()),
        ui::style_text("Avg:", ui::StyleType::TotalLabel),
        ui::style_text(&fmt(day.average_czk()), ui::StyleType::TotalValue),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::test_support::{FixedRate, FixedSpot, quotes};
    use chrono::TimeZone;
    use chrono_tz::Europe::Prague;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    async fn day() -> DayPrices {
        let spot = FixedSpot(Some(quotes(&[80.0, 120.0, -1.0, 100.0])));
        fetch_day_prices(&spot, &FixedRate(25.0), date()).await.unwrap()
    }

    #[tokio::test]
    async fn test_price_table_lists_every_interval() {
        let table = build_price_table(&day().await, None).to_string();
        assert!(table.contains("00:00 - 00:14"));
        assert!(table.contains("00:45 - 00:59"));
        assert!(table.contains("3000.00"));
        assert!(table.contains("-25.00"));
        assert!(!table.contains('▶'));
    }

    #[tokio::test]
    async fn test_price_table_marks_current_interval() {
        let table = build_price_table(&day().await, Some(2)).to_string();
        assert!(table.contains("▶ 00:15 - 00:29"));
    }

    #[tokio::test]
    async fn test_current_only_falls_back_to_table() {
        let day = day().await;
        let during = Prague.with_ymd_and_hms(2025, 10, 15, 0, 20, 0).unwrap();
        assert_eq!(current_only(&day, false, during).map(|p| p.period), Some(2));
        assert!(current_only(&day, true, during).is_none());

        // Only the first hour is published, noon has no interval
        let noon = Prague.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        assert!(current_only(&day, false, noon).is_none());

        let other_day = Prague.with_ymd_and_hms(2025, 10, 16, 0, 20, 0).unwrap();
        assert!(current_only(&day, false, other_day).is_none());
    }

    #[tokio::test]
    async fn test_run_with_unpublished_day_is_ok() {
        let spot = FixedSpot(Some(vec![]));
        let now = Prague.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        assert!(run(&spot, &FixedRate(25.0), date(), false, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_propagates_provider_errors() {
        let spot = FixedSpot(None);
        let now = Prague.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        assert!(run(&spot, &FixedRate(25.0), date(), true, now).await.is_err());
    }
}
