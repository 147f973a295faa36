use super::spot::{build_price_table, print_day_summary};
use super::ui;
use crate::core::price::DayPrices;
use crate::core::stats::change_pct;
use crate::store::{DailyStats, PriceStore};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};

/// Prints the stored prices of `date`, or an overview of every stored day.
pub fn run(store: &PriceStore, date: Option<NaiveDate>) -> Result<()> {
    match date {
        Some(date) => show_day(store, date),
        None => show_overview(store),
    }
}

fn show_day(store: &PriceStore, date: NaiveDate) -> Result<()> {
    let prices = store.prices_for_date(date)?;
    let Some(stats) = store.daily_stats(date)? else {
        println!(
            "{}",
            ui::style_text(
                &format!("No stored data for {date}"),
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    };

    let day = DayPrices {
        date,
        eur_czk_rate: stats.eur_czk_rate,
        prices,
    };
    println!(
        "\n{}",
        ui::style_text(
            &format!("Stored spot prices for {}", date.format("%d.%m.%Y")),
            ui::StyleType::Title
        )
    );
    println!(
        "{} {:.3} CZK/EUR",
        ui::style_text("ČNB rate:", ui::StyleType::TotalLabel),
        day.eur_czk_rate
    );
    println!("{}", build_price_table(&day, None));
    print_day_summary(&day);
    Ok(())
}

fn show_overview(store: &PriceStore) -> Result<()> {
    let dates = store.available_dates()?;
    if dates.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "No stored data yet, run `ote save` first",
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }

    let mut days = Vec::with_capacity(dates.len());
    for date in dates {
        if let Some(stats) = store.daily_stats(date)? {
            days.push((date, stats));
        }
    }

    println!("\n{}", ui::style_text("Stored days", ui::StyleType::Title));
    println!("{}", build_overview_table(&days));
    ui::print_separator();
    println!(
        "{} {}",
        ui::style_text("Days stored:", ui::StyleType::TotalLabel),
        ui::style_text(&days.len().to_string(), ui::StyleType::TotalValue)
    );
    Ok(())
}

/// `days` newest first; the change column compares each day's average with
/// the previous stored day.
fn build_overview_table(days: &[(NaiveDate, DailyStats)]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Intervals"),
        ui::header_cell("Min CZK"),
        ui::header_cell("Max CZK"),
        ui::header_cell("Avg CZK"),
        ui::header_cell("Change"),
        ui::header_cell("CZK/EUR"),
    ]);

    for (i, (date, stats)) in days.iter().enumerate() {
        let change = days
            .get(i + 1)
            .and_then(|(_, previous)| change_pct(stats.avg, previous.avg));
        table.add_row(vec![
            Cell::new(date.format("%Y-%m-%d (%a)")),
            Cell::new(stats.count).set_alignment(CellAlignment::Right),
            ui::price_cell(stats.min, Some(stats.avg)),
            ui::price_cell(stats.max, Some(stats.avg)),
            ui::format_optional_cell(Some(stats.avg), ui::format_price),
            change.map_or(ui::na_cell(), ui::change_cell),
            Cell::new(format!("{:.3}", stats.eur_czk_rate)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::day_prices;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_overview_table_shows_change_against_previous_day() {
        let store = PriceStore::open_in_memory().unwrap();
        store.save_prices(date(14), &day_prices(date(14), |_| 100.0), 25.0).unwrap();
        store.save_prices(date(15), &day_prices(date(15), |_| 110.0), 25.0).unwrap();

        let days: Vec<_> = store
            .available_dates()
            .unwrap()
            .into_iter()
            .map(|d| (d, store.daily_stats(d).unwrap().unwrap()))
            .collect();
        let table = build_overview_table(&days).to_string();

        assert!(table.contains("2025-10-15"));
        assert!(table.contains("+10.00%"));
        assert!(table.contains("N/A"));
        assert!(table.contains("96"));
    }

    #[test]
    fn test_run_handles_empty_store_and_missing_day() {
        let store = PriceStore::open_in_memory().unwrap();
        assert!(run(&store, None).is_ok());
        assert!(run(&store, Some(date(15))).is_ok());
    }

    #[test]
    fn test_run_shows_stored_day() {
        let store = PriceStore::open_in_memory().unwrap();
        store.save_prices(date(15), &day_prices(date(15), f64::from), 25.0).unwrap();
        assert!(run(&store, Some(date(15))).is_ok());
        assert!(run(&store, None).is_ok());
    }
}
