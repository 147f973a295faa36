use super::ui;
use crate::core::market::fetch_day_prices;
use crate::core::{CurrencyRateProvider, SpotPriceProvider};
use crate::store::PriceStore;
use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

/// Fetches the prices of `date` and upserts them into `store`.
/// Returns the number of stored rows, zero when the day is not published.
pub async fn run(
    spot: &dyn SpotPriceProvider,
    rates: &dyn CurrencyRateProvider,
    store: &PriceStore,
    date: NaiveDate,
) -> Result<usize> {
    let pb = ui::new_spinner(format!("Fetching spot prices for {date}"))?;
    let result = fetch_day_prices(spot, rates, date).await;
    pb.finish_and_clear();
    let day = result?;

    if day.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("No data available for {date}, nothing saved"),
                ui::StyleType::Subtle
            )
        );
        return Ok(0);
    }

    let saved = store.save_prices(date, &day.prices, day.eur_czk_rate)?;
    info!(%date, saved, "Stored spot prices");
    println!(
        "{} {} intervals for {}",
        ui::style_text("Saved", ui::StyleType::TotalLabel),
        ui::style_text(&saved.to_string(), ui::StyleType::TotalValue),
        date.format("%d.%m.%Y")
    );
    println!(
        "{} {:.3} CZK/EUR",
        ui::style_text("ČNB rate:", ui::StyleType::TotalLabel),
        day.eur_czk_rate
    );
    Ok(saved)
}
