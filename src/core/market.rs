//! Combines the spot price feed with the exchange rate into CZK prices

use crate::core::currency::CurrencyRateProvider;
use crate::core::price::{DayPrices, SpotPrice, SpotPriceProvider};
use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

/// Fetches the EUR quotes and the EUR/CZK fixing for `date` concurrently and
/// converts every quote to CZK.
///
/// An unpublished day yields an empty `DayPrices` rather than an error.
pub async fn fetch_day_prices(
    spot: &dyn SpotPriceProvider,
    rates: &dyn CurrencyRateProvider,
    date: NaiveDate,
) -> Result<DayPrices> {
    let (quotes, eur_czk_rate) =
        futures::try_join!(spot.fetch_day(date), rates.get_rate("EUR", "CZK", date))?;
    debug!(
        "Converting {} quotes for {} at {} CZK/EUR",
        quotes.len(),
        date,
        eur_czk_rate
    );

    let prices = quotes
        .into_iter()
        .map(|quote| SpotPrice::from_quote(date, quote, eur_czk_rate))
        .collect::<Result<Vec<_>>>()?;

    Ok(DayPrices {
        date,
        eur_czk_rate,
        prices,
    })
}
