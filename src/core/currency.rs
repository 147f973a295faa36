//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Units of `to` for one unit of `from`, as fixed on `date` or the last
    /// business day before it.
    async fn get_rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<f64>;
}
