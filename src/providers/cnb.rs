use crate::core::cache::Cache;
use crate::core::config::HttpConfig;
use crate::core::currency::CurrencyRateProvider;
use crate::core::price::prague_today;
use crate::providers::util::{get_with_retry, http_client};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const DAILY_FIXING_PATH: &str = "/en/financial-markets/foreign-exchange-market/central-bank-exchange-rate-fixing/central-bank-exchange-rate-fixing/daily.txt";

const TODAY_FIXING_TTL: Duration = Duration::from_secs(60 * 60);

/// CZK per one unit of each currency, keyed by ISO code.
type FixingTable = HashMap<String, f64>;

/// Parses the ČNB `daily.txt` fixing.
///
/// ```text
/// 17.10.2025 #202
/// Country|Currency|Amount|Code|Rate
/// EMU|euro|1|EUR|24.325
/// Japan|yen|100|JPY|16.012
/// ```
fn parse_fixing(text: &str) -> Result<FixingTable> {
    let mut table = FixingTable::new();
    for line in text.lines().skip(2) {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        let [_, _, amount, code, rate] = fields.as_slice() else {
            continue;
        };
        let amount: f64 = amount
            .parse()
            .with_context(|| format!("Invalid amount in CNB row: {line}"))?;
        let rate: f64 = rate
            .replace(',', ".")
            .parse()
            .with_context(|| format!("Invalid rate in CNB row: {line}"))?;
        if amount <= 0.0 {
            bail!("Invalid amount in CNB row: {line}");
        }
        table.insert(code.to_uppercase(), rate / amount);
    }

    if table.is_empty() {
        bail!("CNB fixing contains no exchange rates");
    }
    table.insert("CZK".to_string(), 1.0);
    Ok(table)
}

fn czk_per_unit(table: &FixingTable, code: &str, date: NaiveDate) -> Result<f64> {
    table
        .get(code)
        .copied()
        .ok_or_else(|| anyhow!("Currency {} not found in CNB fixing for {}", code, date))
}

/// Exchange rates from the Czech National Bank daily fixing.
pub struct CnbRateProvider {
    base_url: String,
    http: HttpConfig,
    client: reqwest::Client,
    cache: Cache<NaiveDate, FixingTable>,
}

impl CnbRateProvider {
    pub fn new(base_url: &str, http: HttpConfig) -> Result<Self> {
        Ok(CnbRateProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(&http)?,
            http,
            cache: Cache::new(),
        })
    }

    #[instrument(name = "CnbFixingFetch", skip(self), fields(date = %date))]
    async fn fixing(&self, date: NaiveDate) -> Result<FixingTable> {
        if let Some(cached) = self.cache.get(&date).await {
            return Ok(cached);
        }

        let url = format!("{}{}", self.base_url, DAILY_FIXING_PATH);
        debug!("Requesting exchange rate fixing from {}", url);

        let query = [("date", date.format("%d.%m.%Y").to_string())];
        let response = get_with_retry(&self.client, &url, &query, &self.http)
            .await
            .with_context(|| format!("Failed to fetch CNB exchange rates for {date}"))?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read CNB response for {date}"))?;

        let table = parse_fixing(&text)
            .with_context(|| format!("Failed to parse CNB exchange rates for {date}"))?;
        // Today's fixing is published in the afternoon; until then the
        // previous one is served
        let ttl = (date >= prague_today()).then_some(TODAY_FIXING_TTL);
        self.cache.put(date, table.clone(), ttl).await;
        Ok(table)
    }
}

#[async_trait]
impl CurrencyRateProvider for CnbRateProvider {
    async fn get_rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<f64> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if from == to {
            return Ok(1.0);
        }

        let table = self.fixing(date).await?;
        let rate = czk_per_unit(&table, &from, date)? / czk_per_unit(&table, &to, date)?;
        debug!("Rate {}/{} on {}: {}", from, to, date, rate);
        Ok(rate)
    }
}
