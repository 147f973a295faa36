use crate::core::cache::Cache;
use crate::core::config::HttpConfig;
use crate::core::price::{EurQuote, SpotPriceProvider};
use crate::providers::util::{get_with_retry, http_client, lenient_f64};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const CHART_DATA_PATH: &str = "/en/short-term-markets/electricity/day-ahead-market/@@chart-data";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    data: Option<ChartData>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(rename = "dataLine", default)]
    data_line: Vec<DataLine>,
}

#[derive(Debug, Deserialize)]
struct DataLine {
    #[serde(default)]
    title: String,
    #[serde(default)]
    point: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    #[serde(deserialize_with = "lenient_f64", default)]
    x: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", default)]
    y: Option<f64>,
}

impl DataLine {
    fn is_quarter_hour_price(&self) -> bool {
        let title = self.title.to_lowercase();
        title.contains("price") && title.contains("15min")
    }
}

/// Extracts the 15-minute price series from an OTE chart-data response.
fn parse_quotes(response: ChartResponse) -> Vec<EurQuote> {
    let Some(line) = response
        .data
        .into_iter()
        .flat_map(|data| data.data_line)
        .find(DataLine::is_quarter_hour_price)
    else {
        return Vec::new();
    };

    let mut quotes: Vec<EurQuote> = line
        .point
        .into_iter()
        .filter_map(|point| match (point.x, point.y) {
            (Some(x), Some(y)) if x >= 1.0 => Some(EurQuote {
                period: x as u32,
                price_eur: y,
            }),
            _ => {
                warn!("Skipping malformed OTE point: {:?}", point);
                None
            }
        })
        .collect();
    quotes.sort_by_key(|q| q.period);
    quotes
}

/// Day-ahead market prices from the OTE chart-data endpoint.
pub struct OteProvider {
    base_url: String,
    http: HttpConfig,
    client: reqwest::Client,
    cache: Cache<NaiveDate, Vec<EurQuote>>,
}

impl OteProvider {
    pub fn new(base_url: &str, http: HttpConfig) -> Result<Self> {
        Ok(OteProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(&http)?,
            http,
            cache: Cache::new(),
        })
    }
}

#[async_trait]
impl SpotPriceProvider for OteProvider {
    #[instrument(name = "OtePriceFetch", skip(self), fields(date = %date))]
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EurQuote>> {
        if let Some(cached) = self.cache.get(&date).await {
            return Ok(cached);
        }

        let url = format!("{}{}", self.base_url, CHART_DATA_PATH);
        debug!("Requesting day-ahead prices from {}", url);

        let query = [("report_date", date.format("%Y-%m-%d").to_string())];
        let response = get_with_retry(&self.client, &url, &query, &self.http)
            .await
            .with_context(|| format!("Failed to fetch OTE prices for {date}"))?;

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read OTE response for {date}"))?;
        let chart: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse OTE response for {}: {}", date, e))?;

        let quotes = parse_quotes(chart);
        debug!("Received {} quotes for {}", quotes.len(), date);

        // Published day-ahead prices are final; empty days may still be published later
        if !quotes.is_empty() {
            self.cache.put(date, quotes.clone(), None).await;
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_retries() -> HttpConfig {
        HttpConfig {
            retries: 0,
            retry_delay_ms: 1,
            timeout_secs: 5,
        }
    }

    async fn create_mock_server(report_date: &str, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CHART_DATA_PATH))
            .and(query_param("report_date", report_date))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_day_picks_quarter_hour_price_line() {
        let body = r#"{
            "data": {
                "dataLine": [
                    {"title": "15min volume (MWh)", "point": [{"x": "1", "y": 3000.5}]},
                    {"title": "60min price (EUR/MWh)", "point": [{"x": "1", "y": 1.0}]},
                    {"title": "15min price (EUR/MWh)", "point": [
                        {"x": "2", "y": 95.5},
                        {"x": 1, "y": "101.2"},
                        {"x": "3", "y": -4.1}
                    ]}
                ]
            }
        }"#;
        let server = create_mock_server("2025-10-15", body).await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        let quotes = provider.fetch_day(date()).await.unwrap();
        assert_eq!(
            quotes,
            vec![
                EurQuote { period: 1, price_eur: 101.2 },
                EurQuote { period: 2, price_eur: 95.5 },
                EurQuote { period: 3, price_eur: -4.1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_day_without_price_line_is_empty() {
        let body = r#"{"data": {"dataLine": [{"title": "15min volume (MWh)", "point": []}]}}"#;
        let server = create_mock_server("2025-10-15", body).await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        assert!(provider.fetch_day(date()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_day_skips_null_points() {
        let body = r#"{"data": {"dataLine": [{"title": "15min Price", "point": [
            {"x": "1", "y": null}, {"x": "2", "y": 80.0}
        ]}]}}"#;
        let server = create_mock_server("2025-10-15", body).await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        let quotes = provider.fetch_day(date()).await.unwrap();
        assert_eq!(quotes, vec![EurQuote { period: 2, price_eur: 80.0 }]);
    }

    #[tokio::test]
    async fn test_fetch_day_malformed_json() {
        let server = create_mock_server("2025-10-15", "<html>maintenance</html>").await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        let err = provider.fetch_day(date()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse OTE response"));
    }

    #[tokio::test]
    async fn test_fetch_day_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        let err = provider.fetch_day(date()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch OTE prices"));
    }

    #[tokio::test]
    async fn test_fetch_day_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CHART_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": {"dataLine": [{"title": "15min price", "point": [{"x": 1, "y": 10}]}]}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        let provider = OteProvider::new(&server.uri(), no_retries()).unwrap();

        let first = provider.fetch_day(date()).await.unwrap();
        let second = provider.fetch_day(date()).await.unwrap();
        assert_eq!(first, second);
    }
}
