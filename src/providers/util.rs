use crate::core::config::HttpConfig;
use anyhow::{Context, Error, Result};
use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("ote/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by a provider.
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
///
/// Only `reqwest` errors are retried. An HTTP error status is not an error to
/// `reqwest`, so callers that want 5xx/4xx retried go through
/// [`get_with_retry`], which turns them into errors with `error_for_status`.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// GET `url` with `query`, retried per `config`. Non-2xx statuses count as failures.
pub async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    config: &HttpConfig,
) -> Result<reqwest::Response> {
    with_retry(
        || async {
            client
                .get(url)
                .query(query)
                .send()
                .await?
                .error_for_status()
        },
        config.retries,
        config.retry_delay_ms,
    )
    .await
}

/// Accepts a JSON number, a numeric string, or null (as `None`).
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    Ok(
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(NumberOrString::Number(n)) => Some(n),
            Some(NumberOrString::Text(s)) => s.trim().replace(',', ".").parse().ok(),
            None => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retries(retries: usize) -> HttpConfig {
        HttpConfig {
            retries,
            retry_delay_ms: 1,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_get_with_retry_recovers_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let config = fast_retries(1);
        let client = http_client(&config).unwrap();
        let response = get_with_retry(&client, &format!("{}/flaky", server.uri()), &[], &config)
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_get_with_retry_gives_up() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        Mock::given(method("GET"))
            .respond_with(move |_: &wiremock::Request| {
                counter.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(500)
            })
            .mount(&server)
            .await;

        let config = fast_retries(2);
        let client = http_client(&config).unwrap();
        let result = get_with_retry(&client, &server.uri(), &[], &config).await;
        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_lenient_f64() {
        #[derive(Deserialize)]
        struct Point {
            #[serde(deserialize_with = "lenient_f64", default)]
            y: Option<f64>,
        }

        let parse = |json: &str| serde_json::from_str::<Point>(json).unwrap().y;
        assert_eq!(parse(r#"{"y": 12.5}"#), Some(12.5));
        assert_eq!(parse(r#"{"y": "12,5"}"#), Some(12.5));
        assert_eq!(parse(r#"{"y": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"y": "n/a"}"#), None);
    }
}
