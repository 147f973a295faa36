//! Web dashboard: axum routes rendering askama pages with SVG charts

mod chart;
mod views;

use crate::core::market::fetch_day_prices;
use crate::core::price::{DayPrices, prague_now, prague_today};
use crate::core::{CurrencyRateProvider, SpotPriceProvider, WeatherProvider};
use crate::store::PriceStore;
use anyhow::{Context, Result};
use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared by all handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<PriceStore>,
    pub spot: Arc<dyn SpotPriceProvider>,
    pub rates: Arc<dyn CurrencyRateProvider>,
    pub weather: Arc<dyn WeatherProvider>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    date: Option<String>,
    days: Option<String>,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/history", get(history_handler))
        .route("/analysis", get(analysis_handler))
        .route("/profiles", get(profiles_handler))
        .route("/forecast", get(forecast_handler))
        .route("/weather", get(weather_handler))
        .route("/api/prices", get(prices_api_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Binds `port` on all interfaces and serves until the process is stopped.
pub async fn serve(state: DashboardState, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard to {addr}"))?;
    info!("Dashboard listening on http://localhost:{}/", port);
    println!("Dashboard running at http://localhost:{port}/ (Ctrl+C to stop)");

    axum::serve(listener, router(state))
        .await
        .context("Dashboard server failed")
}

fn render(template: impl Template) -> Html<String> {
    match template.render() {
        Ok(html) => Html(html),
        Err(e) => {
            error!(error = %e, "Template render error");
            Html(format!("<h1>Error rendering page: {e}</h1>"))
        }
    }
}

/// Renders the page, or the error page with the failure inline.
fn render_page<T: Template>(active: &'static str, page: Result<T>) -> Html<String> {
    match page {
        Ok(template) => render(template),
        Err(e) => {
            error!(error = %format!("{e:#}"), page = active, "Failed to build page");
            render(views::ErrorTemplate {
                active,
                message: format!("{e:#}"),
            })
        }
    }
}

async fn index_handler(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let page = match views::parse_date(query.date.as_deref()) {
        Ok(date) => views::index_page(&state, date, prague_now()).await,
        Err(e) => Err(e),
    };
    render_page("index", page)
}

async fn history_handler(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let page = views::parse_date(query.date.as_deref())
        .and_then(|date| views::history_page(&state, date, prague_today()));
    render_page("history", page)
}

async fn analysis_handler(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let page = match views::parse_days_back(query.days.as_deref()) {
        Ok(days) => views::analysis_page(&state, days, prague_now()).await,
        Err(e) => Err(e),
    };
    render_page("analysis", page)
}

async fn profiles_handler(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let page = match views::parse_days_back(query.days.as_deref()) {
        Ok(days) => views::profiles_page(&state, days, prague_now()).await,
        Err(e) => Err(e),
    };
    render_page("profiles", page)
}

async fn forecast_handler(State(state): State<DashboardState>) -> Html<String> {
    let page = views::forecast_page(&state, prague_today()).await;
    render_page("forecast", page)
}

async fn weather_handler(State(state): State<DashboardState>) -> Html<String> {
    let page = views::weather_page(&state, prague_today()).await;
    render_page("weather", page)
}

/// Stored prices of the day when available, otherwise fetched live.
async fn day_prices(state: &DashboardState, query: &PageQuery) -> Result<DayPrices> {
    let date = views::parse_date(query.date.as_deref())?.unwrap_or_else(|| prague_today());
    if let Some(stats) = state.store.daily_stats(date)? {
        return Ok(DayPrices {
            date,
            eur_czk_rate: stats.eur_czk_rate,
            prices: state.store.prices_for_date(date)?,
        });
    }
    fetch_day_prices(state.spot.as_ref(), state.rates.as_ref(), date).await
}

async fn prices_api_handler(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Response {
    match day_prices(&state, &query).await {
        Ok(day) => Json(day).into_response(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Price API request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
