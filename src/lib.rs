pub mod cli;
pub mod core;
pub mod dashboard;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::price::{prague_now, prague_today};
use crate::providers::{CnbRateProvider, OpenMeteoProvider, OteProvider};
use crate::store::PriceStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Fetch and show the prices of a day, today when `date` is `None`.
    Spot { date: Option<NaiveDate>, all: bool },
    /// Fetch the prices of a day and store them.
    Save { date: Option<NaiveDate> },
    /// Show stored prices.
    History { date: Option<NaiveDate> },
    /// Serve the web dashboard, on the configured port unless overridden.
    Dashboard { port: Option<u16> },
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

fn open_store(config: &AppConfig) -> Result<PriceStore> {
    let path = config.database_path()?;
    debug!("Using price database at {}", path.display());
    PriceStore::open(&path)
        .with_context(|| format!("Failed to open price database at {}", path.display()))
}

fn market_providers(config: &AppConfig) -> Result<(OteProvider, CnbRateProvider)> {
    let spot = OteProvider::new(&config.providers.ote.base_url, config.http.clone())?;
    let rates = CnbRateProvider::new(&config.providers.cnb.base_url, config.http.clone())?;
    Ok((spot, rates))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("OTE spot prices starting...");
    let config = load_config(config_path)?;

    match command {
        AppCommand::Spot { date, all } => {
            let (spot, rates) = market_providers(&config)?;
            let date = date.unwrap_or_else(prague_today);
            cli::spot::run(&spot, &rates, date, all, prague_now()).await
        }
        AppCommand::Save { date } => {
            let (spot, rates) = market_providers(&config)?;
            let store = open_store(&config)?;
            let date = date.unwrap_or_else(prague_today);
            cli::save::run(&spot, &rates, &store, date).await?;
            Ok(())
        }
        AppCommand::History { date } => {
            let store = open_store(&config)?;
            cli::history::run(&store, date)
        }
        AppCommand::Dashboard { port } => {
            let (spot, rates) = market_providers(&config)?;
            let weather = OpenMeteoProvider::new(
                &config.providers.weather.forecast_url,
                &config.providers.weather.archive_url,
                config.location,
                config.http.clone(),
            )?;
            let state = dashboard::DashboardState {
                store: Arc::new(open_store(&config)?),
                spot: Arc::new(spot),
                rates: Arc::new(rates),
                weather: Arc::new(weather),
            };
            dashboard::serve(state, port.unwrap_or(config.dashboard.port)).await
        }
    }
}
