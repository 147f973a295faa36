//! Core business logic abstractions

pub mod analysis;
pub mod cache;
pub mod config;
pub mod currency;
pub mod forecast;
pub mod log;
pub mod market;
pub mod price;
pub mod stats;
pub mod weather;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use price::{DayPrices, EurQuote, SpotPrice, SpotPriceProvider};
pub use weather::WeatherProvider;
