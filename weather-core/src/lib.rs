//! Core library for the weather service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The upstream provider abstraction and its OpenWeather implementation
//! - The SQLite weather store
//! - The aggregator that fetches every configured city and records the results
//! - Rollups and heat alerts over aggregation results
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod store;
pub mod summary;

pub use aggregator::WeatherAggregator;
pub use config::Config;
pub use error::{Result, WeatherError};
pub use model::{NewWeatherRecord, StoredWeatherRecord, WeatherReading};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use store::WeatherStore;
pub use summary::{HeatAlert, HeatAlerts, Summary, Units, WeatherReport, summarize};
