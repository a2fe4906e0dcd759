use crate::{Config, WeatherReading, error::Result, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of current conditions for a single city.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Fetch the current reading for `city`.
    ///
    /// Returns `Ok(None)` when the upstream answers with a non-success status;
    /// transport and decode failures are errors.
    async fn current(&self, city: &str) -> Result<Option<WeatherReading>>;
}

/// Construct the upstream provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key()?;

    Ok(Box::new(OpenWeatherProvider::with_base_url(
        api_key.to_owned(),
        config.base_url.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        let provider = provider_from_config(&cfg);
        assert!(provider.is_ok());
    }
}
