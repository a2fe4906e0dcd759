use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{Result, WeatherError},
    model::{WeatherReading, utc_from_epoch},
};

use super::WeatherProvider;

/// OpenWeather current-conditions client (metric units).
///
/// No timeout or retry is configured; the reqwest defaults apply.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn fetch_current(&self, city: &str) -> Result<Option<WeatherReading>> {
        let url = format!("{}/weather", self.base_url);

        let transport = |source| WeatherError::Transport {
            city: city.to_string(),
            source,
        };

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("units", "metric"),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().await.map_err(transport)?;

        if !status.is_success() {
            debug!(
                city,
                %status,
                body = %truncate_body(&body),
                "OpenWeather returned non-success status, skipping city"
            );
            return Ok(None);
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).map_err(|e| WeatherError::Decode {
                city: city.to_string(),
                reason: e.to_string(),
            })?;

        parsed.into_reading(city).map(Some)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_max: f64,
    temp_min: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

impl OwCurrentResponse {
    fn into_reading(self, city: &str) -> Result<WeatherReading> {
        let decode = |reason: String| WeatherError::Decode {
            city: city.to_string(),
            reason,
        };

        let date_time =
            utc_from_epoch(self.dt).ok_or_else(|| decode(format!("dt {} out of range", self.dt)))?;

        let condition = self
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| decode("weather list is empty".to_string()))?;

        Ok(WeatherReading {
            city: city.to_string(),
            current_temp: self.main.temp,
            max_temp: self.main.temp_max,
            min_temp: self.main.temp_min,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            date_time,
            condition,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, city: &str) -> Result<Option<WeatherReading>> {
        self.fetch_current(city).await
    }
}

fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
