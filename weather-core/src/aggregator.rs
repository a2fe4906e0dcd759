use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::Result,
    model::WeatherReading,
    provider::WeatherProvider,
    store::WeatherStore,
};

/// Fetches every configured city in order and records the successful ones.
#[derive(Debug, Clone)]
pub struct WeatherAggregator {
    provider: Arc<dyn WeatherProvider>,
    store: WeatherStore,
    cities: Arc<[String]>,
}

impl WeatherAggregator {
    pub fn new(provider: Arc<dyn WeatherProvider>, store: WeatherStore, cities: Vec<String>) -> Self {
        Self {
            provider,
            store,
            cities: cities.into(),
        }
    }

    /// Fetch all cities sequentially, commit their records in one
    /// transaction, and return the readings in city-list order.
    ///
    /// Cities the upstream rejects with a non-success status are left out.
    /// A transport or decode failure aborts the whole run before the commit,
    /// so nothing staged by this call is persisted.
    pub async fn fetch_and_record(&self) -> Result<Vec<WeatherReading>> {
        let mut readings = Vec::with_capacity(self.cities.len());
        let mut staged = Vec::with_capacity(self.cities.len());

        for city in self.cities.iter() {
            match self.provider.current(city).await? {
                Some(reading) => {
                    staged.push(reading.to_record());
                    readings.push(reading);
                }
                None => debug!(city = %city, "No reading"),
            }
        }

        let saved = self.store.save(staged).await?;
        info!(
            requested = self.cities.len(),
            saved, "Aggregation finished"
        );

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::WeatherError, model::utc_from_epoch};
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    enum Canned {
        Ok(f64),
        Missing,
        Malformed,
    }

    #[derive(Debug, Default)]
    struct StaticProvider {
        answers: HashMap<String, Canned>,
    }

    impl StaticProvider {
        fn with(mut self, city: &str, answer: Canned) -> Self {
            self.answers.insert(city.to_string(), answer);
            self
        }
    }

    #[async_trait]
    impl WeatherProvider for StaticProvider {
        async fn current(&self, city: &str) -> Result<Option<WeatherReading>> {
            match self.answers.get(city).cloned().unwrap_or(Canned::Missing) {
                Canned::Ok(max_temp) => Ok(Some(WeatherReading {
                    city: city.to_string(),
                    current_temp: max_temp - 1.0,
                    max_temp,
                    min_temp: max_temp - 4.0,
                    feels_like: max_temp,
                    humidity: 40.0,
                    wind_speed: 3.5,
                    date_time: utc_from_epoch(1_700_000_000).unwrap(),
                    condition: "clear sky".into(),
                })),
                Canned::Missing => Ok(None),
                Canned::Malformed => Err(WeatherError::Decode {
                    city: city.to_string(),
                    reason: "missing field `main`".into(),
                }),
            }
        }
    }

    fn cities(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn keeps_city_order_and_skips_missing() {
        let provider = StaticProvider::default()
            .with("Delhi", Canned::Ok(27.0))
            .with("Chennai", Canned::Ok(33.0))
            .with("Kolkata", Canned::Ok(30.0));
        let store = WeatherStore::in_memory().unwrap();
        let aggregator = WeatherAggregator::new(
            Arc::new(provider),
            store.clone(),
            cities(&["Delhi", "Mumbai", "Chennai", "Kolkata"]),
        );

        let readings = aggregator.fetch_and_record().await.unwrap();

        let names: Vec<_> = readings.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, ["Delhi", "Chennai", "Kolkata"]);
        assert_eq!(store.count().await.unwrap(), readings.len());
    }

    #[tokio::test]
    async fn persisted_rows_mirror_readings() {
        let provider = StaticProvider::default()
            .with("Delhi", Canned::Ok(27.0))
            .with("Mumbai", Canned::Ok(31.0));
        let store = WeatherStore::in_memory().unwrap();
        let aggregator =
            WeatherAggregator::new(Arc::new(provider), store.clone(), cities(&["Delhi", "Mumbai"]));

        let readings = aggregator.fetch_and_record().await.unwrap();
        let rows = store.list_all().await.unwrap();

        assert_eq!(rows.len(), 2);
        for (reading, row) in readings.iter().zip(&rows) {
            assert_eq!(row.max_temp, reading.max_temp);
            assert_eq!(row.min_temp, reading.min_temp);
            assert_eq!(row.date_time, reading.date_time);
        }
    }

    #[tokio::test]
    async fn malformed_response_aborts_without_persisting() {
        let provider = StaticProvider::default()
            .with("Delhi", Canned::Ok(27.0))
            .with("Mumbai", Canned::Malformed)
            .with("Chennai", Canned::Ok(33.0));
        let store = WeatherStore::in_memory().unwrap();
        let aggregator = WeatherAggregator::new(
            Arc::new(provider),
            store.clone(),
            cities(&["Delhi", "Mumbai", "Chennai"]),
        );

        let err = aggregator.fetch_and_record().await.unwrap_err();

        assert!(matches!(err, WeatherError::Decode { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn all_missing_returns_empty_and_writes_nothing() {
        let store = WeatherStore::in_memory().unwrap();
        let aggregator = WeatherAggregator::new(
            Arc::new(StaticProvider::default()),
            store.clone(),
            cities(&["Delhi", "Mumbai"]),
        );

        assert!(aggregator.fetch_and_record().await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn repeated_runs_accumulate_rows() {
        let provider = StaticProvider::default().with("Delhi", Canned::Ok(27.0));
        let store = WeatherStore::in_memory().unwrap();
        let aggregator = WeatherAggregator::new(Arc::new(provider), store.clone(), cities(&["Delhi"]));

        aggregator.fetch_and_record().await.unwrap();
        aggregator.fetch_and_record().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }
}
