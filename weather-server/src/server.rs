//! HTTP surface: `/api/weather` runs an aggregation, `/api/weather_data`
//! returns every stored record and `/api/weather/summary` adds rollups and
//! heat alerts to a fresh aggregation.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use weather_core::{
    Config, HeatAlert, HeatAlerts, StoredWeatherRecord, Units, WeatherAggregator, WeatherError,
    WeatherReading, WeatherReport, WeatherStore, provider_from_config,
};

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: WeatherAggregator,
    pub store: WeatherStore,
    /// Previous max temperature per city, fed by every aggregation.
    pub alerts: Arc<Mutex<HeatAlerts>>,
}

impl AppState {
    /// Open the store and build the provider described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = provider_from_config(config)?;
        let store = WeatherStore::open(&config.database_path).with_context(|| {
            format!(
                "Failed to open weather store: {}",
                config.database_path.display()
            )
        })?;
        let aggregator =
            WeatherAggregator::new(Arc::from(provider), store.clone(), config.cities.clone());

        Ok(Self::new(aggregator, store))
    }

    pub fn new(aggregator: WeatherAggregator, store: WeatherStore) -> Self {
        Self {
            aggregator,
            store,
            alerts: Arc::new(Mutex::new(HeatAlerts::default())),
        }
    }

    /// Run one aggregation and feed it to the heat-alert tracker.
    pub async fn update(&self) -> weather_core::Result<(Vec<WeatherReading>, Vec<HeatAlert>)> {
        let readings = self.aggregator.fetch_and_record().await?;
        let alerts = self.alerts.lock().observe(&readings);
        for alert in &alerts {
            warn!(
                city = %alert.city,
                max_temp = alert.max_temp,
                previous_max_temp = alert.previous_max_temp,
                "{}",
                alert.message
            );
        }
        Ok((readings, alerts))
    }

    /// One update rendered as a report in `units`.
    pub async fn report(&self, units: Units) -> weather_core::Result<WeatherReport> {
        let (readings, alerts) = self.update().await?;
        Ok(WeatherReport::new(&readings, alerts, units))
    }
}

/// Any failure while handling a request; rendered as a bare 500.
pub struct AppError(WeatherError);

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/weather", get(get_weather))
        .route("/api/weather/summary", get(get_weather_summary))
        .route("/api/weather_data", get(get_weather_data))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/weather: fetch every city, persist the readings, return them.
async fn get_weather(State(state): State<AppState>) -> Result<Json<Vec<WeatherReading>>, AppError> {
    let (readings, _) = state.update().await?;
    Ok(Json(readings))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    #[serde(default)]
    units: Units,
}

/// GET /api/weather/summary?units=metric|imperial: aggregate like
/// `/api/weather`, then add the summary and any heat alerts.
async fn get_weather_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<WeatherReport>, AppError> {
    Ok(Json(state.report(query.units).await?))
}

/// GET /api/weather_data: all stored records.
async fn get_weather_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredWeatherRecord>>, AppError> {
    let records = state.store.list_all().await?;
    Ok(Json(records))
}

/// Run the HTTP service until Ctrl-C or SIGTERM, then close the store.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let store = state.store.clone();

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        addr = %listener.local_addr()?,
        cities = config.cities.len(),
        "Weather service listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");
    store.close()?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
