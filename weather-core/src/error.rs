use thiserror::Error;

/// Failures of the aggregation and store operations.
///
/// A non-success upstream status is not an error: the provider reports it as
/// an absent reading.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Network, DNS, TLS or timeout failure talking to the upstream provider.
    #[error("Failed to send request to upstream provider for '{city}': {source}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a success status but an unexpected body.
    #[error("Failed to parse upstream response for '{city}': {reason}")]
    Decode { city: String, reason: String },

    #[error("Weather store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Weather store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Weather store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, WeatherError>;
