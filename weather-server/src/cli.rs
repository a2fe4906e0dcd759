use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use tracing::{error, info};
use weather_core::{Config, Units, WeatherStore, config::parse_city_list};

use crate::server::{self, AppState};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather aggregation service")]
pub struct Cli {
    /// Path to the config file (defaults to the platform config directory).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on, e.g. "0.0.0.0:5000".
        #[arg(long)]
        bind: Option<String>,

        /// SQLite database file.
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },

    /// Interactively set the API key and city list.
    Configure,

    /// Fetch all cities once, store the results and print them as JSON.
    Fetch,

    /// Print every stored record as JSON.
    History,

    /// Fetch on a fixed interval, printing a report with summary and heat
    /// alerts after every update. Stops on Ctrl-C.
    Watch {
        /// Seconds between updates.
        #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        /// Temperature units for the printed report: metric or imperial.
        #[arg(long, default_value_t = Units::Metric)]
        units: Units,

        /// Stop after this many updates.
        #[arg(long)]
        count: Option<u64>,
    },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file_path(),
        }
    }

    /// File config with `WEATHER_*` environment overrides applied.
    fn effective_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load_from(&self.config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match &self.command {
            Command::Serve { bind, database } => {
                let mut config = self.effective_config()?;
                if let Some(bind) = bind {
                    config.bind_addr = bind.clone();
                }
                if let Some(database) = database {
                    config.database_path = database.clone();
                }
                server::serve(config).await
            }
            Command::Configure => self.configure(),
            Command::Fetch => {
                let AppState { aggregator, store, .. } =
                    AppState::from_config(&self.effective_config()?)?;
                let readings = aggregator.fetch_and_record().await?;
                drop(aggregator);
                println!("{}", serde_json::to_string_pretty(&readings)?);
                store.close()?;
                Ok(())
            }
            Command::History => {
                let config = self.effective_config()?;
                let store = WeatherStore::open(&config.database_path).with_context(|| {
                    format!("Failed to open weather store: {}", config.database_path.display())
                })?;
                let records = store.list_all().await?;
                println!("{}", serde_json::to_string_pretty(&records)?);
                store.close()?;
                Ok(())
            }
            Command::Watch {
                interval,
                units,
                count,
            } => {
                let state = AppState::from_config(&self.effective_config()?)?;
                watch(&state, Duration::from_secs(*interval), *units, *count).await?;
                let AppState { aggregator, store, .. } = state;
                drop(aggregator);
                store.close()?;
                Ok(())
            }
        }
    }

    fn configure(&self) -> anyhow::Result<()> {
        let path = self.config_path()?;
        let mut config = Config::load_from(&path)?;

        let api_key = Password::new("OpenWeather API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()?;
        config.set_api_key(api_key.trim().to_string());

        let current = config.cities.join(", ");
        let cities = Text::new("Cities (comma-separated):")
            .with_default(&current)
            .prompt()?;
        let cities = parse_city_list(&cities);
        if !cities.is_empty() {
            config.cities = cities;
        }

        config.save_to(&path)?;
        info!(path = %path.display(), "Configuration saved");
        println!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Poll until Ctrl-C or `count` updates. A failed update is logged and the
/// next tick tries again.
async fn watch(
    state: &AppState,
    interval: Duration,
    units: Units,
    count: Option<u64>,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut updates = 0u64;

    info!(interval_secs = interval.as_secs(), %units, "Watching weather");
    loop {
        let update = async {
            ticker.tick().await;
            state.report(units).await
        };
        tokio::select! {
            _ = &mut shutdown => {
                info!(updates, "Stopping watch");
                return Ok(());
            }
            report = update => match report {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => error!(error = %e, "Weather update failed"),
            },
        }

        updates += 1;
        if count.is_some_and(|n| updates >= n) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "weather",
            "--config",
            "/tmp/w.toml",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--database",
            "/tmp/w.db",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/w.toml")));
        match cli.command {
            Command::Serve { bind, database } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:8080"));
                assert_eq!(database, Some(PathBuf::from("/tmp/w.db")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["weather", "history", "--config", "c.toml"]).unwrap();

        assert!(matches!(cli.command, Command::History));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn watch_defaults_to_five_minutes_in_metric() {
        let cli = Cli::try_parse_from(["weather", "watch"]).unwrap();

        match cli.command {
            Command::Watch {
                interval,
                units,
                count,
            } => {
                assert_eq!(interval, 300);
                assert_eq!(units, Units::Metric);
                assert_eq!(count, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn watch_accepts_interval_units_and_count() {
        let cli = Cli::try_parse_from([
            "weather", "watch", "--interval", "60", "--units", "imperial", "--count", "3",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Watch {
                interval: 60,
                units: Units::Imperial,
                count: Some(3)
            }
        ));
    }

    #[test]
    fn watch_rejects_zero_interval_and_unknown_units() {
        assert!(Cli::try_parse_from(["weather", "watch", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["weather", "watch", "--units", "kelvin"]).is_err());
    }

    #[tokio::test]
    async fn watch_stops_after_count_and_survives_failed_updates() {
        let store = WeatherStore::in_memory().unwrap();
        let config = Config {
            api_key: Some("KEY".into()),
            cities: vec!["Delhi".into()],
            base_url: "http://127.0.0.1:1".into(),
            ..Config::default()
        };
        let provider = weather_core::provider_from_config(&config).unwrap();
        let state = AppState::new(
            weather_core::WeatherAggregator::new(provider.into(), store.clone(), config.cities),
            store,
        );

        watch(&state, Duration::from_millis(10), Units::Metric, Some(2))
            .await
            .unwrap();

        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_closes_the_store_it_opens() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("weather_data.db");
        let config_file = dir.path().join("config.toml");
        std::fs::write(&config_file, format!("database_path = {:?}\n", database)).unwrap();

        let cli = Cli::try_parse_from(["weather", "--config", config_file.to_str().unwrap(), "history"])
            .unwrap();
        cli.run().await.unwrap();

        assert!(database.exists());
        assert!(!dir.path().join("weather_data.db-wal").exists());
        let reopened = WeatherStore::open(&database).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 0);
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["weather"]).is_err());
    }
}
