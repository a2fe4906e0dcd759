use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Cities queried by an aggregation request unless configured otherwise.
pub const DEFAULT_CITIES: [&str; 6] = [
    "Delhi",
    "Mumbai",
    "Chennai",
    "Hyderabad",
    "Bangalore",
    "Kolkata",
];

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_DATABASE_PATH: &str = "weather_data.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// cities = ["Delhi", "Mumbai"]
/// database_path = "/var/lib/weather/weather_data.db"
/// bind_addr = "0.0.0.0:5000"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential for the upstream provider.
    pub api_key: Option<String>,
    /// Ordered list of cities; output order follows it.
    pub cities: Vec<String>,
    /// Upstream API root; `/weather` is appended for current conditions.
    pub base_url: String,
    pub database_path: PathBuf,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl Config {
    /// Load config from `path`, or defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay `WEATHER_*` variables on top of the file values.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("WEATHER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(cities) = get("WEATHER_CITIES") {
            let cities = parse_city_list(&cities);
            if !cities.is_empty() {
                self.cities = cities;
            }
        }
        if let Some(url) = get("WEATHER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = get("WEATHER_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(addr) = get("WEATHER_BIND_ADDR") {
            self.bind_addr = addr;
        }
    }

    /// Returns the upstream API key, or an error with a hint on how to set it.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured for the weather provider.\n\
                 Hint: run `weather configure` or set WEATHER_API_KEY."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }
}

/// Split a comma-separated city list, trimming entries and dropping empties.
pub fn parse_city_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}
