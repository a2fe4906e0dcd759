//! Rollups over one aggregation run: average maximum temperature, dominant
//! condition, unit conversion and consecutive-update heat alerts.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::model::WeatherReading;

/// Reported when no reading carries a condition.
pub const NO_DOMINANT_CONDITION: &str = "No Dominant Condition Found!";

/// Max temperature (°C) at or above which a city counts as hot.
pub const HEAT_THRESHOLD_C: f64 = 35.0;

/// Temperature units for presenting readings. Upstream data is always metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    /// "C" or "F".
    pub fn notation(&self) -> &'static str {
        match self {
            Units::Metric => "C",
            Units::Imperial => "F",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

impl WeatherReading {
    /// Copy of the reading with its temperatures expressed in `units`.
    ///
    /// Humidity, wind speed and everything else pass through untouched.
    pub fn in_units(&self, units: Units) -> WeatherReading {
        match units {
            Units::Metric => self.clone(),
            Units::Imperial => WeatherReading {
                current_temp: celsius_to_fahrenheit(self.current_temp),
                max_temp: celsius_to_fahrenheit(self.max_temp),
                min_temp: celsius_to_fahrenheit(self.min_temp),
                feels_like: celsius_to_fahrenheit(self.feels_like),
                ..self.clone()
            },
        }
    }
}

/// Aggregates over the readings of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub city_count: usize,
    /// Mean of `max_temp`; `None` when there are no readings.
    pub average_max_temp: Option<f64>,
    pub dominant_condition: String,
}

/// Average max temperature and most frequent condition.
///
/// Empty conditions are not counted. On a tie the condition that first
/// appeared last among the tied ones wins.
pub fn summarize(readings: &[WeatherReading]) -> Summary {
    let average_max_temp = if readings.is_empty() {
        None
    } else {
        Some(readings.iter().map(|r| r.max_temp).sum::<f64>() / readings.len() as f64)
    };

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for reading in readings.iter().filter(|r| !r.condition.is_empty()) {
        let count = counts.entry(reading.condition.as_str()).or_insert(0);
        if *count == 0 {
            order.push(reading.condition.as_str());
        }
        *count += 1;
    }

    let mut dominant: Option<(&str, usize)> = None;
    for condition in order {
        let count = counts[condition];
        match dominant {
            Some((_, best)) if best > count => {}
            _ => dominant = Some((condition, count)),
        }
    }

    Summary {
        city_count: readings.len(),
        average_max_temp,
        dominant_condition: dominant
            .map(|(c, _)| c.to_string())
            .unwrap_or_else(|| NO_DOMINANT_CONDITION.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatAlert {
    pub city: String,
    pub previous_max_temp: f64,
    pub max_temp: f64,
    pub message: String,
}

/// Tracks the last max temperature per city across updates.
///
/// A city alerts when both its previous and current max temperature are at
/// or above the threshold. A city missing from an update keeps its last
/// value, so the streak resumes when it comes back.
#[derive(Debug, Clone)]
pub struct HeatAlerts {
    threshold: f64,
    previous: HashMap<String, f64>,
}

impl Default for HeatAlerts {
    fn default() -> Self {
        Self::new(HEAT_THRESHOLD_C)
    }
}

impl HeatAlerts {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: HashMap::new(),
        }
    }

    /// Record one update (metric readings) and return the alerts it raises.
    pub fn observe(&mut self, readings: &[WeatherReading]) -> Vec<HeatAlert> {
        let mut alerts = Vec::new();

        for reading in readings {
            let Some(previous) = self.previous.insert(reading.city.clone(), reading.max_temp)
            else {
                continue;
            };
            if previous >= self.threshold && reading.max_temp >= self.threshold {
                alerts.push(HeatAlert {
                    city: reading.city.clone(),
                    previous_max_temp: previous,
                    max_temp: reading.max_temp,
                    message: format!(
                        "{} has been above {}°C for two consecutive updates!",
                        reading.city, self.threshold
                    ),
                });
            }
        }

        alerts
    }
}

/// Everything one polling update produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub units: Units,
    pub notation: &'static str,
    pub readings: Vec<WeatherReading>,
    pub summary: Summary,
    pub alerts: Vec<HeatAlert>,
}

impl WeatherReport {
    /// Build a report from metric `readings`; `alerts` come from
    /// [`HeatAlerts::observe`] on the same readings.
    pub fn new(readings: &[WeatherReading], alerts: Vec<HeatAlert>, units: Units) -> Self {
        let readings: Vec<_> = readings.iter().map(|r| r.in_units(units)).collect();
        let summary = summarize(&readings);

        Self {
            units,
            notation: units.notation(),
            readings,
            summary,
            alerts,
        }
    }
}
