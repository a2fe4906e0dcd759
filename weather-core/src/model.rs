use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One city's weather snapshot, as returned to API callers.
///
/// `date_time` is the observation time in UTC without an offset, serialized
/// as `2023-11-14T22:13:20`. `humidity` is an integer percentage upstream and
/// is written back as an integer (`40`, not `40.0`) whenever it has no
/// fractional part; stored records keep the float column form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub city: String,
    pub current_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub feels_like: f64,
    #[serde(serialize_with = "serialize_whole_number")]
    pub humidity: f64,
    pub wind_speed: f64,
    pub date_time: NaiveDateTime,
    pub condition: String,
}

impl WeatherReading {
    /// The subset of this reading that gets persisted.
    pub fn to_record(&self) -> NewWeatherRecord {
        NewWeatherRecord::new(
            Some(self.date_time),
            self.max_temp,
            self.min_temp,
            self.humidity,
            self.wind_speed,
        )
    }
}

/// A record staged for insertion; it has no identity until committed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherRecord {
    pub date_time: NaiveDateTime,
    pub max_temp: f64,
    pub min_temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl NewWeatherRecord {
    /// Build a record; a missing timestamp falls back to "now" in UTC.
    pub fn new(
        date_time: Option<NaiveDateTime>,
        max_temp: f64,
        min_temp: f64,
        humidity: f64,
        wind_speed: f64,
    ) -> Self {
        Self {
            date_time: date_time.unwrap_or_else(|| Utc::now().naive_utc()),
            max_temp,
            min_temp,
            humidity,
            wind_speed,
        }
    }
}

/// A committed row of the `weather_data` table.
///
/// The identity is assigned by the store and never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredWeatherRecord {
    #[serde(skip_serializing)]
    pub id: i64,
    pub date_time: NaiveDateTime,
    pub max_temp: f64,
    pub min_temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

fn serialize_whole_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Convert upstream epoch seconds into a naive UTC calendar time.
pub fn utc_from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delhi() -> WeatherReading {
        WeatherReading {
            city: "Delhi".into(),
            current_temp: 25.0,
            max_temp: 27.0,
            min_temp: 23.0,
            feels_like: 26.0,
            humidity: 40.0,
            wind_speed: 3.5,
            date_time: utc_from_epoch(1_700_000_000).unwrap(),
            condition: "clear sky".into(),
        }
    }

    #[test]
    fn epoch_converts_to_utc_calendar_time() {
        let dt = utc_from_epoch(1_700_000_000).unwrap();
        assert_eq!(dt.to_string(), "2023-11-14 22:13:20");
    }

    #[test]
    fn serialized_date_time_decodes_to_same_instant() {
        let reading = delhi();
        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["date_time"], "2023-11-14T22:13:20");

        let back: WeatherReading = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back.date_time.and_utc().timestamp(), 1_700_000_000);
        assert_eq!(serde_json::to_value(&back).unwrap(), value);
    }

    #[test]
    fn reading_serializes_in_api_shape() {
        let value = serde_json::to_value(delhi()).unwrap();
        assert_eq!(
            value,
            json!({
                "city": "Delhi",
                "current_temp": 25.0,
                "max_temp": 27.0,
                "min_temp": 23.0,
                "feels_like": 26.0,
                "humidity": 40,
                "wind_speed": 3.5,
                "date_time": "2023-11-14T22:13:20",
                "condition": "clear sky"
            })
        );
    }

    #[test]
    fn fractional_humidity_stays_a_float() {
        let mut reading = delhi();
        reading.humidity = 40.5;

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["humidity"], json!(40.5));
        assert!(serde_json::to_string(&delhi()).unwrap().contains(r#""humidity":40,"#));
    }

    #[test]
    fn record_projection_drops_reading_only_fields() {
        let record = delhi().to_record();
        assert_eq!(record.max_temp, 27.0);
        assert_eq!(record.min_temp, 23.0);
        assert_eq!(record.humidity, 40.0);
        assert_eq!(record.wind_speed, 3.5);
        assert_eq!(record.date_time, utc_from_epoch(1_700_000_000).unwrap());
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let before = Utc::now().naive_utc();
        let record = NewWeatherRecord::new(None, 1.0, 0.0, 50.0, 2.0);
        let after = Utc::now().naive_utc();
        assert!(record.date_time >= before && record.date_time <= after);
    }

    #[test]
    fn stored_record_hides_identity() {
        let stored = StoredWeatherRecord {
            id: 7,
            date_time: utc_from_epoch(1_700_000_000).unwrap(),
            max_temp: 27.0,
            min_temp: 23.0,
            humidity: 40.0,
            wind_speed: 3.5,
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["date_time"], "2023-11-14T22:13:20");
    }
}
