//! SQLite-backed persistence for weather readings.
//!
//! A single `weather_data` table holds the projected records. Rows are only
//! ever inserted; nothing here updates or deletes them.

use std::{path::Path, sync::Arc};

use parking_lot::Mutex;
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    model::{NewWeatherRecord, StoredWeatherRecord},
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS weather_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date_time TEXT NOT NULL,
        max_temp REAL NOT NULL,
        min_temp REAL NOT NULL,
        humidity REAL NOT NULL,
        wind_speed REAL NOT NULL
    );
"#;

/// Shared handle to the weather database.
///
/// Clones share one connection; blocking SQLite calls run on the tokio
/// blocking pool.
#[derive(Clone)]
pub struct WeatherStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for WeatherStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherStore").finish_non_exhaustive()
    }
}

impl WeatherStore {
    /// Open (or create) the database at `path` and ensure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn).inspect(|_| info!(path = %path.display(), "Weather store opened"))
    }

    /// Create an in-memory store (tests, one-off runs).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert all records in one transaction and return how many were written.
    ///
    /// Either every record becomes durable or none does.
    pub async fn save(&self, records: Vec<NewWeatherRecord>) -> Result<usize> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || insert_all(&mut conn.lock(), &records)).await?
    }

    /// Every committed row, ordered by identity (insertion order).
    pub async fn list_all(&self) -> Result<Vec<StoredWeatherRecord>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || select_all(&conn.lock())).await?
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let n: i64 = conn
                .lock()
                .query_row("SELECT COUNT(*) FROM weather_data", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await?
    }

    /// Close the connection, flushing the WAL.
    ///
    /// If other clones are still alive the connection stays open until the
    /// last one drops.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                mutex.into_inner().close().map_err(|(_, e)| e)?;
                info!("Weather store closed");
                Ok(())
            }
            Err(_) => {
                warn!("Weather store still shared at shutdown; leaving close to drop");
                Ok(())
            }
        }
    }
}

fn insert_all(conn: &mut Connection, records: &[NewWeatherRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO weather_data (date_time, max_temp, min_temp, humidity, wind_speed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for record in records {
            stmt.execute(params![
                record.date_time,
                record.max_temp,
                record.min_temp,
                record.humidity,
                record.wind_speed,
            ])?;
        }
    }
    tx.commit()?;

    debug!(rows = records.len(), "Committed weather records");
    Ok(records.len())
}

fn select_all(conn: &Connection) -> Result<Vec<StoredWeatherRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, date_time, max_temp, min_temp, humidity, wind_speed
         FROM weather_data
         ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(StoredWeatherRecord {
            id: row.get(0)?,
            date_time: row.get(1)?,
            max_temp: row.get(2)?,
            min_temp: row.get(3)?,
            humidity: row.get(4)?,
            wind_speed: row.get(5)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
