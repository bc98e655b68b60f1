//! SQLite-backed store for weather observations.
//!
//! "Cache" here means "durable store consulted before issuing a network
//! call": freshness is a pure function of the capture timestamp at read
//! time, there is no in-memory layer. Current-weather rows are unique per
//! (city, country); forecast rows share a location key and are append-only.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::config::CACHE_TTL_SECS;
use crate::error::WeatherError;
use crate::model::WeatherObservation;

const OBSERVATION_COLUMNS: &str = "id, city, country, temperature, feels_like, temp_min, temp_max, \
     pressure, humidity, description, wind_speed, clouds, fetched_at, forecast_at";

/// Filters for [`WeatherStore::list`].
#[derive(Debug, Clone)]
pub struct ListFilter {
    /// Substring match on the city name.
    pub city: Option<String>,
    /// Exact match on the country code.
    pub country: Option<String>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub limit: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            city: None,
            country: None,
            min_temp: None,
            max_temp: None,
            limit: 50,
        }
    }
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WeatherError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Ephemeral in-memory store, used by tests.
    pub fn in_memory() -> Result<Self, WeatherError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create tables and indexes if they don't exist. The uniqueness
    /// constraint on (city, country) only covers current-weather rows, so
    /// forecast inserts bypass it structurally.
    fn init_schema(&self) -> Result<(), WeatherError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT NOT NULL,
                country TEXT NOT NULL,
                temperature REAL NOT NULL,
                feels_like REAL NOT NULL,
                temp_min REAL NOT NULL,
                temp_max REAL NOT NULL,
                pressure INTEGER NOT NULL,
                humidity INTEGER NOT NULL,
                description TEXT NOT NULL,
                wind_speed REAL NOT NULL,
                clouds INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL,
                forecast_at INTEGER
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_current_location
                ON observations(city, country) WHERE forecast_at IS NULL;

            CREATE INDEX IF NOT EXISTS idx_location ON observations(city, country);
            CREATE INDEX IF NOT EXISTS idx_fetched_at ON observations(fetched_at);
            "#,
        )?;
        Ok(())
    }

    /// Persist an observation, returning its assigned row id.
    ///
    /// A current-weather observation replaces any existing row for its
    /// (city, country) key and refreshes the capture timestamp; no history
    /// is kept. A forecast observation always inserts a new row.
    pub fn upsert(&self, obs: &WeatherObservation) -> Result<i64, WeatherError> {
        match obs.forecast_at {
            Some(_) => self.insert_forecast(obs),
            None => self.upsert_current(obs),
        }
    }

    fn upsert_current(&self, obs: &WeatherObservation) -> Result<i64, WeatherError> {
        let id = self.conn.query_row(
            r#"
            INSERT INTO observations (
                city, country, temperature, feels_like, temp_min, temp_max,
                pressure, humidity, description, wind_speed, clouds, fetched_at, forecast_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL)
            ON CONFLICT(city, country) WHERE forecast_at IS NULL DO UPDATE SET
                temperature = excluded.temperature,
                feels_like = excluded.feels_like,
                temp_min = excluded.temp_min,
                temp_max = excluded.temp_max,
                pressure = excluded.pressure,
                humidity = excluded.humidity,
                description = excluded.description,
                wind_speed = excluded.wind_speed,
                clouds = excluded.clouds,
                fetched_at = excluded.fetched_at
            RETURNING id
            "#,
            params![
                obs.city,
                obs.country,
                obs.temperature,
                obs.feels_like,
                obs.temp_min,
                obs.temp_max,
                obs.pressure,
                obs.humidity,
                obs.description,
                obs.wind_speed,
                obs.clouds,
                obs.fetched_at.timestamp(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn insert_forecast(&self, obs: &WeatherObservation) -> Result<i64, WeatherError> {
        self.conn.execute(
            r#"
            INSERT INTO observations (
                city, country, temperature, feels_like, temp_min, temp_max,
                pressure, humidity, description, wind_speed, clouds, fetched_at, forecast_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                obs.city,
                obs.country,
                obs.temperature,
                obs.feels_like,
                obs.temp_min,
                obs.temp_max,
                obs.pressure,
                obs.humidity,
                obs.description,
                obs.wind_speed,
                obs.clouds,
                obs.fetched_at.timestamp(),
                obs.forecast_at.map(|t| t.timestamp()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Return the most recently captured current-weather row for a location
    /// if its age is under the freshness window, else a miss.
    ///
    /// The city is matched with SQL `LIKE` rather than `=` — a lenient-match
    /// quirk kept on purpose: the match is case-insensitive and `%`/`_` in
    /// the input act as wildcards. Country is exact when supplied.
    pub fn lookup_fresh(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<Option<WeatherObservation>, WeatherError> {
        let cutoff = Utc::now().timestamp() - CACHE_TTL_SECS;

        let row = match country {
            Some(code) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM observations \
                         WHERE city LIKE ?1 AND country = ?2 \
                           AND forecast_at IS NULL AND fetched_at > ?3 \
                         ORDER BY fetched_at DESC LIMIT 1"
                    ),
                    params![city, code, cutoff],
                    row_to_observation,
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM observations \
                         WHERE city LIKE ?1 \
                           AND forecast_at IS NULL AND fetched_at > ?2 \
                         ORDER BY fetched_at DESC LIMIT 1"
                    ),
                    params![city, cutoff],
                    row_to_observation,
                )
                .optional()?,
        };

        Ok(row)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<WeatherObservation>, WeatherError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {OBSERVATION_COLUMNS} FROM observations WHERE id = ?1"),
                params![id],
                row_to_observation,
            )
            .optional()?;
        Ok(row)
    }

    /// List stored observations, newest capture first, at most `limit` rows.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<WeatherObservation>, WeatherError> {
        let mut sql = format!("SELECT {OBSERVATION_COLUMNS} FROM observations WHERE 1=1");
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(city) = &filter.city {
            sql.push_str(" AND city LIKE ?");
            args.push(SqlValue::Text(format!("%{city}%")));
        }
        if let Some(country) = &filter.country {
            sql.push_str(" AND country = ?");
            args.push(SqlValue::Text(country.clone()));
        }
        if let Some(min_temp) = filter.min_temp {
            sql.push_str(" AND temperature >= ?");
            args.push(SqlValue::Real(min_temp));
        }
        if let Some(max_temp) = filter.max_temp {
            sql.push_str(" AND temperature <= ?");
            args.push(SqlValue::Real(max_temp));
        }

        sql.push_str(" ORDER BY fetched_at DESC LIMIT ?");
        args.push(SqlValue::Integer(i64::from(filter.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_observation)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row?);
        }
        Ok(observations)
    }
}

/// Rehydrate one row into an observation. The only construction path
/// besides the validator.
fn row_to_observation(row: &Row<'_>) -> rusqlite::Result<WeatherObservation> {
    let fetched: i64 = row.get("fetched_at")?;
    let forecast: Option<i64> = row.get("forecast_at")?;

    Ok(WeatherObservation {
        id: Some(row.get("id")?),
        city: row.get("city")?,
        country: row.get("country")?,
        temperature: row.get("temperature")?,
        feels_like: row.get("feels_like")?,
        temp_min: row.get("temp_min")?,
        temp_max: row.get("temp_max")?,
        pressure: row.get("pressure")?,
        humidity: row.get("humidity")?,
        description: row.get("description")?,
        wind_speed: row.get("wind_speed")?,
        clouds: row.get("clouds")?,
        fetched_at: DateTime::from_timestamp(fetched, 0).unwrap_or_else(Utc::now),
        forecast_at: forecast.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observation(city: &str, country: &str, temp: f64) -> WeatherObservation {
        WeatherObservation {
            id: None,
            city: city.to_string(),
            country: country.to_string(),
            temperature: temp,
            feels_like: temp - 1.0,
            temp_min: temp - 3.0,
            temp_max: temp + 3.0,
            pressure: 1012,
            humidity: 65,
            description: "clear sky".to_string(),
            wind_speed: 3.4,
            clouds: 10,
            fetched_at: Utc::now(),
            forecast_at: None,
        }
    }

    fn forecast(city: &str, country: &str, offset_hours: i64) -> WeatherObservation {
        WeatherObservation {
            forecast_at: Some(Utc::now() + Duration::hours(offset_hours)),
            ..observation(city, country, 8.0)
        }
    }

    #[test]
    fn upsert_assigns_id_and_lookup_returns_row() {
        let store = WeatherStore::in_memory().unwrap();

        let id = store.upsert(&observation("London", "GB", 15.0)).unwrap();
        assert!(id > 0);

        let cached = store.lookup_fresh("London", Some("GB")).unwrap().unwrap();
        assert_eq!(cached.id, Some(id));
        assert_eq!(cached.city, "London");
        assert_eq!(cached.temperature, 15.0);
    }

    #[test]
    fn upsert_is_idempotent_per_location_key() {
        let store = WeatherStore::in_memory().unwrap();

        let first = store.upsert(&observation("London", "GB", 15.0)).unwrap();
        let second = store.upsert(&observation("London", "GB", 17.5)).unwrap();
        assert_eq!(first, second);

        let rows = store.list(&ListFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        // Replaced in place, latest values win.
        assert_eq!(rows[0].temperature, 17.5);
    }

    #[test]
    fn upsert_refreshes_capture_timestamp() {
        let store = WeatherStore::in_memory().unwrap();

        let mut stale = observation("London", "GB", 15.0);
        stale.fetched_at = Utc::now() - Duration::seconds(CACHE_TTL_SECS + 100);
        store.upsert(&stale).unwrap();
        assert!(store.lookup_fresh("London", Some("GB")).unwrap().is_none());

        store.upsert(&observation("London", "GB", 16.0)).unwrap();
        assert!(store.lookup_fresh("London", Some("GB")).unwrap().is_some());
    }

    #[test]
    fn lookup_misses_once_window_elapses() {
        let store = WeatherStore::in_memory().unwrap();

        let mut obs = observation("London", "GB", 15.0);
        obs.fetched_at = Utc::now() - Duration::seconds(CACHE_TTL_SECS + 1);
        store.upsert(&obs).unwrap();

        assert!(store.lookup_fresh("London", Some("GB")).unwrap().is_none());
    }

    #[test]
    fn lookup_without_country_matches_any_country() {
        let store = WeatherStore::in_memory().unwrap();
        store.upsert(&observation("London", "GB", 15.0)).unwrap();

        assert!(store.lookup_fresh("London", None).unwrap().is_some());
        assert!(store.lookup_fresh("London", Some("CA")).unwrap().is_none());
    }

    #[test]
    fn lookup_city_match_is_case_insensitive_like() {
        let store = WeatherStore::in_memory().unwrap();
        store.upsert(&observation("London", "GB", 15.0)).unwrap();

        // LIKE semantics, kept on purpose.
        assert!(store.lookup_fresh("london", None).unwrap().is_some());
        assert!(store.lookup_fresh("Lon%", None).unwrap().is_some());
        assert!(store.lookup_fresh("Lon", None).unwrap().is_none());
    }

    #[test]
    fn lookup_ignores_forecast_rows() {
        let store = WeatherStore::in_memory().unwrap();
        store.upsert(&forecast("London", "GB", 3)).unwrap();

        assert!(store.lookup_fresh("London", Some("GB")).unwrap().is_none());
    }

    #[test]
    fn forecast_rows_accumulate_per_location_key() {
        let store = WeatherStore::in_memory().unwrap();

        let a = store.upsert(&forecast("Kyiv", "UA", 3)).unwrap();
        let b = store.upsert(&forecast("Kyiv", "UA", 6)).unwrap();
        assert_ne!(a, b);

        let rows = store.list(&ListFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn find_by_id_hit_and_miss() {
        let store = WeatherStore::in_memory().unwrap();
        let id = store.upsert(&observation("London", "GB", 15.0)).unwrap();

        let found = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.city, "London");
        assert!(store.find_by_id(id + 1000).unwrap().is_none());
    }

    #[test]
    fn list_respects_limit_and_orders_newest_first() {
        let store = WeatherStore::in_memory().unwrap();
        for (i, city) in ["Oslo", "Lviv", "Porto", "Quito"].iter().enumerate() {
            let mut obs = observation(city, "XX", 10.0);
            obs.fetched_at = Utc::now() - Duration::seconds(60 * i as i64);
            store.upsert(&obs).unwrap();
        }

        let rows = store
            .list(&ListFilter { limit: 3, ..Default::default() })
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(
            rows.windows(2)
                .all(|pair| pair[0].fetched_at >= pair[1].fetched_at)
        );
        assert_eq!(rows[0].city, "Oslo");
    }

    #[test]
    fn list_filters_compose() {
        let store = WeatherStore::in_memory().unwrap();
        store.upsert(&observation("London", "GB", 15.0)).unwrap();
        store.upsert(&observation("London", "CA", 25.0)).unwrap();
        store.upsert(&observation("Lviv", "UA", 5.0)).unwrap();

        let rows = store
            .list(&ListFilter {
                city: Some("ondo".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = store
            .list(&ListFilter {
                city: Some("London".to_string()),
                country: Some("GB".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);

        let rows = store
            .list(&ListFilter {
                min_temp: Some(10.0),
                max_temp: Some(20.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country, "GB");
    }

    #[test]
    fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.db");

        {
            let store = WeatherStore::open(&path).unwrap();
            store.upsert(&observation("London", "GB", 15.0)).unwrap();
        }

        let store = WeatherStore::open(&path).unwrap();
        let cached = store.lookup_fresh("London", Some("GB")).unwrap();
        assert!(cached.is_some());
    }
}
