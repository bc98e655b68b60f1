use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One validated weather snapshot, current or forecast-dated.
///
/// Constructed only by the response validator (from the network) or by the
/// store's row-rehydration path (from SQLite) — never hand-built elsewhere.
/// `id` is `None` until the store assigns one on first persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub id: Option<i64>,
    pub city: String,
    /// Never empty: coerced to `"Unknown"` when upstream omits it, so the
    /// (city, country) location key is always two non-null strings.
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: u32,
    /// Relative humidity, percent.
    pub humidity: u8,
    pub description: String,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Cloud cover, percent.
    pub clouds: u8,
    /// When this system fetched and validated the data.
    pub fetched_at: DateTime<Utc>,
    /// When the condition is predicted to occur; `None` for current weather.
    pub forecast_at: Option<DateTime<Utc>>,
}

impl WeatherObservation {
    pub fn is_forecast(&self) -> bool {
        self.forecast_at.is_some()
    }
}

impl std::fmt::Display for WeatherObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Weather in {}, {}: {}°C, {}",
            self.city, self.country, self.temperature, self.description
        )
    }
}
