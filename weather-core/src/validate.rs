//! Response validation and normalization.
//!
//! Turns raw upstream JSON into canonical [`WeatherObservation`]s. The
//! required top-level keys are checked strictly; everything nested beneath
//! them is a best-effort projection with explicit per-field defaults
//! (missing numeric leaves become zero, never null). Current-weather
//! payloads fail as a whole; forecast payloads are validated per interval,
//! skipping malformed entries with a warning.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::WeatherError;
use crate::model::WeatherObservation;

/// Placeholder used when the condition entry carries no description.
pub const NO_DESCRIPTION: &str = "No description";

/// Sentinel country code used when upstream omits one.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Top-level keys a current-weather payload must carry.
const REQUIRED_FIELDS: [&str; 6] = ["name", "sys", "main", "weather", "wind", "clouds"];

/// Validate a single current-weather payload.
pub fn parse_current(data: &Value) -> Result<WeatherObservation, WeatherError> {
    for field in REQUIRED_FIELDS {
        if data.get(field).is_none() {
            return Err(WeatherError::missing_field(field));
        }
    }

    let city = string_field(data, "name")?;
    let country = country_of(&data["sys"]);
    let description = description_of(&data["weather"])?;

    build_observation(city, country, description, data, None)
}

/// Validate a multi-interval forecast payload.
///
/// A malformed interval is skipped with a warning rather than failing the
/// whole fetch; the survivors keep upstream order. Only when no interval
/// survives does the call fail.
pub fn parse_forecast(data: &Value) -> Result<Vec<WeatherObservation>, WeatherError> {
    let location = data
        .get("city")
        .ok_or_else(|| WeatherError::missing_field("city"))?;
    let city = string_field(location, "name")?;
    let country = country_of(location);

    let intervals = data
        .get("list")
        .ok_or_else(|| WeatherError::missing_field("list"))?
        .as_array()
        .ok_or_else(|| WeatherError::invalid_field("list", "expected an array"))?;

    let mut observations = Vec::with_capacity(intervals.len());
    for (idx, entry) in intervals.iter().enumerate() {
        match parse_interval(&city, &country, entry) {
            Ok(obs) => observations.push(obs),
            Err(e) => {
                warn!(city = %city, interval = idx, error = %e, "skipping malformed forecast interval");
            }
        }
    }

    if observations.is_empty() {
        return Err(WeatherError::MalformedPayload("no valid data".to_string()));
    }

    Ok(observations)
}

/// One 3-hour forecast interval, validated against the same required-field
/// rule as a current-weather payload.
fn parse_interval(
    city: &str,
    country: &str,
    entry: &Value,
) -> Result<WeatherObservation, WeatherError> {
    for field in ["dt", "main", "weather", "wind", "clouds"] {
        if entry.get(field).is_none() {
            return Err(WeatherError::missing_field(field));
        }
    }

    let ts = int_value(&entry["dt"], "dt")?;
    let forecast_at = DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| WeatherError::invalid_field("dt", "timestamp out of range"))?;

    let description = description_of(&entry["weather"])?;

    build_observation(
        city.to_string(),
        country.to_string(),
        description,
        entry,
        Some(forecast_at),
    )
}

/// Assemble an observation from the shared metric sections of `data`
/// (`main`, `wind`, `clouds`), stamping it with the current time.
fn build_observation(
    city: String,
    country: String,
    description: String,
    data: &Value,
    forecast_at: Option<DateTime<Utc>>,
) -> Result<WeatherObservation, WeatherError> {
    let main = &data["main"];
    let wind = &data["wind"];
    let clouds = &data["clouds"];

    Ok(WeatherObservation {
        id: None,
        city,
        country,
        temperature: num_or_zero(main, "temp")?,
        feels_like: num_or_zero(main, "feels_like")?,
        temp_min: num_or_zero(main, "temp_min")?,
        temp_max: num_or_zero(main, "temp_max")?,
        pressure: uint_or_zero(main, "pressure")?,
        humidity: uint_or_zero(main, "humidity")?,
        description,
        wind_speed: num_or_zero(wind, "speed")?,
        clouds: uint_or_zero(clouds, "all")?,
        fetched_at: Utc::now(),
        forecast_at,
    })
}

fn country_of(section: &Value) -> String {
    match section.get("country").and_then(Value::as_str) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => UNKNOWN_COUNTRY.to_string(),
    }
}

/// First entry of the condition list; its description falls back to the
/// placeholder when absent or empty.
fn description_of(conditions: &Value) -> Result<String, WeatherError> {
    let list = conditions
        .as_array()
        .ok_or_else(|| WeatherError::invalid_field("weather", "expected an array"))?;
    let first = list
        .first()
        .ok_or_else(|| WeatherError::invalid_field("weather", "no condition entries"))?;

    Ok(match first.get("description").and_then(Value::as_str) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => NO_DESCRIPTION.to_string(),
    })
}

fn string_field(data: &Value, key: &str) -> Result<String, WeatherError> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WeatherError::invalid_field(key, "expected a string"))
}

/// Float leaf with a zero default. Numbers and numeric strings coerce;
/// anything else is a malformed payload.
fn num_or_zero(section: &Value, key: &str) -> Result<f64, WeatherError> {
    match section.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| WeatherError::invalid_field(key, "not a finite number")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| WeatherError::invalid_field(key, format!("cannot coerce '{s}' to a number"))),
        Some(other) => Err(WeatherError::invalid_field(
            key,
            format!("cannot coerce {other} to a number"),
        )),
    }
}

/// Unsigned integer leaf with a zero default. Fractional values truncate,
/// negatives and out-of-range values fail.
fn uint_or_zero<T>(section: &Value, key: &str) -> Result<T, WeatherError>
where
    T: TryFrom<u64>,
{
    let raw = match section.get(key) {
        None | Some(Value::Null) => 0,
        Some(value) => int_value(value, key)?
            .try_into()
            .map_err(|_| WeatherError::invalid_field(key, "expected a non-negative integer"))?,
    };

    T::try_from(raw).map_err(|_| WeatherError::invalid_field(key, "value out of range"))
}

fn int_value(value: &Value, key: &str) -> Result<i64, WeatherError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                Ok(f as i64)
            } else {
                Err(WeatherError::invalid_field(key, "not an integer"))
            }
        }
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| WeatherError::invalid_field(key, format!("cannot coerce '{s}' to an integer"))),
        other => Err(WeatherError::invalid_field(
            key,
            format!("cannot coerce {other} to an integer"),
        )),
    }
}
