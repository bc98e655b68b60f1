//! Remote fetch client for the upstream weather API.
//!
//! One blocking (awaited) request at a time, a fixed deadline, no retries:
//! a failed attempt surfaces immediately as one [`WeatherError`] variant.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::{API_TIMEOUT_SECS, DEFAULT_BASE_URL};
use crate::error::WeatherError;
use crate::model::WeatherObservation;
use crate::validate;

/// Upstream delivers 3-hour-spaced forecast intervals, 8 per day, capped at
/// 5 days.
const INTERVALS_PER_DAY: u32 = 8;
const MAX_INTERVALS: u32 = 40;

#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherClient {
    /// Build a client over the real upstream endpoint.
    ///
    /// The credential is checked once here, not per call; an empty key fails
    /// construction with [`WeatherError::MissingCredential`].
    pub fn new(api_key: impl Into<String>) -> Result<Self, WeatherError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(WeatherError::MissingCredential);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .map_err(|e| WeatherError::Connection(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    /// Point the client at a different upstream, e.g. a stub server in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch and validate the current weather for a city.
    pub async fn fetch_current(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<WeatherObservation, WeatherError> {
        let location = compose_location(city, country);
        let url = format!("{}/weather", self.base_url);

        let body = self
            .get_json(
                &url,
                &[
                    ("q", location.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                ],
                &location,
            )
            .await?;

        validate::parse_current(&body)
    }

    /// Fetch and validate a multi-day forecast, `days` in 1..=5.
    ///
    /// Returns the surviving intervals ordered by forecast-target timestamp
    /// ascending, as delivered upstream.
    pub async fn fetch_forecast(
        &self,
        city: &str,
        country: Option<&str>,
        days: u8,
    ) -> Result<Vec<WeatherObservation>, WeatherError> {
        let location = compose_location(city, country);
        let cnt = interval_count(days).to_string();
        let url = format!("{}/forecast", self.base_url);

        let body = self
            .get_json(
                &url,
                &[
                    ("q", location.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                    ("cnt", cnt.as_str()),
                ],
                &location,
            )
            .await?;

        validate::parse_forecast(&body)
    }

    /// Issue one GET and map transport, HTTP and decode failures onto the
    /// error taxonomy.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        location: &str,
    ) -> Result<Value, WeatherError> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = res.status();
        let text = res.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => WeatherError::NotFound(location.to_string()),
                StatusCode::UNAUTHORIZED => WeatherError::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => WeatherError::RateLimited,
                other => WeatherError::Upstream(other.as_u16()),
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| WeatherError::MalformedPayload(format!("invalid encoding: {e}")))
    }
}

/// `"city"` or `"city,CC"` when a country code is supplied.
fn compose_location(city: &str, country: Option<&str>) -> String {
    match country {
        Some(code) => format!("{city},{code}"),
        None => city.to_string(),
    }
}

fn interval_count(days: u8) -> u32 {
    (u32::from(days.clamp(1, 5)) * INTERVALS_PER_DAY).min(MAX_INTERVALS)
}

fn classify_transport(e: reqwest::Error) -> WeatherError {
    if e.is_timeout() {
        WeatherError::Timeout
    } else {
        WeatherError::Connection(e.to_string())
    }
}
