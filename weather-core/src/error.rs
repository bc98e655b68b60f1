use thiserror::Error;

use crate::config::API_TIMEOUT_SECS;

/// Everything that can go wrong on the fetch-validate-cache path.
///
/// The fetch taxonomy is exhaustive and every variant must stay
/// distinguishable to callers; none of these are retried or masked by a
/// stale cache row.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No API key available. Checked once at client construction, not per call.
    #[error(
        "No API key provided. Set OPENWEATHER_API_KEY or run `weather configure`."
    )]
    MissingCredential,

    /// The outbound call exceeded the fixed request deadline.
    #[error(
        "Request timed out after {} seconds. Please check your internet connection and try again.",
        API_TIMEOUT_SECS
    )]
    Timeout,

    /// Transport-level failure before any HTTP response (DNS, refusal, reset).
    #[error("Network connection failed: {0}. Please check your internet connection.")]
    Connection(String),

    /// Upstream reports no match for the requested location (HTTP 404).
    #[error("Location '{0}' not found.")]
    NotFound(String),

    /// Bad or missing credential (HTTP 401).
    #[error("Invalid API key. Please check your configuration.")]
    Unauthorized,

    /// HTTP 429.
    #[error("API rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Any other non-2xx HTTP status.
    #[error("Upstream HTTP error {0}")]
    Upstream(u16),

    /// Undecodable or schema-invalid response body. Decoding failures carry
    /// an "invalid encoding" message, schema failures a "missing required
    /// field" / "invalid field" message.
    #[error("Malformed response: {0}")]
    MalformedPayload(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl WeatherError {
    pub(crate) fn missing_field(name: &str) -> Self {
        Self::MalformedPayload(format!("missing required field: {name}"))
    }

    pub(crate) fn invalid_field(name: &str, detail: impl std::fmt::Display) -> Self {
        Self::MalformedPayload(format!("invalid field '{name}': {detail}"))
    }
}
