//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The upstream fetch client and response validation
//! - The freshness-gated SQLite store consulted before any network call
//! - Shared domain model and error taxonomy
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod validate;

pub use client::WeatherClient;
pub use config::Config;
pub use error::WeatherError;
pub use model::WeatherObservation;
pub use store::{ListFilter, WeatherStore};
