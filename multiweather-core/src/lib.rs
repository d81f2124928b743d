//! Core library for the `multiweather` service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers, one adapter per upstream
//! - The aggregator averaging readings across providers
//! - Shared domain models (the weather report payload)
//!
//! It is used by `multiweather-server`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use aggregate::{Aggregator, FailurePolicy};
pub use config::{Config, ProviderConfig};
pub use error::{AggregateError, ProviderError};
pub use model::{WeatherReport, celsius_to_kelvin};
pub use provider::{ProviderId, TemperatureProvider, aggregator_from_config};
