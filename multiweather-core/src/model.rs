use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Offset between the Celsius and Kelvin scales.
pub const CELSIUS_KELVIN_OFFSET: f64 = 273.15;

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + CELSIUS_KELVIN_OFFSET
}

/// Body of a successful `/weather/<city>` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    /// Averaged temperature in Kelvin.
    pub temp: f64,
    /// Wall-clock time spent aggregating, e.g. `"412.3ms"`.
    pub took: String,
}

impl WeatherReport {
    pub fn new(city: impl Into<String>, temp: f64, took: Duration) -> Self {
        Self { city: city.into(), temp, took: format!("{took:?}") }
    }
}
