use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ProviderError;

use super::{TemperatureProvider, decode, fetch_body};

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";

/// OpenWeatherMap current weather. Reports temperatures in Kelvin already.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http }
    }

    /// Point the provider at another host, e.g. a mock server in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/data/2.5/weather", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: Option<String>,
    main: OwMain,
}

#[async_trait]
impl TemperatureProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        "openweather"
    }

    async fn temperature(&self, city: &str) -> Result<f64, ProviderError> {
        let request = self
            .http
            .get(self.endpoint())
            .query(&[("APPID", self.api_key.as_str()), ("q", city)]);

        let body = fetch_body(self.name(), request).await?;
        let parsed: OwCurrentResponse = decode(self.name(), &body)?;

        let kelvin = parsed.main.temp;
        tracing::info!(
            location = parsed.name.as_deref().unwrap_or(city),
            "openweather: {city}: {kelvin:.2}"
        );

        Ok(kelvin)
    }
}
