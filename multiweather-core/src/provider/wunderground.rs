use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{error::ProviderError, model::celsius_to_kelvin};

use super::{TemperatureProvider, decode, fetch_body};

pub const DEFAULT_BASE_URL: &str = "http://api.wunderground.com";

/// Weather Underground conditions. Reports Celsius, converted to Kelvin here.
#[derive(Debug, Clone)]
pub struct WundergroundProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WundergroundProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/api/<key>/conditions/q/<city>.json`, with the city encoded as
    /// a single path segment.
    fn endpoint(&self, city: &str) -> Result<Url, ProviderError> {
        let invalid = |reason: String| ProviderError::InvalidUrl {
            provider: self.name().to_string(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("'{}' cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["api", self.api_key.as_str(), "conditions", "q"])
            .push(&format!("{city}.json"));

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct WuObservation {
    temp_c: f64,
}

#[derive(Debug, Deserialize)]
struct WuConditionsResponse {
    current_observation: WuObservation,
}

#[async_trait]
impl TemperatureProvider for WundergroundProvider {
    fn name(&self) -> &str {
        "wunderground"
    }

    async fn temperature(&self, city: &str) -> Result<f64, ProviderError> {
        let url = self.endpoint(city)?;

        let body = fetch_body(self.name(), self.http.get(url)).await?;
        let parsed: WuConditionsResponse = decode(self.name(), &body)?;

        let kelvin = celsius_to_kelvin(parsed.current_observation.temp_c);
        tracing::info!("wunderground: {city}: {kelvin:.2}");

        Ok(kelvin)
    }
}
