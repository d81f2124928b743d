use crate::{
    Config,
    aggregate::Aggregator,
    error::ProviderError,
    provider::{openweather::OpenWeatherProvider, wunderground::WundergroundProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug};

pub mod openweather;
pub mod wunderground;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    Wunderground,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::Wunderground => "wunderground",
        }
    }

    /// Registry order; the aggregator queries providers in this order.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::Wunderground]
    }

    /// Name of the environment variable carrying this provider's API key.
    pub fn api_key_env_var(&self) -> String {
        format!("MULTIWEATHER_{}_API_KEY", self.as_str().to_uppercase())
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "wunderground" => Ok(ProviderId::Wunderground),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, wunderground."
            )),
        }
    }
}

/// Something that can report the current temperature of a city, in Kelvin.
#[async_trait]
pub trait TemperatureProvider: Send + Sync + Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn temperature(&self, city: &str) -> Result<f64, ProviderError>;
}

/// Build the HTTP client shared by every provider, with the configured timeout.
pub fn http_client(config: &Config) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: Client,
) -> anyhow::Result<Box<dyn TemperatureProvider>> {
    let provider_cfg = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `multiweather configure {id}` or set {}.",
            id.api_key_env_var()
        )
    })?;

    let api_key = provider_cfg.api_key.clone();
    let base_url = provider_cfg.base_url.clone();

    let boxed: Box<dyn TemperatureProvider> = match id {
        ProviderId::OpenWeather => {
            let provider = OpenWeatherProvider::new(api_key, http);
            Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderId::Wunderground => {
            let provider = WundergroundProvider::new(api_key, http);
            Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
    };

    Ok(boxed)
}

/// Every configured provider, in registry order.
pub fn providers_from_config(config: &Config) -> anyhow::Result<Vec<Box<dyn TemperatureProvider>>> {
    let http = http_client(config)?;

    ProviderId::all()
        .iter()
        .filter(|id| config.is_provider_configured(**id))
        .map(|id| provider_from_config(*id, config, http.clone()))
        .collect()
}

/// Construct the aggregator over all configured providers.
pub fn aggregator_from_config(config: &Config) -> anyhow::Result<Aggregator> {
    let providers = providers_from_config(config)?;
    let aggregator = Aggregator::new(providers)?.with_policy(config.failure_policy);

    tracing::info!(
        providers = ?aggregator.provider_names(),
        policy = ?config.failure_policy,
        "aggregator ready"
    );

    Ok(aggregator)
}

/// Send `request` and return the full body of a successful response.
///
/// The response is consumed here whether or not the status is a success, so
/// the connection is released before any decoding happens.
pub(crate) async fn fetch_body(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    // reqwest errors render the request URL, and the URL carries the API key.
    let transport = |source: reqwest::Error| ProviderError::Transport {
        provider: provider.to_string(),
        source: source.without_url(),
    };

    let res = request.send().await.map_err(transport)?;
    let status = res.status();
    let body = res.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status,
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: &str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|source| ProviderError::Decode { provider: provider.to_string(), source })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
