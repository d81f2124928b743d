//! Averaging of readings across several providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AggregateError, ProviderError},
    provider::TemperatureProvider,
};

/// What to do when one provider fails during an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure and return its error. Remaining providers
    /// are not queried.
    #[default]
    Abort,
    /// Skip failing providers and average whatever readings succeeded.
    Continue,
}

impl TryFrom<&str> for FailurePolicy {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err(anyhow::anyhow!(
                "Unknown failure policy '{value}'. Expected 'abort' or 'continue'."
            )),
        }
    }
}

/// An ordered, non-empty list of providers queried one after another.
#[derive(Debug)]
pub struct Aggregator {
    providers: Vec<Box<dyn TemperatureProvider>>,
    policy: FailurePolicy,
}

impl Aggregator {
    pub fn new(providers: Vec<Box<dyn TemperatureProvider>>) -> Result<Self, AggregateError> {
        if providers.is_empty() {
            return Err(AggregateError::NoProviders);
        }

        Ok(Self { providers, policy: FailurePolicy::default() })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl TemperatureProvider for Aggregator {
    fn name(&self) -> &str {
        "aggregate"
    }

    async fn temperature(&self, city: &str) -> Result<f64, ProviderError> {
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut last_err = None;

        for provider in &self.providers {
            match provider.temperature(city).await {
                Ok(kelvin) => {
                    sum += kelvin;
                    count += 1;
                }
                Err(err) => match self.policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Continue => {
                        tracing::warn!(provider = provider.name(), %city, error = %err, "skipping failed provider");
                        last_err = Some(err);
                    }
                },
            }
        }

        // The list is never empty, so zero readings means an error was recorded.
        if let (0, Some(err)) = (count, last_err) {
            return Err(err);
        }

        let avg = sum / count as f64;
        tracing::debug!(%city, readings = count, "average {avg:.2}");

        Ok(avg)
    }
}
