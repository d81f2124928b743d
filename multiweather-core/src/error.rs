use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single provider call.
///
/// The aggregator hands these back unchanged, so the message always names the
/// provider that failed. Messages never carry the request URL, which holds the
/// provider's API key.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream could not be reached or the body could not be read.
    #[error("{provider}: request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("{provider}: upstream returned status {status}: {body}")]
    Status {
        provider: String,
        status: StatusCode,
        body: String,
    },

    /// The body did not match the JSON shape the adapter expects.
    #[error("{provider}: unexpected response body: {source}")]
    Decode {
        provider: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider}: invalid endpoint url: {reason}")]
    InvalidUrl { provider: String, reason: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Decode { provider, .. }
            | ProviderError::InvalidUrl { provider, .. } => provider,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error(
        "No weather providers configured.\n\
         Hint: run `multiweather configure <provider>` or set MULTIWEATHER_<PROVIDER>_API_KEY."
    )]
    NoProviders,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_provider_and_status() {
        let err = ProviderError::Status {
            provider: "openweather".into(),
            status: StatusCode::NOT_FOUND,
            body: "city not found".into(),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("openweather:"));
        assert!(msg.contains("404"));
        assert!(msg.contains("city not found"));
        assert_eq!(err.provider(), "openweather");
    }

    #[test]
    fn decode_error_keeps_serde_source() {
        let source = serde_json::from_str::<f64>("{}").unwrap_err();
        let err = ProviderError::Decode { provider: "wunderground".into(), source };

        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.provider(), "wunderground");
        assert!(err.to_string().starts_with("wunderground: unexpected response body"));
    }
}
