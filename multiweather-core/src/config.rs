use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{aggregate::FailurePolicy, provider::ProviderId};

pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const ENV_LISTEN: &str = "MULTIWEATHER_LISTEN";
pub const ENV_TIMEOUT_SECS: &str = "MULTIWEATHER_TIMEOUT_SECS";
pub const ENV_FAILURE_POLICY: &str = "MULTIWEATHER_FAILURE_POLICY";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's public host, e.g. to point at a mock server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub listen: SocketAddr,

    /// Timeout applied to every upstream request.
    pub request_timeout_secs: u64,

    pub failure_policy: FailurePolicy,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            failure_policy: FailurePolicy::default(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "multiweather", "multiweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply overrides looked up through `lookup`. Unset or empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(listen) = get(ENV_LISTEN) {
            self.listen = listen
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_LISTEN} value '{listen}'"))?;
        }

        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_TIMEOUT_SECS} value '{secs}'"))?;
        }

        if let Some(policy) = get(ENV_FAILURE_POLICY) {
            self.failure_policy = FailurePolicy::try_from(policy.trim())
                .with_context(|| format!("Invalid {ENV_FAILURE_POLICY} value"))?;
        }

        for id in ProviderId::all() {
            if let Some(key) = get(&id.api_key_env_var()) {
                self.upsert_provider_api_key(*id, key.trim().to_string());
            }
        }

        self.validate()
    }

    /// A zero timeout would fail every upstream call immediately.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Set or replace a provider API key, keeping any configured base URL.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        match self.providers.get_mut(provider_id.as_str()) {
            Some(cfg) => cfg.api_key = api_key,
            None => {
                self.providers
                    .insert(provider_id.as_str().to_string(), ProviderConfig { api_key, base_url: None });
            }
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some_and(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();

        assert_eq!(cfg.listen, DEFAULT_LISTEN);
        assert_eq!(cfg.listen.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.failure_policy, FailurePolicy::Abort);
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
        assert!(!cfg.is_provider_configured(ProviderId::Wunderground));
    }

    #[test]
    fn upsert_keeps_base_url() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "wunderground".into(),
            ProviderConfig { api_key: "OLD".into(), base_url: Some("http://mock".into()) },
        );

        cfg.upsert_provider_api_key(ProviderId::Wunderground, "NEW".into());

        let provider = cfg.provider_config(ProviderId::Wunderground).unwrap();
        assert_eq!(provider.api_key, "NEW");
        assert_eq!(provider.base_url.as_deref(), Some("http://mock"));
    }

    #[test]
    fn empty_api_key_is_not_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, String::new());
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
            failure_policy = "continue"

            [providers.openweather]
            api_key = "abc"
            base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.failure_policy, FailurePolicy::Continue);
        assert_eq!(cfg.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("abc"));
        assert_eq!(
            cfg.provider_config(ProviderId::OpenWeather).unwrap().base_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn save_and_load_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.request_timeout_secs = 3;
        cfg.upsert_provider_api_key(ProviderId::Wunderground, "W_KEY".into());
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "listen = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("request_timeout_secs must be at least 1"));
    }

    #[test]
    fn zero_timeout_override_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg.apply_overrides(env(&[(ENV_TIMEOUT_SECS, "0")])).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs must be at least 1"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_overrides(env(&[
            (ENV_LISTEN, "127.0.0.1:9090"),
            (ENV_TIMEOUT_SECS, "2"),
            (ENV_FAILURE_POLICY, "continue"),
            ("MULTIWEATHER_OPENWEATHER_API_KEY", "from-env"),
            ("MULTIWEATHER_WUNDERGROUND_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(cfg.listen.to_string(), "127.0.0.1:9090");
        assert_eq!(cfg.request_timeout_secs, 2);
        assert_eq!(cfg.failure_policy, FailurePolicy::Continue);
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("from-env"));
        assert!(!cfg.is_provider_configured(ProviderId::Wunderground));
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let mut cfg = Config::default();
        let err = cfg.apply_overrides(env(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));

        let err = cfg.apply_overrides(env(&[(ENV_LISTEN, "nowhere")])).unwrap_err();
        assert!(err.to_string().contains(ENV_LISTEN));
    }
}
