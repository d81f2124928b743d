use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use multiweather_core::{
    Config, ProviderId, TemperatureProvider, aggregator_from_config, model::CELSIUS_KELVIN_OFFSET,
};

use crate::routes;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "multiweather", version, about = "City temperatures averaged across weather providers")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Listen address; overrides config and MULTIWEATHER_LISTEN.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Print the averaged temperature for a city once and exit.
    Show {
        /// City name as understood by the providers, e.g. "London".
        city: String,
    },

    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "wunderground".
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Serve { listen } => {
                let mut config = Config::load_from(&path)?.with_env_overrides()?;
                if let Some(listen) = listen {
                    config.listen = listen;
                }
                serve(config).await
            }
            Command::Show { city } => {
                let config = Config::load_from(&path)?.with_env_overrides()?;
                show(&config, &city).await
            }
            Command::Configure { provider } => configure(&path, &provider),
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let aggregator = Arc::new(aggregator_from_config(&config)?);

    let (addr, server) = warp::serve(routes::routes(aggregator))
        .try_bind_with_graceful_shutdown(config.listen, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .with_context(|| format!("Failed to bind {}", config.listen))?;

    tracing::info!(%addr, "listening");
    server.await;
    tracing::info!("shut down");

    Ok(())
}

async fn show(config: &Config, city: &str) -> anyhow::Result<()> {
    let aggregator = aggregator_from_config(config)?;

    let begin = Instant::now();
    let kelvin = aggregator.temperature(city).await?;

    println!(
        "{city}: {kelvin:.2} K ({:.2} °C), took {:?}",
        kelvin - CELSIUS_KELVIN_OFFSET,
        begin.elapsed()
    );

    Ok(())
}

fn configure(path: &Path, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_from(path)?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_help_message(&format!("Stored in {}", path.display()))
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key for '{id}' must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.to_string());
    config.save_to(path)?;

    println!("Saved API key for {id} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_with_listen_override() {
        let cli = Cli::try_parse_from(["multiweather", "serve", "--listen", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Command::Serve { listen } => assert_eq!(listen, Some("127.0.0.1:9000".parse().unwrap())),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["multiweather", "show", "London", "--config", "/tmp/mw.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mw.toml")));
        assert!(matches!(cli.command, Command::Show { city } if city == "London"));
    }

    #[test]
    fn configure_rejects_unknown_provider_before_prompting() {
        let dir = std::env::temp_dir().join("multiweather-cli-test.toml");
        let err = configure(&dir, "doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
