//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig   # Host, port, shutdown
//! └── bundle: ConfigBundle   # Cookies, rate limit, proxies, CORS, docs, headers
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod server;

use std::process;

use anyhow::Context;
use bastion_server::service::ConfigBundle;
use clap::Parser;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "bastion")]
#[command(about = "Bastion API server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Everything the bootstrap pipeline consumes.
    #[clap(flatten)]
    pub bundle: ConfigBundle,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so clap's `env` fallbacks can see it.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates the server section.
    ///
    /// The bundle is validated by the bootstrap pipeline itself, so a bad
    /// value there surfaces as a startup failure naming its stage.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "build information"
        );

        self.server.log();

        let bundle = &self.bundle;
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cookie_secret_set = bundle.cookie.cookie_secret.is_some(),
            protected_cookies = ?bundle.cookie.protected_cookies,
            rate_limit_max = bundle.rate_limit.max_requests,
            rate_limit_window_secs = bundle.rate_limit.window_secs,
            trusted_headers = ?bundle.proxy.trusted_headers,
            trusted_proxies = bundle.proxy.trusted_proxies.len(),
            cors_origins = ?bundle.cors.allowed_origins,
            cors_credentials = bundle.cors.allow_credentials,
            openapi_path = %bundle.openapi.open_api_json,
            scalar_path = %bundle.openapi.scalar_ui,
            "bootstrap configuration"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_bootstrap_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "bastion",
            "--cookie-secret",
            "s3cr3t",
            "--rate-limit-max",
            "5",
            "--trusted-proxies",
            "10.0.0.0/8,192.0.2.1",
            "--trusted-headers",
            "x-forwarded-for",
        ])?;

        assert_eq!(cli.bundle.cookie.cookie_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(cli.bundle.rate_limit.max_requests, 5);
        assert_eq!(cli.bundle.proxy.trusted_proxies.len(), 2);
        assert_eq!(cli.bundle.proxy.trusted_headers.len(), 1);
        cli.bundle.validate()?;
        Ok(())
    }
}
