#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod routes;
mod server;

use std::process;

use anyhow::Context;
use bastion_server::bootstrap::{StartupFailure, start};
use bastion_server::service::{Dependencies, LogMailer, MemoryStore};

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "bastion_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "bastion_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "bastion_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if is_logged_startup_failure(&error) {
        process::exit(1);
    }

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Startup failures are already logged by the bootstrap, inside its span.
fn is_logged_startup_failure(error: &anyhow::Error) -> bool {
    error.downcast_ref::<StartupFailure>().is_some()
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let span = tracing::info_span!(
        target: TRACING_TARGET_SERVER_STARTUP,
        "bootstrap",
        version = env!("CARGO_PKG_VERSION")
    );
    let dependencies =
        Dependencies::new(MemoryStore::new(), LogMailer::new()).with_span(span);

    let instance = start(dependencies, cli.bundle, routes::routes)
        .await
        .context("server startup failed")?;

    server::serve(instance, cli.server).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bastion_server::bootstrap::{BootstrapStage, start};
    use bastion_server::service::ConfigBundle;

    use super::*;

    #[tokio::test]
    async fn startup_failure_is_not_logged_again() -> anyhow::Result<()> {
        let dependencies = Dependencies::new(MemoryStore::new(), LogMailer::new());
        let Err(failure) = start(dependencies, ConfigBundle::default(), routes::routes).await else {
            anyhow::bail!("startup succeeded without a cookie secret");
        };
        assert_eq!(failure.stage(), BootstrapStage::Configuration);

        let error = anyhow::Error::new(failure).context("server startup failed");
        assert!(is_logged_startup_failure(&error));
        assert!(!is_logged_startup_failure(&anyhow::anyhow!("bind failed")));
        Ok(())
    }
}
