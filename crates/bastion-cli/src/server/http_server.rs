//! HTTP listener startup and lifecycle management.

use bastion_server::bootstrap::ServerInstance;
use tokio::net::TcpListener;

use super::shutdown::{ShutdownHandle, shutdown_signal};
use super::{ServerError, ServerResult};
use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Binds the configured address and serves the instance until shutdown.
///
/// After a shutdown signal, in-flight requests get the configured window to
/// finish. Connections still open afterwards are dropped.
pub async fn serve_http(instance: ServerInstance, server_config: ServerConfig) -> ServerResult<()> {
    let server_addr = server_config.server_addr();

    let listener = match TcpListener::bind(server_addr).await {
        Ok(listener) => listener,
        Err(listener_err) => {
            let error = ServerError::bind_error(server_addr, listener_err);
            tracing::error!(
                target: TRACING_TARGET_SERVER_STARTUP,
                addr = %server_addr,
                error = %error,
                suggestion = error.suggestion(),
                "failed to bind to address"
            );
            return Err(error);
        }
    };

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        stages = instance.stages().len(),
        documented_paths = instance.openapi().paths.as_ref().map_or(0, |paths| paths.paths.len()),
        "server is ready and listening for connections"
    );

    if server_config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "server is bound to all interfaces, ensure firewall rules are properly configured"
        );
    }

    let handle = ShutdownHandle::new();
    let signal = handle.clone().watch(shutdown_signal());
    let server = async move {
        axum::serve(listener, instance.into_make_service())
            .with_graceful_shutdown(signal)
            .await
    };

    tokio::select! {
        result = server => result.map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %err,
                "server encountered an error"
            );
            ServerError::Runtime(err)
        })?,
        () = handle.deadline(server_config.shutdown_timeout()) => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = server_config.shutdown_timeout,
                "shutdown window elapsed, dropping open connections"
            );
            return Ok(());
        }
    }

    tracing::info!(target: TRACING_TARGET_SERVER_SHUTDOWN, "server shut down gracefully");
    Ok(())
}
