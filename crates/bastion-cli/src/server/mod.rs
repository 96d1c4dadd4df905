//! HTTP server startup with graceful shutdown.

mod error;
mod http_server;
mod shutdown;

use bastion_server::bootstrap::ServerInstance;
pub use error::{ServerError, ServerResult};
use http_server::serve_http;

use crate::config::ServerConfig;

/// Serves a bootstrapped instance on the configured address.
pub async fn serve(instance: ServerInstance, config: ServerConfig) -> ServerResult<()> {
    serve_http(instance, config).await
}
