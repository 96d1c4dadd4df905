use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::Router;
use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;

use crate::bootstrap::BootstrapStage;
use crate::service::ConfigBundle;

/// A fully assembled server, ready to be served.
///
/// Every registration is already applied; the instance exposes no way to
/// attach further middleware.
#[must_use = "the server does nothing unless it is served"]
pub struct ServerInstance {
    router: Router,
    openapi: Arc<OpenApi>,
    config: Arc<ConfigBundle>,
    stages: Vec<BootstrapStage>,
    documentation_errors: usize,
}

impl ServerInstance {
    pub(crate) fn new(
        router: Router,
        openapi: Arc<OpenApi>,
        config: Arc<ConfigBundle>,
        stages: Vec<BootstrapStage>,
        documentation_errors: usize,
    ) -> Self {
        Self {
            router,
            openapi,
            config,
            stages,
            documentation_errors,
        }
    }

    /// Returns the published OpenAPI document.
    pub fn openapi(&self) -> &OpenApi {
        &self.openapi
    }

    /// Returns the configuration the server was built from.
    pub fn config(&self) -> &ConfigBundle {
        &self.config
    }

    /// Returns the completed startup stages in execution order.
    pub fn stages(&self) -> &[BootstrapStage] {
        &self.stages
    }

    /// Returns how many operations could not be fully documented.
    pub fn documentation_errors(&self) -> usize {
        self.documentation_errors
    }

    /// Returns the application router.
    ///
    /// Without connection info the transport address is unknown and client
    /// address resolution relies on proxy headers alone.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Returns a make-service exposing the peer address to the client IP
    /// resolver.
    pub fn into_make_service(self) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
        self.router
            .into_make_service_with_connect_info::<SocketAddr>()
    }
}

impl fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInstance")
            .field("stages", &self.stages)
            .field("documentation_errors", &self.documentation_errors)
            .finish_non_exhaustive()
    }
}
