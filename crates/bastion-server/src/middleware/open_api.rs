//! OpenAPI document generation with Scalar UI.
//!
//! Route metadata accumulates in the aide [`ApiRouter`] while route trees are
//! mounted. [`DocsPublisher`] adds the documentation routes and, once the
//! server is ready, finalizes the document and serves it as JSON.
//!
//! [`ApiRouter`]: aide::axum::ApiRouter

use std::sync::Arc;

use aide::axum::ApiRouter;
use aide::openapi::{Info, OpenApi};
use aide::scalar::Scalar;
use axum::Extension;
use axum::response::{IntoResponse, Response};
use axum::routing::{Router, get};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::utility::TRACING_TARGET_OPENAPI;
use crate::{Error, Result};

/// Paths under which the documentation is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct OpenApiConfig {
    /// Path which exposes the OpenAPI JSON document.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_JSON_PATH", default_value = "/api/docs/json")
    )]
    pub open_api_json: String,

    /// Path which exposes the Scalar API reference UI.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_SCALAR_PATH", default_value = "/api/docs")
    )]
    pub scalar_ui: String,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            open_api_json: "/api/docs/json".to_owned(),
            scalar_ui: "/api/docs".to_owned(),
        }
    }
}

impl OpenApiConfig {
    /// Validates that both paths are absolute and distinct.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.open_api_json, &self.scalar_ui] {
            if !path.starts_with('/') {
                return Err(Error::config(format!(
                    "documentation path '{path}' must start with '/'"
                )));
            }
        }

        if self.open_api_json == self.scalar_ui {
            return Err(Error::config(
                "documentation JSON and UI paths must be different",
            ));
        }

        Ok(())
    }
}

/// Publishes the OpenAPI document and its UI.
#[derive(Debug, Clone)]
pub struct DocsPublisher {
    config: OpenApiConfig,
    info: Info,
}

impl DocsPublisher {
    /// Creates a publisher with the default API info.
    pub fn new(config: OpenApiConfig) -> Self {
        let info = Info {
            title: "Bastion API".to_owned(),
            summary: Some("HTTP API served behind the Bastion bootstrap pipeline".to_owned()),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            ..Info::default()
        };

        Self::with_info(config, info)
    }

    /// Creates a publisher with custom API info.
    pub fn with_info(config: OpenApiConfig, info: Info) -> Self {
        Self { config, info }
    }

    /// Returns the configured paths.
    pub fn config(&self) -> &OpenApiConfig {
        &self.config
    }

    /// Returns the documentation routes.
    ///
    /// The JSON route answers only after [`publish`] has attached the
    /// finished document.
    ///
    /// [`publish`]: Self::publish
    pub fn routes<S>(&self) -> ApiRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let scalar = Scalar::new(&self.config.open_api_json);
        ApiRouter::new()
            .route(&self.config.scalar_ui, scalar.axum_route())
            .route(&self.config.open_api_json, get(serve_openapi))
    }

    /// Finalizes the document from the accumulated routes.
    pub fn publish<S>(&self, api: ApiRouter<S>) -> (Router<S>, Arc<OpenApi>)
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut openapi = OpenApi {
            info: self.info.clone(),
            ..OpenApi::default()
        };

        let router = api.finish_api(&mut openapi);
        let openapi = Arc::new(openapi);

        tracing::info!(
            target: TRACING_TARGET_OPENAPI,
            paths = openapi.paths.as_ref().map_or(0, |paths| paths.paths.len()),
            json = %self.config.open_api_json,
            ui = %self.config.scalar_ui,
            "documentation published"
        );

        (router.layer(Extension(openapi.clone())), openapi)
    }
}

async fn serve_openapi(Extension(api): Extension<Arc<OpenApi>>) -> Response {
    axum::Json(api.as_ref()).into_response()
}

#[cfg(test)]
mod tests {
    use aide::axum::routing::get as api_get;
    use axum_test::TestServer;

    use super::*;

    async fn ping() -> String {
        "pong".to_owned()
    }

    #[tokio::test]
    async fn published_document_lists_routes() -> anyhow::Result<()> {
        let publisher = DocsPublisher::new(OpenApiConfig::default());
        let api = publisher.routes::<()>().api_route("/api/ping", api_get(ping));

        let (router, openapi) = publisher.publish(api);
        assert_eq!(openapi.info.title, "Bastion API");

        let server = TestServer::new(router)?;
        let response = server.get("/api/docs/json").await;
        response.assert_status_ok();

        let document: serde_json::Value = response.json();
        assert!(document["paths"]["/api/ping"].is_object());

        server.get("/api/docs").await.assert_status_ok();
        Ok(())
    }

    #[test]
    fn rejects_relative_or_duplicate_paths() {
        let relative = OpenApiConfig {
            open_api_json: "docs.json".to_owned(),
            ..OpenApiConfig::default()
        };
        assert!(relative.validate().is_err());

        let duplicate = OpenApiConfig {
            open_api_json: "/api/docs".to_owned(),
            ..OpenApiConfig::default()
        };
        assert!(duplicate.validate().is_err());
        assert!(OpenApiConfig::default().validate().is_ok());
    }
}
