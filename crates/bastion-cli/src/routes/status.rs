//! Service status endpoint.

use std::sync::Arc;

use aide::axum::ApiRouter;
use aide::axum::routing::get_with;
use aide::transform::TransformOperation;
use axum::extract::State;
use bastion_server::extract::Json;
use bastion_server::middleware::RouteRateLimit;
use bastion_server::service::{AppState, DataStore, RateLimitPolicy};
use schemars::JsonSchema;
use serde::Serialize;

/// Requests per minute allowed on the status endpoint for one client.
const STATUS_REQUESTS_PER_MINUTE: u32 = 120;

/// Health of the service and its data store.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// `healthy` when the data store answers, `degraded` otherwise.
    pub status: ServiceStatus,
    /// Name of the data store backing the service.
    pub data_store: String,
    /// Server version.
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

async fn status(State(data_store): State<Arc<dyn DataStore>>) -> Json<StatusResponse> {
    let status = match data_store.ping().await {
        Ok(()) => ServiceStatus::Healthy,
        Err(error) => {
            tracing::warn!(
                data_store = data_store.name(),
                error = %error,
                "data store probe failed"
            );
            ServiceStatus::Degraded
        }
    };

    Json(StatusResponse {
        status,
        data_store: data_store.name().to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

fn status_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Service status")
        .description("Reports whether the service and its data store are reachable.")
        .response::<200, Json<StatusResponse>>()
}

pub fn routes() -> ApiRouter<AppState> {
    ApiRouter::new()
        .api_route("/status", get_with(status, status_docs))
        .with_rate_limit(RateLimitPolicy::per_minute(
            "status",
            STATUS_REQUESTS_PER_MINUTE,
        ))
}
