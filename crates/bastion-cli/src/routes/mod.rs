//! Route trees mounted by the binary.

mod status;

use aide::axum::ApiRouter;
use bastion_server::bootstrap::MountContext;
use bastion_server::service::AppState;

/// Builds the routes mounted under the API prefix.
pub fn routes(context: MountContext) -> ApiRouter<AppState> {
    tracing::debug!(
        target: crate::TRACING_TARGET_SERVER_STARTUP,
        prefix = context.prefix(),
        data_store = context.data_store().name(),
        "mounting routes"
    );

    ApiRouter::new().merge(status::routes())
}
