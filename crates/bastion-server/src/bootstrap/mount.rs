use std::fmt;
use std::sync::Arc;

use aide::axum::ApiRouter;
use async_trait::async_trait;

use crate::Result;
use crate::service::{AppState, DataStore, MailService};

/// What a route tree receives when it is mounted.
#[derive(Clone)]
pub struct MountContext {
    prefix: &'static str,
    data_store: Arc<dyn DataStore>,
    mailer: Arc<dyn MailService>,
}

impl MountContext {
    pub(crate) fn new(
        prefix: &'static str,
        data_store: Arc<dyn DataStore>,
        mailer: Arc<dyn MailService>,
    ) -> Self {
        Self {
            prefix,
            data_store,
            mailer,
        }
    }

    /// Returns the prefix the route tree is nested under.
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Returns the data store handle.
    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.data_store
    }

    /// Returns the mail service handle.
    pub fn mailer(&self) -> &Arc<dyn MailService> {
        &self.mailer
    }
}

impl fmt::Debug for MountContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountContext")
            .field("prefix", &self.prefix)
            .field("data_store", &self.data_store.name())
            .finish_non_exhaustive()
    }
}

/// Supplies the route tree mounted under the API prefix.
///
/// Routes are relative to the prefix: a route registered at `/status` is
/// served at `/api/status`. Handlers documented through `api_route` appear
/// in the published OpenAPI document.
#[async_trait]
pub trait RouteRegistrar: Send + Sync {
    /// Builds the route tree.
    async fn register(&self, context: MountContext) -> Result<ApiRouter<AppState>>;
}

#[async_trait]
impl<F> RouteRegistrar for F
where
    F: Fn(MountContext) -> ApiRouter<AppState> + Send + Sync,
{
    async fn register(&self, context: MountContext) -> Result<ApiRouter<AppState>> {
        Ok(self(context))
    }
}
