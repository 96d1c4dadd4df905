//! Ordered, fail-fast server startup.
//!
//! [`start`] runs the whole sequence. [`Bootstrap`] exposes the same steps
//! one at a time; its type parameter tracks the completed stage, so steps
//! cannot be skipped or reordered:
//!
//! ```text
//! new -> install_schema_adapter -> sign_cookies -> cors -> client_ip
//!     -> documentation -> rate_limit -> security_headers -> mount -> ready
//! ```
//!
//! Any failing step returns a [`StartupFailure`] naming its stage, and no
//! partially configured server is ever produced.

mod failure;
mod instance;
mod mount;
pub mod phase;
mod registration;
mod stage;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use aide::axum::ApiRouter;
use tracing::Instrument;

pub use self::failure::StartupFailure;
pub use self::instance::ServerInstance;
pub use self::mount::{MountContext, RouteRegistrar};
use self::phase::{
    ClientIpResolved, Configured, CookiesSigned, CorsApplied, Documented, Mounted, Prepared,
    RateLimited, SchemaInstalled, Secured,
};
use self::registration::{Registration, apply_all};
pub use self::stage::BootstrapStage;
use crate::handler;
use crate::middleware::{
    ClientIpResolver, DocsPublisher, RouterObservabilityExt, RouterRecoveryExt, SchemaAdapter,
    SignedCookies,
};
pub use crate::service::Dependencies;
use crate::service::{AppState, ConfigBundle, RateLimiter};
use crate::utility::TRACING_TARGET_BOOTSTRAP;
use crate::{API_PREFIX, Error};

/// Assembles and readies a server in the fixed registration order.
///
/// Runs inside the span supplied with the dependencies, or a fresh
/// `bootstrap` span. A failure is logged once, here, and returned.
pub async fn start(
    dependencies: Dependencies,
    config: ConfigBundle,
    routes: impl RouteRegistrar,
) -> Result<ServerInstance, StartupFailure> {
    let span = dependencies
        .span()
        .cloned()
        .unwrap_or_else(|| tracing::info_span!(target: TRACING_TARGET_BOOTSTRAP, "bootstrap"));

    let result = run(dependencies, config, routes)
        .instrument(span.clone())
        .await;

    if let Err(failure) = &result {
        span.in_scope(|| {
            tracing::error!(
                target: TRACING_TARGET_BOOTSTRAP,
                stage = %failure.stage(),
                error = %failure.error(),
                "server startup failed"
            );
        });
    }

    result
}

async fn run(
    dependencies: Dependencies,
    config: ConfigBundle,
    routes: impl RouteRegistrar,
) -> Result<ServerInstance, StartupFailure> {
    Bootstrap::new(dependencies, config)?
        .install_schema_adapter()?
        .sign_cookies()
        .await?
        .cors()
        .await?
        .client_ip()
        .await?
        .documentation()
        .await?
        .rate_limit()
        .await?
        .security_headers()
        .await?
        .mount(&routes)
        .await?
        .ready()
        .await
}

/// Shared across every stage of a bootstrap.
struct Context {
    config: Arc<ConfigBundle>,
    dependencies: Dependencies,
    registrations: Vec<Registration>,
    stages: Vec<BootstrapStage>,
    started: Instant,
}

impl Context {
    fn advance(&mut self, stage: BootstrapStage) {
        tracing::info!(
            target: TRACING_TARGET_BOOTSTRAP,
            stage = %stage,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "bootstrap stage completed"
        );
        self.stages.push(stage);
    }

    fn register(&mut self, registration: Registration) {
        let stage = registration.stage();
        self.registrations.push(registration);
        self.advance(stage);
    }
}

/// A server under construction, at stage `P`.
#[must_use = "a bootstrap does nothing until it reaches `ready`"]
pub struct Bootstrap<P> {
    context: Context,
    phase: P,
}

impl<P> Bootstrap<P> {
    /// Returns the validated configuration.
    pub fn config(&self) -> &ConfigBundle {
        &self.context.config
    }

    /// Returns the completed stages in execution order.
    pub fn stages(&self) -> &[BootstrapStage] {
        &self.context.stages
    }

    fn next<N>(self, phase: N) -> Bootstrap<N> {
        Bootstrap {
            context: self.context,
            phase,
        }
    }
}

impl Bootstrap<Configured> {
    /// Validates the configuration bundle before anything is attached.
    pub fn new(dependencies: Dependencies, config: ConfigBundle) -> Result<Self, StartupFailure> {
        config
            .validate()
            .map_err(|error| StartupFailure::new(BootstrapStage::Configuration, error))?;

        let mut context = Context {
            config: Arc::new(config),
            dependencies,
            registrations: Vec::new(),
            stages: Vec::new(),
            started: Instant::now(),
        };
        context.advance(BootstrapStage::Configuration);

        Ok(Self {
            context,
            phase: Configured,
        })
    }

    /// Installs the validation and serialization rules used by every route.
    pub fn install_schema_adapter(mut self) -> Result<Bootstrap<SchemaInstalled>, StartupFailure> {
        let schema = SchemaAdapter::new(&self.context.config.schema)
            .map_err(|error| StartupFailure::new(BootstrapStage::SchemaAdapter, error))?;

        schema.configure_generation();
        self.context.advance(BootstrapStage::SchemaAdapter);
        Ok(self.next(SchemaInstalled { schema }))
    }
}

impl Bootstrap<SchemaInstalled> {
    /// Registers signed cookie verification.
    pub async fn sign_cookies(mut self) -> Result<Bootstrap<CookiesSigned>, StartupFailure> {
        let cookies = SignedCookies::from_config(&self.context.config.cookie)
            .map_err(|error| StartupFailure::new(BootstrapStage::CookieSigning, error))?;

        let prepared = Prepared {
            schema: self.phase.schema,
            cookie_key: cookies.key().clone(),
        };

        self.context.register(Registration::CookieSigning(cookies));
        Ok(Bootstrap {
            context: self.context,
            phase: CookiesSigned { prepared },
        })
    }
}

impl Bootstrap<CookiesSigned> {
    /// Registers the cross-origin policy.
    pub async fn cors(mut self) -> Result<Bootstrap<CorsApplied>, StartupFailure> {
        let layer = self
            .context
            .config
            .cors
            .create_cors_layer()
            .map_err(|error| StartupFailure::new(BootstrapStage::Cors, error))?;

        self.context.register(Registration::Cors(layer));
        let prepared = self.phase.prepared.clone();
        Ok(self.next(CorsApplied { prepared }))
    }
}

impl Bootstrap<CorsApplied> {
    /// Registers client address resolution from trusted proxy headers.
    pub async fn client_ip(mut self) -> Result<Bootstrap<ClientIpResolved>, StartupFailure> {
        let resolver = ClientIpResolver::new(&self.context.config.proxy);

        self.context.register(Registration::ClientIp(resolver));
        let prepared = self.phase.prepared.clone();
        Ok(self.next(ClientIpResolved { prepared }))
    }
}

impl Bootstrap<ClientIpResolved> {
    /// Reserves the documentation routes; the document is published once ready.
    pub async fn documentation(mut self) -> Result<Bootstrap<Documented>, StartupFailure> {
        let docs = DocsPublisher::new(self.context.config.openapi.clone());

        self.context.advance(BootstrapStage::Documentation);
        let prepared = self.phase.prepared.clone();
        Ok(self.next(Documented { prepared, docs }))
    }
}

impl Bootstrap<Documented> {
    /// Registers the global rate limit, keyed by the resolved client address.
    pub async fn rate_limit(mut self) -> Result<Bootstrap<RateLimited>, StartupFailure> {
        let limiter = RateLimiter::new(self.context.config.rate_limit.policy());
        limiter.spawn_eviction();

        self.context.register(Registration::RateLimit(limiter));
        let Documented { prepared, docs } = self.phase;
        Ok(Bootstrap {
            context: self.context,
            phase: RateLimited { prepared, docs },
        })
    }
}

impl Bootstrap<RateLimited> {
    /// Registers the security response headers.
    pub async fn security_headers(mut self) -> Result<Bootstrap<Secured>, StartupFailure> {
        let headers = self
            .context
            .config
            .security_headers
            .to_headers()
            .map_err(|error| StartupFailure::new(BootstrapStage::SecurityHeaders, error))?;

        self.context.register(Registration::SecurityHeaders(headers));
        let RateLimited { prepared, docs } = self.phase;
        Ok(Bootstrap {
            context: self.context,
            phase: Secured { prepared, docs },
        })
    }
}

impl Bootstrap<Secured> {
    /// Mounts the route tree under the API prefix.
    pub async fn mount(
        mut self,
        routes: &impl RouteRegistrar,
    ) -> Result<Bootstrap<Mounted>, StartupFailure> {
        let dependencies = &self.context.dependencies;
        let mount_context = MountContext::new(
            API_PREFIX,
            dependencies.data_store().clone(),
            dependencies.mailer().clone(),
        );

        let Secured { prepared, docs } = self.phase;
        prepared.schema.configure_generation();

        let routes = routes
            .register(mount_context)
            .await
            .map_err(|error| StartupFailure::new(BootstrapStage::RouteMount, error))?;

        let state = AppState::new(
            &self.context.dependencies,
            prepared.cookie_key,
            self.context.config.clone(),
        );
        let api = merge_docs_routes(ApiRouter::new().nest(API_PREFIX, routes), &docs)
            .map_err(|error| StartupFailure::new(BootstrapStage::Documentation, error))?;

        self.context.advance(BootstrapStage::RouteMount);
        Ok(Bootstrap {
            context: self.context,
            phase: Mounted {
                schema: prepared.schema,
                docs,
                api,
                state,
            },
        })
    }
}

impl Bootstrap<Mounted> {
    /// Waits for dependencies, then publishes the documentation and returns
    /// the finished server.
    ///
    /// A data store that fails its probe aborts startup. A mail transport
    /// that fails verification is only logged.
    pub async fn ready(self) -> Result<ServerInstance, StartupFailure> {
        let Self { mut context, phase } = self;
        let Mounted {
            schema,
            docs,
            api,
            state,
        } = phase;

        let data_store = context.dependencies.data_store().clone();
        if let Err(source) = data_store.ping().await {
            let error = Error::dependency(data_store.name().to_owned(), "readiness probe failed")
                .with_boxed_source(source);
            return Err(StartupFailure::new(BootstrapStage::Readiness, error));
        }

        if let Err(error) = context.dependencies.mailer().verify().await {
            tracing::warn!(
                target: TRACING_TARGET_BOOTSTRAP,
                error = %error,
                "mail transport verification failed, continuing"
            );
        }
        context.advance(BootstrapStage::Readiness);

        schema.configure_generation();
        let (router, openapi) = docs.publish(api);

        let documentation_errors = schema.generation_errors();
        if documentation_errors > 0 {
            tracing::warn!(
                target: TRACING_TARGET_BOOTSTRAP,
                documentation_errors,
                "published documentation is incomplete"
            );
        }

        let router = schema.apply(router.fallback(handler::not_found).with_state(state));
        let router = apply_all(std::mem::take(&mut context.registrations), router)
            .with_observability()
            .with_recovery();

        context.advance(BootstrapStage::DocumentationPublish);
        Ok(ServerInstance::new(
            router,
            openapi,
            context.config,
            context.stages,
            documentation_errors,
        ))
    }
}

/// Adds the documentation routes next to the mounted tree.
///
/// axum panics on overlapping routes; a mounted tree claiming a documentation
/// path is reported as a registration error instead.
fn merge_docs_routes(
    api: ApiRouter<AppState>,
    docs: &DocsPublisher,
) -> crate::Result<ApiRouter<AppState>> {
    panic::catch_unwind(AssertUnwindSafe(|| api.merge(docs.routes()))).map_err(|payload| {
        let reason = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("overlapping route");

        Error::registration(format!(
            "mounted routes collide with the documentation routes ({}, {}): {reason}",
            docs.config().open_api_json,
            docs.config().scalar_ui,
        ))
    })
}

#[cfg(test)]
mod tests;
