use axum::Router;
use axum::middleware::from_fn_with_state;
use tower_http::cors::CorsLayer;

use crate::bootstrap::BootstrapStage;
use crate::middleware::{
    ClientIpResolver, SecurityHeaders, SignedCookies, rate_limit_by_ip, resolve_client_ip,
    verify_signed_cookies,
};
use crate::service::RateLimiter;

/// A request-path behavior recorded during startup.
///
/// Registrations are applied to the finished router in one pass. Apart from
/// the cross-origin policy, which is always outermost, the first one recorded
/// sees each request first.
#[derive(Debug, Clone)]
pub(crate) enum Registration {
    CookieSigning(SignedCookies),
    Cors(CorsLayer),
    ClientIp(ClientIpResolver),
    RateLimit(RateLimiter),
    SecurityHeaders(SecurityHeaders),
}

impl Registration {
    /// Returns the stage that recorded this registration.
    pub(crate) fn stage(&self) -> BootstrapStage {
        match self {
            Self::CookieSigning(_) => BootstrapStage::CookieSigning,
            Self::Cors(_) => BootstrapStage::Cors,
            Self::ClientIp(_) => BootstrapStage::ClientIp,
            Self::RateLimit(_) => BootstrapStage::RateLimit,
            Self::SecurityHeaders(_) => BootstrapStage::SecurityHeaders,
        }
    }

    fn is_cors(&self) -> bool {
        matches!(self, Self::Cors(_))
    }

    /// Wraps the router with this registration.
    pub(crate) fn apply(self, router: Router) -> Router {
        match self {
            Self::CookieSigning(cookies) => {
                router.layer(from_fn_with_state(cookies, verify_signed_cookies))
            }
            Self::Cors(layer) => router.layer(layer),
            Self::ClientIp(resolver) => router.layer(from_fn_with_state(resolver, resolve_client_ip)),
            Self::RateLimit(limiter) => router.layer(from_fn_with_state(limiter, rate_limit_by_ip)),
            Self::SecurityHeaders(headers) => headers.apply(router),
        }
    }
}

/// Applies registrations so the first recorded is the outermost layer.
///
/// The cross-origin policy wraps every other registration, so rejections
/// produced early (bad cookie signature, rate limit) still carry CORS headers.
pub(crate) fn apply_all(mut registrations: Vec<Registration>, router: Router) -> Router {
    registrations.sort_by_key(|registration| !registration.is_cors());
    registrations
        .into_iter()
        .rev()
        .fold(router, |router, registration| {
            tracing::debug!(
                target: crate::utility::TRACING_TARGET_BOOTSTRAP,
                stage = %registration.stage(),
                "applying registration"
            );
            registration.apply(router)
        })
}
