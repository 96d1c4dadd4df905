//! Rate limiting middleware for API endpoints.

mod by_ip;

use aide::axum::ApiRouter;
use axum::middleware::from_fn_with_state;
pub use by_ip::rate_limit_by_ip;

use crate::service::{RateLimitPolicy, RateLimiter};

/// Extension trait for [`ApiRouter`] to add route-level rate limits.
///
/// Route-level policies are additive: a request must pass the global
/// limit registered at startup and every policy layered here.
pub trait RouteRateLimit<S> {
    /// Limits the routes registered so far with an additional policy.
    fn with_rate_limit(self, policy: RateLimitPolicy) -> Self;
}

impl<S> RouteRateLimit<S> for ApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_rate_limit(self, policy: RateLimitPolicy) -> Self {
        let limiter = RateLimiter::new(policy);
        limiter.spawn_eviction();
        self.layer(from_fn_with_state(limiter, rate_limit_by_ip))
    }
}
