//! Rate limiting keyed by the resolved client address.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::extract::ClientIp;
use crate::handler::ErrorKind;
use crate::service::{RateLimitKey, RateLimitStatus, RateLimiter};
use crate::utility::TRACING_TARGET_RATE_LIMIT;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate limits requests by the [`ClientIp`] resolved earlier in the chain.
///
/// Admitted responses carry the current quota in `x-ratelimit-*` headers;
/// rejected requests never reach the handler and get a `429` with
/// `retry-after`.
pub async fn rate_limit_by_ip(
    State(rate_limiter): State<RateLimiter>,
    ClientIp(ip_address): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let status = rate_limiter.check(RateLimitKey::from_ip(ip_address)).await;

    if !status.allowed {
        tracing::debug!(
            target: TRACING_TARGET_RATE_LIMIT,
            policy = %rate_limiter.policy().name(),
            client_ip = %ip_address,
            "rate limit exceeded"
        );

        let mut response = ErrorKind::TooManyRequests
            .with_resource(rate_limiter.policy().name().to_owned())
            .into_response();
        let headers = response.headers_mut();
        insert_quota_headers(headers, &status);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs(&status)));
        return response;
    }

    let mut response = next.run(request).await;
    insert_quota_headers(response.headers_mut(), &status);
    response
}

fn insert_quota_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs(status)));
}

/// Seconds until the window closes, rounded up.
fn reset_secs(status: &RateLimitStatus) -> u64 {
    let reset_after = status.reset_after;
    reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0)
}
