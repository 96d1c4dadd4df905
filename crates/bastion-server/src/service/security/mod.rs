//! Security infrastructure services.

mod rate_limiter;

pub use rate_limiter::{
    RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimitStatus, RateLimiter,
};
