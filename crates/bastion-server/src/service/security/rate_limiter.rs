//! In-memory rate limiter implementation using fixed windows.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::utility::TRACING_TARGET_RATE_LIMIT;
use crate::{Error, Result};

/// Lower bound for the eviction sweep period.
const MIN_EVICTION_PERIOD: Duration = Duration::from_secs(1);

/// Global rate limit thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RateLimitConfig {
    /// Maximum number of requests per client within one window.
    #[cfg_attr(
        feature = "config",
        arg(long = "rate-limit-max", env = "RATE_LIMIT_MAX", default_value = "600")
    )]
    pub max_requests: u32,

    /// Length of the rate limit window in seconds.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "rate-limit-window",
            env = "RATE_LIMIT_WINDOW_SECS",
            default_value = "60"
        )
    )]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 600,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    /// Validates the thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(Error::config("rate limit maximum must be greater than zero"));
        }

        if self.window_secs == 0 {
            return Err(Error::config("rate limit window must be greater than zero"));
        }

        Ok(())
    }

    /// Returns the global policy described by this configuration.
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            "global",
            self.max_requests,
            Duration::from_secs(self.window_secs),
        )
    }
}

/// Named rate limit: at most `max_requests` per key within each `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    name: Cow<'static, str>,
    max_requests: u32,
    window: Duration,
}

impl RateLimitPolicy {
    /// Creates a new policy.
    pub fn new(name: impl Into<Cow<'static, str>>, max_requests: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
        }
    }

    /// Creates a policy for N requests per minute.
    pub fn per_minute(name: impl Into<Cow<'static, str>>, max_requests: u32) -> Self {
        Self::new(name, max_requests, Duration::from_secs(60))
    }

    /// Returns the policy name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the maximum number of requests per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Returns the window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Rate limiter key type.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Rate limit by IP address.
    IpAddress(IpAddr),
    /// Custom key.
    Custom(String),
}

impl RateLimitKey {
    /// Creates a key from an IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self::IpAddress(ip)
    }

    /// Creates a custom key.
    pub fn custom(key: impl Into<String>) -> Self {
        Self::Custom(key.into())
    }
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Maximum number of requests per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

type Windows = Mutex<HashMap<RateLimitKey, Window>>;

/// In-memory fixed-window rate limiter.
///
/// Counters are kept behind a single async lock, so every check for the
/// same limiter is serialized and concurrent bursts are counted exactly.
#[derive(Clone)]
pub struct RateLimiter {
    policy: Arc<RateLimitPolicy>,
    windows: Arc<Windows>,
}

impl RateLimiter {
    /// Creates a new rate limiter enforcing the given policy.
    pub fn new(policy: RateLimitPolicy) -> Self {
        tracing::debug!(
            target: TRACING_TARGET_RATE_LIMIT,
            policy = %policy.name,
            max_requests = policy.max_requests,
            window_secs = policy.window.as_secs(),
            "rate limiter initialized"
        );

        Self {
            policy: Arc::new(policy),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the enforced policy.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Counts one request for `key` and reports whether it is admitted.
    pub async fn check(&self, key: RateLimitKey) -> RateLimitStatus {
        let now = Instant::now();
        let max_requests = self.policy.max_requests;
        let window_length = self.policy.window;

        let mut windows = self.windows.lock().await;
        let window = windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= window_length {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let reset_after = window_length.saturating_sub(now.duration_since(window.started));
        if window.count >= max_requests {
            return RateLimitStatus {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_after,
            };
        }

        window.count += 1;
        RateLimitStatus {
            allowed: true,
            limit: max_requests,
            remaining: max_requests - window.count,
            reset_after,
        }
    }

    /// Resets the counter for a specific key.
    pub async fn reset(&self, key: &RateLimitKey) {
        self.windows.lock().await.remove(key);
    }

    /// Returns the number of tracked keys.
    pub async fn size(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Drops every window that has already closed, returning how many were removed.
    pub async fn evict_expired(&self) -> usize {
        evict_expired(&self.windows, self.policy.window).await
    }

    /// Starts a background task that periodically evicts closed windows.
    ///
    /// The task only holds a weak reference and stops once every clone of
    /// this limiter is dropped. Outside of a tokio runtime this is a no-op.
    pub fn spawn_eviction(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let windows: Weak<Windows> = Arc::downgrade(&self.windows);
        let window_length = self.policy.window;
        let period = window_length.max(MIN_EVICTION_PERIOD);

        handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(windows) = windows.upgrade() else {
                    break;
                };

                let removed = evict_expired(&windows, window_length).await;
                if removed > 0 {
                    tracing::debug!(
                        target: TRACING_TARGET_RATE_LIMIT,
                        removed_count = removed,
                        "evicted closed rate limit windows"
                    );
                }
            }
        });
    }
}

async fn evict_expired(windows: &Windows, window_length: Duration) -> usize {
    let now = Instant::now();
    let mut windows = windows.lock().await;
    let before_count = windows.len();
    windows.retain(|_, window| now.duration_since(window.started) < window_length);
    before_count - windows.len()
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitPolicy::new(
            "test",
            max_requests,
            Duration::from_secs(window_secs),
        ))
    }

    #[tokio::test]
    async fn admits_up_to_threshold() -> anyhow::Result<()> {
        let limiter = limiter(3, 60);
        let key = RateLimitKey::from_ip("203.0.113.7".parse()?);

        for remaining in [2, 1, 0] {
            let status = limiter.check(key.clone()).await;
            assert!(status.allowed);
            assert_eq!(status.remaining, remaining);
        }

        let status = limiter.check(key).await;
        assert!(!status.allowed);
        assert_eq!(status.limit, 3);
        assert_eq!(status.remaining, 0);
        Ok(())
    }

    #[tokio::test]
    async fn keys_are_counted_independently() -> anyhow::Result<()> {
        let limiter = limiter(1, 60);

        assert!(limiter.check(RateLimitKey::from_ip("10.0.0.1".parse()?)).await.allowed);
        assert!(limiter.check(RateLimitKey::from_ip("10.0.0.2".parse()?)).await.allowed);
        assert!(!limiter.check(RateLimitKey::from_ip("10.0.0.1".parse()?)).await.allowed);
        assert_eq!(limiter.size().await, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn window_reopens_after_it_closes() -> anyhow::Result<()> {
        let limiter = limiter(2, 10);
        let key = RateLimitKey::custom("client");

        assert!(limiter.check(key.clone()).await.allowed);
        assert!(limiter.check(key.clone()).await.allowed);
        assert!(!limiter.check(key.clone()).await.allowed);

        tokio::time::advance(Duration::from_secs(4)).await;
        let status = limiter.check(key.clone()).await;
        assert!(!status.allowed);
        assert_eq!(status.reset_after, Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(6)).await;
        let status = limiter.check(key).await;
        assert!(status.allowed);
        assert_eq!(status.remaining, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_bursts_are_counted_exactly() -> anyhow::Result<()> {
        let limiter = limiter(50, 60);
        let key = RateLimitKey::custom("burst");

        let checks = (0..80).map(|_| limiter.check(key.clone()));
        let statuses = futures::future::join_all(checks).await;

        let admitted = statuses.iter().filter(|status| status.allowed).count();
        assert_eq!(admitted, 50);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_closed_windows() -> anyhow::Result<()> {
        let limiter = limiter(5, 1);
        limiter.check(RateLimitKey::custom("a")).await;
        limiter.check(RateLimitKey::custom("b")).await;

        assert_eq!(limiter.evict_expired().await, 0);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.evict_expired().await, 2);
        assert_eq!(limiter.size().await, 0);
        Ok(())
    }

    #[test]
    fn config_rejects_zero_thresholds() {
        let config = RateLimitConfig {
            max_requests: 0,
            ..RateLimitConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimitConfig {
            window_secs: 0,
            ..RateLimitConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RateLimitConfig::default().validate().is_ok());
    }
}
