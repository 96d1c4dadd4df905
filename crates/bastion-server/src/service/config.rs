//! Immutable configuration snapshot consumed by the bootstrap pipeline.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::middleware::{
    CookieConfig, CorsConfig, OpenApiConfig, ProxyConfig, SchemaConfig, SecurityHeadersConfig,
};
use crate::service::RateLimitConfig;

/// Every setting the server needs, resolved once before startup.
///
/// The bundle is validated in full before any registration runs and then
/// shared read-only; no component reads the environment afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ConfigBundle {
    /// Cookie signing.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub cookie: CookieConfig,

    /// Global rate limit.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub rate_limit: RateLimitConfig,

    /// Trusted proxy headers and networks.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub proxy: ProxyConfig,

    /// Cross-origin policy.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub cors: CorsConfig,

    /// Documentation routes.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub openapi: OpenApiConfig,

    /// Request body parsing.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub schema: SchemaConfig,

    /// Security response headers.
    #[cfg_attr(feature = "config", clap(flatten))]
    pub security_headers: SecurityHeadersConfig,
}

impl ConfigBundle {
    /// Creates a bundle with default settings and the given cookie secret.
    pub fn with_cookie_secret(secret: impl Into<String>) -> Self {
        Self {
            cookie: CookieConfig::with_secret(secret),
            ..Self::default()
        }
    }

    /// Validates every section, returning the first error found.
    pub fn validate(&self) -> Result<()> {
        self.cookie.validate()?;
        self.rate_limit.validate()?;
        self.proxy.validate()?;
        self.cors.validate()?;
        self.openapi.validate()?;
        self.schema.validate()?;
        self.security_headers.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn default_bundle_requires_cookie_secret() {
        let error = ConfigBundle::default().validate().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn bundle_with_secret_is_valid() -> anyhow::Result<()> {
        ConfigBundle::with_cookie_secret("a-long-enough-development-secret").validate()?;
        Ok(())
    }

    #[test]
    fn invalid_section_fails_validation() {
        let mut config = ConfigBundle::with_cookie_secret("secret");
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());
    }
}
