//! CORS (Cross-Origin Resource Sharing) middleware configuration.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
#[cfg(feature = "config")]
use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::{Error, Result};

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// List of allowed CORS origins.
    ///
    /// If empty, the request origin is reflected back.
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-origins", env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    pub allowed_origins: Vec<String>,

    /// Maximum age for CORS preflight requests in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-max-age", env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,

    /// Whether to allow credentials in CORS requests.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "cors-allow-credentials",
            env = "CORS_ALLOW_CREDENTIALS",
            default_value_t = true,
            action = ArgAction::Set
        )
    )]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    /// Returns the CORS max age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Validates the configured origins.
    pub fn validate(&self) -> Result<()> {
        self.to_header_values().map(|_| ())
    }

    /// Converts configured origins to header values.
    pub fn to_header_values(&self) -> Result<Vec<HeaderValue>> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                let origin = origin.trim();
                if origin == "*" {
                    return Err(Error::config(
                        "wildcard CORS origin is not allowed, leave the list empty to reflect origins",
                    ));
                }

                HeaderValue::from_str(origin)
                    .map_err(|e| Error::config(format!("invalid CORS origin '{origin}'")).with_source(e))
            })
            .collect()
    }

    fn allow_origin(&self) -> Result<AllowOrigin> {
        if self.allowed_origins.is_empty() {
            return Ok(AllowOrigin::mirror_request());
        }

        Ok(AllowOrigin::list(self.to_header_values()?))
    }

    /// Creates a CORS layer based on this configuration.
    pub(crate) fn create_cors_layer(&self) -> Result<CorsLayer> {
        let layer = CorsLayer::new()
            .allow_origin(self.allow_origin()?)
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age());

        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer() -> anyhow::Result<()> {
        let _layer = CorsConfig::default().create_cors_layer()?;

        let config = CorsConfig {
            allowed_origins: vec!["https://app.example.com".to_owned()],
            ..CorsConfig::default()
        };
        let _layer = config.create_cors_layer()?;
        Ok(())
    }

    #[test]
    fn test_cors_config_custom_origins() -> anyhow::Result<()> {
        let config = CorsConfig {
            allowed_origins: vec![
                "https://example.com".to_owned(),
                "https://app.example.com".to_owned(),
            ],
            ..Default::default()
        };
        assert_eq!(config.to_header_values()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_cors_config_rejects_invalid_origins() {
        let wildcard = CorsConfig {
            allowed_origins: vec!["*".to_owned()],
            ..Default::default()
        };
        assert!(wildcard.validate().is_err());

        let malformed = CorsConfig {
            allowed_origins: vec!["https://bad\norigin".to_owned()],
            ..Default::default()
        };
        assert!(malformed.validate().is_err());
    }
}
