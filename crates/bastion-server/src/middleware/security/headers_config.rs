//! Security response headers.

use std::sync::Arc;

use axum::Router;
use axum::http::header::{self, HeaderName, HeaderValue};
#[cfg(feature = "config")]
use clap::{ArgAction, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{Error, Result};

const CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");
const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");
const ORIGIN_AGENT_CLUSTER: HeaderName = HeaderName::from_static("origin-agent-cluster");
const X_DOWNLOAD_OPTIONS: HeaderName = HeaderName::from_static("x-download-options");
const X_PERMITTED_CROSS_DOMAIN_POLICIES: HeaderName =
    HeaderName::from_static("x-permitted-cross-domain-policies");

/// Security headers configuration for the application.
///
/// The defaults protect against clickjacking, MIME sniffing and protocol
/// downgrades. Content-Security-Policy is disabled unless a policy is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct SecurityHeadersConfig {
    /// HTTP Strict Transport Security (HSTS) max age in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "hsts-max-age", env = "HSTS_MAX_AGE", default_value = "15552000")
    )]
    pub hsts_max_age_seconds: u64,

    /// Whether to include subdomains in HSTS policy.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "HSTS_INCLUDE_SUBDOMAINS",
            default_value_t = true,
            action = ArgAction::Set
        )
    )]
    pub hsts_include_subdomains: bool,

    /// Content Security Policy (CSP) directives. Disabled when unset.
    #[cfg_attr(feature = "config", arg(long, env = "CONTENT_SECURITY_POLICY"))]
    pub content_security_policy: Option<String>,

    /// X-Frame-Options header value.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "FRAME_OPTIONS", value_enum, default_value = "same-origin")
    )]
    pub frame_options: FrameOptions,

    /// Referrer-Policy header value.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REFERRER_POLICY", value_enum, default_value = "no-referrer")
    )]
    pub referrer_policy: ReferrerPolicy,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            hsts_max_age_seconds: 15_552_000, // 180 days
            hsts_include_subdomains: true,
            content_security_policy: None,
            frame_options: FrameOptions::SameOrigin,
            referrer_policy: ReferrerPolicy::NoReferrer,
        }
    }
}

impl SecurityHeadersConfig {
    /// Returns the HSTS header value as a string.
    pub fn hsts_header_value(&self) -> String {
        if self.hsts_include_subdomains {
            format!("max-age={}; includeSubDomains", self.hsts_max_age_seconds)
        } else {
            format!("max-age={}", self.hsts_max_age_seconds)
        }
    }

    /// Validates that every header value is well-formed.
    pub fn validate(&self) -> Result<()> {
        self.to_headers().map(|_| ())
    }

    /// Returns every header to set on responses, in application order.
    pub fn to_headers(&self) -> Result<SecurityHeaders> {
        let mut headers = vec![
            (
                CROSS_ORIGIN_OPENER_POLICY,
                HeaderValue::from_static("same-origin"),
            ),
            (
                CROSS_ORIGIN_RESOURCE_POLICY,
                HeaderValue::from_static("same-origin"),
            ),
            (ORIGIN_AGENT_CLUSTER, HeaderValue::from_static("?1")),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static(self.referrer_policy.as_str()),
            ),
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_str(&self.hsts_header_value())
                    .map_err(|e| Error::config("invalid HSTS header value").with_source(e))?,
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (
                header::X_DNS_PREFETCH_CONTROL,
                HeaderValue::from_static("off"),
            ),
            (X_DOWNLOAD_OPTIONS, HeaderValue::from_static("noopen")),
            (
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static(self.frame_options.as_str()),
            ),
            (
                X_PERMITTED_CROSS_DOMAIN_POLICIES,
                HeaderValue::from_static("none"),
            ),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        ];

        if let Some(csp) = self.content_security_policy.as_deref() {
            let value = HeaderValue::from_str(csp)
                .map_err(|e| Error::config("invalid Content-Security-Policy").with_source(e))?;
            headers.push((header::CONTENT_SECURITY_POLICY, value));
        }

        Ok(SecurityHeaders(headers.into()))
    }
}

/// Validated set of security headers ready to be applied to a router.
#[derive(Debug, Clone)]
pub struct SecurityHeaders(Arc<[(HeaderName, HeaderValue)]>);

impl SecurityHeaders {
    /// Returns the headers in application order.
    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.0.iter()
    }

    /// Layers the headers onto every response of the router.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.iter().fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name.clone(),
                value.clone(),
            ))
        })
    }
}

/// X-Frame-Options header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum FrameOptions {
    /// The page cannot be displayed in a frame.
    Deny,
    /// The page can only be displayed in a frame on the same origin.
    SameOrigin,
}

impl FrameOptions {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::SameOrigin => "SAMEORIGIN",
        }
    }
}

/// Referrer-Policy header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerPolicy {
    /// No referrer information is sent.
    NoReferrer,
    /// Sends only the origin as the referrer.
    Origin,
    /// Sends the full URL for same-origin requests, only the origin otherwise.
    StrictOriginWhenCrossOrigin,
}

impl ReferrerPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoReferrer => "no-referrer",
            Self::Origin => "origin",
            Self::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsts_header_value() {
        let config = SecurityHeadersConfig::default();
        assert_eq!(
            config.hsts_header_value(),
            "max-age=15552000; includeSubDomains"
        );

        let config = SecurityHeadersConfig {
            hsts_include_subdomains: false,
            ..Default::default()
        };
        assert_eq!(config.hsts_header_value(), "max-age=15552000");
    }

    #[test]
    fn test_default_headers_omit_csp() -> anyhow::Result<()> {
        let headers = SecurityHeadersConfig::default().to_headers()?;

        assert!(
            headers
                .iter()
                .all(|(name, _)| *name != header::CONTENT_SECURITY_POLICY)
        );
        assert!(
            headers
                .iter()
                .any(|(name, value)| *name == header::X_FRAME_OPTIONS && value == "SAMEORIGIN")
        );
        Ok(())
    }

    #[test]
    fn test_configured_csp_is_emitted() -> anyhow::Result<()> {
        let config = SecurityHeadersConfig {
            content_security_policy: Some("default-src 'self'".to_owned()),
            ..Default::default()
        };

        let headers = config.to_headers()?;
        assert!(
            headers
                .iter()
                .any(|(name, _)| *name == header::CONTENT_SECURITY_POLICY)
        );
        Ok(())
    }

    #[test]
    fn test_invalid_csp_is_rejected() {
        let config = SecurityHeadersConfig {
            content_security_policy: Some("default-src\n'self'".to_owned()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
