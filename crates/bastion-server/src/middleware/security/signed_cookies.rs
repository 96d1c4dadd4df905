//! Cookie signing and verification.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{CookieJar, Key, SignedCookieJar};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::handler::ErrorKind;
use crate::utility::TRACING_TARGET_COOKIES;
use crate::{Error, Result};

/// Cookie signing configuration.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CookieConfig {
    /// Secret used to sign cookies. Required.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "COOKIE_SECRET_SIGN_KEY", hide_env_values = true)
    )]
    #[serde(default, skip_serializing)]
    pub cookie_secret: Option<String>,

    /// Names of cookies that must carry a valid signature when present.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "SIGNED_COOKIE_NAMES",
            value_delimiter = ',',
            default_value = "jid"
        )
    )]
    pub protected_cookies: Vec<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            cookie_secret: None,
            protected_cookies: vec!["jid".to_owned()],
        }
    }
}

impl fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieConfig")
            .field("cookie_secret", &self.cookie_secret.as_ref().map(|_| "[REDACTED]"))
            .field("protected_cookies", &self.protected_cookies)
            .finish()
    }
}

impl CookieConfig {
    /// Creates a configuration with the given signing secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            cookie_secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Validates that a non-empty secret is present.
    pub fn validate(&self) -> Result<()> {
        self.secret().map(|_| ())
    }

    fn secret(&self) -> Result<&str> {
        match self.cookie_secret.as_deref().map(str::trim) {
            None => Err(Error::config("cookie signing secret is missing")),
            Some("") => Err(Error::config("cookie signing secret is empty")),
            Some(secret) => Ok(secret),
        }
    }

    /// Derives the 64-byte signing key from the secret with SHA-512.
    pub fn signing_key(&self) -> Result<Key> {
        let digest = Sha512::digest(self.secret()?.as_bytes());
        Key::try_from(digest.as_slice())
            .map_err(|_| Error::config("cookie signing key could not be derived from the secret"))
    }
}

/// Verifies signatures of protected cookies on incoming requests.
#[derive(Clone)]
pub struct SignedCookies {
    key: Key,
    protected: Arc<[String]>,
}

impl SignedCookies {
    /// Builds the verifier from configuration.
    pub fn from_config(config: &CookieConfig) -> Result<Self> {
        Ok(Self {
            key: config.signing_key()?,
            protected: config.protected_cookies.iter().cloned().collect(),
        })
    }

    /// Returns the signing key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Returns the name of the first protected cookie whose signature does not verify.
    pub fn find_tampered(&self, headers: &HeaderMap) -> Option<&str> {
        let plain = CookieJar::from_headers(headers);
        let signed = SignedCookieJar::from_headers(headers, self.key.clone());

        self.protected
            .iter()
            .find(|name| plain.get(name).is_some() && signed.get(name).is_none())
            .map(String::as_str)
    }
}

impl fmt::Debug for SignedCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCookies")
            .field("protected", &self.protected)
            .finish_non_exhaustive()
    }
}

/// Rejects requests carrying a protected cookie with an invalid signature.
pub async fn verify_signed_cookies(
    State(cookies): State<SignedCookies>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(name) = cookies.find_tampered(request.headers()) {
        tracing::warn!(
            target: TRACING_TARGET_COOKIES,
            cookie = %name,
            "rejected cookie with invalid signature"
        );

        return ErrorKind::InvalidCookieSignature
            .with_resource(name.to_owned())
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::header;
    use axum_extra::extract::cookie::Cookie;

    use super::*;

    fn cookie_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, value.parse().expect("valid header"));
        headers
    }

    #[test]
    fn missing_or_empty_secret_is_rejected() {
        assert!(CookieConfig::default().validate().is_err());
        assert!(CookieConfig::with_secret("").validate().is_err());
        assert!(CookieConfig::with_secret("   ").validate().is_err());
        assert!(CookieConfig::with_secret("s3cr3t").validate().is_ok());
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", CookieConfig::with_secret("s3cr3t"));
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn signing_key_is_deterministic() -> anyhow::Result<()> {
        let config = CookieConfig::with_secret("s3cr3t");
        assert_eq!(
            config.signing_key()?.master(),
            config.signing_key()?.master()
        );
        Ok(())
    }

    #[test]
    fn detects_tampered_cookie() -> anyhow::Result<()> {
        let cookies = SignedCookies::from_config(&CookieConfig::with_secret("s3cr3t"))?;
        assert_eq!(cookies.find_tampered(&cookie_header("jid=forged")), Some("jid"));
        Ok(())
    }

    #[test]
    fn accepts_signed_and_unprotected_cookies() -> anyhow::Result<()> {
        let cookies = SignedCookies::from_config(&CookieConfig::with_secret("s3cr3t"))?;

        let response = SignedCookieJar::new(cookies.key().clone())
            .add(Cookie::new("jid", "session"))
            .into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("signed cookie is set");

        let header_value = format!("{set_cookie}; theme=dark");
        assert!(cookies.find_tampered(&cookie_header(&header_value)).is_none());
        assert!(cookies.find_tampered(&cookie_header("theme=dark")).is_none());
        Ok(())
    }
}
