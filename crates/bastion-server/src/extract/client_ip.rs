//! Resolved client address extractor.

use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use derive_more::{Deref, From};

use crate::handler::{Error, ErrorKind};

/// The originating client address, resolved from trusted proxy headers.
///
/// Populated by the client IP middleware, which runs before rate limiting
/// and every mounted route. Extracting it on a router without that
/// middleware is a server fault.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deref, From)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// Returns the inner address.
    #[inline]
    pub fn into_inner(self) -> IpAddr {
        self.0
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<ClientIp>().copied().ok_or_else(|| {
            ErrorKind::InternalServerError
                .with_message("Client address is unavailable")
                .with_context("client IP resolution is not installed on this router")
        })
    }
}

impl aide::OperationInput for ClientIp {}
