//! Client address resolution middleware.

mod resolver;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
pub use resolver::{ClientIpResolver, ProxyConfig, ProxyHeader};

use crate::extract::ClientIp;
use crate::utility::TRACING_TARGET_CLIENT_IP;

/// Resolves the client address and stores it as a [`ClientIp`] request extension.
///
/// The transport address is taken from [`ConnectInfo`] when the server is
/// started with `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn resolve_client_ip(
    State(resolver): State<ClientIpResolver>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let client_ip = resolver.resolve(request.headers(), peer);
    tracing::trace!(
        target: TRACING_TARGET_CLIENT_IP,
        peer = ?peer,
        client_ip = %client_ip,
        "resolved client address"
    );

    request.extensions_mut().insert(ClientIp(client_ip));
    next.run(request).await
}
