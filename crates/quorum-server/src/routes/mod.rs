//! Route handlers.

pub mod api;
pub mod chat;
pub mod upload;
pub mod voice;

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::error::ApiResult;
use crate::identity::client_identity;
use crate::state::AppState;

/// Admission control for the public `/v1` surface: derive the client
/// identity and pass it through the rate limiter.
pub(crate) fn admit(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> ApiResult<String> {
    let identity = client_identity(headers, peer, state.config.server.trust_proxy);
    state.limiter.check(&identity)?;
    Ok(identity)
}
