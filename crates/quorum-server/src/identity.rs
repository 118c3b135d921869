//! Client identity derivation for rate limiting.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Derive the rate-limit identity for a request.
///
/// `X-Forwarded-For` is only honored when the deployment says there
/// is a trusted proxy in front; otherwise any client could spoof its
/// way past the limiter. The first address in the header is the
/// original client per proxy convention.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
