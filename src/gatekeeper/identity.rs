//! Client identity used as the rate-limit key.

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Identify the caller.
///
/// The first entry of `X-Forwarded-For` wins (the service is expected to sit
/// behind a proxy), then the socket peer address, then `"unknown"`.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}
