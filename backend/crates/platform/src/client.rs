//! Request header utilities
//!
//! Helpers for pulling the admission ticket, API key and client address out
//! of inbound requests.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;
use uuid::Uuid;

/// Header carrying the ticket id on every upload request.
pub const TICKET_HEADER: &str = "x-ticket";

/// Error when a required request header is absent or unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Malformed header: {0}")]
    Malformed(String),
}

/// Extract the ticket id from the [`TICKET_HEADER`] header.
pub fn extract_ticket_id(headers: &HeaderMap) -> Result<Uuid, HeaderError> {
    let raw = headers
        .get(TICKET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HeaderError::MissingHeader(TICKET_HEADER.to_string()))?;

    Uuid::parse_str(raw.trim()).map_err(|_| HeaderError::Malformed(TICKET_HEADER.to_string()))
}

/// Extract a bearer token from the `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, HeaderError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HeaderError::MissingHeader("Authorization".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| HeaderError::Malformed("Authorization".to_string()))
}

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For first (the server normally sits behind a TLS
/// terminator), then falls back to the direct connection IP.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first_ip) = xff.split(',').next()
        && let Ok(ip) = first_ip.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }
    direct_ip
}
