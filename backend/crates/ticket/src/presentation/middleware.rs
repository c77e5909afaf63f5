//! API Key Middleware
//!
//! Guards the routes meant for this server's own clients and operators.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{extract_bearer_token, extract_client_ip};
use platform::crypto::constant_time_eq;
use std::sync::Arc;

use crate::error::TicketError;

/// Middleware state
#[derive(Clone, Default)]
pub struct ApiKeyState {
    /// `None` disables every guarded route.
    pub api_key: Option<Arc<str>>,
}

impl ApiKeyState {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

/// Middleware that requires `Authorization: Bearer <api key>`
pub async fn require_api_key(
    State(state): State<ApiKeyState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let headers = req.headers();

    let client_ip = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip());
    let client_ip = extract_client_ip(headers, client_ip);

    let Some(expected) = state.api_key.as_deref() else {
        tracing::warn!(client_ip = ?client_ip, path = %req.uri().path(), "API key not configured");
        return Err(TicketError::Unauthorized.into_response());
    };

    let presented = extract_bearer_token(headers).map_err(|e| {
        tracing::debug!(client_ip = ?client_ip, error = %e, "Missing API key");
        TicketError::Unauthorized.into_response()
    })?;

    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        tracing::warn!(client_ip = ?client_ip, path = %req.uri().path(), "Invalid API key");
        return Err(TicketError::Unauthorized.into_response());
    }

    Ok(next.run(req).await)
}
