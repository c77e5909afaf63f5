//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use kernel::TicketId;
use platform::client::extract_ticket_id;
use std::sync::Arc;
use ticket::{TicketError, TicketRepository};

use crate::application::inbound::InboundService;
use crate::application::pipeline::{FlushReport, Pipeline};
use crate::error::RelayResult;
use crate::presentation::dto::UploadResponse;

/// Shared state for relay handlers
pub struct RelayAppState<T>
where
    T: TicketRepository + Send + Sync + 'static,
{
    pub inbound: Arc<InboundService<T>>,
    pub pipeline: Pipeline,
}

impl<T> Clone for RelayAppState<T>
where
    T: TicketRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inbound: self.inbound.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

fn ticket_id(headers: &HeaderMap) -> RelayResult<TicketId> {
    let id = extract_ticket_id(headers).map_err(TicketError::from)?;
    Ok(TicketId::from(id))
}

fn created(message_id: kernel::MessageId) -> impl IntoResponse {
    (StatusCode::CREATED, Json(UploadResponse { message_id }))
}

// ============================================================================
// Uploads
// ============================================================================

/// POST /incoming/header
pub async fn upload_header<T>(
    State(state): State<RelayAppState<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
{
    let message_id = state.inbound.accept_header(ticket_id(&headers)?, &body).await?;
    Ok(created(message_id))
}

/// POST /incoming/catalog
pub async fn upload_catalog<T>(
    State(state): State<RelayAppState<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
{
    let message_id = state.inbound.accept_catalog(ticket_id(&headers)?, &body).await?;
    Ok(created(message_id))
}

/// POST /incoming/block/{id}
pub async fn upload_block<T>(
    State(state): State<RelayAppState<T>>,
    Path(part_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
{
    let message_id = state
        .inbound
        .accept_block(ticket_id(&headers)?, &part_id, &body)
        .await?;
    Ok(created(message_id))
}

/// POST /incoming/attachment/{id}
pub async fn upload_attachment<T>(
    State(state): State<RelayAppState<T>>,
    Path(part_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RelayResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
{
    let message_id = state
        .inbound
        .accept_attachment(ticket_id(&headers)?, &part_id, &body)
        .await?;
    Ok(created(message_id))
}

// ============================================================================
// Completion
// ============================================================================

/// POST /incoming
pub async fn complete<T>(
    State(state): State<RelayAppState<T>>,
    headers: HeaderMap,
) -> RelayResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
{
    let message_id = state.inbound.complete(ticket_id(&headers)?).await?;
    Ok((StatusCode::ACCEPTED, Json(UploadResponse { message_id })))
}

/// DELETE /incoming
pub async fn delete<T>(
    State(state): State<RelayAppState<T>>,
    headers: HeaderMap,
) -> RelayResult<StatusCode>
where
    T: TicketRepository + Send + Sync + 'static,
{
    state.inbound.delete(ticket_id(&headers)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Admin
// ============================================================================

/// POST /admin/flush
pub async fn flush<T>(State(state): State<RelayAppState<T>>) -> Json<FlushReport>
where
    T: TicketRepository + Send + Sync + 'static,
{
    Json(state.pipeline.flush().await)
}
