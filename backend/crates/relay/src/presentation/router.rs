//! Relay Router

use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware, routing::post};
use ticket::{ApiKeyState, TicketRepository, require_api_key};

use crate::presentation::handlers::{self, RelayAppState};

/// Create the relay router
///
/// Upload routes are authorized by ticket; `/admin/flush` needs the API key.
pub fn relay_router<T>(state: RelayAppState<T>, api_key: ApiKeyState, max_part_bytes: usize) -> Router
where
    T: TicketRepository + Send + Sync + 'static,
{
    let admin = Router::new()
        .route("/admin/flush", post(handlers::flush::<T>))
        .route_layer(middleware::from_fn_with_state(api_key, require_api_key));

    Router::new()
        .route(
            "/incoming",
            post(handlers::complete::<T>).delete(handlers::delete::<T>),
        )
        .route("/incoming/header", post(handlers::upload_header::<T>))
        .route("/incoming/catalog", post(handlers::upload_catalog::<T>))
        .route("/incoming/block/{id}", post(handlers::upload_block::<T>))
        .route(
            "/incoming/attachment/{id}",
            post(handlers::upload_attachment::<T>),
        )
        .layer(DefaultBodyLimit::max(max_part_bytes))
        .merge(admin)
        .with_state(state)
}
