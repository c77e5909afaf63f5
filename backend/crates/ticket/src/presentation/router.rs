//! Ticket Router

use axum::{Router, middleware, routing::post};

use crate::domain::repository::{AccountRepository, SubscriptionRepository, TicketRepository};
use crate::presentation::handlers::{self, TicketAppState};
use crate::presentation::middleware::{ApiKeyState, require_api_key};

/// Create the ticket router
///
/// `/ticket` is open to any sending server; `/account/ticket` needs the API key.
pub fn ticket_router<T, S, A>(state: TicketAppState<T, S, A>, api_key: ApiKeyState) -> Router
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    let account = Router::new()
        .route("/account/ticket", post(handlers::issue_account_ticket::<T, S, A>))
        .route_layer(middleware::from_fn_with_state(api_key, require_api_key));

    Router::new()
        .route("/ticket", post(handlers::request_ticket::<T, S, A>))
        .merge(account)
        .with_state(state)
}
