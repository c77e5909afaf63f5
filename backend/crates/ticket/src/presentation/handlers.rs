//! HTTP Handlers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use kernel::{AddressHash, TicketId};
use std::sync::Arc;

use crate::application::config::TicketConfig;
use crate::application::issue_ticket::{IssueTicketInput, IssueTicketUseCase};
use crate::domain::repository::{AccountRepository, SubscriptionRepository, TicketRepository};
use crate::domain::value_objects::SubscriptionId;
use crate::error::TicketResult;
use crate::presentation::dto::{AccountTicketRequest, TicketRequest, TicketResponse};

/// Shared state for ticket handlers
pub struct TicketAppState<T, S, A>
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    pub tickets: Arc<T>,
    pub subscriptions: Arc<S>,
    pub accounts: Arc<A>,
    pub config: Arc<TicketConfig>,
}

impl<T, S, A> Clone for TicketAppState<T, S, A>
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            tickets: self.tickets.clone(),
            subscriptions: self.subscriptions.clone(),
            accounts: self.accounts.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T, S, A> TicketAppState<T, S, A>
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    fn use_case(&self) -> IssueTicketUseCase<T, S, A> {
        IssueTicketUseCase::new(
            self.tickets.clone(),
            self.subscriptions.clone(),
            self.accounts.clone(),
            self.config.clone(),
        )
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// POST /ticket
///
/// 200 with a usable ticket, 412 with the challenge still to be solved.
pub async fn request_ticket<T, S, A>(
    State(state): State<TicketAppState<T, S, A>>,
    Json(req): Json<TicketRequest>,
) -> TicketResult<impl IntoResponse>
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    let input = IssueTicketInput {
        from: AddressHash::parse(&req.from)?,
        to: AddressHash::parse(&req.to)?,
        subscription_id: req.subscription_id.as_deref().and_then(SubscriptionId::parse),
        ticket_id: req.ticket_id.map(TicketId::from),
        proof: req.proof,
    };

    let ticket = state.use_case().issue_or_resume_local(input).await?;

    let status = if ticket.is_valid() {
        StatusCode::OK
    } else {
        StatusCode::PRECONDITION_FAILED
    };

    Ok((status, Json(TicketResponse::from(&ticket))))
}

// ============================================================================
// Account ticket
// ============================================================================

/// POST /account/ticket
pub async fn issue_account_ticket<T, S, A>(
    State(state): State<TicketAppState<T, S, A>>,
    Json(req): Json<AccountTicketRequest>,
) -> TicketResult<Json<TicketResponse>>
where
    T: TicketRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
{
    let from = AddressHash::parse(&req.from)?;
    let to = AddressHash::parse(&req.to)?;
    let subscription_id = req.subscription_id.as_deref().and_then(SubscriptionId::parse);

    let ticket = state
        .use_case()
        .issue_for_remote(from, to, subscription_id)
        .await?;

    Ok(Json(TicketResponse::from(&ticket)))
}
