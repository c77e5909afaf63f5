//! Authorize Upload Use Case
//!
//! Every part upload presents a ticket id; only validated tickets pass.

use crate::domain::entities::Ticket;
use crate::domain::repository::TicketRepository;
use crate::error::{TicketError, TicketResult};
use kernel::TicketId;
use std::sync::Arc;

pub struct AuthorizeUploadUseCase<T>
where
    T: TicketRepository,
{
    ticket_repo: Arc<T>,
}

impl<T> AuthorizeUploadUseCase<T>
where
    T: TicketRepository + Sync,
{
    pub fn new(ticket_repo: Arc<T>) -> Self {
        Self { ticket_repo }
    }

    /// Fetch the ticket and require it to be validated.
    pub async fn execute(&self, ticket_id: TicketId) -> TicketResult<Ticket> {
        let ticket = self
            .ticket_repo
            .fetch(ticket_id)
            .await?
            .ok_or(TicketError::TicketNotFound)?;

        if !ticket.is_valid() {
            return Err(TicketError::TicketNotValid);
        }

        Ok(ticket)
    }

    /// Drop the ticket once its message was accepted or abandoned.
    pub async fn revoke(&self, ticket_id: TicketId) -> TicketResult<()> {
        self.ticket_repo.remove(ticket_id).await?;
        tracing::debug!(ticket_id = %ticket_id, "Ticket revoked");
        Ok(())
    }
}
