//! Inbound uploads from sending servers
//!
//! Every call presents a ticket; the message id is derived from it, so a
//! sender can only ever touch the message its ticket was issued for.

use crate::domain::entities::Header;
use crate::domain::repository::MessageStore;
use crate::domain::value_objects::{PartId, Section};
use crate::error::{RelayError, RelayResult};
use kernel::{MessageId, TicketId};
use std::sync::Arc;
use ticket::{AuthorizeUploadUseCase, Ticket, TicketRepository};
use tokio::sync::mpsc;

pub struct InboundService<T>
where
    T: TicketRepository,
{
    tickets: Arc<T>,
    store: Arc<dyn MessageStore>,
    queue: mpsc::Sender<MessageId>,
}

impl<T> InboundService<T>
where
    T: TicketRepository + Sync,
{
    pub fn new(tickets: Arc<T>, store: Arc<dyn MessageStore>, queue: mpsc::Sender<MessageId>) -> Self {
        Self {
            tickets,
            store,
            queue,
        }
    }

    async fn authorize(&self, ticket_id: TicketId) -> RelayResult<(Ticket, MessageId)> {
        let ticket = AuthorizeUploadUseCase::new(self.tickets.clone())
            .execute(ticket_id)
            .await?;
        Ok((ticket, ticket_id.message_id()))
    }

    pub async fn accept_header(&self, ticket_id: TicketId, body: &[u8]) -> RelayResult<MessageId> {
        let (ticket, msg_id) = self.authorize(ticket_id).await?;
        let header: Header = serde_json::from_slice(body)?;
        if !ticket.matches(header.from(), header.to()) {
            return Err(RelayError::AddressMismatch);
        }
        self.store.store_header(msg_id, &header).await?;
        Ok(msg_id)
    }

    pub async fn accept_catalog(&self, ticket_id: TicketId, body: &[u8]) -> RelayResult<MessageId> {
        let (_, msg_id) = self.authorize(ticket_id).await?;
        self.store.store_catalog(msg_id, body).await?;
        Ok(msg_id)
    }

    pub async fn accept_block(
        &self,
        ticket_id: TicketId,
        part_id: &str,
        body: &[u8],
    ) -> RelayResult<MessageId> {
        let part_id = PartId::parse(part_id)?;
        let (_, msg_id) = self.authorize(ticket_id).await?;
        self.store.store_block(msg_id, &part_id, body).await?;
        Ok(msg_id)
    }

    pub async fn accept_attachment(
        &self,
        ticket_id: TicketId,
        part_id: &str,
        body: &[u8],
    ) -> RelayResult<MessageId> {
        let part_id = PartId::parse(part_id)?;
        let (_, msg_id) = self.authorize(ticket_id).await?;
        self.store.store_attachment(msg_id, &part_id, body).await?;
        Ok(msg_id)
    }

    /// Retire the ticket of a fully uploaded message and hand it to the
    /// pipeline.
    ///
    /// The ticket goes first: once queued, no further part may reach the
    /// message. If the queue is closed the message stays in `incoming`
    /// without a ticket, where the incoming sweep picks it up.
    pub async fn complete(&self, ticket_id: TicketId) -> RelayResult<MessageId> {
        let (ticket, msg_id) = self.authorize(ticket_id).await?;
        if !self.store.is_complete(Section::Incoming, msg_id).await? {
            return Err(RelayError::IncompleteMessage);
        }

        AuthorizeUploadUseCase::new(self.tickets.clone())
            .revoke(ticket_id)
            .await?;

        self.queue
            .send(msg_id)
            .await
            .map_err(|_| RelayError::QueueClosed)?;

        tracing::info!(
            msg_id = %msg_id,
            from = %ticket.from(),
            to = %ticket.to(),
            "Accepted message"
        );
        Ok(msg_id)
    }

    /// Drop a partial upload together with its ticket.
    pub async fn delete(&self, ticket_id: TicketId) -> RelayResult<()> {
        let (_, msg_id) = self.authorize(ticket_id).await?;
        self.store.remove_message(Section::Incoming, msg_id).await?;
        AuthorizeUploadUseCase::new(self.tickets.clone())
            .revoke(ticket_id)
            .await?;

        tracing::debug!(msg_id = %msg_id, "Deleted partial upload");
        Ok(())
    }
}
