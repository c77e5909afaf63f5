//! Upload ticket lookup for the incoming sweep

use crate::domain::repository::UploadTickets;
use async_trait::async_trait;
use kernel::MessageId;
use std::sync::Arc;
use ticket::{TicketRepository, TicketResult};

pub struct TicketUploads<T> {
    tickets: Arc<T>,
}

impl<T> TicketUploads<T> {
    pub fn new(tickets: Arc<T>) -> Self {
        Self { tickets }
    }
}

#[async_trait]
impl<T> UploadTickets for TicketUploads<T>
where
    T: TicketRepository + Send + Sync + 'static,
{
    async fn is_open(&self, msg_id: MessageId) -> TicketResult<bool> {
        Ok(self.tickets.fetch(msg_id.ticket_id()).await?.is_some())
    }
}
