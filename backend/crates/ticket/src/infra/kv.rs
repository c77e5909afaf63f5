//! Ticket storage on top of an expiring key/value store

use crate::domain::entities::Ticket;
use crate::domain::repository::TicketRepository;
use crate::error::TicketResult;
use kernel::TicketId;
use platform::kv::ExpiringStore;
use std::time::Duration;

const KEY_PREFIX: &str = "ticket:";

fn key(id: TicketId) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Tickets serialized as JSON; each write refreshes the ticket lifetime.
#[derive(Debug, Clone)]
pub struct KvTicketRepository<S> {
    store: S,
    ttl: Duration,
}

impl<S> KvTicketRepository<S>
where
    S: ExpiringStore + Sync,
{
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

impl<S> TicketRepository for KvTicketRepository<S>
where
    S: ExpiringStore + Sync,
{
    async fn fetch(&self, id: TicketId) -> TicketResult<Option<Ticket>> {
        let Some(bytes) = self.store.get(&key(id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn store(&self, ticket: &Ticket) -> TicketResult<()> {
        let bytes = serde_json::to_vec(ticket)?;
        self.store
            .set(&key(ticket.id()), bytes, Some(self.ttl))
            .await?;
        Ok(())
    }

    async fn remove(&self, id: TicketId) -> TicketResult<()> {
        self.store.delete(&key(id)).await?;
        Ok(())
    }
}
