//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in `infra/` or, for
//! accounts, in the server binary.

use crate::domain::entities::Ticket;
use crate::domain::value_objects::SubscriptionId;
use crate::error::TicketResult;
use kernel::{AddressHash, TicketId};

/// Ticket repository trait
#[trait_variant::make(TicketRepository: Send)]
pub trait LocalTicketRepository {
    async fn fetch(&self, id: TicketId) -> TicketResult<Option<Ticket>>;

    /// Insert or overwrite; the repository applies the ticket lifetime.
    async fn store(&self, ticket: &Ticket) -> TicketResult<()>;

    async fn remove(&self, id: TicketId) -> TicketResult<()>;
}

/// Subscription repository trait
#[trait_variant::make(SubscriptionRepository: Send)]
pub trait LocalSubscriptionRepository {
    async fn has(
        &self,
        from: &AddressHash,
        to: &AddressHash,
        subscription_id: &SubscriptionId,
    ) -> TicketResult<bool>;
}

/// Accounts hosted on this server
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    async fn exists(&self, address: &AddressHash) -> TicketResult<bool>;
}
