//! In-memory subscription and account registries

use crate::domain::repository::{AccountRepository, SubscriptionRepository};
use crate::domain::value_objects::SubscriptionId;
use crate::error::TicketResult;
use kernel::AddressHash;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

type SubscriptionKey = (AddressHash, AddressHash, SubscriptionId);

#[derive(Debug, Clone, Default)]
pub struct MemorySubscriptionRepository {
    entries: Arc<RwLock<HashSet<SubscriptionKey>>>,
}

impl MemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, from: AddressHash, to: AddressHash, subscription_id: SubscriptionId) {
        self.entries.write().insert((from, to, subscription_id));
    }
}

impl SubscriptionRepository for MemorySubscriptionRepository {
    async fn has(
        &self,
        from: &AddressHash,
        to: &AddressHash,
        subscription_id: &SubscriptionId,
    ) -> TicketResult<bool> {
        let key = (from.clone(), to.clone(), subscription_id.clone());
        Ok(self.entries.read().contains(&key))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAccountRepository {
    accounts: Arc<RwLock<HashSet<AddressHash>>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, address: AddressHash) {
        self.accounts.write().insert(address);
    }
}

impl AccountRepository for MemoryAccountRepository {
    async fn exists(&self, address: &AddressHash) -> TicketResult<bool> {
        Ok(self.accounts.read().contains(address))
    }
}
