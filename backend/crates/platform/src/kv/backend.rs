//! Startup-selected backend

use super::{ExpiringStore, KvResult, MemoryStore};
use std::time::Duration;

#[cfg(feature = "postgres")]
use super::PgStore;

/// Concrete backend chosen from configuration.
#[derive(Debug, Clone)]
pub enum KvBackend {
    Memory(MemoryStore),
    #[cfg(feature = "postgres")]
    Postgres(PgStore),
}

impl KvBackend {
    pub fn name(&self) -> &'static str {
        match self {
            KvBackend::Memory(_) => "memory",
            #[cfg(feature = "postgres")]
            KvBackend::Postgres(_) => "postgres",
        }
    }
}

impl Default for KvBackend {
    fn default() -> Self {
        KvBackend::Memory(MemoryStore::new())
    }
}

impl ExpiringStore for KvBackend {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        match self {
            KvBackend::Memory(store) => store.get(key).await,
            #[cfg(feature = "postgres")]
            KvBackend::Postgres(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> KvResult<()> {
        match self {
            KvBackend::Memory(store) => store.set(key, value, ttl).await,
            #[cfg(feature = "postgres")]
            KvBackend::Postgres(store) => store.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        match self {
            KvBackend::Memory(store) => store.delete(key).await,
            #[cfg(feature = "postgres")]
            KvBackend::Postgres(store) => store.delete(key).await,
        }
    }

    async fn purge_expired(&self) -> KvResult<u64> {
        match self {
            KvBackend::Memory(store) => store.purge_expired().await,
            #[cfg(feature = "postgres")]
            KvBackend::Postgres(store) => store.purge_expired().await,
        }
    }
}
