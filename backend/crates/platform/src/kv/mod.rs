//! Expiring key/value storage
//!
//! Tickets and retry metadata only need `get`/`set`/`delete` with an optional
//! time-to-live. The capability is a trait; the backend is picked at startup
//! through [`KvBackend`].

mod backend;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::time::Duration;

pub use backend::KvBackend;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Key/value store whose entries may expire.
///
/// Expired entries are invisible to `get` even before `purge_expired`
/// physically removes them.
#[trait_variant::make(ExpiringStore: Send)]
pub trait LocalExpiringStore {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Insert or overwrite. `ttl = None` keeps the entry until deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> KvResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// Physically remove expired entries, returning how many were dropped.
    async fn purge_expired(&self) -> KvResult<u64>;
}
