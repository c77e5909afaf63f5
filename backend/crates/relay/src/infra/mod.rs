//! Infrastructure Layer - Spool backends, retry storage, network clients

pub mod file_store;
pub mod kv_retry;
pub mod memory_store;
pub mod peer;
pub mod resolver;
pub mod ticket_uploads;
