//! Shared Kernel - Domain-crossing minimal core
//!
//! Vocabulary every other crate agrees on:
//! - the boundary error type ([`error::app_error::AppError`]) and its kinds
//! - typed identifiers for tickets and messages
//! - validated address hashes

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod address;
pub mod id;

pub use address::{AddressHash, InvalidAddressHash};
pub use id::{MessageId, TicketId};
