//! Relay Pipeline
//!
//! Clean Architecture structure:
//! - `domain/` - headers, message parts, retry bookkeeping, collaborator traits
//! - `application/` - delivery orchestration, scoreboard, retry scheduling, main loop
//! - `infra/` - file and memory spools, key/value retry storage, HTTP peers and directory
//! - `presentation/` - `/incoming/*` upload handlers and `/admin/flush`
//!
//! ## Message lifecycle
//! Uploaded parts land in `incoming`. Completing the upload queues the
//! message; the main loop claims it on the scoreboard, moves it into
//! `processing` and hands it to a bounded worker pool. A delivery ends in a
//! local mailbox, on a remote server, in `retry` with backoff, or discarded.
//! Whatever is left in `processing` after a crash is recovered by the stuck
//! sweep and retried. Completed uploads lost from the in-memory queue are
//! found again by the incoming sweep, which also drops uploads whose ticket
//! is gone.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::RelayConfig;
pub use application::inbound::InboundService;
pub use application::orchestrator::{DeliveryOrchestrator, DeliveryOutcome, DeliveryServices};
pub use application::pipeline::{FlushReport, IncomingSweep, Pipeline};
pub use application::scoreboard::Scoreboard;
pub use application::signing::{HeaderSigner, SigningKeyError, verify_header};
pub use domain::entities::{AddressInfo, DeliverableMessage, Header, RetryInfo, RoutingInfo};
pub use domain::repository::{
    Mailbox, MessageStore, PeerClient, PeerConnector, Resolver, RetryRepository, UploadTickets,
};
pub use domain::value_objects::{BoxId, Part, PartId, Section};
pub use error::{
    DeliveryError, MailboxError, PeerError, RelayError, RelayResult, ResolveError, StoreError,
};
pub use infra::file_store::FileMessageStore;
pub use infra::kv_retry::KvRetryRepository;
pub use infra::memory_store::MemoryMessageStore;
pub use infra::peer::{HttpPeerClient, HttpPeerConnector};
pub use infra::resolver::{HttpResolver, StaticResolver};
pub use infra::ticket_uploads::TicketUploads;
pub use presentation::handlers::RelayAppState;
pub use presentation::router::relay_router;

#[cfg(test)]
mod tests;
