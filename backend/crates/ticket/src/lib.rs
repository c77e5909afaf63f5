//! Ticket Manager
//!
//! Clean Architecture structure:
//! - `domain/` - `Ticket`, subscription ids, repository traits
//! - `application/` - issuing, resuming and authorizing tickets
//! - `infra/` - key/value ticket storage, in-memory registries
//! - `presentation/` - `/ticket` and `/account/ticket` handlers, API key guard
//!
//! ## Admission model
//! A sending server asks for a ticket per `(from, to)` pair. Known
//! subscriptions get a valid ticket at once; everyone else gets a
//! proof-of-work challenge and resubmits the same ticket id with the
//! solution. Uploads are only accepted against a valid ticket.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::authorize_upload::AuthorizeUploadUseCase;
pub use application::config::TicketConfig;
pub use application::issue_ticket::{IssueTicketInput, IssueTicketUseCase};
pub use domain::entities::Ticket;
pub use domain::repository::{AccountRepository, SubscriptionRepository, TicketRepository};
pub use domain::value_objects::SubscriptionId;
pub use error::{TicketError, TicketResult};
pub use infra::kv::KvTicketRepository;
pub use infra::memory::{MemoryAccountRepository, MemorySubscriptionRepository};
pub use presentation::dto::{ChallengeDto, TicketRequest, TicketResponse};
pub use presentation::handlers::TicketAppState;
pub use presentation::middleware::{ApiKeyState, require_api_key};
pub use presentation::router::ticket_router;
