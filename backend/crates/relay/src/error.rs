//! Relay Error Types
//!
//! Collaborator errors (`StoreError`, `PeerError`, `ResolveError`,
//! `MailboxError`) feed into `DeliveryError`, which only decides between
//! retrying and discarding. `RelayError` is what the inbound HTTP surface
//! reports to senders.

use crate::domain::value_objects::{InvalidPartId, Part, Section};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use kernel::{AddressHash, MessageId};
use platform::kv::KvError;
use pow::PowError;
use thiserror::Error;
use ticket::TicketError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Message {msg_id} not found in {section}")]
    NotFound { section: Section, msg_id: MessageId },

    #[error("Part {part} of message {msg_id} not found in {section}")]
    PartNotFound {
        section: Section,
        msg_id: MessageId,
        part: Part,
    },

    #[error("{what} already exists for message {msg_id}")]
    AlreadyExists { msg_id: MessageId, what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::PartNotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Invalid peer endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Peer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Peer answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Peer rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No directory entry for {0}")]
    NotFound(String),

    #[error("Resolver request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resolver error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("No local account for {0}")]
    UnknownAccount(AddressHash),

    #[error("Mailbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mailbox serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Mailbox error: {0}")]
    Backend(String),
}

/// Why a delivery attempt did not finish.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Worth another attempt later
    #[error("{0}")]
    Transient(String),

    /// The message itself is bad; retrying cannot help
    #[error("{0}")]
    Integrity(String),
}

macro_rules! transient_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for DeliveryError {
                fn from(err: $source) -> Self {
                    DeliveryError::Transient(err.to_string())
                }
            }
        )*
    };
}

transient_from!(
    StoreError,
    PeerError,
    ResolveError,
    MailboxError,
    PowError,
    serde_json::Error,
    tokio::task::JoinError,
);

pub type RelayResult<T> = Result<T, RelayError>;

/// Errors reported to uploading senders
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    InvalidPartId(#[from] InvalidPartId),

    #[error("Malformed header: {0}")]
    MalformedHeader(#[from] serde_json::Error),

    #[error("Header addresses do not match the ticket")]
    AddressMismatch,

    #[error("Message is missing its header or catalog")]
    IncompleteMessage,

    #[error("Part was already uploaded")]
    DuplicatePart,

    #[error("Message store error: {0}")]
    Store(StoreError),

    #[error("Delivery queue is closed")]
    QueueClosed,
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { .. } => RelayError::DuplicatePart,
            other => RelayError::Store(other),
        }
    }
}

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Ticket(e) => e.kind(),
            RelayError::InvalidPartId(_) | RelayError::MalformedHeader(_) => ErrorKind::BadRequest,
            RelayError::AddressMismatch | RelayError::DuplicatePart => ErrorKind::Conflict,
            RelayError::IncompleteMessage => ErrorKind::UnprocessableEntity,
            RelayError::Store(_) => ErrorKind::InternalServerError,
            RelayError::QueueClosed => ErrorKind::ServiceUnavailable,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            RelayError::Store(e) => tracing::error!(error = %e, "Message store error"),
            RelayError::QueueClosed => tracing::error!("Delivery queue closed"),
            RelayError::AddressMismatch => {
                tracing::warn!("Rejected header not matching its ticket")
            }
            _ => tracing::debug!(error = %self, "Upload rejected"),
        }
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Ticket(e) => e.into(),
            RelayError::IncompleteMessage => AppError::new(err.kind(), err.to_string())
                .with_action("Upload the header and catalog before completing"),
            other => AppError::new(other.kind(), other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let RelayError::Ticket(e) = self {
            return e.into_response();
        }
        self.log();
        // Internal details stay in the log.
        let app_err = if self.kind().is_server_error() {
            AppError::new(self.kind(), self.kind().as_str())
        } else {
            AppError::from(self)
        };
        app_err.into_response()
    }
}
