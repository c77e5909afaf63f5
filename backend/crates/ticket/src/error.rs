//! Ticket Error Types
//!
//! Admission failures. All of them are reported synchronously to the caller
//! as RFC 7807 problem documents through `kernel::error::AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::InvalidAddressHash;
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::client::HeaderError;
use platform::kv::KvError;
use thiserror::Error;

/// Ticket-specific result type alias
pub type TicketResult<T> = Result<T, TicketError>;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressHash),

    #[error("Ticket not found or expired")]
    TicketNotFound,

    /// Ticket exists but its proof of work has not been accepted yet
    #[error("Ticket is not validated")]
    TicketNotValid,

    #[error("Sender or recipient does not match the ticket")]
    AddressMismatch,

    #[error("Recipient is not hosted on this server")]
    RecipientNotLocal,

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Account lookup failed: {0}")]
    AccountLookup(String),
}

impl TicketError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TicketError::InvalidAddress(_) | TicketError::Header(_) => ErrorKind::BadRequest,
            TicketError::TicketNotFound => ErrorKind::NotFound,
            TicketError::TicketNotValid => ErrorKind::PreconditionFailed,
            TicketError::AddressMismatch => ErrorKind::Conflict,
            TicketError::RecipientNotLocal => ErrorKind::UnprocessableEntity,
            TicketError::Unauthorized => ErrorKind::Unauthorized,
            TicketError::Storage(_) | TicketError::Serialization(_) => {
                ErrorKind::InternalServerError
            }
            TicketError::AccountLookup(_) => ErrorKind::ServiceUnavailable,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            TicketError::Storage(e) => tracing::error!(error = %e, "Ticket storage error"),
            TicketError::Serialization(e) => {
                tracing::error!(error = %e, "Ticket serialization error")
            }
            TicketError::AccountLookup(msg) => {
                tracing::error!(message = %msg, "Account lookup failed")
            }
            TicketError::Unauthorized => tracing::warn!("Rejected request with bad API key"),
            TicketError::RecipientNotLocal => {
                tracing::warn!("Rejected ticket request for non-local recipient")
            }
            _ => tracing::debug!(error = %self, "Ticket admission error"),
        }
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        let kind = err.kind();
        let app_err = AppError::new(kind, err.to_string());
        match err {
            TicketError::TicketNotValid => app_err
                .with_action("Solve the proof of work and request the ticket again"),
            TicketError::TicketNotFound => app_err.with_action("Request a new ticket"),
            _ => app_err,
        }
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases: Vec<(TicketError, StatusCode)> = vec![
            (
                TicketError::InvalidAddress(InvalidAddressHash),
                StatusCode::BAD_REQUEST,
            ),
            (TicketError::TicketNotFound, StatusCode::NOT_FOUND),
            (TicketError::TicketNotValid, StatusCode::PRECONDITION_FAILED),
            (TicketError::AddressMismatch, StatusCode::CONFLICT),
            (
                TicketError::RecipientNotLocal,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                TicketError::Header(HeaderError::MissingHeader("x-ticket".into())),
                StatusCode::BAD_REQUEST,
            ),
            (TicketError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                TicketError::Storage(KvError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_app_error_carries_action() {
        let app: AppError = TicketError::TicketNotValid.into();
        assert_eq!(app.status_code(), 412);
        assert!(app.action().is_some());
    }
}
