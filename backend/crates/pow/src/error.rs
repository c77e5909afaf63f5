//! PoW Error Types
//!
//! Errors from the engine. They never reach a client directly: the ticket
//! layer reports a rejected proof as an unvalidated ticket, and the relay
//! treats a failed search as a transient delivery fault.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// PoW-specific result type alias
pub type PowResult<T> = Result<T, PowError>;

#[derive(Debug, Error)]
pub enum PowError {
    #[error("Difficulty of {0} bits is out of range")]
    InvalidDifficulty(u8),

    #[error("Search gave up after {attempts} attempts")]
    SearchExhausted { attempts: u64 },

    #[error("Search timed out after {elapsed_ms} ms")]
    SearchTimedOut { elapsed_ms: u64 },

    #[error("Search cancelled")]
    SearchCancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PowError::InvalidDifficulty(_) => ErrorKind::BadRequest,
            PowError::SearchExhausted { .. } | PowError::SearchCancelled => {
                ErrorKind::ServiceUnavailable
            }
            PowError::SearchTimedOut { .. } => ErrorKind::RequestTimeout,
            PowError::Internal(_) => ErrorKind::InternalServerError,
        }
    }
}

impl From<PowError> for AppError {
    fn from(err: PowError) -> Self {
        let kind = err.kind();
        AppError::new(kind, err.to_string())
    }
}
