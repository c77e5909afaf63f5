//! PoW (Proof of Work) Engine
//!
//! Clean Architecture structure:
//! - `domain/` - puzzle hash, `Work`, `ProofOfWork`, value objects
//! - `application/` - challenge issuing and the multi-core search
//!
//! ## Puzzle
//! A proof `p` solves `(data, bits)` iff `SHA-256(data || p as u64 BE)` has at
//! least `bits` leading zero bits. Receivers issue random 32-byte challenges;
//! senders search for `p`. The search is bounded by [`SearchLimits`] and a
//! [`CancelFlag`], never by the receiving side.

pub mod application;
pub mod domain;
pub mod error;

pub use application::config::PowConfig;
pub use application::issue_challenge::issue_challenge;
pub use application::search::{CancelFlag, search_parallel, solve};
pub use domain::entities::{ProofOfWork, Work};
pub use domain::value_objects::{Difficulty, SearchLimits};
pub use error::{PowError, PowResult};
