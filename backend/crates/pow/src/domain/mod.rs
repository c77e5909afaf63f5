//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Work, ProofOfWork)
//! - Domain value objects (Difficulty, SearchLimits)
//! - Domain services (puzzle hash and verification)

pub mod entities;
pub mod services;
pub mod value_objects;
