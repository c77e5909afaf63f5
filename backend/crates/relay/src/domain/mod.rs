//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Header, RetryInfo, directory entries)
//! - Domain value objects (Section, Part, PartId, BoxId)
//! - Domain services (retry backoff)
//! - Storage and collaborator traits

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
