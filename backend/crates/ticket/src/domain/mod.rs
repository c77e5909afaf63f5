//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Ticket)
//! - Domain value objects (SubscriptionId)
//! - Repository traits (tickets, subscriptions, local accounts)

pub mod entities;
pub mod repository;
pub mod value_objects;
