//! Presentation Layer - HTTP handlers, DTOs, router

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
