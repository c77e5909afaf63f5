//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, Base64, Ed25519)
//! - Request header extraction (ticket id, API key, client IP)
//! - Expiring key/value storage with swappable backends

pub mod client;
pub mod crypto;
pub mod kv;
