//! Infrastructure Layer - Storage implementations

pub mod kv;
pub mod memory;
