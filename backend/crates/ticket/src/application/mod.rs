//! Application Layer - Use Cases

pub mod authorize_upload;
pub mod config;
pub mod issue_ticket;
