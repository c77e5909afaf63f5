//! Application Layer - Use Cases
//!
//! Issuing challenges on the receiving side, solving them on the sending side.

pub mod config;
pub mod issue_challenge;
pub mod search;
