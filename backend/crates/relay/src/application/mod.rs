//! Application Layer - Delivery pipeline and inbound uploads

pub mod config;
pub mod inbound;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod scoreboard;
pub mod signing;
