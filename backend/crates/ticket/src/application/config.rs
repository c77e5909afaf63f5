//! Application Configuration

use pow::PowConfig;
use std::time::Duration;

/// Ticket application configuration
#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// How long an issued ticket stays in the store
    pub ticket_ttl: Duration,
    /// Challenge parameters handed to senders
    pub pow: PowConfig,
}

impl Default for TicketConfig {
    fn default() -> Self {
        let pow = PowConfig::default();
        Self {
            ticket_ttl: pow.challenge_ttl,
            pow,
        }
    }
}

impl TicketConfig {
    pub fn development() -> Self {
        let pow = PowConfig::development();
        Self {
            ticket_ttl: pow.challenge_ttl,
            pow,
        }
    }
}
