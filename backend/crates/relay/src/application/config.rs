//! Application Configuration

use pow::PowConfig;
use std::time::Duration;

/// Relay pipeline configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deliveries running at the same time
    pub max_concurrent_deliveries: usize,
    /// Part uploads in flight per remote delivery
    pub max_concurrent_uploads: usize,
    /// Completed uploads waiting for dispatch
    pub queue_capacity: usize,
    /// How often the retry section is swept
    pub retry_interval: Duration,
    /// How often `processing` is checked for abandoned messages
    pub stuck_interval: Duration,
    /// Grace period for in-flight deliveries on shutdown
    pub shutdown_timeout: Duration,
    pub peer_connect_timeout: Duration,
    pub peer_request_timeout: Duration,
    /// Largest accepted part upload in bytes
    pub max_part_bytes: usize,
    /// Limits for solving a peer's challenge
    pub pow: PowConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: 16,
            max_concurrent_uploads: 8,
            queue_capacity: 1024,
            retry_interval: Duration::from_secs(5),
            stuck_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            peer_connect_timeout: Duration::from_secs(10),
            peer_request_timeout: Duration::from_secs(60),
            max_part_bytes: 16 * 1024 * 1024,
            pow: PowConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn development() -> Self {
        Self {
            max_concurrent_deliveries: 4,
            max_concurrent_uploads: 4,
            shutdown_timeout: Duration::from_secs(5),
            pow: PowConfig::development(),
            ..Self::default()
        }
    }
}
