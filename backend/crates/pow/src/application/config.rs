//! Application Configuration
//!
//! Configuration for issuing and solving challenges.

use crate::domain::value_objects::{Difficulty, SearchLimits};
use std::time::Duration;

/// PoW application configuration
#[derive(Debug, Clone)]
pub struct PowConfig {
    /// Challenge bytes length
    pub challenge_bytes_len: usize,
    /// Difficulty demanded from senders
    pub difficulty: Difficulty,
    /// Challenge lifetime; matches the ticket lifetime
    pub challenge_ttl: Duration,
    /// Threads used when this server has to solve a peer's challenge
    pub search_workers: usize,
    /// Bounds applied to outbound searches
    pub search_limits: SearchLimits,
}

impl Default for PowConfig {
    fn default() -> Self {
        let challenge_ttl = Duration::from_secs(30 * 60);
        Self {
            challenge_bytes_len: 32,
            difficulty: Difficulty::DEFAULT,
            challenge_ttl,
            search_workers: num_cpus::get(),
            search_limits: SearchLimits::duration(challenge_ttl),
        }
    }
}

impl PowConfig {
    /// Cheap puzzles for local development and tests
    pub fn development() -> Self {
        Self {
            difficulty: Difficulty::new(8).unwrap_or_default(),
            search_workers: 2,
            ..Self::default()
        }
    }

    pub fn difficulty_bits(&self) -> u8 {
        self.difficulty.bits()
    }

    pub fn challenge_ttl_ms(&self) -> i64 {
        self.challenge_ttl.as_millis() as i64
    }
}
