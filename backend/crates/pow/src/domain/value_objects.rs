//! Domain Value Objects
//!
//! Immutable value types for the PoW domain.

use std::time::{Duration, Instant};

/// Difficulty level for PoW, in leading zero bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const DEFAULT: Difficulty = Difficulty(22);
    /// Zero is allowed: it turns the challenge into a formality.
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 48;

    pub fn new(bits: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

/// Caller-imposed bounds on a proof search.
///
/// `None` leaves that dimension unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimits {
    pub max_attempts: Option<u64>,
    pub max_duration: Option<Duration>,
}

impl SearchLimits {
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            max_duration: None,
        }
    }

    pub const fn attempts(max: u64) -> Self {
        Self {
            max_attempts: Some(max),
            max_duration: None,
        }
    }

    pub const fn duration(max: Duration) -> Self {
        Self {
            max_attempts: None,
            max_duration: Some(max),
        }
    }

    pub(crate) fn deadline(&self, started: Instant) -> Option<Instant> {
        self.max_duration.and_then(|d| started.checked_add(d))
    }
}
