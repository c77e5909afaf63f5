//! Domain Services - retry backoff policy

use std::time::Duration;

/// A message that has failed more often than this is abandoned.
pub const MAX_RETRIES: u32 = 30;

const MINUTE: u64 = 60;

/// Delay before the next attempt after `retries` failures.
///
/// Zero means "give up": the retry sweep abandons the message.
pub fn next_retry_duration(retries: u32) -> Duration {
    let minutes = match retries {
        0..5 => 1,
        5..17 => 5,
        17..25 => 30,
        25..MAX_RETRIES => 60,
        _ => 0,
    };
    Duration::from_secs(minutes * MINUTE)
}

/// Whether a message with this many failures is past the cutoff.
pub fn is_exhausted(retries: u32) -> bool {
    retries > MAX_RETRIES
}
