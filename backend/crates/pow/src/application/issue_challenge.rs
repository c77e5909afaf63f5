//! Issue Challenge Use Case

use crate::application::config::PowConfig;
use crate::domain::entities::ProofOfWork;
use platform::crypto::random_bytes;

/// Mint a fresh challenge at the configured difficulty.
pub fn issue_challenge(config: &PowConfig) -> ProofOfWork {
    let challenge = ProofOfWork::new(
        config.difficulty_bits(),
        random_bytes(config.challenge_bytes_len),
        config.challenge_ttl_ms(),
    );

    tracing::debug!(
        difficulty = challenge.bits,
        expires_at_ms = challenge.expires_at_ms,
        "Issued proof-of-work challenge"
    );

    challenge
}
