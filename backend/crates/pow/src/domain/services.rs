//! Domain Services
//!
//! The puzzle function. Issuer and solver must hash identically:
//! `SHA-256(data || proof as u64 big-endian)`.

use sha2::{Digest, Sha256};

/// Count leading zero bits in a SHA-256 hash (0..=256)
pub fn count_leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut count = 0u32;
    for &byte in hash {
        if byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}

/// Verify that a hash meets the difficulty requirement
pub fn verify_difficulty(hash: &[u8; 32], difficulty_bits: u8) -> bool {
    count_leading_zero_bits(hash) >= u32::from(difficulty_bits)
}

/// Compute SHA-256 of concatenated data and proof (big-endian)
pub fn compute_pow_hash(data: &[u8], proof: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(proof.to_be_bytes());
    hasher.finalize().into()
}

pub fn verify_pow(data: &[u8], proof: u64, difficulty_bits: u8) -> bool {
    // Zero difficulty accepts everything; skip the hash.
    if difficulty_bits == 0 {
        return true;
    }
    verify_difficulty(&compute_pow_hash(data, proof), difficulty_bits)
}
