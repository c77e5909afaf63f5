//! Domain Entities
//!
//! [`Work`] is a checkable puzzle instance; [`ProofOfWork`] is the challenge
//! a server hands out and later verifies.

use crate::domain::services::verify_pow;
use crate::domain::value_objects::SearchLimits;
use crate::error::{PowError, PowResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// How many hashes a worker computes between checks of the cancel flag,
/// the deadline and the sibling-found flag.
pub(crate) const CHECK_INTERVAL: u64 = 4096;

/// A puzzle instance: `data` plus a candidate `proof` at difficulty `bits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    bits: u8,
    data: Vec<u8>,
    proof: u64,
}

impl Work {
    pub fn new(bits: u8, data: Vec<u8>, proof: u64) -> Self {
        Self { bits, data, proof }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    /// Recompute the puzzle hash over `(data, proof)` and check the difficulty.
    pub fn validate(&self) -> bool {
        verify_pow(&self.data, self.proof, self.bits)
    }

    /// Single-core search: tries proofs 0, 1, 2, ... until one validates.
    ///
    /// On success the found proof is stored in `self` and returned.
    pub fn search(&mut self, limits: &SearchLimits, cancel: &AtomicBool) -> PowResult<u64> {
        let never = AtomicBool::new(false);
        let started = Instant::now();
        let deadline = limits.deadline(started);
        match self.scan(0, 1, limits.max_attempts, deadline, cancel, &never)? {
            Some(proof) => Ok(proof),
            // `never` is never raised, so the scan cannot stop without a result.
            None => Err(PowError::SearchCancelled),
        }
    }

    /// Strided scan shared by the single- and multi-core searches.
    ///
    /// Returns `Ok(None)` when `stop` was raised by a sibling worker.
    pub(crate) fn scan(
        &mut self,
        start: u64,
        step: u64,
        budget: Option<u64>,
        deadline: Option<Instant>,
        cancel: &AtomicBool,
        stop: &AtomicBool,
    ) -> PowResult<Option<u64>> {
        let started = Instant::now();
        let mut attempts: u64 = 0;
        self.proof = start;

        loop {
            if attempts % CHECK_INTERVAL == 0 {
                if stop.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                if cancel.load(Ordering::Relaxed) {
                    return Err(PowError::SearchCancelled);
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(PowError::SearchTimedOut {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }

            if self.validate() {
                return Ok(Some(self.proof));
            }

            attempts += 1;
            if budget.is_some_and(|max| attempts >= max) {
                return Err(PowError::SearchExhausted { attempts });
            }

            self.proof = self
                .proof
                .checked_add(step)
                .ok_or(PowError::SearchExhausted { attempts })?;
        }
    }
}

/// A challenge issued by a server, optionally carrying the solver's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfWork {
    pub bits: u8,
    #[serde(with = "platform::crypto::serde_base64")]
    pub challenge: Vec<u8>,
    proof: Option<u64>,
    pub expires_at_ms: i64,
}

impl ProofOfWork {
    pub fn new(bits: u8, challenge: Vec<u8>, ttl_ms: i64) -> Self {
        Self {
            bits,
            challenge,
            proof: None,
            expires_at_ms: Utc::now().timestamp_millis() + ttl_ms,
        }
    }

    pub fn proof(&self) -> Option<u64> {
        self.proof
    }

    pub fn has_done_work(&self) -> bool {
        self.proof.is_some()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() > self.expires_at_ms
    }

    /// Would `proof` solve this challenge? Does not record it.
    pub fn accepts(&self, proof: u64) -> bool {
        !self.is_expired() && self.work(proof).validate()
    }

    /// Record the solution. Only the first call has any effect.
    pub fn set_proof(&mut self, proof: u64) -> bool {
        if self.proof.is_some() {
            return false;
        }
        self.proof = Some(proof);
        true
    }

    /// Work has been recorded, it validates, and the challenge is still live.
    pub fn is_valid(&self) -> bool {
        self.proof.is_some_and(|p| self.accepts(p))
    }

    pub fn work(&self, proof: u64) -> Work {
        Work::new(self.bits, self.challenge.clone(), proof)
    }

    pub fn challenge_b64(&self) -> String {
        platform::crypto::to_base64(&self.challenge)
    }
}
