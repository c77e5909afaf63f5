//! Multi-core proof search
//!
//! Used when this server relays to a peer that demands work. The search is
//! CPU-bound and blocking; async callers run it on a blocking thread.

use crate::application::config::PowConfig;
use crate::domain::entities::Work;
use crate::domain::value_objects::{Difficulty, SearchLimits};
use crate::error::{PowError, PowResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

/// Shared cancellation switch for a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Search with `workers` threads; worker `i` tries `i, i + n, i + 2n, ...`.
///
/// The first proof found wins and stops every other worker. `max_attempts`
/// is the total budget across all workers.
pub fn search_parallel(
    bits: u8,
    data: &[u8],
    workers: usize,
    limits: &SearchLimits,
    cancel: &CancelFlag,
) -> PowResult<u64> {
    let workers = workers.max(1);
    let step = workers as u64;
    let per_worker_budget = limits.max_attempts.map(|max| max.div_ceil(step).max(1));
    let deadline = limits.deadline(Instant::now());

    let found = OnceLock::new();
    let stop = AtomicBool::new(false);

    let failures: Vec<PowError> = thread::scope(|scope| {
        let handles: Vec<_> = (0..step)
            .map(|start| {
                let (found, stop) = (&found, &stop);
                scope.spawn(move || {
                    let mut work = Work::new(bits, data.to_vec(), start);
                    let outcome = work.scan(
                        start,
                        step,
                        per_worker_budget,
                        deadline,
                        cancel.flag(),
                        stop,
                    );
                    if let Ok(Some(proof)) = outcome {
                        let _ = found.set(proof);
                        stop.store(true, Ordering::Relaxed);
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(Err(err)) => Some(err),
                Ok(Ok(_)) => None,
                Err(_) => Some(PowError::Internal("search worker panicked".to_string())),
            })
            .collect()
    });

    if let Some(proof) = found.get() {
        return Ok(*proof);
    }

    if cancel.is_cancelled() {
        return Err(PowError::SearchCancelled);
    }

    Err(failures
        .into_iter()
        .next()
        .unwrap_or(PowError::SearchCancelled))
}

/// Solve a peer's challenge with this server's configured workers and limits.
///
/// Challenges harder than [`Difficulty::MAX`] are refused without searching.
pub fn solve(bits: u8, data: &[u8], config: &PowConfig, cancel: &CancelFlag) -> PowResult<u64> {
    Difficulty::new(bits).ok_or(PowError::InvalidDifficulty(bits))?;

    let started = Instant::now();
    let result = search_parallel(
        bits,
        data,
        config.search_workers,
        &config.search_limits,
        cancel,
    );

    match &result {
        Ok(proof) => tracing::info!(
            bits,
            proof,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Solved proof-of-work challenge"
        ),
        Err(e) => tracing::warn!(bits, error = %e, "Proof-of-work search failed"),
    }

    result
}
