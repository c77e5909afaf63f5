//! Bounded delivery worker pool

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// Runs deliveries as tasks, at most `max_concurrent` at a time.
///
/// Submitting never waits for a free slot; tasks queue on the semaphore.
#[derive(Debug)]
pub struct DeliveryPool {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl DeliveryPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub async fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let mut tasks = self.tasks.lock().await;
        while let Some(finished) = tasks.try_join_next() {
            log_join(finished);
        }
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }

    /// Tasks submitted and not yet reaped.
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait until every submitted task has finished.
    pub async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(finished) = tasks.join_next().await {
            log_join(finished);
        }
    }

    /// Wait up to `grace` for submitted tasks.
    ///
    /// Returns `false` if tasks were still running when the grace period
    /// ran out; those are detached, not aborted.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let mut tasks = self.tasks.lock().await;

        let drained = tokio::time::timeout(grace, async {
            while let Some(finished) = tasks.join_next().await {
                log_join(finished);
            }
        })
        .await
        .is_ok();

        if drained {
            tracing::info!("All in-flight deliveries completed");
        } else {
            tracing::warn!(
                remaining = tasks.len(),
                "Shutdown timeout exceeded, remaining deliveries resume from processing on restart"
            );
            tasks.detach_all();
        }
        drained
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Delivery task panicked");
        } else {
            tracing::debug!(error = %e, "Delivery task cancelled");
        }
    }
}
