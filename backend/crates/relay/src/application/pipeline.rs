//! Relay pipeline main loop
//!
//! One coordinating loop owns the queue of completed uploads plus the retry
//! and stuck-message timers. It never awaits a delivery: each one is handed
//! to the [`DeliveryPool`] together with its scoreboard claim.
//!
//! The stuck timer also sweeps `incoming`. Its first tick fires as soon as
//! the loop starts, which is what picks up work left behind by a restart.

use crate::application::config::RelayConfig;
use crate::application::orchestrator::{DeliveryOrchestrator, DeliveryServices};
use crate::application::pool::DeliveryPool;
use crate::application::retry::{RetryAction, classify};
use crate::application::scoreboard::Scoreboard;
use crate::domain::repository::{MessageStore, UploadTickets};
use crate::domain::value_objects::Section;
use kernel::MessageId;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Result of a forced sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    /// Retry-section messages dispatched
    pub retried: usize,
    /// Abandoned processing messages moved to retry
    pub recovered: usize,
    /// Completed uploads dispatched from `incoming`
    pub resumed: usize,
    /// Unfinished uploads removed after their ticket was gone
    pub pruned: usize,
}

/// Result of one pass over `incoming`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomingSweep {
    pub resumed: usize,
    pub pruned: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    store: Arc<dyn MessageStore>,
    uploads: Arc<dyn UploadTickets>,
    orchestrator: Arc<DeliveryOrchestrator>,
    scoreboard: Scoreboard,
    pool: DeliveryPool,
    config: Arc<RelayConfig>,
}

impl Pipeline {
    /// `uploads` tells the incoming sweep which uploads are still open.
    pub fn new(
        services: DeliveryServices,
        uploads: Arc<dyn UploadTickets>,
        config: RelayConfig,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            inner: Arc::new(PipelineInner {
                store: services.store.clone(),
                uploads,
                orchestrator: Arc::new(DeliveryOrchestrator::new(services, config.clone())),
                scoreboard: Scoreboard::new(),
                pool: DeliveryPool::new(config.max_concurrent_deliveries),
                config,
            }),
        }
    }

    /// Queue the upload handlers feed completed message ids into.
    pub fn channel(&self) -> (mpsc::Sender<MessageId>, mpsc::Receiver<MessageId>) {
        mpsc::channel(self.inner.config.queue_capacity.max(1))
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.inner.scoreboard
    }

    pub fn orchestrator(&self) -> &Arc<DeliveryOrchestrator> {
        &self.inner.orchestrator
    }

    /// Run until `shutdown` fires, then drain in-flight deliveries.
    pub async fn run(
        &self,
        mut queue: mpsc::Receiver<MessageId>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let config = &self.inner.config;
        let mut retry_timer = tokio::time::interval(config.retry_interval);
        let mut stuck_timer = tokio::time::interval(config.stuck_interval);
        retry_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stuck_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            max_concurrent = config.max_concurrent_deliveries,
            "Relay pipeline starting"
        );

        loop {
            tokio::select! {
                Some(msg_id) = queue.recv() => {
                    self.dispatch(Section::Incoming, msg_id).await;
                }
                _ = retry_timer.tick() => {
                    self.process_retry_queue(false).await;
                }
                _ = stuck_timer.tick() => {
                    self.process_stuck_messages().await;
                    self.process_incoming().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Relay pipeline received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Wait for in-flight deliveries within the configured grace period.
    pub async fn shutdown(&self) {
        let drained = self
            .inner
            .pool
            .shutdown(self.inner.config.shutdown_timeout)
            .await;
        if !drained {
            self.inner.orchestrator.cancel_searches();
        }
        tracing::info!("Relay pipeline shutdown complete");
    }

    /// Claim `msg_id`, move it into `processing` and start its delivery.
    ///
    /// Returns `false` if another task owns the message or it is no longer
    /// in `from`.
    pub async fn dispatch(&self, from: Section, msg_id: MessageId) -> bool {
        let Some(guard) = self.inner.scoreboard.claim(Section::Processing, msg_id) else {
            tracing::debug!(msg_id = %msg_id, "Message already being delivered");
            return false;
        };

        if let Err(e) = self
            .inner
            .store
            .move_message(from, Section::Processing, msg_id)
            .await
        {
            if e.is_not_found() {
                tracing::debug!(msg_id = %msg_id, from = %from, "Message already taken");
            } else {
                tracing::warn!(msg_id = %msg_id, from = %from, error = %e, "Failed to claim message");
            }
            return false;
        }

        let orchestrator = self.inner.orchestrator.clone();
        self.inner
            .pool
            .submit(async move {
                let _claim = guard;
                orchestrator.process_message(msg_id).await;
            })
            .await;
        true
    }

    /// Dispatch due retries; `force` ignores `retry_at` but never revives
    /// an exhausted message. Returns how many were dispatched.
    pub async fn process_retry_queue(&self, force: bool) -> usize {
        let ids = match self.inner.store.list_messages(Section::Retry).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list retry queue");
                return 0;
            }
        };

        let retry = self.inner.orchestrator.retry_scheduler();
        let now = retry.now();
        let mut dispatched = 0;

        for msg_id in ids {
            if self.inner.scoreboard.is_present(Section::Processing, msg_id) {
                continue;
            }
            let info = match retry.info(msg_id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(msg_id = %msg_id, error = %e, "Failed to read retry info");
                    continue;
                }
            };

            match classify(info.as_ref(), now, force) {
                RetryAction::Abandon => {
                    let Some(_claim) = self.inner.scoreboard.claim(Section::Processing, msg_id)
                    else {
                        continue;
                    };
                    tracing::warn!(
                        msg_id = %msg_id,
                        retries = info.as_ref().map(|i| i.retries),
                        "Abandoning message after too many retries"
                    );
                    retry.discard(Section::Retry, msg_id).await;
                }
                RetryAction::Requeue => {
                    if self.dispatch(Section::Retry, msg_id).await {
                        dispatched += 1;
                    }
                }
                RetryAction::Wait => {}
            }
        }

        if dispatched > 0 {
            tracing::info!(dispatched, force, "Processed retry queue");
        }
        dispatched
    }

    /// Move unowned messages out of `processing` so the retry sweep sees
    /// them again. Retry info is left untouched.
    pub async fn process_stuck_messages(&self) -> usize {
        let ids = match self.inner.store.list_messages(Section::Processing).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list processing section");
                return 0;
            }
        };

        let mut recovered = 0;
        for msg_id in ids {
            let Some(_claim) = self.inner.scoreboard.claim(Section::Processing, msg_id) else {
                continue;
            };
            match self
                .inner
                .store
                .move_message(Section::Processing, Section::Retry, msg_id)
                .await
            {
                Ok(()) => {
                    tracing::warn!(msg_id = %msg_id, "Recovered stuck message");
                    recovered += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(msg_id = %msg_id, error = %e, "Failed to recover stuck message")
                }
            }
        }
        recovered
    }

    /// Pick up `incoming` messages whose ticket is gone.
    ///
    /// A complete one was accepted but never dispatched, for example when
    /// the queue was lost in a restart; it is dispatched now. An incomplete
    /// one can never be finished and is removed. Messages with a live ticket
    /// are still being uploaded and stay untouched.
    pub async fn process_incoming(&self) -> IncomingSweep {
        let ids = match self.inner.store.list_messages(Section::Incoming).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list incoming section");
                return IncomingSweep::default();
            }
        };

        let mut sweep = IncomingSweep::default();
        for msg_id in ids {
            if self.inner.scoreboard.is_present(Section::Processing, msg_id) {
                continue;
            }
            match self.inner.uploads.is_open(msg_id).await {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    tracing::warn!(msg_id = %msg_id, error = %e, "Failed to look up upload ticket");
                    continue;
                }
            }

            match self.inner.store.is_complete(Section::Incoming, msg_id).await {
                Ok(true) => {
                    if self.dispatch(Section::Incoming, msg_id).await {
                        tracing::info!(msg_id = %msg_id, "Resumed accepted message");
                        sweep.resumed += 1;
                    }
                }
                Ok(false) => {
                    match self
                        .inner
                        .store
                        .remove_message(Section::Incoming, msg_id)
                        .await
                    {
                        Ok(()) => {
                            tracing::info!(msg_id = %msg_id, "Removed unfinished upload");
                            sweep.pruned += 1;
                        }
                        Err(e) => {
                            tracing::warn!(msg_id = %msg_id, error = %e, "Failed to remove unfinished upload")
                        }
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(msg_id = %msg_id, error = %e, "Failed to inspect incoming message")
                }
            }
        }
        sweep
    }

    /// Forced sweep of every section.
    pub async fn flush(&self) -> FlushReport {
        let recovered = self.process_stuck_messages().await;
        let IncomingSweep { resumed, pruned } = self.process_incoming().await;
        let retried = self.process_retry_queue(true).await;
        tracing::info!(retried, recovered, resumed, pruned, "Flushed relay queues");
        FlushReport {
            retried,
            recovered,
            resumed,
            pruned,
        }
    }

    /// Wait for every dispatched delivery to finish.
    pub async fn wait_idle(&self) {
        self.inner.pool.wait_idle().await;
    }
}
