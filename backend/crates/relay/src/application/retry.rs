//! Retry Scheduler

use crate::domain::entities::RetryInfo;
use crate::domain::repository::{MessageStore, RetryRepository};
use crate::domain::services::is_exhausted;
use crate::domain::value_objects::Section;
use crate::error::DeliveryError;
use chrono::{DateTime, Utc};
use kernel::MessageId;
use std::sync::Arc;
use tokio::time::Instant;

/// What the retry sweep does with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Past the retry cutoff; remove for good
    Abandon,
    /// Dispatch again now
    Requeue,
    /// Not due yet
    Wait,
}

/// Missing retry info counts as due. Exhausted messages are abandoned even
/// when the sweep is forced.
pub fn classify(info: Option<&RetryInfo>, now: DateTime<Utc>, force: bool) -> RetryAction {
    match info {
        None => RetryAction::Requeue,
        Some(info) if is_exhausted(info.retries) => RetryAction::Abandon,
        Some(info) if force || info.is_due(now) => RetryAction::Requeue,
        Some(_) => RetryAction::Wait,
    }
}

/// Wall-clock time read through the runtime clock.
///
/// Anchored once at construction and advanced by [`tokio::time::Instant`],
/// so a paused runtime also pauses retry scheduling.
#[derive(Debug, Clone, Copy)]
pub struct RetryClock {
    wall: DateTime<Utc>,
    anchor: Instant,
}

impl RetryClock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.wall + chrono::Duration::from_std(self.anchor.elapsed()).unwrap_or_default()
    }
}

impl Default for RetryClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RetryScheduler {
    store: Arc<dyn MessageStore>,
    retries: Arc<dyn RetryRepository>,
    clock: RetryClock,
}

impl RetryScheduler {
    pub fn new(store: Arc<dyn MessageStore>, retries: Arc<dyn RetryRepository>) -> Self {
        Self {
            store,
            retries,
            clock: RetryClock::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn info(&self, msg_id: MessageId) -> Result<Option<RetryInfo>, DeliveryError> {
        Ok(self.retries.get(msg_id).await?)
    }

    /// Count a failed attempt and park the message in `retry`.
    pub async fn move_to_retry(&self, msg_id: MessageId) -> Result<RetryInfo, DeliveryError> {
        let mut info = self
            .retries
            .get(msg_id)
            .await?
            .unwrap_or_else(|| RetryInfo::new(msg_id));
        info.record_failure(self.clock.now());
        self.retries.save(&info).await?;

        self.store
            .move_message(Section::Processing, Section::Retry, msg_id)
            .await?;

        tracing::warn!(
            msg_id = %msg_id,
            retries = info.retries,
            retry_at = %info.retry_at,
            "Moved message to retry queue"
        );
        Ok(info)
    }

    /// Remove a message and its retry info. Failures are logged only.
    pub async fn discard(&self, section: Section, msg_id: MessageId) {
        if let Err(e) = self.store.remove_message(section, msg_id).await {
            tracing::warn!(msg_id = %msg_id, section = %section, error = %e, "Failed to remove message");
        }
        self.forget(msg_id).await;
    }

    /// Drop retry info only. Failures are logged only.
    pub async fn forget(&self, msg_id: MessageId) {
        if let Err(e) = self.retries.remove(msg_id).await {
            tracing::warn!(msg_id = %msg_id, error = %e, "Failed to remove retry info");
        }
    }
}
