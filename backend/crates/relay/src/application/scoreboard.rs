//! Scoreboard of messages with an active delivery

use crate::domain::value_objects::Section;
use kernel::MessageId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

type Entry = (Section, MessageId);

/// Set of `(section, message)` pairs some task currently owns.
///
/// Cloning shares the set. Owned by the pipeline and handed to whoever
/// needs it; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    entries: Arc<Mutex<HashSet<Entry>>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the entry was already present.
    pub fn add(&self, section: Section, msg_id: MessageId) -> bool {
        self.entries.lock().insert((section, msg_id))
    }

    pub fn remove(&self, section: Section, msg_id: MessageId) {
        self.entries.lock().remove(&(section, msg_id));
    }

    pub fn is_present(&self, section: Section, msg_id: MessageId) -> bool {
        self.entries.lock().contains(&(section, msg_id))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register atomically; `None` if someone else holds the entry.
    ///
    /// The entry is released when the guard drops, including on panic.
    pub fn claim(&self, section: Section, msg_id: MessageId) -> Option<ScoreboardGuard> {
        self.add(section, msg_id).then(|| ScoreboardGuard {
            scoreboard: self.clone(),
            section,
            msg_id,
        })
    }
}

#[derive(Debug)]
#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct ScoreboardGuard {
    scoreboard: Scoreboard,
    section: Section,
    msg_id: MessageId,
}

impl ScoreboardGuard {
    pub fn msg_id(&self) -> MessageId {
        self.msg_id
    }
}

impl Drop for ScoreboardGuard {
    fn drop(&mut self) {
        self.scoreboard.remove(self.section, self.msg_id);
    }
}
