//! In-memory message store
//!
//! One map entry per message; the entry records the message's single section,
//! so "present in two sections" cannot be represented at all.

use crate::domain::repository::MessageStore;
use crate::domain::value_objects::{Part, Section};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use kernel::MessageId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug)]
struct StoredMessage {
    section: Section,
    parts: BTreeMap<Part, Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMessageStore {
    messages: Arc<Mutex<HashMap<MessageId, StoredMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Section a message currently sits in, if stored at all.
    pub fn section_of(&self, msg_id: MessageId) -> Option<Section> {
        self.messages.lock().get(&msg_id).map(|m| m.section)
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn write_part(&self, msg_id: MessageId, part: &Part, data: &[u8]) -> StoreResult<()> {
        let mut messages = self.messages.lock();
        let message = messages.entry(msg_id).or_insert_with(|| StoredMessage {
            section: Section::Incoming,
            parts: BTreeMap::new(),
        });

        if message.section != Section::Incoming {
            return Err(StoreError::AlreadyExists {
                msg_id,
                what: format!("message in {}", message.section),
            });
        }
        if message.parts.contains_key(part) {
            return Err(StoreError::AlreadyExists {
                msg_id,
                what: part.to_string(),
            });
        }
        message.parts.insert(part.clone(), data.to_vec());
        Ok(())
    }

    async fn read_part(
        &self,
        section: Section,
        msg_id: MessageId,
        part: &Part,
    ) -> StoreResult<Vec<u8>> {
        self.messages
            .lock()
            .get(&msg_id)
            .filter(|m| m.section == section)
            .and_then(|m| m.parts.get(part).cloned())
            .ok_or_else(|| StoreError::PartNotFound {
                section,
                msg_id,
                part: part.clone(),
            })
    }

    async fn list_files(&self, section: Section, msg_id: MessageId) -> StoreResult<Vec<Part>> {
        let messages = self.messages.lock();
        let message = messages
            .get(&msg_id)
            .filter(|m| m.section == section)
            .ok_or(StoreError::NotFound { section, msg_id })?;
        Ok(message
            .parts
            .keys()
            .filter(|p| p.is_content())
            .cloned()
            .collect())
    }

    async fn list_messages(&self, section: Section) -> StoreResult<Vec<MessageId>> {
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|(_, m)| m.section == section)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn exists(&self, section: Section, msg_id: MessageId) -> StoreResult<bool> {
        Ok(self.section_of(msg_id) == Some(section))
    }

    async fn is_complete(&self, section: Section, msg_id: MessageId) -> StoreResult<bool> {
        Ok(self
            .messages
            .lock()
            .get(&msg_id)
            .filter(|m| m.section == section)
            .is_some_and(|m| {
                m.parts.contains_key(&Part::Header) && m.parts.contains_key(&Part::Catalog)
            }))
    }

    async fn move_message(
        &self,
        from: Section,
        to: Section,
        msg_id: MessageId,
    ) -> StoreResult<()> {
        let mut messages = self.messages.lock();
        match messages.get_mut(&msg_id) {
            Some(message) if message.section == from => {
                message.section = to;
                Ok(())
            }
            Some(message) if message.section == to => Err(StoreError::AlreadyExists {
                msg_id,
                what: format!("message in {to}"),
            }),
            _ => Err(StoreError::NotFound {
                section: from,
                msg_id,
            }),
        }
    }

    async fn remove_message(&self, section: Section, msg_id: MessageId) -> StoreResult<()> {
        let mut messages = self.messages.lock();
        if messages.get(&msg_id).is_some_and(|m| m.section == section) {
            messages.remove(&msg_id);
        }
        Ok(())
    }
}
