//! Retry bookkeeping on top of an expiring key/value store

use crate::domain::entities::RetryInfo;
use crate::domain::repository::RetryRepository;
use crate::error::StoreError;
use async_trait::async_trait;
use kernel::MessageId;
use platform::kv::ExpiringStore;

fn key(msg_id: MessageId) -> String {
    format!("retry:{msg_id}")
}

/// Entries never expire; they are removed with their message.
#[derive(Debug, Clone)]
pub struct KvRetryRepository<S> {
    store: S,
}

impl<S> KvRetryRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> RetryRepository for KvRetryRepository<S>
where
    S: ExpiringStore + Sync + 'static,
{
    async fn get(&self, msg_id: MessageId) -> Result<Option<RetryInfo>, StoreError> {
        match self.store.get(&key(msg_id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, info: &RetryInfo) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(info)?;
        self.store.set(&key(info.msg_id), bytes, None).await?;
        Ok(())
    }

    async fn remove(&self, msg_id: MessageId) -> Result<(), StoreError> {
        self.store.delete(&key(msg_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::kv::MemoryStore;

    #[tokio::test]
    async fn test_save_get_remove() {
        let repo = KvRetryRepository::new(MemoryStore::new());
        let mut info = RetryInfo::new(MessageId::new());
        info.record_failure(chrono::Utc::now());

        assert!(repo.get(info.msg_id).await.unwrap().is_none());
        repo.save(&info).await.unwrap();
        assert_eq!(repo.get(info.msg_id).await.unwrap(), Some(info.clone()));

        repo.remove(info.msg_id).await.unwrap();
        assert!(repo.get(info.msg_id).await.unwrap().is_none());
    }
}
