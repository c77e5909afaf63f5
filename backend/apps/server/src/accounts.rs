//! Locally hosted accounts
//!
//! One directory per account under the accounts root:
//!
//! ```text
//! <root>/<address hash>/<box>/<message id>/header.json
//!                                         /catalog
//!                                         /block-<id>
//!                                         /attachment-<id>
//! ```
//!
//! A message directory is assembled under a temporary name and renamed into
//! place, so a box never shows a half-written message.

use async_trait::async_trait;
use kernel::{AddressHash, MessageId};
use relay::{BoxId, DeliverableMessage, Mailbox, MailboxError, Part};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use ticket::{AccountRepository, TicketError, TicketResult};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalAccounts {
    root: PathBuf,
}

impl LocalAccounts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn account_dir(&self, address: &AddressHash) -> PathBuf {
        self.root.join(address.as_str())
    }

    /// Create the account directory with an empty inbox.
    pub async fn create(&self, address: &AddressHash) -> std::io::Result<()> {
        fs::create_dir_all(self.account_dir(address).join(BoxId::INBOX.as_str())).await
    }

    async fn is_account(&self, address: &AddressHash) -> std::io::Result<bool> {
        match fs::metadata(self.account_dir(address)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Message ids stored in one box.
    pub async fn list_box(
        &self,
        address: &AddressHash,
        box_id: &BoxId,
    ) -> std::io::Result<Vec<MessageId>> {
        let dir = self.account_dir(address).join(box_id.as_str());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn message_dir(&self, address: &AddressHash, box_id: &BoxId, msg_id: MessageId) -> PathBuf {
        self.account_dir(address)
            .join(box_id.as_str())
            .join(msg_id.to_string())
    }
}

async fn write_message(dir: &Path, message: &DeliverableMessage) -> Result<(), MailboxError> {
    fs::create_dir_all(dir).await?;
    fs::write(
        dir.join(&*Part::Header.file_name()),
        serde_json::to_vec(&message.header)?,
    )
    .await?;
    fs::write(dir.join(&*Part::Catalog.file_name()), &message.catalog).await?;
    for (id, data) in &message.blocks {
        let part = Part::Block(id.clone());
        fs::write(dir.join(&*part.file_name()), data).await?;
    }
    for (id, data) in &message.attachments {
        let part = Part::Attachment(id.clone());
        fs::write(dir.join(&*part.file_name()), data).await?;
    }
    Ok(())
}

impl AccountRepository for LocalAccounts {
    async fn exists(&self, address: &AddressHash) -> TicketResult<bool> {
        self.is_account(address)
            .await
            .map_err(|e| TicketError::AccountLookup(e.to_string()))
    }
}

#[async_trait]
impl Mailbox for LocalAccounts {
    async fn exists(&self, address: &AddressHash) -> Result<bool, MailboxError> {
        Ok(self.is_account(address).await?)
    }

    async fn deliver_to_box(
        &self,
        address: &AddressHash,
        box_id: &BoxId,
        msg_id: MessageId,
        message: DeliverableMessage,
    ) -> Result<(), MailboxError> {
        if !self.is_account(address).await? {
            return Err(MailboxError::UnknownAccount(address.clone()));
        }

        let target = self.message_dir(address, box_id, msg_id);
        if fs::try_exists(&target).await? {
            tracing::debug!(msg_id = %msg_id, "Message already in mailbox");
            return Ok(());
        }

        let box_dir = self.account_dir(address).join(box_id.as_str());
        let staging = box_dir.join(format!(".tmp-{msg_id}-{}", Uuid::new_v4()));
        if let Err(e) = write_message(&staging, &message).await {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_dir_all(&staging).await;
            // Lost a race against an earlier attempt of the same delivery.
            if fs::try_exists(&target).await.unwrap_or(false) {
                return Ok(());
            }
            return Err(e.into());
        }

        tracing::debug!(msg_id = %msg_id, box_id = %box_id, "Stored message in mailbox");
        Ok(())
    }
}
