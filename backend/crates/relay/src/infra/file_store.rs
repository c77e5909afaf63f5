//! File-backed message store
//!
//! Layout: `<root>/<section>/<msg_id>/{header.json,catalog,block-<id>,attachment-<id>}`.
//!
//! - Parts are written to a `.tmp-` file and hard-linked into place, so a
//!   half-written part is never visible and an existing part is never
//!   overwritten.
//! - Parts are refused once the message has left `incoming`, so a late upload
//!   cannot recreate it next to its moved copy.
//! - Moving a message between sections is a single directory rename.
//! - Removal renames the directory to `<msg_id>.deleted` first; anything left
//!   over by a crash is purged by [`FileMessageStore::init`].

use crate::domain::repository::MessageStore;
use crate::domain::value_objects::{Part, Section};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use kernel::MessageId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const TMP_PREFIX: &str = ".tmp-";
const DELETED_SUFFIX: &str = ".deleted";

#[derive(Debug, Clone)]
pub struct FileMessageStore {
    root: PathBuf,
}

impl FileMessageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the section directories and purge crash leftovers.
    ///
    /// # Errors
    /// If a section directory cannot be created or scanned
    pub fn init(&self) -> StoreResult<()> {
        let mut cleaned = 0usize;
        for section in Section::ALL {
            let dir = self.section_dir(section);
            std::fs::create_dir_all(&dir)?;

            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let path = entry.path();

                if name.ends_with(DELETED_SUFFIX) {
                    std::fs::remove_dir_all(&path)?;
                    cleaned += 1;
                } else if path.is_dir() {
                    cleaned += Self::purge_temp_files(&path)?;
                }
            }
        }

        if cleaned > 0 {
            tracing::info!(root = %self.root.display(), cleaned, "Cleaned up spool leftovers");
        }
        Ok(())
    }

    fn purge_temp_files(dir: &Path) -> StoreResult<usize> {
        let mut cleaned = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                std::fs::remove_file(entry.path())?;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    fn section_dir(&self, section: Section) -> PathBuf {
        self.root.join(section.as_str())
    }

    fn message_dir(&self, section: Section, msg_id: MessageId) -> PathBuf {
        self.section_dir(section).join(msg_id.to_string())
    }

    async fn dir_exists(path: &Path) -> StoreResult<bool> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn write_part(&self, msg_id: MessageId, part: &Part, data: &[u8]) -> StoreResult<()> {
        for section in [Section::Processing, Section::Retry] {
            if Self::dir_exists(&self.message_dir(section, msg_id)).await? {
                return Err(StoreError::AlreadyExists {
                    msg_id,
                    what: format!("message in {section}"),
                });
            }
        }

        let dir = self.message_dir(Section::Incoming, msg_id);
        fs::create_dir_all(&dir).await?;

        let file_name = part.file_name();
        let target = dir.join(file_name.as_ref());
        let temp = dir.join(format!("{TMP_PREFIX}{file_name}-{}", Uuid::new_v4()));

        fs::write(&temp, data).await?;
        let linked = fs::hard_link(&temp, &target).await;
        if let Err(e) = fs::remove_file(&temp).await {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to remove temp part");
        }

        match linked {
            Ok(()) => {
                tracing::debug!(msg_id = %msg_id, part = %part, bytes = data.len(), "Stored part");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists {
                msg_id,
                what: part.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_part(
        &self,
        section: Section,
        msg_id: MessageId,
        part: &Part,
    ) -> StoreResult<Vec<u8>> {
        let path = self.message_dir(section, msg_id).join(part.file_name().as_ref());
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::PartNotFound {
                section,
                msg_id,
                part: part.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, section: Section, msg_id: MessageId) -> StoreResult<Vec<Part>> {
        let dir = self.message_dir(section, msg_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { section, msg_id });
            }
            Err(e) => return Err(e.into()),
        };

        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(part) = Part::from_file_name(&entry.file_name().to_string_lossy())
                && part.is_content()
            {
                parts.push(part);
            }
        }
        parts.sort();
        Ok(parts)
    }

    async fn list_messages(&self, section: Section) -> StoreResult<Vec<MessageId>> {
        let mut entries = match fs::read_dir(self.section_dir(section)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // `.deleted` directories and stray files do not parse as ids.
            if let Ok(id) = entry.file_name().to_string_lossy().parse::<MessageId>() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn exists(&self, section: Section, msg_id: MessageId) -> StoreResult<bool> {
        Self::dir_exists(&self.message_dir(section, msg_id)).await
    }

    async fn is_complete(&self, section: Section, msg_id: MessageId) -> StoreResult<bool> {
        let dir = self.message_dir(section, msg_id);
        for part in [Part::Header, Part::Catalog] {
            if !fs::try_exists(dir.join(part.file_name().as_ref())).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn move_message(
        &self,
        from: Section,
        to: Section,
        msg_id: MessageId,
    ) -> StoreResult<()> {
        let source = self.message_dir(from, msg_id);
        let target = self.message_dir(to, msg_id);

        if !Self::dir_exists(&source).await? {
            return Err(StoreError::NotFound {
                section: from,
                msg_id,
            });
        }
        if fs::try_exists(&target).await? {
            return Err(StoreError::AlreadyExists {
                msg_id,
                what: format!("message in {to}"),
            });
        }

        fs::create_dir_all(self.section_dir(to)).await?;
        match fs::rename(&source, &target).await {
            Ok(()) => {
                tracing::debug!(msg_id = %msg_id, from = %from, to = %to, "Moved message");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                section: from,
                msg_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_message(&self, section: Section, msg_id: MessageId) -> StoreResult<()> {
        let dir = self.message_dir(section, msg_id);
        let deleted = self
            .section_dir(section)
            .join(format!("{msg_id}{DELETED_SUFFIX}"));

        match fs::rename(&dir, &deleted).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // A crash here leaves `<id>.deleted` behind for `init` to purge.
        fs::remove_dir_all(&deleted).await?;

        tracing::debug!(msg_id = %msg_id, section = %section, "Removed message");
        Ok(())
    }
}
