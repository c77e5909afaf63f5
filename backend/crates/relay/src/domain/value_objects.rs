//! Domain Value Objects

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const MAX_PART_ID_LEN: usize = 64;

/// Pipeline stage a stored message currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Being uploaded by a sender, or complete and waiting for dispatch
    Incoming,
    /// Owned by an active delivery
    Processing,
    /// Waiting for its next attempt
    Retry,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Incoming, Section::Processing, Section::Retry];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Incoming => "incoming",
            Section::Processing => "processing",
            Section::Retry => "retry",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Part id must be 1-64 characters of [A-Za-z0-9_-]")]
pub struct InvalidPartId;

/// Sender-chosen name of a block or attachment.
///
/// The charset keeps ids safe to embed in file names and URL paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PartId(String);

impl PartId {
    pub fn parse(raw: &str) -> Result<Self, InvalidPartId> {
        let valid_len = (1..=MAX_PART_ID_LEN).contains(&raw.len());
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid_len && valid_chars {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidPartId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PartId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PartId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

const HEADER_FILE: &str = "header.json";
const CATALOG_FILE: &str = "catalog";
const BLOCK_PREFIX: &str = "block-";
const ATTACHMENT_PREFIX: &str = "attachment-";

/// One stored piece of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    Header,
    Catalog,
    Block(PartId),
    Attachment(PartId),
}

impl Part {
    pub fn file_name(&self) -> Cow<'static, str> {
        match self {
            Part::Header => Cow::Borrowed(HEADER_FILE),
            Part::Catalog => Cow::Borrowed(CATALOG_FILE),
            Part::Block(id) => Cow::Owned(format!("{BLOCK_PREFIX}{id}")),
            Part::Attachment(id) => Cow::Owned(format!("{ATTACHMENT_PREFIX}{id}")),
        }
    }

    /// Inverse of [`Part::file_name`]; anything else (temp files, etc.) is `None`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            HEADER_FILE => Some(Part::Header),
            CATALOG_FILE => Some(Part::Catalog),
            _ => {
                if let Some(id) = name.strip_prefix(BLOCK_PREFIX) {
                    PartId::parse(id).ok().map(Part::Block)
                } else if let Some(id) = name.strip_prefix(ATTACHMENT_PREFIX) {
                    PartId::parse(id).ok().map(Part::Attachment)
                } else {
                    None
                }
            }
        }
    }

    /// Blocks and attachments, the parts `list_files` reports.
    pub fn is_content(&self) -> bool {
        matches!(self, Part::Block(_) | Part::Attachment(_))
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Mailbox folder inside an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoxId(Cow<'static, str>);

impl BoxId {
    pub const INBOX: BoxId = BoxId(Cow::Borrowed("inbox"));

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_id_charset() {
        assert!(PartId::parse("block_01-a").is_ok());
        assert!(PartId::parse(&"a".repeat(64)).is_ok());
        assert!(PartId::parse("").is_err());
        assert!(PartId::parse(&"a".repeat(65)).is_err());
        assert!(PartId::parse("../etc").is_err());
        assert!(PartId::parse("a b").is_err());
    }

    #[test]
    fn test_part_file_names() {
        let block = Part::Block(PartId::parse("b1").unwrap());
        assert_eq!(block.file_name(), "block-b1");
        assert_eq!(Part::from_file_name("block-b1"), Some(block));
        assert_eq!(
            Part::from_file_name("attachment-x"),
            Some(Part::Attachment(PartId::parse("x").unwrap()))
        );
        assert_eq!(Part::from_file_name("header.json"), Some(Part::Header));
        assert_eq!(Part::from_file_name("catalog"), Some(Part::Catalog));
        assert_eq!(Part::from_file_name(".tmp-catalog-1"), None);
        assert_eq!(Part::from_file_name("block-"), None);
    }

    #[test]
    fn test_section_names() {
        let names: Vec<_> = Section::ALL.iter().map(Section::as_str).collect();
        assert_eq!(names, ["incoming", "processing", "retry"]);
    }
}
