//! Domain Entities

use crate::domain::services::next_retry_duration;
use crate::domain::value_objects::PartId;
use chrono::{DateTime, Utc};
use kernel::{AddressHash, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One side of a message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub addr: AddressHash,
}

/// Message header as uploaded by the sender.
///
/// Only the envelope and the relaying server's signature are interpreted
/// here; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub from: Participant,
    pub to: Participant,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "platform::crypto::serde_base64::option"
    )]
    pub server_signature: Option<Vec<u8>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    pub fn new(from: AddressHash, to: AddressHash) -> Self {
        Self {
            from: Participant { addr: from },
            to: Participant { addr: to },
            server_signature: None,
            extra: Map::new(),
        }
    }

    pub fn from(&self) -> &AddressHash {
        &self.from.addr
    }

    pub fn to(&self) -> &AddressHash {
        &self.to.addr
    }

    pub fn is_signed(&self) -> bool {
        self.server_signature.is_some()
    }

    /// Canonical bytes covered by the server signature: the header JSON with
    /// the signature itself left out.
    pub fn signing_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let unsigned = Header {
            server_signature: None,
            ..self.clone()
        };
        serde_json::to_vec(&unsigned)
    }
}

/// A complete message handed to a local mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverableMessage {
    pub header: Header,
    pub catalog: Vec<u8>,
    pub blocks: Vec<(PartId, Vec<u8>)>,
    pub attachments: Vec<(PartId, Vec<u8>)>,
}

/// Retry bookkeeping for a message that failed at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInfo {
    pub msg_id: MessageId,
    pub retries: u32,
    pub last_retried_at: DateTime<Utc>,
    pub retry_at: DateTime<Utc>,
}

impl RetryInfo {
    pub fn new(msg_id: MessageId) -> Self {
        let now = Utc::now();
        Self {
            msg_id,
            retries: 0,
            last_retried_at: now,
            retry_at: now,
        }
    }

    /// Count one more failed attempt and schedule the next one.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.retries = self.retries.saturating_add(1);
        self.last_retried_at = now;
        let delay = next_retry_duration(self.retries);
        self.retry_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.retry_at <= now
    }
}

/// Directory entry for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub hash: AddressHash,
    pub routing_id: String,
    #[serde(with = "platform::crypto::serde_base64")]
    pub public_key: Vec<u8>,
}

/// Where a routing id's server lives and how it signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingInfo {
    pub routing_id: String,
    pub endpoint: String,
    #[serde(with = "platform::crypto::serde_base64")]
    pub public_key: Vec<u8>,
}
