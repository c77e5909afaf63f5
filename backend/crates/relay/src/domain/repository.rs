//! Storage and collaborator traits
//!
//! The pipeline holds these as trait objects so backends can be picked at
//! startup (file or memory spool, HTTP or static resolver).

use crate::domain::entities::{AddressInfo, DeliverableMessage, Header, RetryInfo, RoutingInfo};
use crate::domain::value_objects::{BoxId, Part, PartId, Section};
use crate::error::{MailboxError, PeerError, ResolveError, StoreError, StoreResult};
use async_trait::async_trait;
use kernel::{AddressHash, MessageId, TicketId};
use std::sync::Arc;
use ticket::{TicketRequest, TicketResponse, TicketResult};

/// Message parts spread over the three pipeline sections.
///
/// Parts are write-once and only ever written into [`Section::Incoming`]; a
/// message lives in exactly one section at a time.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Write a part into `incoming`, failing with `AlreadyExists` if present.
    async fn write_part(&self, msg_id: MessageId, part: &Part, data: &[u8]) -> StoreResult<()>;

    async fn read_part(&self, section: Section, msg_id: MessageId, part: &Part)
    -> StoreResult<Vec<u8>>;

    /// Blocks and attachments of a message.
    async fn list_files(&self, section: Section, msg_id: MessageId) -> StoreResult<Vec<Part>>;

    async fn list_messages(&self, section: Section) -> StoreResult<Vec<MessageId>>;

    async fn exists(&self, section: Section, msg_id: MessageId) -> StoreResult<bool>;

    /// Header and catalog are both present.
    async fn is_complete(&self, section: Section, msg_id: MessageId) -> StoreResult<bool>;

    /// Atomic section change. `NotFound` if absent from `from`,
    /// `AlreadyExists` if already present in `to`.
    async fn move_message(&self, from: Section, to: Section, msg_id: MessageId)
    -> StoreResult<()>;

    /// Delete every part. Removing a missing message is not an error.
    async fn remove_message(&self, section: Section, msg_id: MessageId) -> StoreResult<()>;

    async fn store_header(&self, msg_id: MessageId, header: &Header) -> StoreResult<()> {
        let bytes = serde_json::to_vec(header)?;
        self.write_part(msg_id, &Part::Header, &bytes).await
    }

    async fn store_catalog(&self, msg_id: MessageId, catalog: &[u8]) -> StoreResult<()> {
        self.write_part(msg_id, &Part::Catalog, catalog).await
    }

    async fn store_block(&self, msg_id: MessageId, id: &PartId, data: &[u8]) -> StoreResult<()> {
        self.write_part(msg_id, &Part::Block(id.clone()), data).await
    }

    async fn store_attachment(
        &self,
        msg_id: MessageId,
        id: &PartId,
        data: &[u8],
    ) -> StoreResult<()> {
        self.write_part(msg_id, &Part::Attachment(id.clone()), data)
            .await
    }

    async fn header(&self, section: Section, msg_id: MessageId) -> StoreResult<Header> {
        let bytes = self.read_part(section, msg_id, &Part::Header).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn catalog(&self, section: Section, msg_id: MessageId) -> StoreResult<Vec<u8>> {
        self.read_part(section, msg_id, &Part::Catalog).await
    }

    async fn block(&self, section: Section, msg_id: MessageId, id: &PartId) -> StoreResult<Vec<u8>> {
        self.read_part(section, msg_id, &Part::Block(id.clone()))
            .await
    }

    async fn attachment(
        &self,
        section: Section,
        msg_id: MessageId,
        id: &PartId,
    ) -> StoreResult<Vec<u8>> {
        self.read_part(section, msg_id, &Part::Attachment(id.clone()))
            .await
    }

    /// Read a whole message for local delivery.
    async fn load_message(
        &self,
        section: Section,
        msg_id: MessageId,
    ) -> StoreResult<DeliverableMessage> {
        let header = self.header(section, msg_id).await?;
        let catalog = self.catalog(section, msg_id).await?;
        let mut blocks = Vec::new();
        let mut attachments = Vec::new();
        for part in self.list_files(section, msg_id).await? {
            let data = self.read_part(section, msg_id, &part).await?;
            match part {
                Part::Block(id) => blocks.push((id, data)),
                Part::Attachment(id) => attachments.push((id, data)),
                Part::Header | Part::Catalog => {}
            }
        }
        Ok(DeliverableMessage {
            header,
            catalog,
            blocks,
            attachments,
        })
    }
}

/// Retry bookkeeping keyed by message id
#[async_trait]
pub trait RetryRepository: Send + Sync {
    async fn get(&self, msg_id: MessageId) -> Result<Option<RetryInfo>, StoreError>;

    async fn save(&self, info: &RetryInfo) -> Result<(), StoreError>;

    async fn remove(&self, msg_id: MessageId) -> Result<(), StoreError>;
}

/// Upload tickets, seen from the pipeline
#[async_trait]
pub trait UploadTickets: Send + Sync {
    /// The sender still holds a ticket for `msg_id` and may add parts.
    async fn is_open(&self, msg_id: MessageId) -> TicketResult<bool>;
}

/// Address and routing directory
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_address(&self, address: &AddressHash) -> Result<AddressInfo, ResolveError>;

    async fn resolve_routing(&self, routing_id: &str) -> Result<RoutingInfo, ResolveError>;
}

/// Accounts hosted on this server, seen from the delivery side
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn exists(&self, address: &AddressHash) -> Result<bool, MailboxError>;

    /// Store a complete message in one of the account's boxes. Delivering the
    /// same `msg_id` twice leaves a single copy.
    async fn deliver_to_box(
        &self,
        address: &AddressHash,
        box_id: &BoxId,
        msg_id: MessageId,
        message: DeliverableMessage,
    ) -> Result<(), MailboxError>;
}

/// Remote server speaking the inbound HTTP surface
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn request_ticket(&self, request: &TicketRequest) -> Result<TicketResponse, PeerError>;

    async fn upload_header(&self, ticket_id: TicketId, header: &Header) -> Result<(), PeerError>;

    async fn upload_catalog(&self, ticket_id: TicketId, catalog: Vec<u8>) -> Result<(), PeerError>;

    async fn upload_block(
        &self,
        ticket_id: TicketId,
        id: &PartId,
        data: Vec<u8>,
    ) -> Result<(), PeerError>;

    async fn upload_attachment(
        &self,
        ticket_id: TicketId,
        id: &PartId,
        data: Vec<u8>,
    ) -> Result<(), PeerError>;

    /// Hand the uploaded message over to the peer's pipeline.
    async fn complete(&self, ticket_id: TicketId) -> Result<(), PeerError>;

    /// Drop a partial upload.
    async fn delete(&self, ticket_id: TicketId) -> Result<(), PeerError>;
}

/// Opens a [`PeerClient`] for a routing endpoint.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn PeerClient>, PeerError>;
}
