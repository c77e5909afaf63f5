//! Delivery Orchestrator
//!
//! Takes one message sitting in `processing` to a terminal state:
//!
//! ```text
//! processing ──► local mailbox ──► removed        (Delivered)
//!      │    └──► remote peer ───► removed        (Delivered)
//!      ├──────► retry section                    (RetryQueued)
//!      └──────► removed, never retried           (Discarded)
//! ```
//!
//! The caller holds the scoreboard claim for the whole call.

use crate::application::config::RelayConfig;
use crate::application::retry::RetryScheduler;
use crate::application::signing::{HeaderSigner, verify_header};
use crate::domain::entities::{AddressInfo, Header};
use crate::domain::repository::{
    Mailbox, MessageStore, PeerClient, PeerConnector, Resolver, RetryRepository,
};
use crate::domain::value_objects::{BoxId, Part, Section};
use crate::error::DeliveryError;
use kernel::{MessageId, TicketId};
use pow::{CancelFlag, solve};
use std::sync::Arc;
use ticket::TicketRequest;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Terminal state of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    RetryQueued,
    Discarded,
}

/// Everything a delivery talks to
#[derive(Clone)]
pub struct DeliveryServices {
    pub store: Arc<dyn MessageStore>,
    pub retries: Arc<dyn RetryRepository>,
    pub resolver: Arc<dyn Resolver>,
    pub mailbox: Arc<dyn Mailbox>,
    pub peers: Arc<dyn PeerConnector>,
    /// Signs relayed headers that arrive unsigned
    pub signer: Option<HeaderSigner>,
}

pub struct DeliveryOrchestrator {
    store: Arc<dyn MessageStore>,
    retry: RetryScheduler,
    resolver: Arc<dyn Resolver>,
    mailbox: Arc<dyn Mailbox>,
    peers: Arc<dyn PeerConnector>,
    signer: Option<HeaderSigner>,
    config: Arc<RelayConfig>,
    cancel: CancelFlag,
}

impl DeliveryOrchestrator {
    pub fn new(services: DeliveryServices, config: Arc<RelayConfig>) -> Self {
        Self {
            retry: RetryScheduler::new(services.store.clone(), services.retries),
            store: services.store,
            resolver: services.resolver,
            mailbox: services.mailbox,
            peers: services.peers,
            signer: services.signer,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn retry_scheduler(&self) -> &RetryScheduler {
        &self.retry
    }

    /// Abort running proof-of-work searches; their deliveries go to retry.
    pub fn cancel_searches(&self) {
        self.cancel.cancel();
    }

    pub async fn process_message(&self, msg_id: MessageId) -> DeliveryOutcome {
        match self.deliver(msg_id).await {
            Ok(()) => {
                self.retry.discard(Section::Processing, msg_id).await;
                DeliveryOutcome::Delivered
            }
            Err(DeliveryError::Integrity(reason)) => {
                tracing::warn!(msg_id = %msg_id, reason = %reason, "Discarding message");
                self.retry.discard(Section::Processing, msg_id).await;
                DeliveryOutcome::Discarded
            }
            Err(DeliveryError::Transient(reason)) => {
                tracing::warn!(msg_id = %msg_id, reason = %reason, "Delivery attempt failed");
                if let Err(e) = self.retry.move_to_retry(msg_id).await {
                    // Left in processing; the stuck sweep picks it up.
                    tracing::error!(msg_id = %msg_id, error = %e, "Failed to queue retry");
                }
                DeliveryOutcome::RetryQueued
            }
        }
    }

    async fn deliver(&self, msg_id: MessageId) -> Result<(), DeliveryError> {
        let header = self.store.header(Section::Processing, msg_id).await?;
        let recipient = self.resolver.resolve_address(header.to()).await?;

        if self.mailbox.exists(header.to()).await? {
            self.deliver_local(msg_id, header).await
        } else {
            self.relay_remote(msg_id, header, recipient).await
        }
    }

    async fn deliver_local(&self, msg_id: MessageId, header: Header) -> Result<(), DeliveryError> {
        if header.is_signed() {
            let sender = self.resolver.resolve_address(header.from()).await?;
            let routing = self.resolver.resolve_routing(&sender.routing_id).await?;
            if !verify_header(&header, &routing.public_key) {
                return Err(DeliveryError::Integrity(format!(
                    "server signature does not match routing key of {}",
                    routing.routing_id
                )));
            }
        }

        let message = self.store.load_message(Section::Processing, msg_id).await?;
        self.mailbox
            .deliver_to_box(header.to(), &BoxId::INBOX, msg_id, message)
            .await?;

        tracing::info!(msg_id = %msg_id, to = %header.to(), "Delivered message locally");
        Ok(())
    }

    async fn relay_remote(
        &self,
        msg_id: MessageId,
        mut header: Header,
        recipient: AddressInfo,
    ) -> Result<(), DeliveryError> {
        let routing = self.resolver.resolve_routing(&recipient.routing_id).await?;
        let peer = self.peers.connect(&routing.endpoint).await?;
        let ticket_id = self.acquire_ticket(peer.as_ref(), &header).await?;

        if !header.is_signed()
            && let Some(signer) = &self.signer
        {
            signer.sign(&mut header)?;
        }

        if let Err(e) = self.upload_parts(&peer, ticket_id, msg_id, header).await {
            if let Err(delete_err) = peer.delete(ticket_id).await {
                tracing::warn!(
                    msg_id = %msg_id,
                    error = %delete_err,
                    "Failed to delete partial upload on peer"
                );
            }
            return Err(e);
        }

        peer.complete(ticket_id).await?;

        tracing::info!(
            msg_id = %msg_id,
            endpoint = %routing.endpoint,
            "Relayed message to remote server"
        );
        Ok(())
    }

    /// Ask the peer for a ticket, solving its challenge when one comes back.
    async fn acquire_ticket(
        &self,
        peer: &dyn PeerClient,
        header: &Header,
    ) -> Result<TicketId, DeliveryError> {
        let request = TicketRequest {
            from: header.from().to_string(),
            to: header.to().to_string(),
            subscription_id: None,
            ticket_id: None,
            proof: None,
        };
        let response = peer.request_ticket(&request).await?;
        if response.valid {
            return Ok(response.ticket_id.into());
        }

        let challenge = response.proof_of_work.ok_or_else(|| {
            DeliveryError::Transient("peer sent neither a valid ticket nor a challenge".into())
        })?;
        let data = platform::crypto::from_base64(&challenge.challenge)
            .map_err(|e| DeliveryError::Transient(format!("undecodable challenge: {e}")))?;

        tracing::debug!(bits = challenge.bits, "Solving peer challenge");
        let pow = self.config.pow.clone();
        let cancel = self.cancel.clone();
        let proof =
            tokio::task::spawn_blocking(move || solve(challenge.bits, &data, &pow, &cancel))
                .await??;

        let response = peer
            .request_ticket(&TicketRequest {
                ticket_id: Some(response.ticket_id),
                proof: Some(proof),
                ..request
            })
            .await?;
        if !response.valid {
            return Err(DeliveryError::Transient("peer rejected proof of work".into()));
        }
        Ok(response.ticket_id.into())
    }

    /// Upload every part concurrently; the first failure cancels the rest.
    async fn upload_parts(
        &self,
        peer: &Arc<dyn PeerClient>,
        ticket_id: TicketId,
        msg_id: MessageId,
        header: Header,
    ) -> Result<(), DeliveryError> {
        let contents = self.store.list_files(Section::Processing, msg_id).await?;
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_uploads.max(1)));
        let mut uploads: JoinSet<Result<(), DeliveryError>> = JoinSet::new();

        {
            let peer = peer.clone();
            let limit = limit.clone();
            uploads.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| DeliveryError::Transient(e.to_string()))?;
                peer.upload_header(ticket_id, &header).await?;
                Ok(())
            });
        }

        for part in std::iter::once(Part::Catalog).chain(contents) {
            let peer = peer.clone();
            let store = self.store.clone();
            let limit = limit.clone();
            uploads.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| DeliveryError::Transient(e.to_string()))?;
                let data = store.read_part(Section::Processing, msg_id, &part).await?;
                let bytes = data.len();
                match &part {
                    Part::Catalog => peer.upload_catalog(ticket_id, data).await?,
                    Part::Block(id) => peer.upload_block(ticket_id, id, data).await?,
                    Part::Attachment(id) => peer.upload_attachment(ticket_id, id, data).await?,
                    Part::Header => {}
                }
                tracing::debug!(msg_id = %msg_id, part = %part, bytes, "Uploaded part");
                Ok(())
            });
        }

        while let Some(joined) = uploads.join_next().await {
            if let Err(e) = joined.map_err(DeliveryError::from).and_then(|r| r) {
                uploads.abort_all();
                while uploads.join_next().await.is_some() {}
                return Err(e);
            }
        }
        Ok(())
    }
}
