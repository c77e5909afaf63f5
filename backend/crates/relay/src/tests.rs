//! Scenario tests for the relay pipeline

#[cfg(test)]
mod fixtures {
    use crate::application::config::RelayConfig;
    use crate::application::inbound::InboundService;
    use crate::application::orchestrator::DeliveryServices;
    use crate::application::pipeline::Pipeline;
    use crate::application::signing::HeaderSigner;
    use crate::domain::entities::{AddressInfo, DeliverableMessage, Header, RoutingInfo};
    use crate::domain::repository::{Mailbox, MessageStore, PeerClient, PeerConnector};
    use crate::domain::value_objects::{BoxId, PartId};
    use crate::error::{MailboxError, PeerError};
    use crate::infra::kv_retry::KvRetryRepository;
    use crate::infra::memory_store::MemoryMessageStore;
    use crate::infra::resolver::StaticResolver;
    use crate::infra::ticket_uploads::TicketUploads;
    use async_trait::async_trait;
    use kernel::{AddressHash, MessageId, TicketId};
    use parking_lot::Mutex;
    use platform::kv::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use ticket::{
        IssueTicketInput, IssueTicketUseCase, KvTicketRepository, MemoryAccountRepository,
        MemorySubscriptionRepository, SubscriptionId, TicketConfig, TicketRequest, TicketResponse,
    };
    use tokio::sync::mpsc;

    pub type Tickets = KvTicketRepository<MemoryStore>;

    pub fn addr(byte: u8) -> AddressHash {
        AddressHash::from_digest(&[byte; 32])
    }

    pub const LOCAL_ROUTE: &str = "local";
    pub const REMOTE_ROUTE: &str = "remote";

    /// Mailbox recording every delivery; can be told to fail or to stall.
    #[derive(Default)]
    pub struct RecordingMailbox {
        accounts: Mutex<HashSet<AddressHash>>,
        pub delivered: Mutex<Vec<(AddressHash, BoxId, MessageId, DeliverableMessage)>>,
        pub failures: AtomicUsize,
        pub attempts: AtomicUsize,
        pub delay: Mutex<Option<Duration>>,
    }

    impl RecordingMailbox {
        pub fn add(&self, address: AddressHash) {
            self.accounts.lock().insert(address);
        }

        pub fn fail_next(&self, times: usize) {
            self.failures.store(times, Ordering::SeqCst);
        }

        pub fn delivered_count(&self) -> usize {
            self.delivered.lock().len()
        }

        pub fn attempt_count(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Mailbox for RecordingMailbox {
        async fn exists(&self, address: &AddressHash) -> Result<bool, MailboxError> {
            Ok(self.accounts.lock().contains(address))
        }

        async fn deliver_to_box(
            &self,
            address: &AddressHash,
            box_id: &BoxId,
            msg_id: MessageId,
            message: DeliverableMessage,
        ) -> Result<(), MailboxError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(MailboxError::Backend("mailbox offline".into()));
            }
            self.delivered
                .lock()
                .push((address.clone(), box_id.clone(), msg_id, message));
            Ok(())
        }
    }

    /// A receiving server wired from the real ticket and inbound services,
    /// called in-process instead of over HTTP.
    pub struct FakePeer {
        pub store: Arc<MemoryMessageStore>,
        pub inbound: InboundService<Tickets>,
        pub queue: Mutex<mpsc::Receiver<MessageId>>,
        issue: IssueTicketUseCase<Tickets, MemorySubscriptionRepository, MemoryAccountRepository>,
        pub fail_blocks: AtomicBool,
        pub deletes: AtomicUsize,
        pub completes: AtomicUsize,
    }

    impl FakePeer {
        /// `local` is hosted on the peer.
        pub fn new(local: AddressHash) -> Self {
            let config = TicketConfig::development();
            let tickets = Arc::new(KvTicketRepository::new(MemoryStore::new(), config.ticket_ttl));
            let accounts = MemoryAccountRepository::new();
            accounts.add(local);
            let store = Arc::new(MemoryMessageStore::new());
            let (tx, rx) = mpsc::channel(16);
            Self {
                inbound: InboundService::new(tickets.clone(), store.clone(), tx),
                issue: IssueTicketUseCase::new(
                    tickets.clone(),
                    Arc::new(MemorySubscriptionRepository::new()),
                    Arc::new(accounts),
                    Arc::new(config),
                ),
                store,
                queue: Mutex::new(rx),
                fail_blocks: AtomicBool::new(false),
                deletes: AtomicUsize::new(0),
                completes: AtomicUsize::new(0),
            }
        }

        pub fn accepted(&self) -> Option<MessageId> {
            self.queue.lock().try_recv().ok()
        }
    }

    fn rejected(e: impl std::fmt::Display) -> PeerError {
        PeerError::Rejected(e.to_string())
    }

    #[async_trait]
    impl PeerClient for FakePeer {
        async fn request_ticket(&self, request: &TicketRequest) -> Result<TicketResponse, PeerError> {
            let input = IssueTicketInput {
                from: AddressHash::parse(&request.from).map_err(rejected)?,
                to: AddressHash::parse(&request.to).map_err(rejected)?,
                subscription_id: request
                    .subscription_id
                    .as_deref()
                    .and_then(SubscriptionId::parse),
                ticket_id: request.ticket_id.map(TicketId::from),
                proof: request.proof,
            };
            let ticket = self
                .issue
                .issue_or_resume_local(input)
                .await
                .map_err(rejected)?;
            Ok(TicketResponse::from(&ticket))
        }

        async fn upload_header(&self, ticket_id: TicketId, header: &Header) -> Result<(), PeerError> {
            let body = serde_json::to_vec(header).map_err(rejected)?;
            self.inbound
                .accept_header(ticket_id, &body)
                .await
                .map_err(rejected)?;
            Ok(())
        }

        async fn upload_catalog(&self, ticket_id: TicketId, catalog: Vec<u8>) -> Result<(), PeerError> {
            self.inbound
                .accept_catalog(ticket_id, &catalog)
                .await
                .map_err(rejected)?;
            Ok(())
        }

        async fn upload_block(
            &self,
            ticket_id: TicketId,
            id: &PartId,
            data: Vec<u8>,
        ) -> Result<(), PeerError> {
            if self.fail_blocks.load(Ordering::SeqCst) {
                return Err(PeerError::Status {
                    status: 507,
                    message: "disk full".into(),
                });
            }
            self.inbound
                .accept_block(ticket_id, id.as_str(), &data)
                .await
                .map_err(rejected)?;
            Ok(())
        }

        async fn upload_attachment(
            &self,
            ticket_id: TicketId,
            id: &PartId,
            data: Vec<u8>,
        ) -> Result<(), PeerError> {
            self.inbound
                .accept_attachment(ticket_id, id.as_str(), &data)
                .await
                .map_err(rejected)?;
            Ok(())
        }

        async fn complete(&self, ticket_id: TicketId) -> Result<(), PeerError> {
            self.inbound.complete(ticket_id).await.map_err(rejected)?;
            self.completes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, ticket_id: TicketId) -> Result<(), PeerError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.inbound.delete(ticket_id).await.map_err(rejected)
        }
    }

    pub struct FakeConnector {
        pub peer: Arc<FakePeer>,
        pub endpoints: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PeerConnector for FakeConnector {
        async fn connect(&self, endpoint: &str) -> Result<Arc<dyn PeerClient>, PeerError> {
            self.endpoints.lock().push(endpoint.to_string());
            Ok(self.peer.clone())
        }
    }

    /// This server hosts `addr(2)`; `addr(1)` sends from here and `addr(9)`
    /// lives on the remote peer.
    pub struct Fixture {
        pub store: Arc<MemoryMessageStore>,
        pub tickets: Arc<Tickets>,
        pub retries: Arc<KvRetryRepository<MemoryStore>>,
        pub resolver: Arc<StaticResolver>,
        pub mailbox: Arc<RecordingMailbox>,
        pub peer: Arc<FakePeer>,
        pub connector: Arc<FakeConnector>,
        pub local_key: HeaderSigner,
        pub remote_key: HeaderSigner,
    }

    impl Fixture {
        pub fn new() -> Self {
            let local_key = HeaderSigner::from_seed([11; 32]);
            let remote_key = HeaderSigner::from_seed([22; 32]);

            let resolver = StaticResolver::new();
            resolver.add_routing(RoutingInfo {
                routing_id: LOCAL_ROUTE.into(),
                endpoint: "local.example".into(),
                public_key: local_key.public_key().to_vec(),
            });
            resolver.add_routing(RoutingInfo {
                routing_id: REMOTE_ROUTE.into(),
                endpoint: "remote.example".into(),
                public_key: remote_key.public_key().to_vec(),
            });
            for (byte, route) in [(1, LOCAL_ROUTE), (2, LOCAL_ROUTE), (9, REMOTE_ROUTE)] {
                resolver.add_address(AddressInfo {
                    hash: addr(byte),
                    routing_id: route.into(),
                    public_key: vec![byte; 32],
                });
            }

            let mailbox = RecordingMailbox::default();
            mailbox.add(addr(2));

            let peer = Arc::new(FakePeer::new(addr(9)));
            Self {
                store: Arc::new(MemoryMessageStore::new()),
                tickets: Arc::new(KvTicketRepository::new(
                    MemoryStore::new(),
                    Duration::from_secs(60),
                )),
                retries: Arc::new(KvRetryRepository::new(MemoryStore::new())),
                resolver: Arc::new(resolver),
                mailbox: Arc::new(mailbox),
                connector: Arc::new(FakeConnector {
                    peer: peer.clone(),
                    endpoints: Mutex::new(Vec::new()),
                }),
                peer,
                local_key,
                remote_key,
            }
        }

        pub fn services(&self) -> DeliveryServices {
            DeliveryServices {
                store: self.store.clone(),
                retries: self.retries.clone(),
                resolver: self.resolver.clone(),
                mailbox: self.mailbox.clone(),
                peers: self.connector.clone(),
                signer: Some(self.local_key.clone()),
            }
        }

        pub fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                self.services(),
                Arc::new(TicketUploads::new(self.tickets.clone())),
                RelayConfig::development(),
            )
        }

        /// Upload a complete message into `incoming`; its ticket is already
        /// spent.
        pub async fn seed(&self, header: &Header) -> MessageId {
            let msg_id = MessageId::new();
            let block = PartId::parse("b1").unwrap();
            let attachment = PartId::parse("a1").unwrap();
            self.store.store_header(msg_id, header).await.unwrap();
            self.store.store_catalog(msg_id, b"catalog").await.unwrap();
            self.store.store_block(msg_id, &block, b"block").await.unwrap();
            self.store
                .store_attachment(msg_id, &attachment, b"attachment")
                .await
                .unwrap();
            msg_id
        }
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::fixtures::{Fixture, addr};
    use crate::application::pipeline::IncomingSweep;
    use crate::domain::entities::{Header, RetryInfo};
    use crate::domain::repository::{MessageStore, RetryRepository};
    use crate::domain::value_objects::{BoxId, Section};
    use chrono::Utc;
    use kernel::MessageId;
    use ticket::{Ticket, TicketRepository};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_local_delivery_reaches_inbox() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        assert!(pipeline.dispatch(Section::Incoming, msg_id).await);
        pipeline.wait_idle().await;

        let delivered = fx.mailbox.delivered.lock();
        assert_eq!(delivered.len(), 1);
        let (to, box_id, id, message) = &delivered[0];
        assert_eq!(to, &addr(2));
        assert_eq!(box_id, &BoxId::INBOX);
        assert_eq!(*id, msg_id);
        assert_eq!(message.catalog, b"catalog");
        assert_eq!(message.blocks.len(), 1);
        assert_eq!(message.attachments.len(), 1);

        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(pipeline.scoreboard().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_of_unknown_message_is_refused() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();

        assert!(!pipeline.dispatch(Section::Incoming, kernel::MessageId::new()).await);
        assert!(pipeline.scoreboard().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        fx.mailbox.fail_next(1);
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        pipeline.dispatch(Section::Incoming, msg_id).await;
        pipeline.wait_idle().await;

        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
        let info = fx.retries.get(msg_id).await.unwrap().unwrap();
        assert_eq!(info.retries, 1);
        assert!(info.retry_at > Utc::now());

        // Not due yet
        assert_eq!(pipeline.process_retry_queue(false).await, 0);

        let report = pipeline.flush().await;
        assert_eq!(report.retried, 1);
        pipeline.wait_idle().await;

        assert_eq!(fx.mailbox.delivered_count(), 1);
        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(fx.retries.get(msg_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exhausted_message_is_abandoned_even_when_forced() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;
        assert_ok!(
            fx.store
                .move_message(Section::Incoming, Section::Retry, msg_id)
                .await
        );
        let mut info = RetryInfo::new(msg_id);
        info.retries = 31;
        fx.retries.save(&info).await.unwrap();

        assert_eq!(pipeline.process_retry_queue(true).await, 0);

        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(fx.retries.get(msg_id).await.unwrap().is_none());
        assert_eq!(fx.mailbox.delivered_count(), 0);
    }

    #[tokio::test]
    async fn test_stuck_message_is_recovered_intact() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;
        assert_ok!(
            fx.store
                .move_message(Section::Incoming, Section::Processing, msg_id)
                .await
        );

        assert_eq!(pipeline.process_stuck_messages().await, 1);

        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
        let message = fx.store.load_message(Section::Retry, msg_id).await.unwrap();
        assert_eq!(message.header.to(), &addr(2));
        assert_eq!(message.blocks.len(), 1);
        assert!(fx.retries.get(msg_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stuck_sweep_skips_claimed_messages() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;
        assert_ok!(
            fx.store
                .move_message(Section::Incoming, Section::Processing, msg_id)
                .await
        );

        let _claim = pipeline
            .scoreboard()
            .claim(Section::Processing, msg_id)
            .unwrap();
        assert_eq!(pipeline.process_stuck_messages().await, 0);
        assert_eq!(fx.store.section_of(msg_id), Some(Section::Processing));
    }

    #[tokio::test]
    async fn test_signed_header_from_known_server_is_delivered() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let mut header = Header::new(addr(9), addr(2));
        fx.remote_key.sign(&mut header).unwrap();
        let msg_id = fx.seed(&header).await;

        pipeline.dispatch(Section::Incoming, msg_id).await;
        pipeline.wait_idle().await;

        assert_eq!(fx.mailbox.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_forged_signature_is_discarded() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let mut header = Header::new(addr(9), addr(2));
        // Claims to come from the remote server but is signed with our key.
        fx.local_key.sign(&mut header).unwrap();
        let msg_id = fx.seed(&header).await;

        pipeline.dispatch(Section::Incoming, msg_id).await;
        pipeline.wait_idle().await;

        assert_eq!(fx.mailbox.delivered_count(), 0);
        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(fx.retries.get(msg_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accepted_message_left_in_incoming_is_resumed() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        let report = pipeline.flush().await;
        assert_eq!(report.resumed, 1);
        assert_eq!(report.pruned, 0);
        pipeline.wait_idle().await;

        assert_eq!(fx.mailbox.delivered_count(), 1);
        assert_eq!(fx.store.section_of(msg_id), None);
    }

    #[tokio::test]
    async fn test_incoming_sweep_spares_open_uploads() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();

        // Ticket gone, header never arrived
        let abandoned = MessageId::new();
        fx.store.store_catalog(abandoned, b"catalog").await.unwrap();

        // Ticket still live, upload in progress
        let partial = Ticket::validated(addr(1), addr(2), None);
        fx.tickets.store(&partial).await.unwrap();
        let partial_id = partial.id().message_id();
        fx.store.store_catalog(partial_id, b"catalog").await.unwrap();

        // Ticket still live, every part uploaded but not completed
        let finished = Ticket::validated(addr(1), addr(2), None);
        fx.tickets.store(&finished).await.unwrap();
        let finished_id = finished.id().message_id();
        fx.store
            .store_header(finished_id, &Header::new(addr(1), addr(2)))
            .await
            .unwrap();
        fx.store.store_catalog(finished_id, b"catalog").await.unwrap();

        let sweep = pipeline.process_incoming().await;
        assert_eq!(sweep, IncomingSweep { resumed: 0, pruned: 1 });
        pipeline.wait_idle().await;

        assert_eq!(fx.store.section_of(abandoned), None);
        assert_eq!(fx.store.section_of(partial_id), Some(Section::Incoming));
        assert_eq!(fx.store.section_of(finished_id), Some(Section::Incoming));
        assert_eq!(fx.mailbox.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_recipient_goes_to_retry() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(77))).await;

        pipeline.dispatch(Section::Incoming, msg_id).await;
        pipeline.wait_idle().await;

        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
    }
}

#[cfg(test)]
mod relay_tests {
    use super::fixtures::{Fixture, addr};
    use crate::application::orchestrator::DeliveryOutcome;
    use crate::application::signing::verify_header;
    use crate::domain::entities::Header;
    use crate::domain::repository::{MessageStore, RetryRepository};
    use crate::domain::value_objects::Section;
    use std::sync::atomic::Ordering;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_remote_relay_solves_challenge_and_signs() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        let msg_id = fx.seed(&Header::new(addr(1), addr(9))).await;
        assert_ok!(
            fx.store
                .move_message(Section::Incoming, Section::Processing, msg_id)
                .await
        );

        let outcome = pipeline.orchestrator().process_message(msg_id).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(fx.store.section_of(msg_id), None);
        assert_eq!(fx.connector.endpoints.lock().as_slice(), ["remote.example"]);

        let remote_id = fx.peer.accepted().expect("peer queued the message");
        assert_eq!(fx.peer.completes.load(Ordering::SeqCst), 1);
        let received = fx
            .peer
            .store
            .load_message(Section::Incoming, remote_id)
            .await
            .unwrap();
        assert_eq!(received.catalog, b"catalog");
        assert_eq!(received.blocks.len(), 1);
        assert_eq!(received.attachments.len(), 1);
        assert!(verify_header(&received.header, fx.local_key.public_key()));
    }

    #[tokio::test]
    async fn test_upload_failure_deletes_remote_copy_and_retries() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        fx.peer.fail_blocks.store(true, Ordering::SeqCst);
        let msg_id = fx.seed(&Header::new(addr(1), addr(9))).await;
        assert_ok!(
            fx.store
                .move_message(Section::Incoming, Section::Processing, msg_id)
                .await
        );

        let outcome = pipeline.orchestrator().process_message(msg_id).await;
        assert_eq!(outcome, DeliveryOutcome::RetryQueued);

        assert_eq!(fx.peer.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.peer.completes.load(Ordering::SeqCst), 0);
        assert!(fx.peer.accepted().is_none());
        assert!(
            fx.peer
                .store
                .list_messages(Section::Incoming)
                .await
                .unwrap()
                .is_empty()
        );

        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
        assert_eq!(fx.retries.get(msg_id).await.unwrap().unwrap().retries, 1);
    }
}

#[cfg(test)]
mod handler_tests {
    use super::fixtures::{Fixture, Tickets, addr};
    use crate::application::inbound::InboundService;
    use crate::domain::entities::Header;
    use crate::domain::repository::MessageStore;
    use crate::domain::value_objects::Section;
    use crate::presentation::handlers::RelayAppState;
    use crate::presentation::router::relay_router;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use kernel::{MessageId, TicketId};
    use platform::client::TICKET_HEADER;
    use platform::kv::KvError;
    use pow::{PowConfig, issue_challenge};
    use std::sync::Arc;
    use ticket::{ApiKeyState, Ticket, TicketError, TicketRepository, TicketResult};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct Harness {
        fx: Fixture,
        tickets: Arc<Tickets>,
        queue: mpsc::Receiver<MessageId>,
        router: Router,
    }

    impl Harness {
        fn new() -> Self {
            let fx = Fixture::new();
            let pipeline = fx.pipeline();
            let (tx, queue) = pipeline.channel();
            let tickets = fx.tickets.clone();
            let state = RelayAppState {
                inbound: Arc::new(InboundService::new(tickets.clone(), fx.store.clone(), tx)),
                pipeline,
            };
            let router = relay_router(state, ApiKeyState::new(Some("admin".into())), 1024);
            Self {
                fx,
                tickets,
                queue,
                router,
            }
        }

        async fn ticket(&self, valid: bool) -> TicketId {
            let ticket = if valid {
                Ticket::validated(addr(1), addr(2), None)
            } else {
                Ticket::with_challenge(addr(1), addr(2), issue_challenge(&PowConfig::development()))
            };
            self.tickets.store(&ticket).await.unwrap();
            ticket.id()
        }

        async fn post(&self, path: &str, ticket: Option<TicketId>, body: Vec<u8>) -> StatusCode {
            let mut request = Request::post(path);
            if let Some(id) = ticket {
                request = request.header(TICKET_HEADER, id.to_string());
            }
            let response = self
                .router
                .clone()
                .oneshot(request.body(Body::from(body)).unwrap())
                .await
                .unwrap();
            response.status()
        }

        async fn upload_header(&self, ticket: TicketId, header: &Header) -> StatusCode {
            self.post(
                "/incoming/header",
                Some(ticket),
                serde_json::to_vec(header).unwrap(),
            )
            .await
        }
    }

    #[tokio::test]
    async fn test_full_upload() {
        let mut h = Harness::new();
        let ticket = h.ticket(true).await;
        let msg_id = ticket.message_id();

        let header = Header::new(addr(1), addr(2));
        assert_eq!(h.upload_header(ticket, &header).await, StatusCode::CREATED);
        assert_eq!(
            h.post("/incoming/catalog", Some(ticket), b"catalog".to_vec()).await,
            StatusCode::CREATED
        );
        assert_eq!(
            h.post("/incoming/block/b1", Some(ticket), b"block".to_vec()).await,
            StatusCode::CREATED
        );
        assert_eq!(
            h.post("/incoming/attachment/a1", Some(ticket), b"file".to_vec()).await,
            StatusCode::CREATED
        );
        assert_eq!(h.post("/incoming", Some(ticket), Vec::new()).await, StatusCode::ACCEPTED);

        assert_eq!(h.queue.try_recv().unwrap(), msg_id);
        assert!(h.fx.store.is_complete(Section::Incoming, msg_id).await.unwrap());
        // The ticket is spent.
        assert!(h.tickets.fetch(ticket).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parts_after_completion_are_refused() {
        let mut h = Harness::new();
        let ticket = h.ticket(true).await;
        let msg_id = ticket.message_id();
        h.upload_header(ticket, &Header::new(addr(1), addr(2))).await;
        h.post("/incoming/catalog", Some(ticket), b"catalog".to_vec())
            .await;
        assert_eq!(h.post("/incoming", Some(ticket), Vec::new()).await, StatusCode::ACCEPTED);
        assert_eq!(h.queue.try_recv().unwrap(), msg_id);

        assert_eq!(
            h.post("/incoming/block/late", Some(ticket), b"late".to_vec()).await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            h.post("/incoming", Some(ticket), Vec::new()).await,
            StatusCode::NOT_FOUND
        );
        assert!(h.queue.try_recv().is_err());
        assert!(h.fx.store.list_files(Section::Incoming, msg_id).await.unwrap().is_empty());
    }

    /// Ticket store that cannot delete.
    struct StickyTickets(Arc<Tickets>);

    impl TicketRepository for StickyTickets {
        async fn fetch(&self, id: TicketId) -> TicketResult<Option<Ticket>> {
            self.0.fetch(id).await
        }

        async fn store(&self, ticket: &Ticket) -> TicketResult<()> {
            self.0.store(ticket).await
        }

        async fn remove(&self, _id: TicketId) -> TicketResult<()> {
            Err(TicketError::Storage(KvError::Backend("read-only".into())))
        }
    }

    #[tokio::test]
    async fn test_completion_needs_ticket_retired() {
        let fx = Fixture::new();
        let (tx, mut queue) = fx.pipeline().channel();
        let inbound = InboundService::new(
            Arc::new(StickyTickets(fx.tickets.clone())),
            fx.store.clone(),
            tx,
        );
        let ticket = Ticket::validated(addr(1), addr(2), None);
        fx.tickets.store(&ticket).await.unwrap();
        let body = serde_json::to_vec(&Header::new(addr(1), addr(2))).unwrap();
        inbound.accept_header(ticket.id(), &body).await.unwrap();
        inbound.accept_catalog(ticket.id(), b"catalog").await.unwrap();

        assert!(inbound.complete(ticket.id()).await.is_err());
        assert!(queue.try_recv().is_err());
        assert_eq!(fx.store.section_of(ticket.id().message_id()), Some(Section::Incoming));
    }

    #[tokio::test]
    async fn test_missing_ticket_header() {
        let h = Harness::new();
        assert_eq!(
            h.post("/incoming/catalog", None, b"catalog".to_vec()).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_unvalidated_ticket_is_refused() {
        let h = Harness::new();
        let ticket = h.ticket(false).await;
        assert_eq!(
            h.post("/incoming/catalog", Some(ticket), b"catalog".to_vec()).await,
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let h = Harness::new();
        assert_eq!(
            h.post("/incoming/catalog", Some(TicketId::new()), b"c".to_vec()).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_header_must_match_ticket() {
        let h = Harness::new();
        let ticket = h.ticket(true).await;
        let header = Header::new(addr(1), addr(3));
        assert_eq!(h.upload_header(ticket, &header).await, StatusCode::CONFLICT);
        assert!(!h.fx.store.exists(Section::Incoming, ticket.message_id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_header_and_part_id() {
        let h = Harness::new();
        let ticket = h.ticket(true).await;
        assert_eq!(
            h.post("/incoming/header", Some(ticket), b"{not json".to_vec()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            h.post("/incoming/block/bad.id", Some(ticket), b"x".to_vec()).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_duplicate_part_conflicts() {
        let h = Harness::new();
        let ticket = h.ticket(true).await;
        assert_eq!(
            h.post("/incoming/block/b1", Some(ticket), b"one".to_vec()).await,
            StatusCode::CREATED
        );
        assert_eq!(
            h.post("/incoming/block/b1", Some(ticket), b"two".to_vec()).await,
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_incomplete_message_cannot_complete() {
        let mut h = Harness::new();
        let ticket = h.ticket(true).await;
        assert_eq!(
            h.post("/incoming/catalog", Some(ticket), b"catalog".to_vec()).await,
            StatusCode::CREATED
        );
        assert_eq!(
            h.post("/incoming", Some(ticket), Vec::new()).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert!(h.queue.try_recv().is_err());
        // Ticket survives for the missing header.
        assert!(h.tickets.fetch(ticket).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oversized_part_is_rejected() {
        let h = Harness::new();
        let ticket = h.ticket(true).await;
        assert_eq!(
            h.post("/incoming/block/big", Some(ticket), vec![0u8; 4096]).await,
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_delete_partial_upload() {
        let h = Harness::new();
        let ticket = h.ticket(true).await;
        h.post("/incoming/catalog", Some(ticket), b"catalog".to_vec())
            .await;

        let response = h
            .router
            .clone()
            .oneshot(
                Request::delete("/incoming")
                    .header(TICKET_HEADER, ticket.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(h.fx.store.section_of(ticket.message_id()), None);
        assert!(h.tickets.fetch(ticket).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_requires_api_key() {
        let h = Harness::new();
        assert_eq!(
            h.post("/admin/flush", None, Vec::new()).await,
            StatusCode::UNAUTHORIZED
        );

        let response = h
            .router
            .clone()
            .oneshot(
                Request::post("/admin/flush")
                    .header(header::AUTHORIZATION, "Bearer admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["retried"], 0);
        assert_eq!(report["recovered"], 0);
        assert_eq!(report["resumed"], 0);
        assert_eq!(report["pruned"], 0);
    }
}

#[cfg(test)]
mod run_tests {
    use super::fixtures::{Fixture, addr};
    use crate::domain::entities::Header;
    use crate::domain::repository::RetryRepository;
    use crate::domain::value_objects::Section;
    use std::time::Duration;
    use tokio::sync::broadcast;

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_succeeds_on_scheduled_sweep() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        fx.mailbox.fail_next(1);
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        let (queue, rx) = pipeline.channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(rx, shutdown_rx).await }
        });
        queue.send(msg_id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fx.mailbox.attempt_count(), 1);
        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
        let info = fx.retries.get(msg_id).await.unwrap().unwrap();
        assert_eq!(info.retries, 1);

        // Retry sweeps before the backoff expires leave it parked.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.mailbox.attempt_count(), 1);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(fx.mailbox.attempt_count(), 2);
        assert_eq!(fx.mailbox.delivered_count(), 1);
        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(fx.retries.get(msg_id).await.unwrap().is_none());

        shutdown.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_delivery() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        *fx.mailbox.delay.lock() = Some(Duration::from_secs(2));
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        let (queue, rx) = pipeline.channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(rx, shutdown_rx).await }
        });
        queue.send(msg_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.mailbox.attempt_count(), 1);
        assert_eq!(fx.mailbox.delivered_count(), 0);

        shutdown.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(fx.mailbox.delivered_count(), 1);
        assert_eq!(fx.store.section_of(msg_id), None);
        assert!(pipeline.scoreboard().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_past_grace_period_resumes_after_restart() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline();
        *fx.mailbox.delay.lock() = Some(Duration::from_secs(600));
        let msg_id = fx.seed(&Header::new(addr(1), addr(2))).await;

        let (queue, rx) = pipeline.channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(rx, shutdown_rx).await }
        });
        queue.send(msg_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        shutdown.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(fx.mailbox.delivered_count(), 0);
        assert_eq!(fx.store.section_of(msg_id), Some(Section::Processing));

        // A fresh pipeline starts with an empty scoreboard.
        let restarted = fx.pipeline();
        assert_eq!(restarted.process_stuck_messages().await, 1);
        assert_eq!(fx.store.section_of(msg_id), Some(Section::Retry));
    }
}
