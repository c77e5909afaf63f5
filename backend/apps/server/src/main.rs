//! Mail Transfer Server Entry Point
//!
//! Wires the ticket manager and the relay pipeline into one axum server.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod accounts;
mod config;

use accounts::LocalAccounts;
use axum::{
    Router, http,
    http::{Method, header},
};
use config::{KvBackendKind, ServerConfig, SpoolBackendKind};
use platform::client::TICKET_HEADER;
use platform::kv::{ExpiringStore, KvBackend, MemoryStore, PgStore};
use relay::{
    AddressInfo, DeliveryServices, FileMessageStore, HeaderSigner, HttpPeerConnector,
    HttpResolver, InboundService, KvRetryRepository, MemoryMessageStore, MessageStore, Pipeline,
    RelayAppState, Resolver, RoutingInfo, StaticResolver, TicketUploads, relay_router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticket::{
    ApiKeyState, KvTicketRepository, MemorySubscriptionRepository, TicketAppState, ticket_router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const KV_PURGE_INTERVAL: Duration = Duration::from_secs(60);
const RESOLVER_TIMEOUT: Duration = Duration::from_secs(10);
const LOCAL_ROUTING_ID: &str = "local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "server=info,ticket=info,relay=info,pow=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Key/value storage for tickets and retry info
    let kv = match config.kv_backend {
        KvBackendKind::Memory => KvBackend::Memory(MemoryStore::new()),
        KvBackendKind::Postgres => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;
            tracing::info!("Migrations completed");

            KvBackend::Postgres(PgStore::new(pool))
        }
    };

    // Startup cleanup: errors here should not prevent server startup
    match kv.purge_expired().await {
        Ok(purged) => tracing::info!(purged, backend = kv.name(), "Expired entry cleanup completed"),
        Err(e) => tracing::warn!(error = %e, "Expired entry cleanup failed, continuing anyway"),
    }

    // Message spool
    let store: Arc<dyn MessageStore> = match config.spool_backend {
        SpoolBackendKind::File => {
            let store = FileMessageStore::new(&config.spool_dir);
            store.init()?;
            Arc::new(store)
        }
        SpoolBackendKind::Memory => {
            tracing::warn!("Using in-memory spool; queued mail is lost on restart");
            Arc::new(MemoryMessageStore::new())
        }
    };

    // Local accounts
    let accounts = Arc::new(LocalAccounts::new(&config.accounts_dir));
    for address in &config.local_addresses {
        accounts.create(address).await?;
    }

    let signer = config
        .routing_signing_key
        .as_deref()
        .map(HeaderSigner::from_base64)
        .transpose()?;
    if signer.is_none() {
        tracing::warn!("ROUTING_SIGNING_KEY not set; relayed headers stay unsigned");
    }

    let resolver: Arc<dyn Resolver> = match &config.resolver_url {
        Some(url) => Arc::new(HttpResolver::new(url, RESOLVER_TIMEOUT)?),
        None => Arc::new(single_host_directory(&config, signer.as_ref())),
    };

    let ticket_config = config.ticket_config();
    let relay_config = config.relay_config();
    let max_part_bytes = relay_config.max_part_bytes;

    let services = DeliveryServices {
        store: store.clone(),
        retries: Arc::new(KvRetryRepository::new(kv.clone())),
        resolver,
        mailbox: accounts.clone(),
        peers: Arc::new(HttpPeerConnector::new(
            relay_config.peer_connect_timeout,
            relay_config.peer_request_timeout,
        )?),
        signer,
    };

    let tickets = Arc::new(KvTicketRepository::new(kv.clone(), ticket_config.ticket_ttl));

    // Relay pipeline
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let pipeline = Pipeline::new(
        services,
        Arc::new(TicketUploads::new(tickets.clone())),
        relay_config,
    );
    let (queue_tx, queue_rx) = pipeline.channel();
    let pipeline_task = {
        let pipeline = pipeline.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { pipeline.run(queue_rx, shutdown).await })
    };

    // Periodic expired-entry purge
    {
        let kv = kv.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(KV_PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => match kv.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => tracing::debug!(purged, "Purged expired entries"),
                        Err(e) => tracing::warn!(error = %e, "Expired entry purge failed"),
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    let ticket_state = TicketAppState {
        tickets: tickets.clone(),
        subscriptions: Arc::new(MemorySubscriptionRepository::new()),
        accounts: accounts.clone(),
        config: Arc::new(ticket_config),
    };
    let relay_state = RelayAppState {
        inbound: Arc::new(InboundService::new(tickets, store, queue_tx)),
        pipeline,
    };

    let api_key = ApiKeyState::new(config.admin_api_key.clone());
    if api_key.api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; account and admin routes are disabled");
    }

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            http::HeaderName::from_static(TICKET_HEADER),
        ]));

    // Build router
    let app = Router::new()
        .merge(ticket_router(ticket_state, api_key.clone()))
        .merge(relay_router(relay_state, api_key, max_part_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", config.listen_addr);

    let listener = TcpListener::bind(config.listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    pipeline_task.await?;
    tracing::info!("Server stopped");

    Ok(())
}

/// Directory that knows only this server's own accounts.
fn single_host_directory(config: &ServerConfig, signer: Option<&HeaderSigner>) -> StaticResolver {
    let resolver = StaticResolver::new();
    resolver.add_routing(RoutingInfo {
        routing_id: LOCAL_ROUTING_ID.into(),
        endpoint: format!("http://{}", config.listen_addr),
        public_key: signer.map(|s| s.public_key().to_vec()).unwrap_or_default(),
    });
    for address in &config.local_addresses {
        resolver.add_address(AddressInfo {
            hash: address.clone(),
            routing_id: LOCAL_ROUTING_ID.into(),
            public_key: Vec::new(),
        });
    }
    tracing::info!(
        accounts = config.local_addresses.len(),
        "No RESOLVER_URL; using single-host directory"
    );
    resolver
}

async fn shutdown_signal(shutdown: broadcast::Sender<()>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    // No receivers left just means everything already stopped.
    let _ = shutdown.send(());
}
