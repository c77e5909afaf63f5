//! HTTP client for remote servers

use crate::domain::entities::Header;
use crate::domain::repository::{PeerClient, PeerConnector};
use crate::domain::value_objects::PartId;
use crate::error::PeerError;
use async_trait::async_trait;
use kernel::TicketId;
use platform::client::TICKET_HEADER;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use ticket::{TicketRequest, TicketResponse};

/// Problem document returned by a peer on failure
#[derive(Debug, Deserialize)]
struct ProblemBody {
    #[serde(default)]
    detail: Option<String>,
}

/// Builds [`HttpPeerClient`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpPeerConnector {
    http: reqwest::Client,
}

impl HttpPeerConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, PeerError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PeerConnector for HttpPeerConnector {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn PeerClient>, PeerError> {
        let client = HttpPeerClient::new(self.http.clone(), endpoint)?;
        Ok(Arc::new(client))
    }
}

#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPeerClient {
    /// Endpoints without a scheme are reached over HTTPS.
    pub fn new(http: reqwest::Client, endpoint: &str) -> Result<Self, PeerError> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(PeerError::InvalidEndpoint(endpoint.to_string()));
        }
        let base_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        };
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_part(
        &self,
        ticket_id: TicketId,
        path: &str,
        body: Vec<u8>,
    ) -> Result<(), PeerError> {
        let response = self
            .http
            .post(self.url(path))
            .header(TICKET_HEADER, ticket_id.to_string())
            .body(body)
            .send()
            .await?;
        expect_success(response).await
    }
}

async fn expect_success(response: Response) -> Result<(), PeerError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(status_error(response).await)
}

async fn status_error(response: Response) -> PeerError {
    let status = response.status();
    let message = response
        .json::<ProblemBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .unwrap_or_else(|| status.to_string());
    PeerError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn request_ticket(&self, request: &TicketRequest) -> Result<TicketResponse, PeerError> {
        let response = self
            .http
            .post(self.url("/ticket"))
            .json(request)
            .send()
            .await?;

        // 412 carries the challenge in the same body shape as 200.
        match response.status() {
            StatusCode::OK | StatusCode::PRECONDITION_FAILED => Ok(response.json().await?),
            _ => Err(status_error(response).await),
        }
    }

    async fn upload_header(&self, ticket_id: TicketId, header: &Header) -> Result<(), PeerError> {
        let body = serde_json::to_vec(header)
            .map_err(|e| PeerError::Rejected(format!("unserializable header: {e}")))?;
        self.post_part(ticket_id, "/incoming/header", body).await
    }

    async fn upload_catalog(&self, ticket_id: TicketId, catalog: Vec<u8>) -> Result<(), PeerError> {
        self.post_part(ticket_id, "/incoming/catalog", catalog).await
    }

    async fn upload_block(
        &self,
        ticket_id: TicketId,
        id: &PartId,
        data: Vec<u8>,
    ) -> Result<(), PeerError> {
        self.post_part(ticket_id, &format!("/incoming/block/{id}"), data)
            .await
    }

    async fn upload_attachment(
        &self,
        ticket_id: TicketId,
        id: &PartId,
        data: Vec<u8>,
    ) -> Result<(), PeerError> {
        self.post_part(ticket_id, &format!("/incoming/attachment/{id}"), data)
            .await
    }

    async fn complete(&self, ticket_id: TicketId) -> Result<(), PeerError> {
        self.post_part(ticket_id, "/incoming", Vec::new()).await
    }

    async fn delete(&self, ticket_id: TicketId) -> Result<(), PeerError> {
        let response = self
            .http
            .delete(self.url("/incoming"))
            .header(TICKET_HEADER, ticket_id.to_string())
            .send()
            .await?;
        expect_success(response).await
    }
}
