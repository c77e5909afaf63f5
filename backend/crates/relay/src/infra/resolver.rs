//! Address directory clients

use crate::domain::entities::{AddressInfo, RoutingInfo};
use crate::domain::repository::Resolver;
use crate::error::ResolveError;
use async_trait::async_trait;
use kernel::AddressHash;
use parking_lot::RwLock;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Directory service reached over HTTP.
///
/// `GET {base}/address/{hash}` and `GET {base}/routing/{id}` answer with
/// [`AddressInfo`] and [`RoutingInfo`] JSON.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    base_url: String,
    http: reqwest::Client,
}

impl HttpResolver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ResolveError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
    ) -> Result<T, ResolveError> {
        let url = format!("{}/{path}/{key}", self.base_url);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ResolveError::NotFound(key.to_string())),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(ResolveError::Backend(format!("{url} answered {status}"))),
        }
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve_address(&self, address: &AddressHash) -> Result<AddressInfo, ResolveError> {
        let info: AddressInfo = self.fetch("address", address.as_str()).await?;
        if &info.hash != address {
            return Err(ResolveError::Backend(format!(
                "directory answered for {} instead of {address}",
                info.hash
            )));
        }
        Ok(info)
    }

    async fn resolve_routing(&self, routing_id: &str) -> Result<RoutingInfo, ResolveError> {
        self.fetch("routing", routing_id).await
    }
}

/// Fixed directory for single-host deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addresses: Arc<RwLock<HashMap<AddressHash, AddressInfo>>>,
    routes: Arc<RwLock<HashMap<String, RoutingInfo>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&self, info: AddressInfo) {
        self.addresses.write().insert(info.hash.clone(), info);
    }

    pub fn add_routing(&self, info: RoutingInfo) {
        self.routes.write().insert(info.routing_id.clone(), info);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve_address(&self, address: &AddressHash) -> Result<AddressInfo, ResolveError> {
        self.addresses
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(address.to_string()))
    }

    async fn resolve_routing(&self, routing_id: &str) -> Result<RoutingInfo, ResolveError> {
        self.routes
            .read()
            .get(routing_id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(routing_id.to_string()))
    }
}
