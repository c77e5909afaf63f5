//! Server configuration from the environment

use anyhow::{Context, bail};
use kernel::AddressHash;
use pow::{Difficulty, PowConfig};
use relay::RelayConfig;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use ticket::TicketConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvBackendKind {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolBackendKind {
    File,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub kv_backend: KvBackendKind,
    pub database_url: Option<String>,
    pub spool_backend: SpoolBackendKind,
    pub spool_dir: PathBuf,
    pub accounts_dir: PathBuf,
    /// Accounts created at startup if missing
    pub local_addresses: Vec<AddressHash>,
    /// Directory service; a static single-host directory is used without it
    pub resolver_url: Option<String>,
    pub pow_bits: Option<u8>,
    /// Base64 Ed25519 seed for signing relayed headers
    pub routing_signing_key: Option<String>,
    pub admin_api_key: Option<String>,
    pub max_concurrent_deliveries: Option<usize>,
    pub shutdown_timeout: Option<Duration>,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let listen_addr = get("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:31113".to_string())
            .parse()
            .context("LISTEN_ADDR must be host:port")?;

        let kv_backend = match get("KV_BACKEND").as_deref() {
            None | Some("memory") => KvBackendKind::Memory,
            Some("postgres") => KvBackendKind::Postgres,
            Some(other) => bail!("KV_BACKEND must be memory or postgres, got {other}"),
        };
        let database_url = get("DATABASE_URL");
        if kv_backend == KvBackendKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when KV_BACKEND=postgres");
        }

        let spool_backend = match get("SPOOL_BACKEND").as_deref() {
            None | Some("file") => SpoolBackendKind::File,
            Some("memory") => SpoolBackendKind::Memory,
            Some(other) => bail!("SPOOL_BACKEND must be file or memory, got {other}"),
        };

        let local_addresses = get("LOCAL_ADDRESSES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        AddressHash::parse(s)
                            .with_context(|| format!("LOCAL_ADDRESSES entry {s} is not an address hash"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let pow_bits = get("POW_BITS")
            .map(|v| v.parse::<u8>().context("POW_BITS must be a number"))
            .transpose()?;
        if let Some(bits) = pow_bits
            && Difficulty::new(bits).is_none()
        {
            bail!("POW_BITS must be between {} and {}", Difficulty::MIN, Difficulty::MAX);
        }

        let max_concurrent_deliveries = get("MAX_CONCURRENT_DELIVERIES")
            .map(|v| v.parse::<usize>().context("MAX_CONCURRENT_DELIVERIES must be a number"))
            .transpose()?;

        let shutdown_timeout = get("SHUTDOWN_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>().context("SHUTDOWN_TIMEOUT_SECS must be a number"))
            .transpose()?
            .map(Duration::from_secs);

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            kv_backend,
            database_url,
            spool_backend,
            spool_dir: get("SPOOL_DIR").unwrap_or_else(|| "./data/spool".into()).into(),
            accounts_dir: get("ACCOUNTS_DIR")
                .unwrap_or_else(|| "./data/accounts".into())
                .into(),
            local_addresses,
            resolver_url: get("RESOLVER_URL"),
            pow_bits,
            routing_signing_key: get("ROUTING_SIGNING_KEY"),
            admin_api_key: get("ADMIN_API_KEY"),
            max_concurrent_deliveries,
            shutdown_timeout,
            allowed_origins,
        })
    }

    fn pow_config(&self) -> PowConfig {
        let base = if cfg!(debug_assertions) {
            PowConfig::development()
        } else {
            PowConfig::default()
        };
        match self.pow_bits.and_then(Difficulty::new) {
            Some(difficulty) => PowConfig { difficulty, ..base },
            None => base,
        }
    }

    pub fn ticket_config(&self) -> TicketConfig {
        let pow = self.pow_config();
        TicketConfig {
            ticket_ttl: pow.challenge_ttl,
            pow,
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        let base = if cfg!(debug_assertions) {
            RelayConfig::development()
        } else {
            RelayConfig::default()
        };
        RelayConfig {
            max_concurrent_deliveries: self
                .max_concurrent_deliveries
                .unwrap_or(base.max_concurrent_deliveries),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(base.shutdown_timeout),
            pow: self.pow_config(),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr.port(), 31113);
        assert_eq!(config.kv_backend, KvBackendKind::Memory);
        assert_eq!(config.spool_backend, SpoolBackendKind::File);
        assert!(config.local_addresses.is_empty());
        assert!(config.resolver_url.is_none());
        assert!(config.admin_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let hash = AddressHash::from_digest(&[5; 32]);
        let config = config(&[
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("SPOOL_BACKEND", "memory"),
            ("LOCAL_ADDRESSES", &format!(" {hash} ,")),
            ("POW_BITS", "12"),
            ("MAX_CONCURRENT_DELIVERIES", "3"),
            ("SHUTDOWN_TIMEOUT_SECS", "9"),
            ("ADMIN_API_KEY", "  "),
        ])
        .unwrap();

        assert_eq!(config.spool_backend, SpoolBackendKind::Memory);
        assert_eq!(config.local_addresses, vec![hash]);
        assert!(config.admin_api_key.is_none());

        let ticket = config.ticket_config();
        assert_eq!(ticket.pow.difficulty_bits(), 12);
        assert_eq!(ticket.ticket_ttl, ticket.pow.challenge_ttl);

        let relay = config.relay_config();
        assert_eq!(relay.max_concurrent_deliveries, 3);
        assert_eq!(relay.shutdown_timeout, Duration::from_secs(9));
        assert_eq!(relay.pow.difficulty_bits(), 12);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("KV_BACKEND", "redis")]).is_err());
        assert!(config(&[("KV_BACKEND", "postgres")]).is_err());
        assert!(config(&[("POW_BITS", "99")]).is_err());
        assert!(config(&[("LOCAL_ADDRESSES", "not-a-hash")]).is_err());
        assert!(config(&[("LISTEN_ADDR", "nowhere")]).is_err());
    }
}
