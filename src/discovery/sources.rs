//! Server discovery tiers: DNS and the HTTP server list.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::http_client::{RoutedClient, Transport};
use crate::privacy::RoutingDecision;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),
    #[error("Server list request failed: {0}")]
    Request(#[from] RequestError),
    #[error("Discovery timed out")]
    Timeout,
}

/// Forward and reverse DNS lookups.
#[async_trait]
pub trait DnsDiscovery: Send + Sync {
    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, DiscoveryError>;

    /// Canonical hostname for `ip`, if it has a PTR record.
    async fn reverse_lookup(&self, ip: IpAddr) -> Result<Option<String>, DiscoveryError>;
}

/// Source of the HTTP server list.
#[async_trait]
pub trait HttpDiscovery: Send + Sync {
    /// Fetch server names along `route`.
    async fn list_servers(&self, route: &RoutingDecision) -> Result<Vec<String>, DiscoveryError>;
}

/// System DNS via hickory.
pub struct HickoryDns {
    resolver: TokioResolver,
}

impl HickoryDns {
    /// Resolver using the system configuration, or hickory's defaults when
    /// the system configuration cannot be read.
    pub fn from_system() -> Self {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                warn!("Failed to read system DNS configuration, using defaults: {}", e);
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        };
        Self { resolver }
    }
}

#[async_trait]
impl DnsDiscovery for HickoryDns {
    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, DiscoveryError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| DiscoveryError::Dns(e.to_string()))?;
        Ok(lookup.iter().collect())
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> Result<Option<String>, DiscoveryError> {
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| DiscoveryError::Dns(e.to_string()))?;
        Ok(lookup
            .iter()
            .next()
            .map(|ptr| ptr.to_string().trim_end_matches('.').to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    #[serde(default)]
    name: String,
}

/// `GET <url>` returning `[{"name": "de1.api.radio-browser.info", ...}, ...]`.
pub struct HttpServerList {
    client: RoutedClient,
    url: String,
    suffix: String,
}

impl HttpServerList {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            client: RoutedClient::new(transport),
            url: url.into(),
            suffix: suffix.into(),
        }
    }
}

#[async_trait]
impl HttpDiscovery for HttpServerList {
    async fn list_servers(&self, route: &RoutingDecision) -> Result<Vec<String>, DiscoveryError> {
        let body = self.client.get_text(route, &self.url).await?;
        let entries: Vec<ServerEntry> = serde_json::from_str(&body)
            .map_err(|e| RequestError::malformed("server list", e))?;
        let names = entries.into_iter().map(|e| e.name);
        Ok(keep_matching(names, &self.suffix, &[]))
    }
}

/// Keep names containing `suffix` that are not in `exclude`, deduplicated in order.
pub(crate) fn keep_matching(
    names: impl IntoIterator<Item = String>,
    suffix: &str,
    exclude: &[String],
) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim().trim_end_matches('.').to_string();
        if name.is_empty() || !name.contains(suffix) || exclude.contains(&name) {
            continue;
        }
        if !kept.contains(&name) {
            kept.push(name);
        }
    }
    kept
}

/// Resolve `lookup_host` and reverse-resolve each address to a server name.
pub(crate) async fn discover_via_dns(
    dns: &dyn DnsDiscovery,
    lookup_host: &str,
    suffix: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let ips = dns.lookup_host(lookup_host).await?;
    debug!("{} resolved to {} address(es)", lookup_host, ips.len());

    let mut names = Vec::new();
    for ip in ips {
        match dns.reverse_lookup(ip).await {
            Ok(Some(name)) if name != ip.to_string() => names.push(name),
            Ok(_) => debug!(%ip, "No usable reverse DNS name"),
            Err(e) => debug!(%ip, "Reverse lookup failed: {}", e),
        }
    }

    Ok(keep_matching(names, suffix, &[lookup_host.to_string()]))
}
