//! Cached, shuffled pool of directory API servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::sources::{discover_via_dns, DiscoveryError, DnsDiscovery, HickoryDns, HttpDiscovery, HttpServerList};
use crate::http_client::{HttpClient, Timeouts};
use crate::privacy::{RoutingDecision, RoutingPolicy, ServiceEndpoint};

/// Host resolved to enumerate directory servers.
pub const DEFAULT_LOOKUP_HOST: &str = "all.api.radio-browser.info";

/// Substring every accepted server name must contain.
pub const DEFAULT_SERVER_SUFFIX: &str = "api.radio-browser.info";

/// Server list endpoint used when DNS discovery yields nothing.
pub const DEFAULT_SERVERS_URL: &str = "https://all.api.radio-browser.info/json/servers";

/// Known servers used when every discovery tier fails.
pub const FALLBACK_SERVERS: &[&str] = &[
    "de1.api.radio-browser.info",
    "de2.api.radio-browser.info",
    "fi1.api.radio-browser.info",
];

/// Discovery settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub lookup_host: String,
    pub server_suffix: String,
    pub servers_url: String,
    pub fallback_servers: Vec<String>,
    pub cache_ttl: Duration,
    pub dns_timeout: Duration,
    pub http_timeout: Duration,
    pub proxied_http_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lookup_host: DEFAULT_LOOKUP_HOST.to_string(),
            server_suffix: DEFAULT_SERVER_SUFFIX.to_string(),
            servers_url: DEFAULT_SERVERS_URL.to_string(),
            fallback_servers: FALLBACK_SERVERS.iter().map(|s| s.to_string()).collect(),
            cache_ttl: Duration::from_secs(30 * 60),
            dns_timeout: Duration::from_secs(5),
            http_timeout: Timeouts::discovery().direct,
            proxied_http_timeout: Timeouts::discovery().proxied,
        }
    }
}

/// Tier that produced the current pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryTier {
    Dns,
    Http,
    Fallback,
}

impl std::fmt::Display for DiscoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryTier::Dns => write!(f, "dns"),
            DiscoveryTier::Http => write!(f, "http"),
            DiscoveryTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Current server list with its refresh time and round-robin cursor.
#[derive(Debug, Clone, Default)]
pub struct ServerPool {
    servers: Vec<String>,
    refreshed_at: Option<Instant>,
    cursor: usize,
    tier: Option<DiscoveryTier>,
}

impl ServerPool {
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tier(&self) -> Option<DiscoveryTier> {
        self.tier
    }

    pub fn age(&self) -> Option<Duration> {
        self.refreshed_at.map(|t| t.elapsed())
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.refreshed_at {
            _ if self.servers.is_empty() => true,
            Some(at) => at.elapsed() > ttl,
            None => true,
        }
    }

    fn current(&self) -> Option<&String> {
        if self.servers.is_empty() {
            return None;
        }
        self.servers.get(self.cursor % self.servers.len())
    }
}

/// Discovers directory servers and hands them out round-robin.
///
/// Refresh is lazy: the pool is rebuilt on access when empty or older than
/// the TTL. The pool lock is held across a refresh so concurrent callers
/// wait for the new list instead of refreshing again.
pub struct ServerDiscovery {
    config: DiscoveryConfig,
    policy: RoutingPolicy,
    dns: Arc<dyn DnsDiscovery>,
    http: Arc<dyn HttpDiscovery>,
    pool: Mutex<ServerPool>,
}

impl ServerDiscovery {
    /// Discovery over system DNS and a reqwest transport.
    pub fn new(config: DiscoveryConfig, policy: RoutingPolicy, user_agent: Option<&str>) -> Self {
        let mut builder = HttpClient::builder().timeouts(Timeouts::new(
            config.http_timeout,
            config.proxied_http_timeout,
        ));
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        let http = HttpServerList::new(
            Arc::new(builder.build()),
            config.servers_url.clone(),
            config.server_suffix.clone(),
        );
        Self::with_sources(config, policy, Arc::new(HickoryDns::from_system()), Arc::new(http))
    }

    pub fn with_sources(
        config: DiscoveryConfig,
        policy: RoutingPolicy,
        dns: Arc<dyn DnsDiscovery>,
        http: Arc<dyn HttpDiscovery>,
    ) -> Self {
        Self {
            config,
            policy,
            dns,
            http,
            pool: Mutex::new(ServerPool::default()),
        }
    }

    fn first_fallback(&self) -> String {
        self.config
            .fallback_servers
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_SERVERS[0].to_string())
    }

    /// Server to use now, refreshing the pool first if it is empty or expired.
    pub async fn current_server(&self) -> String {
        let mut pool = self.pool.lock().await;
        if pool.is_stale(self.config.cache_ttl) {
            self.refresh_locked(&mut pool).await;
        }
        pool.current().cloned().unwrap_or_else(|| self.first_fallback())
    }

    /// Advance to the next server. An empty pool is left untouched.
    pub async fn cycle_to_next(&self) -> String {
        let mut pool = self.pool.lock().await;
        if pool.servers.is_empty() {
            return self.first_fallback();
        }
        pool.cursor = (pool.cursor + 1) % pool.servers.len();
        let next = pool.servers[pool.cursor].clone();
        debug!("Cycled to directory server {}", next);
        next
    }

    /// Rebuild the pool now regardless of its age.
    pub async fn force_refresh(&self) -> Vec<String> {
        let mut pool = self.pool.lock().await;
        self.refresh_locked(&mut pool).await;
        pool.servers.clone()
    }

    /// Every server in the pool, refreshing first if needed.
    pub async fn all_servers(&self) -> Vec<String> {
        let mut pool = self.pool.lock().await;
        if pool.is_stale(self.config.cache_ttl) {
            self.refresh_locked(&mut pool).await;
        }
        if pool.servers.is_empty() {
            return self.config.fallback_servers.clone();
        }
        pool.servers.clone()
    }

    /// Forget the pool; the next access rediscovers.
    pub async fn reset(&self) {
        *self.pool.lock().await = ServerPool::default();
    }

    /// `https://<server>/json` for the current server.
    pub async fn api_base_url(&self) -> String {
        format!("https://{}/json", self.current_server().await)
    }

    pub async fn snapshot(&self) -> ServerPool {
        self.pool.lock().await.clone()
    }

    async fn refresh_locked(&self, pool: &mut ServerPool) {
        let (mut servers, tier) = self.discover().await;
        servers.shuffle(&mut rand::rng());
        info!(
            "Discovered {} directory server(s) via {}",
            servers.len(),
            tier
        );
        *pool = ServerPool {
            servers,
            refreshed_at: Some(Instant::now()),
            cursor: 0,
            tier: Some(tier),
        };
    }

    async fn discover(&self) -> (Vec<String>, DiscoveryTier) {
        let forcing = self.policy.is_forcing();

        if forcing {
            // System DNS would reveal the lookup outside the proxy
            debug!("Proxy policy active, skipping DNS discovery");
        } else {
            match self.dns_tier().await {
                Ok(servers) if !servers.is_empty() => return (servers, DiscoveryTier::Dns),
                Ok(_) => debug!("DNS discovery returned no servers"),
                Err(e) => warn!("DNS discovery failed: {}", e),
            }
        }

        let route = if forcing {
            self.policy
                .resolve(&ServiceEndpoint::clearnet(self.config.servers_url.clone()))
        } else {
            RoutingDecision::direct(self.config.servers_url.clone())
        };

        if route.is_blocked() {
            warn!("Server list request blocked, using fallback servers");
        } else {
            match self.http_tier(&route).await {
                Ok(servers) if !servers.is_empty() => return (servers, DiscoveryTier::Http),
                Ok(_) => debug!("Server list was empty"),
                Err(e) => warn!("HTTP discovery failed: {}", e),
            }
        }

        (self.config.fallback_servers.clone(), DiscoveryTier::Fallback)
    }

    async fn dns_tier(&self) -> Result<Vec<String>, DiscoveryError> {
        tokio::time::timeout(
            self.config.dns_timeout,
            discover_via_dns(
                self.dns.as_ref(),
                &self.config.lookup_host,
                &self.config.server_suffix,
            ),
        )
        .await
        .map_err(|_| DiscoveryError::Timeout)?
    }

    async fn http_tier(&self, route: &RoutingDecision) -> Result<Vec<String>, DiscoveryError> {
        let limit = if route.mode.is_proxied() {
            self.config.proxied_http_timeout
        } else {
            self.config.http_timeout
        };
        tokio::time::timeout(limit, self.http.list_servers(route))
            .await
            .map_err(|_| DiscoveryError::Timeout)?
    }
}
