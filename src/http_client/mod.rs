//! HTTP transport with per-request proxy routing.
//!
//! Privacy features:
//! - Every request carries its [`RoutingDecision`]; the transport builds (and
//!   caches) one reqwest client per distinct route
//! - SOCKS routes use `socks5h://`/`socks4a://` and a resolver that never
//!   performs local DNS lookups; the proxy's own hostname is resolved before
//!   the client is built
//! - HTTPS through an authenticating HTTP proxy answers the CONNECT challenge
//! - Direct routes ignore proxy environment variables
//! - Blocked routes are refused, never sent directly

// This module is the privacy wrapper - it's allowed to use reqwest directly
#![allow(clippy::disallowed_methods)]

mod dns;
mod response;
mod routed;
mod tunnel;
mod user_agent;

pub use dns::{ProxyDelegatedResolver, PLACEHOLDER_ADDR};
pub use response::{TransportRequest, TransportResponse};
pub use routed::{request_uri, RoutedClient};
pub use tunnel::{resolve_proxy_host, tunnel_authority};
pub use user_agent::{resolve_user_agent, TOR_BROWSER_USER_AGENT, USER_AGENT};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, Proxy, Response};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::privacy::{ProxyCredentials, ProxyProtocol, ProxyTarget, RoutingDecision, RoutingMode};

/// Sends a request along the route it carries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Connect and total timeouts for direct and proxied routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub direct: Duration,
    pub proxied: Duration,
}

impl Timeouts {
    pub const fn new(direct: Duration, proxied: Duration) -> Self {
        Self { direct, proxied }
    }

    /// Station directory: 30s direct, 60s proxied.
    pub const fn directory() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(60))
    }

    /// Station registry: 15s direct, 30s proxied.
    pub const fn registry() -> Self {
        Self::new(Duration::from_secs(15), Duration::from_secs(30))
    }

    /// Server discovery over HTTP.
    pub const fn discovery() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(60))
    }

    pub fn for_mode(&self, mode: RoutingMode) -> Duration {
        if mode.is_proxied() {
            self.proxied
        } else {
            self.direct
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::directory()
    }
}

fn extract_response_headers(response: &Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Identity used to cache clients.
///
/// Credentials are part of it because they are attached to the client's
/// proxy. An answered CONNECT challenge is only valid for the tunnel it was
/// computed for, so those clients are also keyed by target authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    proxy: Option<ProxyTarget>,
    credentials: Option<ProxyCredentials>,
    tunnel: Option<String>,
}

impl RouteKey {
    fn of(route: &RoutingDecision, url: &str) -> Self {
        let credentials = route.proxy.as_ref().and(route.credentials.clone());
        let tunnel = match (&route.proxy, &credentials) {
            (Some(proxy), Some(_)) if !proxy.is_socks() => tunnel_authority(url),
            _ => None,
        };
        Self {
            proxy: route.proxy.clone(),
            credentials,
            tunnel,
        }
    }
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpClient {
    user_agent: String,
    timeouts: Timeouts,
    clients: Arc<Mutex<HashMap<RouteKey, Client>>>,
}

/// Builder for constructing [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeouts: Option<Timeouts>,
}

impl HttpClientBuilder {
    /// Set the user agent string.
    /// - `"tor-browser"`: Use the Tor Browser user agent
    /// - Any other string: Use as-is
    /// - Not called: Use default stationnet user agent
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn build(self) -> HttpClient {
        HttpClient {
            user_agent: resolve_user_agent(self.user_agent.as_deref()),
            timeouts: self.timeouts.unwrap_or_default(),
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// DNS resolver to install for a route. Only SOCKS routes get one.
    pub fn resolver_for(route: &RoutingDecision) -> Option<Arc<ProxyDelegatedResolver>> {
        route
            .proxy
            .as_ref()
            .filter(|p| p.is_socks())
            .map(|_| Arc::new(ProxyDelegatedResolver))
    }

    async fn client_for(&self, route: &RoutingDecision, url: &str) -> Result<Client, TransportError> {
        let key = RouteKey::of(route, url);
        if let Some(client) = self.cached(&key) {
            return Ok(client);
        }

        let mut proxy = None;
        let mut tunnel_auth = None;
        if route.mode.is_proxied() {
            if let Some(target) = &route.proxy {
                let timeout = self.timeouts.for_mode(route.mode);
                if target.is_socks() {
                    proxy = Some(resolve_proxy_host(target).await?);
                } else {
                    if let (Some(credentials), Some(authority)) = (&route.credentials, &key.tunnel) {
                        tunnel_auth = tunnel::tunnel_authorization(
                            target,
                            credentials,
                            authority,
                            &self.user_agent,
                            timeout,
                        )
                        .await?;
                    }
                    proxy = Some(target.clone());
                }
            }
        }

        let client = self.build_client(route, proxy.as_ref(), tunnel_auth.as_deref())?;
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, client.clone());
        Ok(client)
    }

    fn cached(&self, key: &RouteKey) -> Option<Client> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn evict(&self, key: &RouteKey) {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Build a reqwest client for `route`.
    ///
    /// `proxy` is the route's proxy with a SOCKS hostname already resolved.
    /// Fails closed: a blocked route or a proxied route without a usable
    /// proxy is an error, never a direct client.
    fn build_client(
        &self,
        route: &RoutingDecision,
        proxy: Option<&ProxyTarget>,
        tunnel_auth: Option<&str>,
    ) -> Result<Client, TransportError> {
        let timeout = self.timeouts.for_mode(route.mode);
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .gzip(true)
            .brotli(true);

        match route.mode {
            RoutingMode::Blocked(reason) => {
                return Err(TransportError::Proxy(format!(
                    "refusing to build client for blocked route: {}",
                    reason
                )));
            }
            RoutingMode::Direct => {
                // Ignore HTTP(S)_PROXY from the environment
                builder = builder.no_proxy();
            }
            RoutingMode::Tor | RoutingMode::CustomProxy => {
                let target = proxy.ok_or_else(|| {
                    TransportError::Proxy(format!("{} route without a proxy", route.mode))
                })?;
                let proxy_url = target.proxy_url();
                let mut reqwest_proxy = Proxy::all(&proxy_url).map_err(|e| {
                    TransportError::Proxy(format!("Invalid proxy URL '{}': {}", proxy_url, e))
                })?;
                if target.protocol == ProxyProtocol::Socks5 {
                    if let Some(creds) = &route.credentials {
                        reqwest_proxy = reqwest_proxy.basic_auth(&creds.username, &creds.password);
                    }
                }
                if let Some(auth) = tunnel_auth {
                    let mut value = HeaderValue::from_str(auth).map_err(|e| {
                        TransportError::Proxy(format!("Invalid proxy authorization: {}", e))
                    })?;
                    value.set_sensitive(true);
                    reqwest_proxy = reqwest_proxy.custom_http_auth(value);
                }
                builder = builder.proxy(reqwest_proxy);
                if let Some(resolver) = Self::resolver_for(route) {
                    builder = builder.dns_resolver(resolver);
                }
                debug!(proxy = %proxy_url, "Built proxied HTTP client");
            }
        }

        builder
            .build()
            .map_err(|e| TransportError::Proxy(format!("Failed to create HTTP client: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(&request.route, &request.url).await?;

        let mut builder = client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                if request.route.mode.is_proxied() {
                    // Next request re-resolves the proxy and re-answers its challenge
                    warn!(error = %e, "Proxied request failed, dropping cached client");
                    self.evict(&RouteKey::of(&request.route, &request.url));
                }
                return Err(e.into());
            }
        };
        let status = response.status().as_u16();
        let headers = extract_response_headers(&response);
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
