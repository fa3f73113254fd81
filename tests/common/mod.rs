//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stationnet::discovery::{DiscoveryError, DnsDiscovery, HttpDiscovery};
use stationnet::http_client::{Transport, TransportRequest, TransportResponse};
use stationnet::privacy::{
    ProxyPreferences, RoutingDecision, RoutingPolicy, SharedPreferences, SharedTorState,
};
use stationnet::TransportError;

type Responder = dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// In-memory transport that records every request it is asked to send.
pub struct RecordingTransport {
    respond: Box<Responder>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    pub fn new(
        respond: impl Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with `200` and `body`.
    pub fn ok(body: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(TransportResponse::new(200, body)))
    }

    /// Fails every request at connection time.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|_| Err(TransportError::Connect("connection refused".to_string())))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// DNS tier returning fixed answers.
pub struct FakeDns {
    pub addrs: Vec<IpAddr>,
    pub names: Vec<(IpAddr, String)>,
    pub lookups: Mutex<usize>,
}

impl FakeDns {
    pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        let names: Vec<(IpAddr, String)> = entries
            .iter()
            .map(|(ip, name)| (ip.parse().unwrap(), name.to_string()))
            .collect();
        Arc::new(Self {
            addrs: names.iter().map(|(ip, _)| *ip).collect(),
            names,
            lookups: Mutex::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(&[])
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl DnsDiscovery for FakeDns {
    async fn lookup_host(&self, _host: &str) -> Result<Vec<IpAddr>, DiscoveryError> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self.addrs.clone())
    }

    async fn reverse_lookup(&self, addr: IpAddr) -> Result<Option<String>, DiscoveryError> {
        Ok(self
            .names
            .iter()
            .find(|(ip, _)| *ip == addr)
            .map(|(_, name)| name.clone()))
    }
}

/// HTTP tier returning a fixed list and recording the routes it was given.
pub struct FakeServerList {
    pub servers: Vec<String>,
    pub routes: Mutex<Vec<RoutingDecision>>,
}

impl FakeServerList {
    pub fn new(servers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            servers: servers.iter().map(|s| s.to_string()).collect(),
            routes: Mutex::new(Vec::new()),
        })
    }

    pub fn routes(&self) -> Vec<RoutingDecision> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpDiscovery for FakeServerList {
    async fn list_servers(&self, route: &RoutingDecision) -> Result<Vec<String>, DiscoveryError> {
        self.routes.lock().unwrap().push(route.clone());
        Ok(self.servers.clone())
    }
}

/// Policy with mutable preferences and Tor state, for toggling mid-test.
pub fn policy(prefs: ProxyPreferences, tor_connected: bool) -> (RoutingPolicy, SharedPreferences, SharedTorState) {
    let shared = SharedPreferences::new(prefs);
    let tor = SharedTorState::default();
    tor.set_connected(tor_connected);
    let policy = RoutingPolicy::new(Arc::new(shared.clone()), Arc::new(tor.clone()));
    (policy, shared, tor)
}

pub fn force_tor() -> ProxyPreferences {
    ProxyPreferences {
        tor_enabled: true,
        force_tor_all: true,
        ..Default::default()
    }
}

pub fn force_proxy(url: &str) -> ProxyPreferences {
    ProxyPreferences::default()
        .with_cli_overrides(false, Some(url))
        .unwrap()
}
