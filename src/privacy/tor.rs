//! Tor connectivity signal.
//!
//! The routing layer never starts or controls Tor itself. It only asks
//! whether a SOCKS listener is up and where it lives.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

/// Default Tor SOCKS host.
pub const DEFAULT_SOCKS_HOST: &str = "127.0.0.1";

/// Default Tor SOCKS port.
pub const DEFAULT_SOCKS_PORT: u16 = 9050;

/// Point-in-time view of the Tor connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorSnapshot {
    pub connected: bool,
    pub socks_host: String,
    /// 0 means the port is unknown or invalid.
    pub socks_port: u16,
}

impl TorSnapshot {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            socks_host: DEFAULT_SOCKS_HOST.to_string(),
            socks_port: DEFAULT_SOCKS_PORT,
        }
    }
}

/// Live Tor connectivity, queried fresh for every routing decision.
pub trait TorStatus: Send + Sync {
    fn is_connected(&self) -> bool;
    fn proxy_host(&self) -> String;
    fn proxy_port(&self) -> u16;

    fn snapshot(&self) -> TorSnapshot {
        TorSnapshot {
            connected: self.is_connected(),
            socks_host: self.proxy_host(),
            socks_port: self.proxy_port(),
        }
    }
}

impl TorStatus for TorSnapshot {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn proxy_host(&self) -> String {
        self.socks_host.clone()
    }

    fn proxy_port(&self) -> u16 {
        self.socks_port
    }
}

/// Tor state shared between the component that watches Tor and the clients
/// that route through it. Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct SharedTorState {
    inner: Arc<TorStateInner>,
}

#[derive(Debug)]
struct TorStateInner {
    connected: AtomicBool,
    host: String,
    port: AtomicU16,
}

impl SharedTorState {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            inner: Arc::new(TorStateInner {
                connected: AtomicBool::new(false),
                host: host.into(),
                port: AtomicU16::new(port),
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_port(&self, port: u16) {
        self.inner.port.store(port, Ordering::SeqCst);
    }

    /// TCP-connect to the SOCKS listener and record whether it answered.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let port = self.proxy_port();
        if port == 0 {
            self.set_connected(false);
            return false;
        }

        let addr = (self.inner.host.as_str(), port);
        let reachable = matches!(
            tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        );

        debug!(
            host = %self.inner.host,
            port,
            reachable,
            "Probed Tor SOCKS listener"
        );
        self.set_connected(reachable);
        reachable
    }
}

impl Default for SharedTorState {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT)
    }
}

impl TorStatus for SharedTorState {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn proxy_host(&self) -> String {
        self.inner.host.clone()
    }

    fn proxy_port(&self) -> u16 {
        self.inner.port.load(Ordering::SeqCst)
    }
}
