//! Per-request routing decisions.
//!
//! Rules, first match wins:
//!
//! 1. Tor enabled and a force-Tor switch on: Tor is mandatory. If Tor is not
//!    connected or its SOCKS port is invalid the request is blocked.
//! 2. A force-custom-proxy switch on: the custom proxy is mandatory. A missing
//!    host or port blocks the request.
//! 3. Tor enabled and connected: route through Tor opportunistically.
//! 4. Otherwise connect directly.
//!
//! A forcing policy never degrades to a direct connection.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::config::{PreferencesProvider, ProxyCredentials, ProxyPreferences, ProxyProtocol};
use super::tor::{TorSnapshot, TorStatus};

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    TorNotConnected,
    TorPortInvalid,
    CustomProxyUnconfigured,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::TorNotConnected => write!(f, "Tor is required but not connected"),
            BlockReason::TorPortInvalid => write!(f, "Tor is required but its SOCKS port is invalid"),
            BlockReason::CustomProxyUnconfigured => {
                write!(f, "custom proxy is required but not configured")
            }
        }
    }
}

/// How a request leaves the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Direct,
    Tor,
    CustomProxy,
    Blocked(BlockReason),
}

impl RoutingMode {
    pub fn is_blocked(&self) -> bool {
        matches!(self, RoutingMode::Blocked(_))
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, RoutingMode::Tor | RoutingMode::CustomProxy)
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::Direct => write!(f, "direct"),
            RoutingMode::Tor => write!(f, "tor"),
            RoutingMode::CustomProxy => write!(f, "custom-proxy"),
            RoutingMode::Blocked(_) => write!(f, "blocked"),
        }
    }
}

/// Proxy a request is sent through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
}

impl ProxyTarget {
    pub fn new(host: impl Into<String>, port: u16, protocol: ProxyProtocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// Proxy URL for the HTTP stack, e.g. `socks5h://127.0.0.1:9050`.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.proxy_scheme(), self.host, self.port)
    }

    pub fn is_socks(&self) -> bool {
        self.protocol.is_socks()
    }
}

/// Logical destination with a clearnet address and an optional onion mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub clearnet_base: String,
    pub onion_base: Option<String>,
}

impl ServiceEndpoint {
    pub fn clearnet(base: impl Into<String>) -> Self {
        Self {
            clearnet_base: base.into(),
            onion_base: None,
        }
    }

    pub fn with_onion(clearnet: impl Into<String>, onion: impl Into<String>) -> Self {
        Self {
            clearnet_base: clearnet.into(),
            onion_base: Some(onion.into()),
        }
    }

    /// Onion base when routing through Tor, clearnet base otherwise.
    pub fn base_for(&self, mode: RoutingMode) -> &str {
        match (&self.onion_base, mode) {
            (Some(onion), RoutingMode::Tor) => onion,
            _ => &self.clearnet_base,
        }
    }
}

/// Outcome of routing resolution for a single request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub mode: RoutingMode,
    pub proxy: Option<ProxyTarget>,
    #[serde(skip)]
    pub credentials: Option<ProxyCredentials>,
    pub base_url: String,
    /// A forcing policy produced this decision.
    pub forced: bool,
}

impl fmt::Debug for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingDecision")
            .field("mode", &self.mode)
            .field("proxy", &self.proxy)
            .field("has_credentials", &self.credentials.is_some())
            .field("base_url", &self.base_url)
            .field("forced", &self.forced)
            .finish()
    }
}

impl RoutingDecision {
    pub fn direct(base_url: impl Into<String>) -> Self {
        Self {
            mode: RoutingMode::Direct,
            proxy: None,
            credentials: None,
            base_url: base_url.into(),
            forced: false,
        }
    }

    pub fn tor(base_url: impl Into<String>, host: impl Into<String>, port: u16, forced: bool) -> Self {
        Self {
            mode: RoutingMode::Tor,
            proxy: Some(ProxyTarget::new(host, port, ProxyProtocol::Socks5)),
            credentials: None,
            base_url: base_url.into(),
            forced,
        }
    }

    pub fn blocked(base_url: impl Into<String>, reason: BlockReason) -> Self {
        Self {
            mode: RoutingMode::Blocked(reason),
            proxy: None,
            credentials: None,
            base_url: base_url.into(),
            forced: true,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.mode.is_blocked()
    }

    pub fn block_reason(&self) -> Option<BlockReason> {
        match self.mode {
            RoutingMode::Blocked(reason) => Some(reason),
            _ => None,
        }
    }

    /// Same route, different base address.
    pub fn with_base_url(&self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self.clone()
        }
    }
}

/// Decide how a request to `endpoint` must be routed. Pure computation.
pub fn resolve(
    preferences: &ProxyPreferences,
    tor: &TorSnapshot,
    endpoint: &ServiceEndpoint,
) -> RoutingDecision {
    if preferences.force_tor() {
        let mode = if !tor.connected {
            RoutingMode::Blocked(BlockReason::TorNotConnected)
        } else if tor.socks_port == 0 {
            RoutingMode::Blocked(BlockReason::TorPortInvalid)
        } else {
            RoutingMode::Tor
        };
        return match mode {
            RoutingMode::Blocked(reason) => {
                RoutingDecision::blocked(endpoint.base_for(mode), reason)
            }
            _ => RoutingDecision::tor(
                endpoint.base_for(mode),
                tor.socks_host.clone(),
                tor.socks_port,
                true,
            ),
        };
    }

    if preferences.force_custom_proxy() {
        let mode = RoutingMode::CustomProxy;
        if preferences.custom_proxy_host.trim().is_empty() || preferences.custom_proxy_port == 0 {
            return RoutingDecision::blocked(
                endpoint.base_for(mode),
                BlockReason::CustomProxyUnconfigured,
            );
        }
        return RoutingDecision {
            mode,
            proxy: Some(ProxyTarget::new(
                preferences.custom_proxy_host.trim(),
                preferences.custom_proxy_port,
                preferences.custom_proxy_protocol(),
            )),
            credentials: preferences.custom_proxy_credentials(),
            base_url: endpoint.base_for(mode).to_string(),
            forced: true,
        };
    }

    if preferences.tor_enabled && tor.connected && tor.socks_port != 0 {
        return RoutingDecision::tor(
            endpoint.base_for(RoutingMode::Tor),
            tor.socks_host.clone(),
            tor.socks_port,
            false,
        );
    }

    RoutingDecision::direct(endpoint.base_for(RoutingMode::Direct))
}

/// Preferences and Tor status bundled for per-request resolution.
#[derive(Clone)]
pub struct RoutingPolicy {
    preferences: Arc<dyn PreferencesProvider>,
    tor: Arc<dyn TorStatus>,
}

impl fmt::Debug for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingPolicy")
            .field("preferences", &self.preferences.snapshot())
            .field("tor", &self.tor.snapshot())
            .finish()
    }
}

impl RoutingPolicy {
    pub fn new(preferences: Arc<dyn PreferencesProvider>, tor: Arc<dyn TorStatus>) -> Self {
        Self { preferences, tor }
    }

    /// Direct connections only, used when no privacy features are configured.
    pub fn direct() -> Self {
        Self::new(
            Arc::new(ProxyPreferences::default()),
            Arc::new(TorSnapshot::disconnected()),
        )
    }

    pub fn preferences(&self) -> ProxyPreferences {
        self.preferences.snapshot()
    }

    pub fn tor_snapshot(&self) -> TorSnapshot {
        self.tor.snapshot()
    }

    /// Resolve with fresh preferences and Tor state.
    pub fn resolve(&self, endpoint: &ServiceEndpoint) -> RoutingDecision {
        let decision = resolve(&self.preferences(), &self.tor_snapshot(), endpoint);
        match decision.block_reason() {
            Some(reason) => warn!(base = %decision.base_url, "Request blocked: {}", reason),
            None => debug!(
                mode = %decision.mode,
                base = %decision.base_url,
                forced = decision.forced,
                "Resolved route"
            ),
        }
        decision
    }

    /// A forcing policy is active, so no request may leave without a proxy.
    pub fn is_forcing(&self) -> bool {
        self.preferences().is_forcing()
    }

    /// Force-Tor is on but Tor is not connected.
    pub fn is_tor_required_but_not_connected(&self) -> bool {
        self.preferences().force_tor() && !self.tor.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEARNET: &str = "https://api.example.org";
    const ONION: &str = "http://exampleonionaddress.onion";

    fn endpoint() -> ServiceEndpoint {
        ServiceEndpoint::with_onion(CLEARNET, ONION)
    }

    fn tor(connected: bool, port: u16) -> TorSnapshot {
        TorSnapshot {
            connected,
            socks_host: "127.0.0.1".to_string(),
            socks_port: port,
        }
    }

    fn force_tor() -> ProxyPreferences {
        ProxyPreferences {
            tor_enabled: true,
            force_tor_all: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_direct() {
        let d = resolve(&ProxyPreferences::default(), &tor(true, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::Direct);
        assert_eq!(d.base_url, CLEARNET);
        assert!(d.proxy.is_none());
        assert!(!d.forced);
    }

    #[test]
    fn test_force_tor_blocks_when_disconnected() {
        let d = resolve(&force_tor(), &tor(false, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::Blocked(BlockReason::TorNotConnected));
        assert!(d.proxy.is_none());
        assert!(d.forced);
    }

    #[test]
    fn test_force_tor_blocks_on_invalid_port() {
        let d = resolve(&force_tor(), &tor(true, 0), &endpoint());
        assert_eq!(d.mode, RoutingMode::Blocked(BlockReason::TorPortInvalid));
    }

    #[test]
    fn test_force_tor_except_i2p_also_forces() {
        let prefs = ProxyPreferences {
            tor_enabled: true,
            force_tor_except_i2p: true,
            ..Default::default()
        };
        assert!(resolve(&prefs, &tor(false, 9050), &endpoint()).is_blocked());
    }

    #[test]
    fn test_force_tor_connected_uses_onion() {
        let d = resolve(&force_tor(), &tor(true, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::Tor);
        assert_eq!(d.base_url, ONION);
        let proxy = d.proxy.unwrap();
        assert_eq!(proxy.protocol, ProxyProtocol::Socks5);
        assert_eq!(proxy.proxy_url(), "socks5h://127.0.0.1:9050");
        assert!(d.forced);
    }

    #[test]
    fn test_force_tor_wins_over_custom_proxy() {
        let prefs = ProxyPreferences {
            force_custom_proxy: true,
            custom_proxy_host: "proxy.local".to_string(),
            custom_proxy_port: 8080,
            ..force_tor()
        };
        let d = resolve(&prefs, &tor(false, 9050), &endpoint());
        assert!(d.is_blocked());
    }

    #[test]
    fn test_force_custom_proxy_blocks_without_host() {
        let prefs = ProxyPreferences {
            force_custom_proxy_except_tor_i2p: true,
            custom_proxy_port: 8080,
            ..Default::default()
        };
        let d = resolve(&prefs, &tor(true, 9050), &endpoint());
        assert_eq!(
            d.mode,
            RoutingMode::Blocked(BlockReason::CustomProxyUnconfigured)
        );
    }

    #[test]
    fn test_force_custom_proxy_blocks_without_port() {
        let prefs = ProxyPreferences {
            force_custom_proxy: true,
            custom_proxy_host: "proxy.local".to_string(),
            ..Default::default()
        };
        assert!(resolve(&prefs, &tor(false, 9050), &endpoint()).is_blocked());
    }

    #[test]
    fn test_custom_proxy_route() {
        let prefs = ProxyPreferences {
            force_custom_proxy: true,
            custom_proxy_host: "proxy.local".to_string(),
            custom_proxy_port: 1080,
            custom_proxy_protocol: "socks4".to_string(),
            custom_proxy_username: "alice".to_string(),
            custom_proxy_password: "secret".to_string(),
            ..Default::default()
        };
        let d = resolve(&prefs, &tor(false, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::CustomProxy);
        assert_eq!(d.base_url, CLEARNET);
        assert_eq!(d.proxy.as_ref().unwrap().proxy_url(), "socks4a://proxy.local:1080");
        assert_eq!(d.credentials.as_ref().unwrap().username, "alice");
    }

    #[test]
    fn test_unknown_protocol_still_proxied() {
        let prefs = ProxyPreferences {
            force_custom_proxy: true,
            custom_proxy_host: "proxy.local".to_string(),
            custom_proxy_port: 3128,
            custom_proxy_protocol: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        let d = resolve(&prefs, &tor(false, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::CustomProxy);
        assert_eq!(d.proxy.unwrap().protocol, ProxyProtocol::Http);
    }

    #[test]
    fn test_opportunistic_tor() {
        let prefs = ProxyPreferences {
            tor_enabled: true,
            ..Default::default()
        };
        let d = resolve(&prefs, &tor(true, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::Tor);
        assert!(!d.forced);

        let d = resolve(&prefs, &tor(false, 9050), &endpoint());
        assert_eq!(d.mode, RoutingMode::Direct);
    }

    #[test]
    fn test_policy_reports_tor_required() {
        let policy = RoutingPolicy::new(Arc::new(force_tor()), Arc::new(tor(false, 9050)));
        assert!(policy.is_tor_required_but_not_connected());
        assert!(policy.is_forcing());

        let policy = RoutingPolicy::new(Arc::new(force_tor()), Arc::new(tor(true, 9050)));
        assert!(!policy.is_tor_required_but_not_connected());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let mut d = RoutingDecision::direct(CLEARNET);
        d.credentials = ProxyCredentials::new("alice", "secret");
        assert!(!format!("{:?}", d).contains("secret"));
    }
}
