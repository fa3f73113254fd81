//! Privacy subsystem for routing requests through Tor or a custom proxy.
//!
//! Every outbound request is routed according to the user's proxy
//! preferences and the live Tor state. Forcing policies fail closed: when
//! the required proxy is unavailable the request is blocked instead of
//! being sent directly.
//!
//! # Configuration
//!
//! Global settings via environment or CLI:
//! - `STATIONNET_TOR=1` - Route through Tor when it is connected
//! - `STATIONNET_FORCE_TOR=1` - Require Tor for every request
//! - `STATIONNET_PROXY=socks5://host:port` - Require a custom proxy
//! - `STATIONNET_TOR_SOCKS=host:port` - Tor SOCKS listener
//! - `--force-tor` / `--proxy <url>` - CLI equivalents

mod config;
mod routing;
mod tor;

pub use config::{
    PreferencesProvider, ProxyCredentials, ProxyPreferences, ProxyProtocol, SharedPreferences,
};
pub use routing::{
    resolve, BlockReason, ProxyTarget, RoutingDecision, RoutingMode, RoutingPolicy,
    ServiceEndpoint,
};
pub use tor::{SharedTorState, TorSnapshot, TorStatus, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT};
