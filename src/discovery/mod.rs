//! Directory server discovery.
//!
//! The station directory is served by a rotating set of mirrors. The pool is
//! discovered in three tiers, each tried only when the previous one yields
//! nothing:
//!
//! 1. DNS: resolve the bootstrap host and reverse-resolve every address
//! 2. HTTP: fetch the server list endpoint
//! 3. A built-in list of known servers
//!
//! While a proxy policy is forcing, the DNS tier is skipped and the HTTP
//! tier goes through the proxy.

mod manager;
mod sources;

pub use manager::{
    DiscoveryConfig, DiscoveryTier, ServerDiscovery, ServerPool, DEFAULT_LOOKUP_HOST,
    DEFAULT_SERVERS_URL, DEFAULT_SERVER_SUFFIX, FALLBACK_SERVERS,
};
pub use sources::{DiscoveryError, DnsDiscovery, HickoryDns, HttpDiscovery, HttpServerList};
