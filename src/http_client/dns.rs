//! DNS handling for SOCKS-routed clients.
//!
//! A SOCKS-routed client must never resolve the target hostname itself: the
//! lookup would go to the system resolver and reveal the destination. The
//! proxy URL already uses the remote-DNS scheme; this resolver makes sure any
//! local resolution attempt yields a non-routable placeholder instead of a
//! real address.
//!
//! reqwest also sends the connection to the SOCKS proxy through this
//! resolver, so the proxy's own hostname is turned into an IP literal by
//! [`resolve_proxy_host`](super::resolve_proxy_host) before the client is
//! built.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::trace;

/// Address handed back for every lookup.
pub const PLACEHOLDER_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Resolver that never performs a local lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyDelegatedResolver;

impl Resolve for ProxyDelegatedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        trace!(host = name.as_str(), "DNS resolution delegated to SOCKS proxy");
        let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(PLACEHOLDER_ADDR, 0)));
        Box::pin(std::future::ready(Ok(addrs)))
    }
}
