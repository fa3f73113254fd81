//! Proxy address handling that has to happen before a client is built.
//!
//! - SOCKS proxy hostnames are resolved here, once, so the client's
//!   placeholder resolver only ever sees target hostnames.
//! - Authenticating HTTP proxies challenge the CONNECT that opens an HTTPS
//!   tunnel. reqwest surfaces that 407 as a connect error, so the challenge
//!   is read with a preflight CONNECT and answered up front.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::TransportResponse;
use crate::auth::ProxyAuthenticator;
use crate::error::TransportError;
use crate::privacy::{ProxyCredentials, ProxyTarget};

/// Largest CONNECT response head read during a preflight.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Replace the proxy hostname with one of its addresses, IPv4 first.
///
/// IP literals are returned unchanged without a lookup.
pub async fn resolve_proxy_host(target: &ProxyTarget) -> Result<ProxyTarget, TransportError> {
    let bare = target.host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return Ok(target.clone());
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare, target.port))
        .await
        .map_err(|e| {
            TransportError::Connect(format!("cannot resolve proxy host '{}': {}", target.host, e))
        })?
        .collect();
    let addr = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .ok_or_else(|| {
            TransportError::Connect(format!("proxy host '{}' has no addresses", target.host))
        })?;

    let host = match addr.ip() {
        IpAddr::V4(ip) => ip.to_string(),
        IpAddr::V6(ip) => format!("[{}]", ip),
    };
    debug!(proxy = %target.host, resolved = %host, "Resolved proxy host");
    Ok(ProxyTarget::new(host, target.port, target.protocol))
}

/// `host:port` a CONNECT for `url` names, or `None` for non-HTTPS URLs.
pub fn tunnel_authority(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;
    Some(format!("{}:{}", host, parsed.port_or_known_default()?))
}

/// Send a bare CONNECT for `authority` and return the proxy's response head.
pub async fn preflight_connect(
    proxy: &ProxyTarget,
    authority: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<TransportResponse, TransportError> {
    let exchange = async {
        let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port))
            .await
            .map_err(|e| TransportError::Connect(format!("proxy {}: {}", proxy.proxy_url(), e)))?;

        let request = format!(
            "CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\nUser-Agent: {user_agent}\r\n\r\n"
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            if head.len() > MAX_HEAD_BYTES {
                return Err(TransportError::Proxy("oversized CONNECT response".to_string()));
            }
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }
        parse_response_head(&String::from_utf8_lossy(&head))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| TransportError::Timeout(format!("CONNECT preflight to {}", proxy.proxy_url())))?
}

fn parse_response_head(head: &str) -> Result<TransportResponse, TransportError> {
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Proxy("malformed CONNECT response".to_string()))?;

    let mut response = TransportResponse::new(status, "");
    for line in lines.take_while(|l| !l.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            response = response.with_header(name.trim(), value.trim());
        }
    }
    Ok(response)
}

/// `Proxy-Authorization` value for tunnelling to `authority`, if the proxy
/// asks for one.
pub async fn tunnel_authorization(
    proxy: &ProxyTarget,
    credentials: &ProxyCredentials,
    authority: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<Option<String>, TransportError> {
    let response = preflight_connect(proxy, authority, user_agent, timeout).await?;
    if !response.is_proxy_auth_required() {
        return Ok(None);
    }

    let challenges = response.proxy_challenges();
    ProxyAuthenticator::new(credentials)
        .answer(&challenges, "CONNECT", authority)
        .map(Some)
        .map_err(|e| TransportError::Proxy(e.to_string()))
}
