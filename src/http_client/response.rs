//! HTTP request/response values passed through a [`Transport`](super::Transport).

use reqwest::StatusCode;

use crate::privacy::RoutingDecision;

/// A GET request bound to the route it must take.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub route: RoutingDecision,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>, route: RoutingDecision) -> Self {
        Self {
            url: url.into(),
            route,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Fully read HTTP response.
///
/// Header names are lowercase. Repeated headers keep one entry per value, in
/// the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Every value of header `name`.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Authentication challenges offered by a 407.
    ///
    /// `Proxy-Authenticate` is preferred; `WWW-Authenticate` is used when the
    /// proxy sent only that.
    pub fn proxy_challenges(&self) -> Vec<&str> {
        let challenges: Vec<&str> = self.header_values("proxy-authenticate").collect();
        if challenges.is_empty() {
            self.header_values("www-authenticate").collect()
        } else {
            challenges
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the proxy demands authentication (407).
    pub fn is_proxy_auth_required(&self) -> bool {
        self.status == StatusCode::PROXY_AUTHENTICATION_REQUIRED.as_u16()
    }

    pub fn status_text(&self) -> String {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(301, "").is_success());
        assert!(TransportResponse::new(407, "").is_proxy_auth_required());
        assert_eq!(TransportResponse::new(503, "").status_text(), "Service Unavailable");
    }

    #[test]
    fn test_header_names_are_lowercased() {
        let r = TransportResponse::new(407, "").with_header("Proxy-Authenticate", "Basic");
        assert_eq!(r.headers, vec![("proxy-authenticate".to_string(), "Basic".to_string())]);
    }

    #[test]
    fn test_repeated_challenges_are_kept() {
        let r = TransportResponse::new(407, "")
            .with_header("Proxy-Authenticate", r#"Digest realm="squid", nonce="n""#)
            .with_header("Proxy-Authenticate", r#"Basic realm="squid""#);
        assert_eq!(
            r.proxy_challenges(),
            vec![r#"Digest realm="squid", nonce="n""#, r#"Basic realm="squid""#]
        );
    }

    #[test]
    fn test_www_authenticate_used_without_proxy_challenge() {
        let r = TransportResponse::new(407, "").with_header("WWW-Authenticate", "Basic");
        assert_eq!(r.proxy_challenges(), vec!["Basic"]);
    }

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let req = TransportRequest::get("http://x/", RoutingDecision::direct("http://x"))
            .header("Accept", "application/json");
        assert_eq!(req.header_value("accept"), Some("application/json"));
        assert_eq!(req.header_value("proxy-authorization"), None);
    }
}
