//! Onion-first request execution with a clearnet-over-Tor retry.

use tracing::{debug, info, warn};

use crate::error::RequestError;
use crate::http_client::RoutedClient;
use crate::privacy::{RoutingDecision, RoutingMode, RoutingPolicy, ServiceEndpoint};

/// Runs registry requests against the onion mirror when routed through Tor.
///
/// The route is resolved per call. Through Tor the onion base is tried
/// first and, if fetching fails, the clearnet base is tried once over the
/// same Tor route. Any other mode makes exactly one request to the clearnet
/// base. A response that arrives but fails to parse is returned as is.
#[derive(Clone)]
pub struct OnionFallbackExecutor {
    policy: RoutingPolicy,
    endpoint: ServiceEndpoint,
    client: RoutedClient,
}

impl OnionFallbackExecutor {
    pub fn new(policy: RoutingPolicy, endpoint: ServiceEndpoint, client: RoutedClient) -> Self {
        Self {
            policy,
            endpoint,
            client,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Route the next request would take.
    pub fn route(&self) -> RoutingDecision {
        self.policy.resolve(&self.endpoint)
    }

    /// GET `{base}{path}` and parse the body.
    pub async fn execute<T>(
        &self,
        path: &str,
        parse: impl Fn(&str) -> Result<T, RequestError>,
    ) -> Result<T, RequestError> {
        let route = self.route();
        if let Some(reason) = route.block_reason() {
            return Err(RequestError::Blocked(reason));
        }

        let onion_first = route.mode == RoutingMode::Tor
            && self.endpoint.onion_base.as_deref() == Some(route.base_url.as_str());
        if !onion_first {
            let body = self.fetch(&route, path).await?;
            return parse(&body);
        }

        let onion_error = match self.fetch(&route, path).await {
            Ok(body) => return parse(&body),
            Err(e) if e.is_blocked() => return Err(e),
            Err(e) => e,
        };
        warn!("Onion request failed, retrying over clearnet via Tor: {}", onion_error);

        let clearnet_route = route.with_base_url(self.endpoint.clearnet_base.clone());
        match self.fetch(&clearnet_route, path).await {
            Ok(body) => {
                info!("Clearnet-over-Tor fallback succeeded");
                parse(&body)
            }
            Err(e) if e.is_blocked() => Err(e),
            Err(clearnet_error) => Err(RequestError::FallbackExhausted {
                onion: Box::new(onion_error),
                clearnet: Box::new(clearnet_error),
            }),
        }
    }

    async fn fetch(&self, route: &RoutingDecision, path: &str) -> Result<String, RequestError> {
        let url = format!("{}{}", route.base_url.trim_end_matches('/'), path);
        debug!(%url, mode = %route.mode, "Registry request");
        self.client.get_text(route, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http_client::{Transport, TransportRequest, TransportResponse};
    use crate::privacy::{ProxyPreferences, TorSnapshot};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const CLEARNET: &str = "https://api.example.org";
    const ONION: &str = "http://mirrorabcdef.onion";

    /// Answers by URL prefix and records every URL requested.
    struct ByHost {
        onion: Option<TransportResponse>,
        clearnet: Option<TransportResponse>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for ByHost {
        async fn execute(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request.url.clone());
            let canned = if request.url.starts_with(ONION) {
                &self.onion
            } else {
                &self.clearnet
            };
            canned
                .clone()
                .ok_or_else(|| TransportError::Connect("unreachable".to_string()))
        }
    }

    fn transport(
        onion: Option<TransportResponse>,
        clearnet: Option<TransportResponse>,
    ) -> Arc<ByHost> {
        Arc::new(ByHost {
            onion,
            clearnet,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn executor(prefs: ProxyPreferences, tor: TorSnapshot, transport: Arc<ByHost>) -> OnionFallbackExecutor {
        let policy = RoutingPolicy::new(Arc::new(prefs), Arc::new(tor));
        OnionFallbackExecutor::new(
            policy,
            ServiceEndpoint::with_onion(CLEARNET, ONION),
            RoutedClient::new(transport),
        )
    }

    fn tor_up() -> TorSnapshot {
        TorSnapshot {
            connected: true,
            socks_host: "127.0.0.1".to_string(),
            socks_port: 9050,
        }
    }

    fn force_tor() -> ProxyPreferences {
        ProxyPreferences {
            tor_enabled: true,
            force_tor_all: true,
            ..Default::default()
        }
    }

    fn ok(body: &str) -> Option<TransportResponse> {
        Some(TransportResponse::new(200, body))
    }

    fn as_string(body: &str) -> Result<String, RequestError> {
        Ok(body.to_string())
    }

    #[tokio::test]
    async fn test_onion_success_single_request() {
        let t = transport(ok("onion"), ok("clearnet"));
        let exec = executor(force_tor(), tor_up(), t.clone());
        assert_eq!(exec.execute("/api/stats", as_string).await.unwrap(), "onion");
        assert_eq!(*t.seen.lock().unwrap(), vec![format!("{}/api/stats", ONION)]);
    }

    #[tokio::test]
    async fn test_onion_failure_falls_back_to_clearnet() {
        let t = transport(None, ok("clearnet"));
        let exec = executor(force_tor(), tor_up(), t.clone());
        assert_eq!(exec.execute("/api/stats", as_string).await.unwrap(), "clearnet");
        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].starts_with(CLEARNET));
    }

    #[tokio::test]
    async fn test_http_error_triggers_fallback() {
        let t = transport(Some(TransportResponse::new(503, "")), ok("clearnet"));
        let exec = executor(force_tor(), tor_up(), t.clone());
        assert_eq!(exec.execute("/api/stats", as_string).await.unwrap(), "clearnet");
    }

    #[tokio::test]
    async fn test_both_fail_reports_both_errors() {
        let t = transport(None, Some(TransportResponse::new(500, "")));
        let exec = executor(force_tor(), tor_up(), t.clone());
        let err = exec.execute("/api/stats", as_string).await.unwrap_err();
        match err {
            RequestError::FallbackExhausted { onion, clearnet } => {
                assert!(matches!(*onion, RequestError::TransportFailure(_)));
                assert!(matches!(*clearnet, RequestError::ProtocolFailure { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(t.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_parse_error_does_not_fall_back() {
        let t = transport(ok("not json"), ok("{}"));
        let exec = executor(force_tor(), tor_up(), t.clone());
        let err = exec
            .execute("/api/stats", |_| Err::<(), _>(RequestError::MalformedResponse("bad".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::MalformedResponse(_)));
        assert_eq!(t.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_sends_nothing() {
        let t = transport(ok("onion"), ok("clearnet"));
        let exec = executor(force_tor(), TorSnapshot::disconnected(), t.clone());
        let err = exec.execute("/api/stats", as_string).await.unwrap_err();
        assert!(err.is_blocked());
        assert!(t.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_mode_single_clearnet_request() {
        let t = transport(ok("onion"), None);
        let exec = executor(ProxyPreferences::default(), tor_up(), t.clone());
        let err = exec.execute("/api/stats", as_string).await.unwrap_err();
        assert!(matches!(err, RequestError::TransportFailure(_)));
        assert_eq!(*t.seen.lock().unwrap(), vec![format!("{}/api/stats", CLEARNET)]);
    }
}
