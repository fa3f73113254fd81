//! JSON API requests over a [`Transport`], with proxy authentication.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Transport, TransportRequest, TransportResponse};
use crate::auth::ProxyAuthenticator;
use crate::error::RequestError;
use crate::privacy::RoutingDecision;

/// Request-URI (path and query) used in Digest responses.
pub fn request_uri(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => "/".to_string(),
    }
}

/// Fetches response bodies along a route and classifies failures.
#[derive(Clone)]
pub struct RoutedClient {
    transport: Arc<dyn Transport>,
}

impl RoutedClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// GET `url` and return the body of a 2xx response.
    ///
    /// Blocked routes fail without touching the network. A 407 is answered
    /// once when the route carries credentials. Non-2xx responses and empty
    /// bodies are errors.
    pub async fn get_text(&self, route: &RoutingDecision, url: &str) -> Result<String, RequestError> {
        if let Some(reason) = route.block_reason() {
            return Err(RequestError::Blocked(reason));
        }

        let request = TransportRequest::get(url, route.clone()).header("Accept", "application/json");
        debug!(url, mode = %route.mode, "Sending request");
        let mut response = self.transport.execute(request.clone()).await?;

        if response.is_proxy_auth_required() {
            response = self.retry_with_proxy_auth(request, response).await?;
        }

        if !response.is_success() {
            return Err(RequestError::ProtocolFailure {
                status: response.status,
                message: response.status_text(),
            });
        }
        if response.body.trim().is_empty() {
            return Err(RequestError::MalformedResponse("empty response body".to_string()));
        }
        Ok(response.body)
    }

    async fn retry_with_proxy_auth(
        &self,
        request: TransportRequest,
        challenge: TransportResponse,
    ) -> Result<TransportResponse, RequestError> {
        let Some(credentials) = request.route.credentials.clone() else {
            warn!("Proxy requires authentication but no credentials are configured");
            return Ok(challenge);
        };

        let uri = request_uri(&request.url);
        let challenges = challenge.proxy_challenges();
        let authorization = ProxyAuthenticator::new(&credentials).answer(&challenges, "GET", &uri)?;
        let response = self
            .transport
            .execute(request.header("Proxy-Authorization", authorization))
            .await?;

        if response.is_proxy_auth_required() {
            warn!("Proxy rejected credentials");
        }
        Ok(response)
    }
}
