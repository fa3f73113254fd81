//! Station directory API client.

use std::sync::Arc;

use tracing::{debug, warn};

use super::station::{parse_countries, parse_stations, parse_tags, CountryInfo, DirectoryStation, TagInfo};
use crate::discovery::ServerDiscovery;
use crate::error::{RequestError, TransportError};
use crate::http_client::{RoutedClient, Transport};
use crate::privacy::{RoutingPolicy, ServiceEndpoint};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Extra attempts against other servers after the first one fails.
pub const DEFAULT_RETRIES: usize = 2;

/// Paging and ordering for station listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: u32,
    pub offset: u32,
    pub order: String,
    pub reverse: bool,
    pub hidebroken: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            order: "votes".to_string(),
            reverse: true,
            hidebroken: true,
        }
    }
}

impl ListOptions {
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    fn query(&self) -> String {
        format!(
            "limit={}&offset={}&order={}&reverse={}&hidebroken={}",
            self.limit(),
            self.offset,
            urlencoding::encode(&self.order),
            self.reverse,
            self.hidebroken
        )
    }
}

/// Advanced search filters. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationSearch {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub country: Option<String>,
    pub countrycode: Option<String>,
    pub language: Option<String>,
    pub options: ListOptions,
}

impl StationSearch {
    fn query(&self) -> String {
        let mut query = self.options.query();
        let filters = [
            ("name", &self.name),
            ("tag", &self.tag),
            ("country", &self.country),
            ("countrycode", &self.countrycode),
            ("language", &self.language),
        ];
        for (key, value) in filters {
            if let Some(value) = value {
                query.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
            }
        }
        query
    }
}

/// Client for the station directory.
///
/// Each call tries up to `retries + 1` servers from the discovery pool,
/// cycling to the next server after every failed attempt.
pub struct DirectoryClient {
    policy: RoutingPolicy,
    servers: Arc<ServerDiscovery>,
    client: RoutedClient,
    retries: usize,
}

impl DirectoryClient {
    pub fn new(policy: RoutingPolicy, servers: Arc<ServerDiscovery>, transport: Arc<dyn Transport>) -> Self {
        Self {
            policy,
            servers,
            client: RoutedClient::new(transport),
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Force-Tor is on but Tor is down, so every call would be blocked.
    pub fn is_tor_required_but_not_connected(&self) -> bool {
        self.policy.is_tor_required_but_not_connected()
    }

    async fn execute<T>(
        &self,
        endpoint: &str,
        parse: fn(&str) -> Result<T, RequestError>,
    ) -> Result<T, RequestError> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            let base = self.servers.api_base_url().await;
            let route = self.policy.resolve(&ServiceEndpoint::clearnet(base));
            if let Some(reason) = route.block_reason() {
                return Err(RequestError::Blocked(reason));
            }

            let url = format!("{}{}", route.base_url, endpoint);
            debug!(attempt = attempt + 1, %url, "Directory request");

            match self.client.get_text(&route, &url).await {
                Ok(body) => return parse(&body),
                Err(e) => {
                    warn!("Directory request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt < self.retries {
                        self.servers.cycle_to_next().await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Other("no directory request attempted".to_string()).into()
        }))
    }

    /// Stations whose name contains `query`.
    pub async fn search_by_name(
        &self,
        query: &str,
        options: &ListOptions,
    ) -> Result<Vec<DirectoryStation>, RequestError> {
        let endpoint = format!(
            "/stations/byname/{}?{}",
            urlencoding::encode(query),
            options.query()
        );
        self.execute(&endpoint, parse_stations).await
    }

    pub async fn search(&self, search: &StationSearch) -> Result<Vec<DirectoryStation>, RequestError> {
        let endpoint = format!("/stations/search?{}", search.query());
        self.execute(&endpoint, parse_stations).await
    }

    pub async fn top_voted(&self, options: &ListOptions) -> Result<Vec<DirectoryStation>, RequestError> {
        self.ranked("topvote", options).await
    }

    pub async fn top_clicked(&self, options: &ListOptions) -> Result<Vec<DirectoryStation>, RequestError> {
        self.ranked("topclick", options).await
    }

    pub async fn recently_changed(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<DirectoryStation>, RequestError> {
        self.ranked("lastchange", options).await
    }

    async fn ranked(&self, kind: &str, options: &ListOptions) -> Result<Vec<DirectoryStation>, RequestError> {
        let endpoint = format!(
            "/stations/{}/{}?offset={}&hidebroken={}",
            kind,
            options.limit(),
            options.offset,
            options.hidebroken
        );
        self.execute(&endpoint, parse_stations).await
    }

    pub async fn by_country_code(
        &self,
        code: &str,
        options: &ListOptions,
    ) -> Result<Vec<DirectoryStation>, RequestError> {
        let endpoint = format!(
            "/stations/bycountrycodeexact/{}?{}",
            urlencoding::encode(&code.to_uppercase()),
            options.query()
        );
        self.execute(&endpoint, parse_stations).await
    }

    pub async fn by_tag(&self, tag: &str, options: &ListOptions) -> Result<Vec<DirectoryStation>, RequestError> {
        let endpoint = format!("/stations/bytag/{}?{}", urlencoding::encode(tag), options.query());
        self.execute(&endpoint, parse_stations).await
    }

    pub async fn by_uuid(&self, uuid: &str) -> Result<Option<DirectoryStation>, RequestError> {
        let endpoint = format!("/stations/byuuid/{}", urlencoding::encode(uuid));
        Ok(self.execute(&endpoint, parse_stations).await?.into_iter().next())
    }

    /// Countries ordered by station count, largest first.
    pub async fn countries(&self) -> Result<Vec<CountryInfo>, RequestError> {
        self.execute("/countries?order=stationcount&reverse=true", parse_countries)
            .await
    }

    /// The `limit` most used tags.
    pub async fn tags(&self, limit: u32) -> Result<Vec<TagInfo>, RequestError> {
        let endpoint = format!("/tags?order=stationcount&reverse=true&limit={}", limit);
        self.execute(&endpoint, parse_tags).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_options_query() {
        let opts = ListOptions::default();
        assert_eq!(
            opts.query(),
            "limit=50&offset=0&order=votes&reverse=true&hidebroken=true"
        );
    }

    #[test]
    fn test_limit_clamped() {
        let opts = ListOptions {
            limit: 500,
            ..Default::default()
        };
        assert_eq!(opts.limit(), MAX_LIMIT);
        let opts = ListOptions {
            limit: 0,
            ..Default::default()
        };
        assert_eq!(opts.limit(), 1);
    }

    #[test]
    fn test_search_query_encodes_filters() {
        let search = StationSearch {
            name: Some("jazz & blues".to_string()),
            countrycode: Some("DE".to_string()),
            ..Default::default()
        };
        let query = search.query();
        assert!(query.ends_with("&name=jazz%20%26%20blues&countrycode=DE"));
        assert!(!query.contains("tag="));
    }
}
