//! Station registry API client.

use std::sync::Arc;

use tracing::{debug, info};

use super::fallback::OnionFallbackExecutor;
use super::station::{
    parse_bulk_download, parse_genres, parse_health, parse_station, parse_station_list,
    parse_stats, RegistryStation, StationListResponse, StationNetwork, StatsResponse,
};
use super::{CLEARNET_BASE_URL, ONION_BASE_URL};
use crate::error::RequestError;
use crate::http_client::{RoutedClient, Transport};
use crate::privacy::{RoutingPolicy, ServiceEndpoint};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 200;

/// Filters for a station listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationQuery {
    pub network: Option<StationNetwork>,
    pub genre: Option<String>,
    pub online_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for StationQuery {
    fn default() -> Self {
        Self {
            network: None,
            genre: None,
            online_only: true,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl StationQuery {
    fn path(&self) -> String {
        let mut path = format!(
            "/api/stations?limit={}&offset={}",
            self.limit.min(MAX_LIMIT),
            self.offset
        );
        if self.online_only {
            path.push_str("&online_only=true");
        }
        if let Some(network) = self.network {
            path.push_str(&format!("&network={}", network.as_str()));
        }
        if let Some(genre) = &self.genre {
            path.push_str(&format!("&genre={}", urlencoding::encode(genre)));
        }
        path
    }
}

/// Client for the curated Tor/I2P station registry.
///
/// Requests go to the onion mirror when routed through Tor and to the
/// clearnet API otherwise. Nothing is sent while the registry is disabled
/// in the preferences.
pub struct RegistryClient {
    policy: RoutingPolicy,
    executor: OnionFallbackExecutor,
}

impl RegistryClient {
    pub fn new(policy: RoutingPolicy, transport: Arc<dyn Transport>) -> Self {
        Self::with_endpoint(
            policy,
            ServiceEndpoint::with_onion(CLEARNET_BASE_URL, ONION_BASE_URL),
            transport,
        )
    }

    pub fn with_endpoint(
        policy: RoutingPolicy,
        endpoint: ServiceEndpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let executor =
            OnionFallbackExecutor::new(policy.clone(), endpoint, RoutedClient::new(transport));
        Self { policy, executor }
    }

    /// Force-Tor is on but Tor is down, so every call would be blocked.
    pub fn is_tor_required_but_not_connected(&self) -> bool {
        self.policy.is_tor_required_but_not_connected()
    }

    pub fn is_disabled(&self) -> bool {
        self.policy.preferences().registry_api_disabled
    }

    /// Base URL the next request would use.
    pub fn active_base_url(&self) -> String {
        self.executor.route().base_url
    }

    async fn get<T>(
        &self,
        path: &str,
        parse: impl Fn(&str) -> Result<T, RequestError>,
    ) -> Result<T, RequestError> {
        if self.is_disabled() {
            debug!(path, "Registry API disabled, skipping request");
            return Err(RequestError::Disabled);
        }
        self.executor.execute(path, parse).await
    }

    pub async fn stations(&self, query: &StationQuery) -> Result<StationListResponse, RequestError> {
        self.get(&query.path(), parse_station_list).await
    }

    pub async fn tor_stations(&self, online_only: bool) -> Result<StationListResponse, RequestError> {
        self.network_stations(StationNetwork::Tor, online_only).await
    }

    pub async fn i2p_stations(&self, online_only: bool) -> Result<StationListResponse, RequestError> {
        self.network_stations(StationNetwork::I2p, online_only).await
    }

    async fn network_stations(
        &self,
        network: StationNetwork,
        online_only: bool,
    ) -> Result<StationListResponse, RequestError> {
        let mut path = format!("/api/stations?network={}", network.as_str());
        if online_only {
            path.push_str("&online_only=true");
        }
        self.get(&path, parse_station_list).await
    }

    pub async fn station(&self, id: &str) -> Result<RegistryStation, RequestError> {
        let path = format!("/api/stations/{}", urlencoding::encode(id));
        self.get(&path, parse_station).await
    }

    pub async fn stats(&self) -> Result<StatsResponse, RequestError> {
        self.get("/api/stats", parse_stats).await
    }

    pub async fn genres(&self) -> Result<Vec<String>, RequestError> {
        self.get("/api/genres", parse_genres).await
    }

    /// Online stations whose name or genre contains `query`, case-insensitively.
    ///
    /// Matching happens locally over the first page of up to
    /// [`MAX_LIMIT`] stations.
    pub async fn search_stations(
        &self,
        query: &str,
        network: Option<StationNetwork>,
        genre: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RegistryStation>, RequestError> {
        let listing = self
            .stations(&StationQuery {
                network,
                genre: genre.map(str::to_string),
                online_only: true,
                limit: MAX_LIMIT,
                offset: 0,
            })
            .await?;

        let needle = query.to_lowercase();
        Ok(listing
            .stations
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.genre
                        .as_deref()
                        .is_some_and(|g| g.to_lowercase().contains(&needle))
            })
            .take(limit)
            .collect())
    }

    /// Registry is up and its database is reachable.
    pub async fn check_health(&self) -> Result<bool, RequestError> {
        self.get("/api/health", parse_health).await
    }

    /// Every approved station, optionally restricted to one network.
    pub async fn download_all_stations(
        &self,
        network: Option<StationNetwork>,
    ) -> Result<Vec<RegistryStation>, RequestError> {
        let stations: Vec<RegistryStation> = self
            .get("/api/download/all", parse_bulk_download)
            .await?
            .into_iter()
            .filter(|s| s.matches_network(network))
            .collect();
        info!("Downloaded {} registry stations", stations.len());
        Ok(stations)
    }
}
