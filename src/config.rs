//! Configuration management for stationnet using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::discovery::DiscoveryConfig;
use crate::error::ConfigError;
use crate::http_client::Timeouts;
use crate::privacy::{ProxyPreferences, ServiceEndpoint, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT};
use crate::registry::{CLEARNET_BASE_URL, ONION_BASE_URL};

/// Tor SOCKS listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorConfig {
    pub socks_host: String,
    pub socks_port: u16,
    /// Seconds to wait when probing the SOCKS listener.
    pub probe_timeout_secs: u64,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            socks_host: DEFAULT_SOCKS_HOST.to_string(),
            socks_port: DEFAULT_SOCKS_PORT,
            probe_timeout_secs: 3,
        }
    }
}

impl TorConfig {
    /// Apply `STATIONNET_TOR_SOCKS=host:port`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("STATIONNET_TOR_SOCKS") {
            match parse_socks_addr(&value) {
                Some((host, port)) => {
                    self.socks_host = host;
                    self.socks_port = port;
                }
                None => warn!("Ignoring invalid STATIONNET_TOR_SOCKS value: {}", value),
            }
        }
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// `host:port`, or just a port for the local host.
fn parse_socks_addr(value: &str) -> Option<(String, u16)> {
    let value = value.trim();
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Some((host.to_string(), port.parse().ok()?)),
        Some(_) => None,
        None => Some((DEFAULT_SOCKS_HOST.to_string(), value.parse().ok()?)),
    }
}

/// Network settings. Unset values fall back to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User agent, or `tor-browser` to blend in with Tor Browser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Extra directory attempts against other servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<usize>,
    /// Direct request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Proxied request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied_timeout_secs: Option<u64>,
    /// Minutes a discovered server list stays fresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_ttl_mins: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_onion_url: Option<String>,
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub privacy: ProxyPreferences,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("stationnet").await {
            Ok(found) => match found.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("{}", e);
                        Self::default_with_env()
                    }
                },
                None => Self::default_with_env(),
            },
            Err(_) => {
                debug!("No config file found, using defaults");
                Self::default_with_env()
            }
        }
    }

    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// TOML, YAML and JSON are picked by file extension; JSON is the default.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read {
                path: display.clone(),
                message: e.to_string(),
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: display.clone(),
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            _ => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        self.privacy = self.privacy.with_env_overrides();
        self.tor = self.tor.with_env_overrides();
        self
    }

    /// Resolve runtime settings, filling in defaults.
    pub fn settings(&self) -> Settings {
        let net = &self.network;

        let directory_timeouts = timeouts_or(Timeouts::directory(), net);
        let registry_timeouts = timeouts_or(Timeouts::registry(), net);

        let mut discovery = DiscoveryConfig::default();
        if let Some(mins) = net.discovery_ttl_mins {
            discovery.cache_ttl = Duration::from_secs(mins * 60);
        }
        if let Some(host) = &net.lookup_host {
            discovery.lookup_host = host.clone();
        }
        if let Some(url) = &net.servers_url {
            discovery.servers_url = url.clone();
        }
        if !net.fallback_servers.is_empty() {
            discovery.fallback_servers = net.fallback_servers.clone();
        }

        Settings {
            user_agent: net.user_agent.clone(),
            retries: net.retries.unwrap_or(crate::directory::DEFAULT_RETRIES),
            directory_timeouts,
            registry_timeouts,
            discovery,
            registry: ServiceEndpoint::with_onion(
                net.registry_url.as_deref().unwrap_or(CLEARNET_BASE_URL),
                net.registry_onion_url.as_deref().unwrap_or(ONION_BASE_URL),
            ),
            tor: self.tor.clone(),
        }
    }
}

fn timeouts_or(defaults: Timeouts, net: &NetworkConfig) -> Timeouts {
    Timeouts::new(
        net.request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.direct),
        net.proxied_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.proxied),
    )
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user_agent: Option<String>,
    pub retries: usize,
    pub directory_timeouts: Timeouts,
    pub registry_timeouts: Timeouts,
    pub discovery: DiscoveryConfig,
    pub registry: ServiceEndpoint,
    pub tor: TorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}
