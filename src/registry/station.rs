//! Station registry payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;
use crate::utils::lenient;

/// Overlay network a registry station is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationNetwork {
    Tor,
    I2p,
    Clearnet,
}

impl StationNetwork {
    /// Parse a network filter; anything but `tor`/`i2p` means no filter.
    pub fn parse_filter(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tor" => Some(StationNetwork::Tor),
            "i2p" => Some(StationNetwork::I2p),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StationNetwork::Tor => "tor",
            StationNetwork::I2p => "i2p",
            StationNetwork::Clearnet => "clearnet",
        }
    }
}

/// Station listed in the curated Tor/I2P registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStation {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stream_url: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub homepage: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub favicon_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub codec: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bitrate: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub language: Option<String>,
    /// `tor` or `i2p`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub network: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub country_code: Option<String>,
    #[serde(rename = "lastCheckOk", default, deserialize_with = "lenient::flag")]
    pub is_online: bool,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub last_check_time: Option<String>,
    /// `approved`, `pending` or `rejected`.
    #[serde(default = "default_status", deserialize_with = "status")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub check_count: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub check_ok_count: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub submitted_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

fn default_status() -> String {
    "approved".to_string()
}

fn status<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient::opt_string(d)?.unwrap_or_else(default_status))
}

impl RegistryStation {
    pub fn is_tor_station(&self) -> bool {
        self.network.eq_ignore_ascii_case("tor") || self.stream_url.contains(".onion")
    }

    pub fn is_i2p_station(&self) -> bool {
        self.network.eq_ignore_ascii_case("i2p") || self.stream_url.contains(".i2p")
    }

    pub fn network_kind(&self) -> StationNetwork {
        if self.is_tor_station() {
            StationNetwork::Tor
        } else if self.is_i2p_station() {
            StationNetwork::I2p
        } else {
            StationNetwork::Clearnet
        }
    }

    /// Share of health checks that succeeded, in percent.
    pub fn uptime_percent(&self) -> f32 {
        if self.check_count > 0 {
            self.check_ok_count as f32 / self.check_count as f32 * 100.0
        } else {
            0.0
        }
    }

    pub fn primary_genre(&self) -> &str {
        self.genre.as_deref().unwrap_or("Other")
    }

    /// e.g. `Jazz · Tor`, or just `Tor` without a genre.
    pub fn genre_with_network(&self) -> String {
        let indicator = match self.network_kind() {
            StationNetwork::Tor => Some("Tor"),
            StationNetwork::I2p => Some("I2P"),
            StationNetwork::Clearnet => None,
        };
        match (indicator, self.genre.as_deref()) {
            (Some(net), Some(genre)) if genre != "Other" => format!("{} · {}", genre, net),
            (Some(net), _) => net.to_string(),
            (None, _) => self.primary_genre().to_string(),
        }
    }

    pub fn quality_info(&self) -> String {
        let mut parts = Vec::new();
        if self.bitrate > 0 {
            parts.push(format!("{}kbps", self.bitrate));
        }
        if let Some(codec) = &self.codec {
            parts.push(codec.to_uppercase());
        }
        parts.join(" • ")
    }

    pub fn matches_network(&self, network: Option<StationNetwork>) -> bool {
        match network {
            Some(StationNetwork::Tor) => self.is_tor_station(),
            Some(StationNetwork::I2p) => self.is_i2p_station(),
            _ => true,
        }
    }

    fn is_listable(&self) -> bool {
        !self.name.is_empty() && !self.stream_url.is_empty()
    }
}

/// Page of stations with registry-wide counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationListResponse {
    pub stations: Vec<RegistryStation>,
    pub total: i64,
    pub online: i64,
}

/// Registry statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default, deserialize_with = "lenient::int")]
    pub total_stations: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub online_stations: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub tor_stations: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub i2p_stations: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub pending_submissions: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub last_health_check: Option<String>,
}

fn parse_object(body: &str, what: &str) -> Result<serde_json::Map<String, Value>, RequestError> {
    match serde_json::from_str(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RequestError::MalformedResponse(format!("{}: expected a JSON object", what))),
        Err(e) => Err(RequestError::malformed(what, e)),
    }
}

/// Stations from a JSON array, skipping malformed and incomplete entries.
fn stations_from(value: Option<&Value>) -> Vec<RegistryStation> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value::<RegistryStation>(v.clone()).ok())
                .map(|mut s| {
                    s.name = s.name.trim().to_string();
                    s
                })
                .filter(RegistryStation::is_listable)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `{"stations": [...], "total": n, "online": n}`.
pub fn parse_station_list(body: &str) -> Result<StationListResponse, RequestError> {
    let map = parse_object(body, "station list")?;
    let stations = stations_from(map.get("stations"));
    let count = |key: &str, fallback: usize| {
        map.get(key)
            .and_then(Value::as_i64)
            .unwrap_or(fallback as i64)
    };
    let online_fallback = stations.iter().filter(|s| s.is_online).count();
    Ok(StationListResponse {
        total: count("total", stations.len()),
        online: count("online", online_fallback),
        stations,
    })
}

pub fn parse_station(body: &str) -> Result<RegistryStation, RequestError> {
    let mut station: RegistryStation =
        serde_json::from_str(body).map_err(|e| RequestError::malformed("station", e))?;
    station.name = station.name.trim().to_string();
    Ok(station)
}

pub fn parse_stats(body: &str) -> Result<StatsResponse, RequestError> {
    serde_json::from_str(body).map_err(|e| RequestError::malformed("stats", e))
}

/// Accepts `{"genres": [...]}` or a plain array.
pub fn parse_genres(body: &str) -> Result<Vec<String>, RequestError> {
    let value: Value = serde_json::from_str(body).map_err(|e| RequestError::malformed("genres", e))?;
    let items = match &value {
        Value::Object(map) => map.get("genres").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    }
    .ok_or_else(|| RequestError::MalformedResponse("genres: expected a list".to_string()))?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect())
}

/// `{"status": "ok", "database": true}` means healthy.
pub fn parse_health(body: &str) -> Result<bool, RequestError> {
    let map = parse_object(body, "health")?;
    Ok(map.get("status").and_then(Value::as_str) == Some("ok")
        && map.get("database").and_then(Value::as_bool) == Some(true))
}

/// Parse the bulk download `{"stations": [...]}`.
pub fn parse_bulk_download(body: &str) -> Result<Vec<RegistryStation>, RequestError> {
    let map = parse_object(body, "bulk download")?;
    Ok(stations_from(map.get("stations")))
}
