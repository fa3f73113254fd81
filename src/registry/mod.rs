//! Curated registry of Tor and I2P radio stations.
//!
//! The registry is reachable both on the clearnet and as an onion service.
//! Through Tor the onion service is preferred, falling back to the clearnet
//! address over the same Tor circuit when the onion service is unreachable.

mod client;
mod fallback;
mod station;

pub use client::{RegistryClient, StationQuery, DEFAULT_LIMIT, MAX_LIMIT};
pub use fallback::OnionFallbackExecutor;
pub use station::{
    parse_genres, parse_station_list, RegistryStation, StationListResponse, StationNetwork,
    StatsResponse,
};

pub const CLEARNET_BASE_URL: &str = "https://api.deutsia.com";
pub const ONION_BASE_URL: &str =
    "http://ccq2dfnskeccxmojoo2kwk23oyynf2fvczdfcpapdmek36waqnjhpvid.onion";
