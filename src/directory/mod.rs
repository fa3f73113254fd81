//! Public station directory (radio-browser style API).

mod client;
mod station;

pub use client::{DirectoryClient, ListOptions, StationSearch, DEFAULT_LIMIT, DEFAULT_RETRIES, MAX_LIMIT};
pub use station::{parse_stations, CountryInfo, DirectoryStation, TagInfo};
