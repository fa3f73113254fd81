//! stationnet - privacy-preserving access to internet radio directories.
//!
//! Every request is routed according to the user's proxy preferences and
//! the live Tor state. Forcing policies fail closed, so a request that
//! cannot be proxied is blocked rather than sent directly.

pub mod auth;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod http_client;
pub mod privacy;
pub mod registry;
pub mod utils;

pub use error::{ConfigError, RequestError, TransportError};
