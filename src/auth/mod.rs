//! Proxy authentication.

pub mod digest;
mod proxy;

pub use digest::{build_authorization, DigestAlgorithm, DigestChallenge};
pub use proxy::ProxyAuthenticator;
