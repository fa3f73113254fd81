//! Error types shared by the API clients.

use thiserror::Error;

use crate::privacy::BlockReason;

/// Classified failure of an API request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request blocked: {0}")]
    Blocked(BlockReason),
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("HTTP {status}: {message}")]
    ProtocolFailure { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Unsupported proxy authentication challenge: {0}")]
    AuthChallengeUnsupported(String),
    #[error("Request failed: both onion and clearnet-over-Tor failed: onion: {onion}; clearnet: {clearnet}")]
    FallbackExhausted {
        onion: Box<RequestError>,
        clearnet: Box<RequestError>,
    },
    #[error("Registry API is disabled")]
    Disabled,
}

impl RequestError {
    /// The request never left the machine because a forcing policy could not be met.
    ///
    /// UIs use this to suggest enabling Tor or the proxy instead of reporting
    /// the network as unreachable.
    pub fn is_blocked(&self) -> bool {
        matches!(self, RequestError::Blocked(_))
    }

    pub(crate) fn malformed(context: &str, err: impl std::fmt::Display) -> Self {
        RequestError::MalformedResponse(format!("{}: {}", context, err))
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("proxy setup failed: {0}")]
    Proxy(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Proxy(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_message() {
        let err = RequestError::Blocked(BlockReason::TorNotConnected);
        assert!(err.is_blocked());
        assert!(err.to_string().to_lowercase().contains("blocked"));
    }

    #[test]
    fn test_fallback_exhausted_names_both() {
        let err = RequestError::FallbackExhausted {
            onion: Box::new(TransportError::Timeout("onion unreachable".to_string()).into()),
            clearnet: Box::new(RequestError::ProtocolFailure {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("both onion and clearnet-over-Tor failed"));
        assert!(msg.contains("onion unreachable"));
        assert!(msg.contains("503"));
        assert!(!err.is_blocked());
    }
}
