//! Answering `407 Proxy Authentication Required`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use super::digest;
use crate::error::RequestError;
use crate::privacy::ProxyCredentials;

/// Builds `Proxy-Authorization` values from proxy challenges.
#[derive(Clone)]
pub struct ProxyAuthenticator<'a> {
    credentials: &'a ProxyCredentials,
}

impl<'a> ProxyAuthenticator<'a> {
    pub fn new(credentials: &'a ProxyCredentials) -> Self {
        Self { credentials }
    }

    /// Answer the challenges carried by a 407 response.
    ///
    /// Digest is preferred whenever one of the challenges offers it. Basic
    /// is used only when no Digest challenge can be answered.
    pub fn answer(
        &self,
        challenges: &[&str],
        method: &str,
        request_uri: &str,
    ) -> Result<String, RequestError> {
        if challenges.is_empty() {
            return Err(RequestError::AuthChallengeUnsupported(
                "407 without a challenge header".to_string(),
            ));
        }

        let digests: Vec<&str> = challenges
            .iter()
            .map(|c| c.trim())
            .filter(|c| scheme_of(c) == "digest")
            .collect();
        for challenge in &digests {
            if let Some(value) = digest::build_authorization(
                challenge,
                method,
                request_uri,
                &self.credentials.username,
                &self.credentials.password,
            ) {
                debug!("Answering Digest proxy challenge");
                return Ok(value);
            }
        }

        if challenges.iter().any(|c| scheme_of(c.trim()) == "basic") {
            debug!("Answering Basic proxy challenge");
            let token = STANDARD.encode(format!(
                "{}:{}",
                self.credentials.username, self.credentials.password
            ));
            return Ok(format!("Basic {}", token));
        }

        if !digests.is_empty() {
            return Err(RequestError::AuthChallengeUnsupported(
                "malformed or unsupported Digest challenge".to_string(),
            ));
        }
        Err(RequestError::AuthChallengeUnsupported(format!(
            "scheme '{}'",
            scheme_of(challenges[0].trim())
        )))
    }
}

fn scheme_of(challenge: &str) -> String {
    challenge
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
