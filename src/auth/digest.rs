//! HTTP Digest authentication (RFC 2617 / RFC 7616) for forward proxies.
//!
//! Only the client side is implemented: given a challenge from a
//! `Proxy-Authenticate` header, produce the matching `Proxy-Authorization`
//! value. The nonce count is always `00000001` because every challenge is
//! answered exactly once.

use std::collections::HashMap;
use std::sync::LazyLock;

use md5::Md5;
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

const NONCE_COUNT: &str = "00000001";

static CHALLENGE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w-]+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^,\s]+))"#).expect("valid challenge regex")
});

/// Hash function named by the challenge's `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Parse an algorithm token, returning the hash and whether it is a `-sess` variant.
    fn parse(token: &str) -> Option<(Self, bool)> {
        let upper = token.to_ascii_uppercase();
        let (name, sess) = match upper.strip_suffix("-SESS") {
            Some(base) => (base, true),
            None => (upper.as_str(), false),
        };
        let algorithm = match name {
            "MD5" => DigestAlgorithm::Md5,
            "SHA-256" => DigestAlgorithm::Sha256,
            _ => return None,
        };
        Some((algorithm, sess))
    }

    fn hash(self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(data.as_bytes())),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }
}

/// Parsed `Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// Selected quality of protection, `auth` preferred over `auth-int`.
    pub qop: Option<String>,
    pub opaque: Option<String>,
    /// Algorithm as sent by the server, if any. Absent means MD5.
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a `Digest realm="..", nonce="..", ...` header value.
    ///
    /// Returns `None` for non-Digest schemes or when realm or nonce is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut values: HashMap<String, String> = HashMap::new();
        for caps in CHALLENGE_PARAM.captures_iter(params) {
            let key = caps[1].to_ascii_lowercase();
            let value = match (caps.get(2), caps.get(3)) {
                (Some(quoted), _) => unquote(quoted.as_str()),
                (None, Some(token)) => token.as_str().to_string(),
                (None, None) => String::new(),
            };
            values.entry(key).or_insert(value);
        }

        let realm = values.remove("realm")?;
        let nonce = values.remove("nonce").filter(|n| !n.is_empty())?;
        let qop = values.remove("qop").and_then(|q| select_qop(&q));

        Some(Self {
            realm,
            nonce,
            qop,
            opaque: values.remove("opaque"),
            algorithm: values.remove("algorithm"),
        })
    }

    fn algorithm_token(&self) -> &str {
        self.algorithm.as_deref().unwrap_or("MD5")
    }
}

/// Pick a qop from a comma-separated list.
fn select_qop(list: &str) -> Option<String> {
    let options: Vec<String> = list
        .split(',')
        .map(|q| q.trim().to_ascii_lowercase())
        .filter(|q| !q.is_empty())
        .collect();
    ["auth", "auth-int"]
        .into_iter()
        .find(|wanted| options.iter().any(|q| q == wanted))
        .map(str::to_string)
}

/// Build an `Authorization`/`Proxy-Authorization` value for a Digest challenge.
///
/// Returns `None` when the challenge is not Digest, lacks realm or nonce, or
/// names an unsupported algorithm.
pub fn build_authorization(
    challenge: &str,
    method: &str,
    request_uri: &str,
    username: &str,
    password: &str,
) -> Option<String> {
    let challenge = DigestChallenge::parse(challenge)?;
    let cnonce = challenge.qop.as_ref().map(|_| generate_cnonce());
    respond(&challenge, method, request_uri, username, password, cnonce.as_deref())
}

/// Answer a parsed challenge with a caller-chosen client nonce.
///
/// `cnonce` is only used when the challenge carries a qop.
pub fn respond(
    challenge: &DigestChallenge,
    method: &str,
    request_uri: &str,
    username: &str,
    password: &str,
    cnonce: Option<&str>,
) -> Option<String> {
    let (algorithm, sess) = DigestAlgorithm::parse(challenge.algorithm_token())?;
    let cnonce = match (&challenge.qop, cnonce) {
        (Some(_), Some(c)) => c.to_string(),
        (Some(_), None) => generate_cnonce(),
        (None, _) => String::new(),
    };

    let mut ha1 = algorithm.hash(&format!("{}:{}:{}", username, challenge.realm, password));
    if sess {
        ha1 = algorithm.hash(&format!("{}:{}:{}", ha1, challenge.nonce, cnonce));
    }
    let ha2 = algorithm.hash(&format!("{}:{}", method, request_uri));

    let response = match &challenge.qop {
        Some(qop) => algorithm.hash(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, challenge.nonce, NONCE_COUNT, cnonce, qop, ha2
        )),
        None => algorithm.hash(&format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
    };

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
        quote(username),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(request_uri),
        response
    );
    if let Some(qop) = &challenge.qop {
        header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, NONCE_COUNT, cnonce));
    }
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
    }
    if let Some(algorithm) = &challenge.algorithm {
        if !algorithm.eq_ignore_ascii_case("MD5") {
            header.push_str(&format!(", algorithm={}", algorithm));
        }
    }
    Some(header)
}

/// Escape a value for a quoted-string (RFC 7230 §3.2.6).
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unquote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn generate_cnonce() -> String {
    let seed = format!(
        "{}:{}",
        chrono::Utc::now().timestamp_millis(),
        rand::rng().random::<u64>()
    );
    DigestAlgorithm::Md5.hash(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn test_parse_rfc_challenge() {
        let c = DigestChallenge::parse(RFC_CHALLENGE).unwrap();
        assert_eq!(c.realm, "testrealm@host.com");
        assert_eq!(c.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(c.qop.as_deref(), Some("auth"));
        assert_eq!(c.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert!(c.algorithm.is_none());
    }

    #[test]
    fn test_rfc2617_reference_vector() {
        let c = DigestChallenge::parse(RFC_CHALLENGE).unwrap();
        let header = respond(
            &c,
            "GET",
            "/dir/index.html",
            "Mufasa",
            "Circle Of Life",
            Some("0a4f113b"),
        )
        .unwrap();
        assert_eq!(
            header,
            "Digest username=\"Mufasa\", realm=\"testrealm@host.com\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", uri=\"/dir/index.html\", \
             response=\"6629fae49393a05397450978507c4ef1\", qop=auth, nc=00000001, \
             cnonce=\"0a4f113b\", opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""
        );
    }

    #[test]
    fn test_non_digest_scheme() {
        assert!(build_authorization("Basic realm=\"proxy\"", "GET", "/", "u", "p").is_none());
        assert!(build_authorization("", "GET", "/", "u", "p").is_none());
    }

    #[test]
    fn test_missing_realm_or_nonce() {
        assert!(build_authorization("Digest nonce=\"abc\"", "GET", "/", "u", "p").is_none());
        assert!(build_authorization("Digest realm=\"r\"", "GET", "/", "u", "p").is_none());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let challenge = r#"Digest realm="r", nonce="n", algorithm=SHA-512-256"#;
        assert!(build_authorization(challenge, "GET", "/", "u", "p").is_none());
    }

    #[test]
    fn test_without_qop_uses_legacy_response() {
        let header = build_authorization(
            r#"Digest realm="r", nonce="n""#,
            "GET",
            "/x",
            "u",
            "p",
        )
        .unwrap();
        let ha1 = DigestAlgorithm::Md5.hash("u:r:p");
        let ha2 = DigestAlgorithm::Md5.hash("GET:/x");
        let expected = DigestAlgorithm::Md5.hash(&format!("{}:n:{}", ha1, ha2));
        assert!(header.contains(&format!("response=\"{}\"", expected)));
        assert!(!header.contains("qop="));
        assert!(!header.contains("cnonce"));
        assert!(!header.contains("algorithm"));
    }

    #[test]
    fn test_md5_sess() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth", algorithm=MD5-sess"#)
            .unwrap();
        let header = respond(&c, "GET", "/x", "u", "p", Some("c")).unwrap();

        let ha1 = DigestAlgorithm::Md5.hash(&format!("{}:n:c", DigestAlgorithm::Md5.hash("u:r:p")));
        let ha2 = DigestAlgorithm::Md5.hash("GET:/x");
        let expected = DigestAlgorithm::Md5.hash(&format!("{}:n:00000001:c:auth:{}", ha1, ha2));
        assert!(header.contains(&format!("response=\"{}\"", expected)));
        assert!(header.ends_with(", algorithm=MD5-sess"));
    }

    #[test]
    fn test_sha256() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop=auth, algorithm=SHA-256"#)
            .unwrap();
        let header = respond(&c, "GET", "/x", "u", "p", Some("c")).unwrap();
        let response = header
            .split("response=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        assert_eq!(response.len(), 64);
        assert!(header.contains("algorithm=SHA-256"));
    }

    #[test]
    fn test_generated_cnonce_with_qop() {
        let header = build_authorization(
            r#"Digest realm="r", nonce="n", qop="auth""#,
            "GET",
            "/",
            "u",
            "p",
        )
        .unwrap();
        assert!(header.contains("nc=00000001"));
        let cnonce = header
            .split("cnonce=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        assert_eq!(cnonce.len(), 32);
    }

    #[test]
    fn test_unknown_qop_is_ignored() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth-conf""#).unwrap();
        assert!(c.qop.is_none());
    }

    #[test]
    fn test_quoted_values_are_escaped() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n", opaque="o\"p""#).unwrap();
        assert_eq!(c.opaque.as_deref(), Some("o\"p"));

        let header = respond(&c, "GET", "/x", "ali\"ce\\", "p", None).unwrap();
        assert!(header.starts_with(r#"Digest username="ali\"ce\\", realm="r""#));
        assert!(header.contains(r#"opaque="o\"p""#));

        // The hash covers the unescaped value
        let ha1 = DigestAlgorithm::Md5.hash("ali\"ce\\:r:p");
        let ha2 = DigestAlgorithm::Md5.hash("GET:/x");
        let expected = DigestAlgorithm::Md5.hash(&format!("{}:n:{}", ha1, ha2));
        assert!(header.contains(&format!("response=\"{}\"", expected)));
    }

    #[test]
    fn test_escaped_realm_round_trips_through_parser() {
        let c = DigestChallenge::parse(r#"Digest realm="a \"quoted\" realm", nonce="n""#).unwrap();
        assert_eq!(c.realm, r#"a "quoted" realm"#);
        let header = respond(&c, "GET", "/", "u", "p", None).unwrap();
        assert!(header.contains(r#"realm="a \"quoted\" realm""#));
    }
}
