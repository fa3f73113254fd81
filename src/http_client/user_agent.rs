//! User agent handling for outbound requests.

pub const USER_AGENT: &str = concat!("stationnet/", env!("CARGO_PKG_VERSION"));

/// Tor Browser's user agent, shared by every Tor Browser user on desktop.
pub const TOR_BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Resolve user agent from config value.
/// - None => default stationnet user agent
/// - "tor-browser" => blend in with Tor Browser traffic
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("tor-browser") => TOR_BROWSER_USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}
