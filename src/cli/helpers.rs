//! Shared helper functions for CLI commands.

use console::style;
use serde::Serialize;

use stationnet::RequestError;

/// Truncate a string to at most `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn a request failure into the command's error, with a hint when a
/// forcing policy or the registry switch stopped the request.
pub fn report_request_error(err: RequestError) -> anyhow::Result<()> {
    match &err {
        RequestError::Blocked(_) => eprintln!(
            "{} Start Tor or fix the proxy settings, or disable the forcing option.",
            style("→").cyan()
        ),
        RequestError::Disabled => eprintln!(
            "{} Set privacy.registry_api_disabled = false to use the registry.",
            style("→").cyan()
        ),
        _ => {}
    }
    Err(err.into())
}
