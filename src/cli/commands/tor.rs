//! Tor helpers.

use console::style;
use serde_json::json;

use stationnet::privacy::TorStatus;

use super::Context;
use crate::cli::helpers::print_json;

/// Probe the configured SOCKS listener.
pub async fn cmd_probe(ctx: &Context) -> anyhow::Result<()> {
    let up = ctx.tor.probe(ctx.settings.tor.probe_timeout()).await;
    let host = ctx.tor.proxy_host();
    let port = ctx.tor.proxy_port();

    if ctx.json {
        return print_json(&json!({ "host": host, "port": port, "connected": up }));
    }

    if up {
        println!("{} Tor SOCKS listener reachable at {}:{}", style("✓").green(), host, port);
    } else {
        println!("{} No Tor SOCKS listener at {}:{}", style("✗").red(), host, port);
    }
    Ok(())
}
