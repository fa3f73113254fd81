//! Directory server pool.

use console::style;
use serde::Serialize;

use super::Context;
use crate::cli::helpers::print_json;

#[derive(Serialize)]
struct ServerList {
    tier: Option<String>,
    current: String,
    servers: Vec<String>,
}

/// List discovered directory servers.
pub async fn cmd_servers(ctx: &Context, refresh: bool) -> anyhow::Result<()> {
    let discovery = ctx.discovery();
    let servers = if refresh {
        discovery.force_refresh().await
    } else {
        discovery.all_servers().await
    };
    let current = discovery.current_server().await;
    let pool = discovery.snapshot().await;

    if ctx.json {
        return print_json(&ServerList {
            tier: pool.tier().map(|t| t.to_string()),
            current,
            servers,
        });
    }

    let tier = pool
        .tier()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!(
        "\n{} ({} via {})",
        style("Directory servers").bold(),
        servers.len(),
        tier
    );
    for server in &servers {
        let marker = if *server == current {
            style("→").cyan().to_string()
        } else {
            " ".to_string()
        };
        println!(" {} {}", marker, server);
    }
    Ok(())
}
