//! Routing overview.

use console::style;
use serde::Serialize;

use stationnet::privacy::{RoutingDecision, RoutingMode, ServiceEndpoint, TorStatus};

use super::Context;
use crate::cli::helpers::print_json;

#[derive(Serialize)]
struct ServiceRoute {
    service: &'static str,
    route: RoutingDecision,
}

/// Show the route each service would take right now.
pub async fn cmd_route(ctx: &Context) -> anyhow::Result<()> {
    let routes = vec![
        ServiceRoute {
            service: "directory-discovery",
            route: ctx
                .policy
                .resolve(&ServiceEndpoint::clearnet(ctx.settings.discovery.servers_url.clone())),
        },
        ServiceRoute {
            service: "registry",
            route: ctx.policy.resolve(&ctx.settings.registry),
        },
    ];

    if ctx.json {
        return print_json(&routes);
    }

    let prefs = ctx.policy.preferences();
    println!("\n{}", style("Routing").bold());
    println!("{}", "-".repeat(60));
    if let Some(path) = &ctx.config.source_path {
        println!("{:<14} {}", "Config:", path.display());
    }
    println!(
        "{:<14} {}:{} ({})",
        "Tor SOCKS:",
        ctx.tor.proxy_host(),
        ctx.tor.proxy_port(),
        if ctx.tor.is_connected() {
            style("connected").green()
        } else {
            style("not connected").red()
        }
    );
    println!("{:<14} {:?}", "Preferences:", prefs);
    println!("{}", "-".repeat(60));

    for ServiceRoute { service, route } in &routes {
        let mode = match route.mode {
            RoutingMode::Blocked(_) => style(route.mode.to_string()).red(),
            RoutingMode::Direct => style(route.mode.to_string()).yellow(),
            _ => style(route.mode.to_string()).green(),
        };
        let via = route
            .proxy
            .as_ref()
            .map(|p| format!(" via {}", p.proxy_url()))
            .unwrap_or_default();
        println!("{:<20} {}{}", service, mode, via);
        println!("{:<20} {}", "", style(&route.base_url).dim());
    }

    Ok(())
}
