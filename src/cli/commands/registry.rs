//! Station registry commands.

use console::style;
use serde_json::json;

use stationnet::registry::{RegistryStation, StationQuery};

use super::{Context, RegistryCommands};
use crate::cli::helpers::{print_json, report_request_error, truncate};

pub(super) async fn run(ctx: &Context, command: RegistryCommands) -> anyhow::Result<()> {
    let client = ctx.registry();
    if !ctx.json {
        eprintln!("{} {}", style("Registry:").dim(), style(client.active_base_url()).dim());
    }

    let stations = match command {
        RegistryCommands::Stations {
            network,
            genre,
            all,
            limit,
            offset,
        } => {
            let query = StationQuery {
                network: network.map(Into::into),
                genre,
                online_only: !all,
                limit,
                offset,
            };
            client.stations(&query).await.map(|list| {
                if !ctx.json {
                    println!("{} stations, {} online", list.total, list.online);
                }
                list.stations
            })
        }
        RegistryCommands::Tor { all } => client.tor_stations(!all).await.map(|l| l.stations),
        RegistryCommands::I2p { all } => client.i2p_stations(!all).await.map(|l| l.stations),
        RegistryCommands::Search {
            query,
            network,
            genre,
            limit,
        } => {
            client
                .search_stations(&query, network.map(Into::into), genre.as_deref(), limit)
                .await
        }
        RegistryCommands::Download { network } => {
            client.download_all_stations(network.map(Into::into)).await
        }
        RegistryCommands::Station { id } => {
            return match client.station(&id).await {
                Ok(station) if ctx.json => print_json(&station),
                Ok(station) => {
                    print_station_detail(&station);
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
        RegistryCommands::Stats => {
            return match client.stats().await {
                Ok(stats) if ctx.json => print_json(&stats),
                Ok(stats) => {
                    println!("\n{}", style("Registry statistics").bold());
                    println!("  {:<22} {}", "Stations:", stats.total_stations);
                    println!("  {:<22} {}", "Online:", stats.online_stations);
                    println!("  {:<22} {}", "Tor:", stats.tor_stations);
                    println!("  {:<22} {}", "I2P:", stats.i2p_stations);
                    println!("  {:<22} {}", "Pending submissions:", stats.pending_submissions);
                    if let Some(checked) = stats.last_health_check {
                        println!("  {:<22} {}", "Last health check:", checked);
                    }
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
        RegistryCommands::Genres => {
            return match client.genres().await {
                Ok(genres) if ctx.json => print_json(&genres),
                Ok(genres) => {
                    for genre in genres {
                        println!("{}", genre);
                    }
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
        RegistryCommands::Health => {
            return match client.check_health().await {
                Ok(healthy) if ctx.json => print_json(&json!({ "healthy": healthy })),
                Ok(true) => {
                    println!("{} Registry is healthy", style("✓").green());
                    Ok(())
                }
                Ok(false) => {
                    println!("{} Registry reports a problem", style("!").yellow());
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
    };

    match stations {
        Ok(stations) if ctx.json => print_json(&stations),
        Ok(stations) => {
            print_station_table(&stations);
            Ok(())
        }
        Err(e) => report_request_error(e),
    }
}

fn print_station_table(stations: &[RegistryStation]) {
    if stations.is_empty() {
        println!("{} No stations found", style("!").yellow());
        return;
    }

    println!("\n{}", style("Registry stations").bold());
    println!("{}", "-".repeat(90));
    println!("{:<32} {:<22} {:<18} {:>7}", "Name", "Genre", "Quality", "Uptime");
    println!("{}", "-".repeat(90));
    for s in stations {
        let name = truncate(&s.name, 31);
        let name = if s.is_online {
            style(name).green()
        } else {
            style(name).dim()
        };
        println!(
            "{:<32} {:<22} {:<18} {:>6.0}%",
            name,
            truncate(&s.genre_with_network(), 21),
            s.quality_info(),
            s.uptime_percent()
        );
    }
}

fn print_station_detail(s: &RegistryStation) {
    println!("\n{}", style(&s.name).bold());
    println!("  {:<10} {}", "ID:", s.id);
    println!("  {:<10} {}", "Stream:", s.stream_url);
    if let Some(homepage) = &s.homepage {
        println!("  {:<10} {}", "Homepage:", homepage);
    }
    println!("  {:<10} {}", "Genre:", s.genre_with_network());
    println!("  {:<10} {}", "Quality:", s.quality_info());
    println!("  {:<10} {}", "Status:", s.status);
    println!(
        "  {:<10} {} ({:.0}% of {} checks)",
        "Online:",
        if s.is_online { "yes" } else { "no" },
        s.uptime_percent(),
        s.check_count
    );
}
