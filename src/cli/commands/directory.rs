//! Station directory commands.

use console::style;

use stationnet::directory::{DirectoryStation, ListOptions, StationSearch};

use super::{Context, DirectoryCommands, PageArgs};
use crate::cli::helpers::{print_json, report_request_error, truncate};

impl PageArgs {
    fn options(self) -> ListOptions {
        ListOptions {
            limit: self.limit,
            offset: self.offset,
            hidebroken: !self.include_broken,
            ..Default::default()
        }
    }
}

pub(super) async fn run(ctx: &Context, command: DirectoryCommands) -> anyhow::Result<()> {
    let client = ctx.directory();

    let result = match command {
        DirectoryCommands::Search {
            query,
            tag,
            country,
            countrycode,
            language,
            page,
        } => {
            if tag.is_none() && country.is_none() && countrycode.is_none() && language.is_none() {
                match query {
                    Some(query) => client.search_by_name(&query, &page.options()).await,
                    None => client.top_voted(&page.options()).await,
                }
            } else {
                let search = StationSearch {
                    name: query,
                    tag,
                    country,
                    countrycode,
                    language,
                    options: page.options(),
                };
                client.search(&search).await
            }
        }
        DirectoryCommands::TopVoted { page } => client.top_voted(&page.options()).await,
        DirectoryCommands::TopClicked { page } => client.top_clicked(&page.options()).await,
        DirectoryCommands::Recent { page } => client.recently_changed(&page.options()).await,
        DirectoryCommands::Country { code, page } => {
            client.by_country_code(&code, &page.options()).await
        }
        DirectoryCommands::Tag { tag, page } => client.by_tag(&tag, &page.options()).await,
        DirectoryCommands::Uuid { uuid } => {
            return match client.by_uuid(&uuid).await {
                Ok(Some(station)) if ctx.json => print_json(&station),
                Ok(Some(station)) => {
                    print_station_detail(&station);
                    Ok(())
                }
                Ok(None) => {
                    println!("{} Station '{}' not found", style("✗").red(), uuid);
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
        DirectoryCommands::Countries => {
            return match client.countries().await {
                Ok(countries) if ctx.json => print_json(&countries),
                Ok(countries) => {
                    println!("\n{}", style("Countries").bold());
                    println!("{}", "-".repeat(50));
                    for c in countries {
                        println!("{:<4} {:<36} {:>8}", c.iso_3166_1, truncate(&c.name, 35), c.stationcount);
                    }
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
        DirectoryCommands::Tags { limit } => {
            return match client.tags(limit).await {
                Ok(tags) if ctx.json => print_json(&tags),
                Ok(tags) => {
                    println!("\n{}", style("Tags").bold());
                    println!("{}", "-".repeat(40));
                    for t in tags {
                        println!("{:<30} {:>8}", truncate(&t.name, 29), t.stationcount);
                    }
                    Ok(())
                }
                Err(e) => report_request_error(e),
            };
        }
    };

    match result {
        Ok(stations) if ctx.json => print_json(&stations),
        Ok(stations) => {
            print_station_table(&stations);
            Ok(())
        }
        Err(e) => report_request_error(e),
    }
}

fn print_station_table(stations: &[DirectoryStation]) {
    if stations.is_empty() {
        println!("{} No stations found", style("!").yellow());
        return;
    }

    println!("\n{}", style("Stations").bold());
    println!("{}", "-".repeat(90));
    println!("{:<32} {:<14} {:<4} {:<18} {:>6}", "Name", "Genre", "CC", "Quality", "Votes");
    println!("{}", "-".repeat(90));
    for s in stations {
        let name = truncate(&s.name, 31);
        let name = if s.is_likely_working() {
            style(name)
        } else {
            style(name).dim()
        };
        println!(
            "{:<32} {:<14} {:<4} {:<18} {:>6}",
            name,
            truncate(&s.primary_genre(), 13),
            s.countrycode,
            s.quality_info(),
            s.votes
        );
    }
}

fn print_station_detail(s: &DirectoryStation) {
    println!("\n{}", style(&s.name).bold());
    println!("  {:<10} {}", "UUID:", s.stationuuid);
    println!("  {:<10} {}", "Stream:", s.stream_url());
    if !s.homepage.is_empty() {
        println!("  {:<10} {}", "Homepage:", s.homepage);
    }
    println!("  {:<10} {}", "Genre:", s.primary_genre());
    println!("  {:<10} {}", "Tags:", s.tag_list().join(", "));
    println!("  {:<10} {} {}", "Country:", s.country, s.countrycode);
    println!("  {:<10} {}", "Quality:", s.quality_info());
    println!("  {:<10} {} votes, {} clicks", "Stats:", s.votes, s.clickcount);
}
