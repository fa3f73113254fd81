//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod directory;
mod registry;
mod route;
mod servers;
mod tor;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing::{debug, info};

use stationnet::config::{Config, Settings};
use stationnet::directory::DirectoryClient;
use stationnet::discovery::ServerDiscovery;
use stationnet::http_client::{HttpClient, Timeouts};
use stationnet::privacy::{RoutingPolicy, SharedPreferences, SharedTorState};
use stationnet::registry::{RegistryClient, StationNetwork};

#[derive(Parser)]
#[command(name = "stationnet")]
#[command(about = "Browse internet radio directories over Tor or a proxy")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Require Tor for every request (requests are blocked while Tor is down)
    #[arg(long, global = true)]
    force_tor: bool,

    /// Require a custom proxy for every request (e.g. socks5://127.0.0.1:1080)
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Show how each service would be reached right now
    Route,

    /// List directory servers
    Servers {
        /// Discard the cached pool and discover again
        #[arg(long)]
        refresh: bool,
    },

    /// Query the public station directory
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },

    /// Query the Tor/I2P station registry
    Registry {
        #[command(subcommand)]
        command: RegistryCommands,
    },

    /// Tor helpers
    Tor {
        #[command(subcommand)]
        command: TorCommands,
    },
}

#[derive(Subcommand)]
enum DirectoryCommands {
    /// Search stations by name and filters
    Search {
        /// Name fragment
        query: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        country: Option<String>,
        /// ISO 3166-1 alpha-2 country code
        #[arg(long)]
        countrycode: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Most voted stations
    TopVoted {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Most clicked stations
    TopClicked {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Recently changed stations
    Recent {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Stations in a country
    Country {
        /// ISO 3166-1 alpha-2 country code
        code: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Stations with a tag
    Tag {
        tag: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Look up a station by UUID
    Uuid { uuid: String },
    /// Countries by station count
    Countries,
    /// Most used tags
    Tags {
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
}

#[derive(clap::Args, Clone, Copy)]
struct PageArgs {
    #[arg(short, long, default_value = "50")]
    limit: u32,
    #[arg(long, default_value = "0")]
    offset: u32,
    /// Include stations that failed their last check
    #[arg(long)]
    include_broken: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Tor,
    I2p,
}

impl From<NetworkArg> for StationNetwork {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Tor => StationNetwork::Tor,
            NetworkArg::I2p => StationNetwork::I2p,
        }
    }
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// List stations
    Stations {
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,
        #[arg(long)]
        genre: Option<String>,
        /// Include stations that failed their last health check
        #[arg(long)]
        all: bool,
        #[arg(short, long, default_value = "50")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Tor stations
    Tor {
        /// Include offline stations
        #[arg(long)]
        all: bool,
    },
    /// I2P stations
    I2p {
        /// Include offline stations
        #[arg(long)]
        all: bool,
    },
    /// Show one station
    Station { id: String },
    /// Registry statistics
    Stats,
    /// Known genres
    Genres,
    /// Search online stations by name or genre
    Search {
        query: String,
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Check registry health
    Health,
    /// Download every approved station
    Download {
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,
    },
}

#[derive(Subcommand)]
enum TorCommands {
    /// Check whether the Tor SOCKS listener accepts connections
    Probe,
}

/// Shared state for a single CLI invocation.
pub struct Context {
    pub config: Config,
    pub settings: Settings,
    pub tor: SharedTorState,
    pub policy: RoutingPolicy,
    pub json: bool,
}

impl Context {
    async fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load_from_path(path).await?,
            None => Config::load().await,
        };
        if let Some(path) = &config.source_path {
            debug!("Loaded config from {}", path.display());
        }

        let preferences = config
            .privacy
            .clone()
            .with_cli_overrides(cli.force_tor, cli.proxy.as_deref())
            .map_err(|e| anyhow::anyhow!(e))?;
        let settings = config.settings();

        let tor = SharedTorState::new(settings.tor.socks_host.clone(), settings.tor.socks_port);
        if preferences.tor_enabled || preferences.force_tor() {
            let up = tor.probe(settings.tor.probe_timeout()).await;
            info!("Tor SOCKS listener {}", if up { "reachable" } else { "unreachable" });
        }

        let policy = RoutingPolicy::new(
            Arc::new(SharedPreferences::new(preferences)),
            Arc::new(tor.clone()),
        );

        Ok(Self {
            config,
            settings,
            tor,
            policy,
            json: cli.json,
        })
    }

    fn http_client(&self, timeouts: Timeouts) -> Arc<HttpClient> {
        let mut builder = HttpClient::builder().timeouts(timeouts);
        if let Some(ua) = &self.settings.user_agent {
            builder = builder.user_agent(ua);
        }
        Arc::new(builder.build())
    }

    pub fn discovery(&self) -> Arc<ServerDiscovery> {
        Arc::new(ServerDiscovery::new(
            self.settings.discovery.clone(),
            self.policy.clone(),
            self.settings.user_agent.as_deref(),
        ))
    }

    pub fn directory(&self) -> DirectoryClient {
        DirectoryClient::new(
            self.policy.clone(),
            self.discovery(),
            self.http_client(self.settings.directory_timeouts),
        )
        .with_retries(self.settings.retries)
    }

    pub fn registry(&self) -> RegistryClient {
        RegistryClient::with_endpoint(
            self.policy.clone(),
            self.settings.registry.clone(),
            self.http_client(self.settings.registry_timeouts),
        )
    }

    /// Warn up front when every request is going to be blocked.
    fn warn_if_blocked(&self) {
        if self.policy.is_tor_required_but_not_connected() {
            eprintln!(
                "{} Force-Tor is enabled but Tor is not reachable at {}:{}; requests will be blocked",
                style("!").yellow(),
                self.settings.tor.socks_host,
                self.settings.tor.socks_port
            );
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = Context::new(&cli).await?;

    match cli.command {
        Commands::Route => route::cmd_route(&ctx).await,
        Commands::Servers { refresh } => servers::cmd_servers(&ctx, refresh).await,
        Commands::Directory { command } => {
            ctx.warn_if_blocked();
            directory::run(&ctx, command).await
        }
        Commands::Registry { command } => {
            ctx.warn_if_blocked();
            registry::run(&ctx, command).await
        }
        Commands::Tor { command } => match command {
            TorCommands::Probe => tor::cmd_probe(&ctx).await,
        },
    }
}
