//! kea-fleet binary entry point.

use clap::{Parser, Subcommand};
use kea_fleet::{telemetry, Config, HttpAgentTransport, LeaseSearch, StaticInventory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Search DHCP leases across a fleet of Kea servers.
#[derive(Parser, Debug)]
#[command(name = "kea-fleet")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "kea-fleet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Query,
}

#[derive(Subcommand, Debug)]
enum Query {
    /// Find leases by IP address, identifier, or hostname.
    Find {
        /// Search text: an IPv4/IPv6 address, a hexadecimal identifier
        /// (MAC address, client identifier, DUID), or a hostname.
        text: String,
    },
    /// Find declined leases across the fleet.
    Declined,
    /// Find leases for the addresses reserved for a host.
    Host {
        /// Host identifier from the fleet inventory.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("KEA_FLEET")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        apps = config.fleet.apps.len(),
        "Starting kea-fleet"
    );

    let inventory = Arc::new(StaticInventory::from_config(&config.fleet));
    let transport = Arc::new(HttpAgentTransport::new(config.search.app_timeout())?);
    let engine = LeaseSearch::with_config(inventory, transport, &config.search);

    let result = match args.command {
        Query::Find { text } => engine.find_leases(&text).await?,
        Query::Declined => engine.find_declined_leases().await?,
        Query::Host { id } => engine.find_leases_by_host_id(id).await?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    info!(
        leases = result.leases.len(),
        erred_apps = result.erred_apps.len(),
        "Search complete"
    );
    Ok(())
}
