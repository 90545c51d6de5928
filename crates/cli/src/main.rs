//! Green Basket CLI - database migrations and operational checks.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! gb-cli migrate
//!
//! # Validate the delivery zone from DELIVERY_ZONE_POLYGON
//! gb-cli zone check
//!
//! # Validate a zone file and test whether a point is inside it
//! gb-cli zone check --file zone.json --lat 18.52 --lon 73.85
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gb-cli")]
#[command(author, version, about = "Green Basket CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Delivery zone tools
    Zone {
        #[command(subcommand)]
        action: ZoneAction,
    },
}

#[derive(Subcommand)]
enum ZoneAction {
    /// Validate a delivery zone exactly as the server loads it
    Check {
        /// JSON file with `[[lat, lon], ...]`; defaults to `DELIVERY_ZONE_POLYGON`
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Latitude of a point to test against the zone
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of a point to test against the zone
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Zone { action } => match action {
            ZoneAction::Check { file, lat, lon } => {
                let point = lat.zip(lon);
                commands::zone::check(file.as_deref(), point)?;
            }
        },
    }
    Ok(())
}
