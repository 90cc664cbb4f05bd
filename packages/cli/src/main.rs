#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the lead service line toolchain.
//!
//! Builds the search index and inventory lookup from the city's CSVs,
//! resolves free-text address queries, lists addresses near a point, and
//! replays the smoke tests.
//!
//! Uses `indicatif-log-bridge` (via [`chi_pb_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chi_pb", about = "Chicago lead service line address search")]
struct Cli {
    /// Config file (defaults to `chi_pb.toml` when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the street-name search index from the service-lines CSV
    BuildIndex {
        /// Service-lines CSV, plain or `.zst`
        #[arg(long)]
        input: Option<PathBuf>,
        /// Where to write the index JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip writing the `.zst` copy
        #[arg(long)]
        no_compress: bool,
    },
    /// Resolve a free-text address against the index
    Search {
        /// Address query, e.g. "5410 N Kenmore Ave"
        query: String,
        /// Index path or http(s) URL (overrides config and `CHI_PB_INDEX_URL`)
        #[arg(long)]
        source: Option<String>,
        /// Maximum number of results to print
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List indexed addresses within a radius of a point
    Nearby {
        /// Latitude of the centre
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude of the centre
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Radius in feet
        #[arg(long, default_value = "500")]
        radius_feet: f64,
        /// Index path or http(s) URL (overrides config and `CHI_PB_INDEX_URL`)
        #[arg(long)]
        source: Option<String>,
        /// Maximum number of results to print
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Build the address-keyed inventory lookup from the service-lines CSV
    BuildInventory {
        /// Service-lines CSV, plain or `.zst`
        #[arg(long)]
        input: Option<PathBuf>,
        /// Where to write the lookup JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip writing the `.zst` copy
        #[arg(long)]
        no_compress: bool,
    },
    /// Look up service lines by inventory row id or by display address
    Inventory {
        /// Inventory row id (`Idx`), scanned from the full inventory CSV
        #[arg(long, conflicts_with = "address", required_unless_present = "address")]
        row: Option<u64>,
        /// Display address, looked up in the address-keyed artifact
        #[arg(long)]
        address: Option<String>,
        /// Inventory CSV path or URL for `--row`, lookup artifact for `--address`
        #[arg(long)]
        source: Option<String>,
    },
    /// Replay the embedded smoke tests against the index
    Verify {
        /// Index path or http(s) URL (overrides config and `CHI_PB_INDEX_URL`)
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = chi_pb_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = chi_pb_search_index::config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::BuildIndex {
            input,
            output,
            no_compress,
        } => commands::build_index(&multi, &config, input, output, no_compress).await?,
        Commands::Search {
            query,
            source,
            limit,
        } => commands::search(&config, source, &query, limit).await?,
        Commands::Nearby {
            lat,
            lng,
            radius_feet,
            source,
            limit,
        } => commands::nearby(&config, source, lat, lng, radius_feet, limit).await?,
        Commands::BuildInventory {
            input,
            output,
            no_compress,
        } => commands::build_inventory(&multi, &config, input, output, no_compress).await?,
        Commands::Inventory {
            row,
            address,
            source,
        } => commands::inventory(&config, row, address, source).await?,
        Commands::Verify { source } => {
            if !commands::verify(&multi, &config, source).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn nearby_accepts_negative_longitude() {
        let cli = Cli::try_parse_from([
            "chi_pb", "nearby", "--lat", "41.88", "--lng", "-87.6278",
        ])
        .unwrap();
        let Commands::Nearby {
            lat,
            lng,
            radius_feet,
            ..
        } = cli.command
        else {
            panic!("expected nearby");
        };
        assert!((lat - 41.88).abs() < f64::EPSILON);
        assert!((lng + 87.6278).abs() < f64::EPSILON);
        assert!((radius_feet - 500.0).abs() < f64::EPSILON);
    }
}
