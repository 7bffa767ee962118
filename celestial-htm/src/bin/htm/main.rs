//! htm: build and query HTM-indexed catalog tables.
//!
//! Positions on the command line are in degrees; the library works in
//! radians throughout.

mod cli;
mod import;
mod info;
mod locate;
mod search;

use std::fs;

use anyhow::{Context, Result};
use celestial_htm::MeshConfig;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Info(args) => info::run(args, &cli),
        Commands::Locate(args) => locate::run(args, &cli),
        Commands::Import(args) => import::run(args, &cli),
        Commands::Search(args) => search::run_search(args, &cli),
        Commands::Nearest(args) => search::run_nearest(args, &cli),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Mesh configuration from `--config`, with an optional depth override.
pub(crate) fn mesh_config(cli: &Cli, depth: Option<u8>) -> Result<MeshConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        }
        None => MeshConfig::default(),
    };
    if let Some(depth) = depth {
        config.depth = depth;
    }
    config.validate()?;
    Ok(config)
}

/// Degrees to a valid `(ra, dec)` in radians, wrapping RA into `[0, 360)`.
pub(crate) fn position(ra_deg: f64, dec_deg: f64) -> Result<(f64, f64)> {
    if !(-90.0..=90.0).contains(&dec_deg) {
        anyhow::bail!("Declination {dec_deg} is outside [-90, 90]");
    }
    let ra = ra_deg.rem_euclid(360.0).to_radians();
    // rem_euclid can round up to exactly 2π
    let ra = if ra >= std::f64::consts::TAU { 0.0 } else { ra };
    Ok((ra, dec_deg.to_radians()))
}
