//! CLI argument definitions for htm

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "htm")]
#[command(about = "Build and query HTM-indexed catalog tables")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON mesh configuration, e.g. {"depth": 8, "table_slots": 4}
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print mesh statistics
    Info(InfoArgs),

    /// Print the home trixel of a position at every depth
    Locate(LocateArgs),

    /// Import a CSV catalog into a saved table
    Import(ImportArgs),

    /// Cone search a saved table
    Search(SearchArgs),

    /// Find the object nearest to a position in a saved table
    Nearest(NearestArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Parser)]
pub struct InfoArgs {
    /// Mesh depth (overrides the config file)
    #[arg(long)]
    pub depth: Option<u8>,
}

#[derive(Parser)]
#[command(allow_negative_numbers = true)]
pub struct LocateArgs {
    /// Right ascension in degrees
    pub ra: f64,

    /// Declination in degrees
    pub dec: f64,

    /// Mesh depth (overrides the config file)
    #[arg(long)]
    pub depth: Option<u8>,
}

#[derive(Parser)]
#[command(allow_negative_numbers = true)]
pub struct ImportArgs {
    /// CSV file with columns id,ra_deg,dec_deg,attr[,secondary]
    #[arg(long)]
    pub input: PathBuf,

    /// Directory the table is saved to
    #[arg(long)]
    pub dir: PathBuf,

    /// Table name
    #[arg(long)]
    pub name: String,

    /// Mesh depth (overrides the config file)
    #[arg(long)]
    pub depth: Option<u8>,

    /// Keep cells in decreasing attribute order (sizes rather than magnitudes)
    #[arg(long)]
    pub descending: bool,

    /// Treat the id column as a designation instead of a number
    #[arg(long)]
    pub designations: bool,

    /// Declared lower attribute bound; rows below it are skipped
    #[arg(long, requires = "max")]
    pub min: Option<f32>,

    /// Declared upper attribute bound; rows above it are skipped
    #[arg(long, requires = "min")]
    pub max: Option<f32>,
}

#[derive(Parser)]
#[command(allow_negative_numbers = true)]
pub struct SearchArgs {
    /// Directory holding the saved table
    #[arg(long)]
    pub dir: PathBuf,

    /// Table name
    #[arg(long)]
    pub name: String,

    /// Right ascension in degrees
    pub ra: f64,

    /// Declination in degrees
    pub dec: f64,

    /// Search radius in degrees
    #[arg(long, default_value = "1.0")]
    pub radius: f64,

    /// Minimum attribute
    #[arg(long)]
    pub attr_min: Option<f32>,

    /// Maximum attribute
    #[arg(long)]
    pub attr_max: Option<f32>,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser)]
#[command(allow_negative_numbers = true)]
pub struct NearestArgs {
    /// Directory holding the saved table
    #[arg(long)]
    pub dir: PathBuf,

    /// Table name
    #[arg(long)]
    pub name: String,

    /// Right ascension in degrees
    pub ra: f64,

    /// Declination in degrees
    pub dec: f64,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_southern_positions_parse() {
        let cli = Cli::try_parse_from([
            "htm", "nearest", "--dir", "/tmp/tables", "--name", "t", "199", "-41",
        ])
        .unwrap();
        let Commands::Nearest(args) = cli.command else {
            panic!("expected nearest");
        };
        assert_eq!((args.ra, args.dec), (199.0, -41.0));

        let cli = Cli::try_parse_from(["htm", "locate", "10", "-20", "--depth", "2"]).unwrap();
        let Commands::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!((args.ra, args.dec, args.depth), (10.0, -20.0, Some(2)));
    }

    #[test]
    fn test_search_flags_after_negative_position() {
        let cli = Cli::try_parse_from([
            "htm", "search", "--dir", "d", "--name", "t", "83.8", "-5.4", "--radius", "0.5",
            "--attr-min", "-1.5", "--limit", "3", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!((args.ra, args.dec, args.radius), (83.8, -5.4, 0.5));
        assert_eq!(args.attr_min, Some(-1.5));
        assert_eq!(args.limit, Some(3));
        assert!(matches!(args.format, OutputFormat::Json));
    }
}
