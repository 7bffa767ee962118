use anyhow::Result;
use celestial_htm::store::read_schema;
use celestial_htm::{cone_search, CatalogObject, ConeSearchParams, Database, MeshConfig};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::cli::{Cli, NearestArgs, OutputFormat, SearchArgs};

pub fn run_search(args: &SearchArgs, cli: &Cli) -> Result<()> {
    let db = open(cli, &args.dir, &args.name)?;
    let Some(table) = db.find_table(&args.name) else {
        anyhow::bail!("Table '{}' did not load", args.name);
    };
    let (ra, dec) = crate::position(args.ra, args.dec)?;

    let mut params = ConeSearchParams::new(ra, dec, args.radius.to_radians());
    params.attr_min = args.attr_min;
    params.attr_max = args.attr_max;
    params.max_results = args.limit;

    let start = Instant::now();
    let mut set = db.object_set(table)?;
    let matches = cone_search(&mut set, &params)?;
    debug!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        trixels = set.trixels().len(),
        candidates = set.object_count(),
        "cone search"
    );

    let rows: Vec<Row> = matches
        .iter()
        .map(|m| Row::new(m.object, m.separation))
        .collect();
    print_rows(&rows, args.format)
}

pub fn run_nearest(args: &NearestArgs, cli: &Cli) -> Result<()> {
    let db = open(cli, &args.dir, &args.name)?;
    let Some(table) = db.find_table(&args.name) else {
        anyhow::bail!("Table '{}' did not load", args.name);
    };
    let (ra, dec) = crate::position(args.ra, args.dec)?;

    let mut set = db.object_set(table)?;
    let rows: Vec<Row> = set
        .nearest_to_position(ra, dec)?
        .map(|n| Row::new(n.object, n.separation))
        .into_iter()
        .collect();
    print_rows(&rows, args.format)
}

/// A database holding just the saved table, on a mesh of the depth it was
/// saved from.
fn open(cli: &Cli, dir: &Path, name: &str) -> Result<Database> {
    let schema = read_schema(dir, name)?;
    let config = crate::mesh_config(cli, Some(schema.max_depth))?;
    let mut db = Database::new(&MeshConfig::new(config.depth, 1))?;
    db.load_table(dir, name)?;
    Ok(db)
}

#[derive(serde::Serialize)]
struct Row {
    key: String,
    ra_deg: f64,
    dec_deg: f64,
    attribute: f32,
    secondary: f32,
    distance_deg: f64,
}

impl Row {
    fn new(object: &CatalogObject, separation: f64) -> Self {
        Self {
            key: object.key.to_string(),
            ra_deg: object.ra.to_degrees(),
            dec_deg: object.dec.to_degrees(),
            attribute: object.attribute,
            secondary: object.secondary,
            distance_deg: separation.to_degrees(),
        }
    }
}

fn print_rows(rows: &[Row], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Csv => print_csv(rows),
    }
    Ok(())
}

fn print_table(rows: &[Row]) {
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:4}: {:>20} RA={:.6}° Dec={:+.6}° Attr={:6.2} Dist={:.4}°",
            i + 1,
            row.key,
            row.ra_deg,
            row.dec_deg,
            row.attribute,
            row.distance_deg
        );
    }

    if rows.is_empty() {
        println!("No objects found matching the search criteria.");
    } else {
        println!("\nTotal results: {}", rows.len());
    }
}

fn print_csv(rows: &[Row]) {
    println!("key,ra_deg,dec_deg,attribute,secondary,distance_deg");
    for row in rows {
        println!(
            "{},{},{},{},{},{}",
            row.key, row.ra_deg, row.dec_deg, row.attribute, row.secondary, row.distance_deg
        );
    }
}
