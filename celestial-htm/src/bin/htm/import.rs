//! CSV import: `id,ra_deg,dec_deg,attr[,secondary]`, one object per line.

use anyhow::{Context, Result};
use celestial_htm::{CatalogObject, Database, KeyKind, ObjectKey, SortOrder, TableSpec};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::{Cli, ImportArgs};

pub fn run(args: &ImportArgs, cli: &Cli) -> Result<()> {
    let config = crate::mesh_config(cli, args.depth)?;

    let mut spec = TableSpec::new(&args.name);
    if args.descending {
        spec = spec.with_sort(SortOrder::Descending);
    }
    if args.designations {
        spec = spec.with_key_kind(KeyKind::Designation);
    }
    if let (Some(min), Some(max)) = (args.min, args.max) {
        spec = spec.with_bounds(min, max);
    }

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open input file: {:?}", args.input))?;
    let (rows, malformed) = read_rows(BufReader::new(file), args.designations)?;
    info!(rows = rows.len(), malformed, input = ?args.input, "parsed catalog");

    let start = Instant::now();
    let mut db = Database::new(&config)?;
    let table = db.open_table(spec)?;
    let report = db.import(table, rows)?;
    let stats = db.save_table(table, &args.dir)?;
    let elapsed = start.elapsed();

    println!("Imported: {}", report.imported);
    println!("Skipped: {}", report.skipped + malformed);
    println!("Blocks written: {}", stats.blocks);
    println!("Bytes written: {}", stats.bytes);
    println!("Elapsed: {:.2} s", elapsed.as_secs_f64());
    Ok(())
}

/// Parses every data line, returning the objects and the number of lines
/// that could not be read. A first line that does not parse is taken as the
/// header.
fn read_rows<R: BufRead>(reader: R, designations: bool) -> Result<(Vec<CatalogObject>, usize)> {
    let mut rows = Vec::new();
    let mut malformed = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_row(line, designations) {
            Some(object) => rows.push(object),
            None if number == 0 => debug!(header = line, "skipping header"),
            None => {
                debug!(line = number + 1, "malformed row");
                malformed += 1;
            }
        }
    }
    Ok((rows, malformed))
}

fn parse_row(line: &str, designations: bool) -> Option<CatalogObject> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return None;
    }

    let key = if designations {
        ObjectKey::Designation(fields[0].to_string())
    } else {
        ObjectKey::Id(fields[0].parse().ok()?)
    };
    let ra_deg: f64 = fields[1].parse().ok()?;
    let dec_deg: f64 = fields[2].parse().ok()?;
    let attribute: f32 = fields[3].parse().ok()?;
    let (ra, dec) = crate::position(ra_deg, dec_deg).ok()?;

    let mut object = CatalogObject::new(key, ra, dec, attribute);
    if let Some(secondary) = fields.get(4).filter(|s| !s.is_empty()) {
        object = object.with_secondary(secondary.parse().ok()?);
    }
    Some(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rows() {
        let csv = "id,ra,dec,mag\n1,10.5,-20.0,5.5\n2,bad,0,1\n\n3,359.0,89.0,12.0,0.4\n";
        let (rows, malformed) = read_rows(csv.as_bytes(), false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(malformed, 1);
        assert_eq!(rows[0].key, ObjectKey::Id(1));
        assert!((rows[0].ra - 10.5_f64.to_radians()).abs() < 1e-12);
        assert_eq!(rows[1].secondary, 0.4);
    }

    #[test]
    fn test_designation_keys() {
        let object = parse_row("M 31, 10.68, 41.27, 3.4", true).unwrap();
        assert_eq!(object.key, ObjectKey::Designation("M 31".into()));
        assert!(parse_row("1,0,95,1", false).is_none());
    }
}
