//! On-disk table storage.
//!
//! A saved table is two files in one directory:
//!
//! - `<name>.schema`: the packed header from [`schema`], carrying the depth
//!   map and histogram
//! - `<name>.objects`: the preorder block stream from [`objects`]
//!
//! Both are native endian, so they load only on machines of the same byte
//! order. Loading replays blocks straight into their trixels, so a table
//! must be loaded into a mesh of the depth it was saved from.

pub mod objects;
pub mod schema;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::validate_table_name;
use crate::error::{HtmError, HtmResult};
use crate::mesh::Mesh;
use crate::table::{Table, KEY_BYTES};

pub use objects::{read_objects, write_objects, StoreStats};
pub use schema::TableSchema;

/// Key, RA and Dec (`f64`), attribute and secondary (`f32`).
pub const RECORD_HEADER_BYTES: usize = KEY_BYTES + 8 + 8 + 4 + 4;

/// `u32` trixel id and `u32` object count ahead of each block.
pub const BLOCK_HEADER_BYTES: usize = 8;

pub fn schema_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.schema"))
}

pub fn objects_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.objects"))
}

/// Writes `table` under `dir`, creating the directory if needed.
pub fn save_table(mesh: &Mesh, table: &Table, dir: &Path) -> HtmResult<StoreStats> {
    fs::create_dir_all(dir)?;
    let schema = TableSchema::from_table(table)?;

    let schema_file = schema_path(dir, table.name());
    fs::write(&schema_file, schema.to_bytes()?)?;

    let objects_file = objects_path(dir, table.name());
    let mut w = BufWriter::new(File::create(&objects_file)?);
    let stats = write_objects(&mut w, mesh, table)?;
    w.flush()?;

    info!(
        table = %table.name(),
        path = %objects_file.display(),
        objects = stats.objects,
        blocks = stats.blocks,
        "saved table"
    );
    Ok(stats)
}

/// Reads just the schema of a saved table.
pub fn read_schema(dir: &Path, name: &str) -> HtmResult<TableSchema> {
    validate_table_name(name)?;
    let bytes = fs::read(schema_path(dir, name))?;
    TableSchema::from_bytes(&bytes)
}

/// Loads the table `name` saved under `dir` into `mesh`.
///
/// # Errors
/// [`HtmError::Format`] if the schema's depth differs from the mesh or the
/// object file does not hold the number of objects the schema declares.
pub fn load_table(mesh: &Mesh, dir: &Path, name: &str) -> HtmResult<Table> {
    let schema = read_schema(dir, name)?;
    if schema.max_depth != mesh.depth() {
        return Err(HtmError::format(format!(
            "table '{name}' was saved from a depth {} mesh, loading into depth {}",
            schema.max_depth,
            mesh.depth()
        )));
    }
    let expected = schema.object_count as usize;

    let mut table = schema.into_table(mesh, name)?;
    let stats = read_objects(&objects_path(dir, name), mesh, &mut table)?;
    if stats.objects != expected {
        return Err(HtmError::format(format!(
            "table '{name}' declares {expected} objects, object file holds {}",
            stats.objects
        )));
    }

    info!(table = %name, objects = stats.objects, blocks = stats.blocks, "loaded table");
    Ok(table)
}
