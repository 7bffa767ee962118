//! The packed table schema header.
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | `i32` version (3) |
//! | 4 | 4 | `i32` endian marker `0x01020304` |
//! | 8 | 4 | `i32` max depth |
//! | 12 | 4 | `i32` object record bytes |
//! | 16 | 4 | `i32` object count |
//! | 20 | 4 | `i32` field count |
//! | 24 | 4 | `i32` flags (bit 0 descending, bit 1 designation keys) |
//! | 28 | 4 | `u32` sort tree root, always 0 |
//! | 32 | 400 | `u32` histogram[100] |
//! | 432 | 800 | `{f32 min, f32 max}` depth[100] |
//!
//! followed by `field count` descriptors of 44 bytes each: a 32 byte
//! NUL-padded symbol, then `u32` offset, size and kind code. All values are
//! native endian.

use std::fmt;

use byteorder::{ByteOrder, NativeEndian};

use crate::config::{FieldDescriptor, FieldKind, KeyKind, SortOrder, TableSpec};
use crate::constants::{HISTOGRAM_DIVS, HTM_MAX_DEPTH};
use crate::depth::{DepthMap, DepthRange, Histogram};
use crate::error::{HtmError, HtmResult};
use crate::mesh::Mesh;
use crate::table::Table;

pub const SCHEMA_VERSION: i32 = 3;
pub const ENDIAN_MARKER: i32 = 0x0102_0304;

/// Depth-map slots reserved in the header regardless of mesh depth.
pub const DEPTH_SLOTS: usize = 100;

const FIXED_FIELDS_BYTES: usize = 32;
const HISTOGRAM_OFFSET: usize = FIXED_FIELDS_BYTES;
const DEPTHS_OFFSET: usize = HISTOGRAM_OFFSET + HISTOGRAM_DIVS * 4;
pub const SCHEMA_HEADER_BYTES: usize = DEPTHS_OFFSET + DEPTH_SLOTS * 8;

const SYMBOL_BYTES: usize = 32;
pub const FIELD_DESCRIPTOR_BYTES: usize = SYMBOL_BYTES + 12;

const FLAG_DESCENDING: i32 = 1;
const FLAG_DESIGNATION: i32 = 1 << 1;

/// Everything needed to rebuild an empty [`Table`] before its objects are
/// replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub max_depth: u8,
    pub object_bytes: u32,
    pub object_count: u32,
    pub sort: SortOrder,
    pub key_kind: KeyKind,
    pub histogram: [u32; HISTOGRAM_DIVS],
    pub depth_tiers: Vec<DepthRange>,
    pub fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    pub fn from_table(table: &Table) -> HtmResult<Self> {
        let map = table.depth_map()?;
        let object_count = u32::try_from(table.object_count()).map_err(|_| {
            HtmError::format(format!(
                "{} objects do not fit the schema header",
                table.object_count()
            ))
        })?;
        // tiers past a shallow depth map are stored empty
        let top = map.max_value();
        let mut depth_tiers = map.tiers().to_vec();
        depth_tiers.resize(
            table.mesh_depth() as usize + 1,
            DepthRange { min: top, max: top },
        );
        let spec = table.spec();
        Ok(Self {
            max_depth: table.mesh_depth(),
            object_bytes: spec.object_bytes,
            object_count,
            sort: spec.sort,
            key_kind: spec.key_kind,
            histogram: table
                .histogram()
                .map_or([0; HISTOGRAM_DIVS], |h| *h.bins()),
            depth_tiers,
            fields: spec.fields.clone(),
        })
    }

    /// Size of the header plus field descriptors.
    pub fn encoded_len(&self) -> usize {
        SCHEMA_HEADER_BYTES + self.fields.len() * FIELD_DESCRIPTOR_BYTES
    }

    pub fn to_bytes(&self) -> HtmResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.encoded_len()];

        let mut flags = 0;
        if self.sort == SortOrder::Descending {
            flags |= FLAG_DESCENDING;
        }
        if self.key_kind == KeyKind::Designation {
            flags |= FLAG_DESIGNATION;
        }

        NativeEndian::write_i32(&mut bytes[0..4], SCHEMA_VERSION);
        NativeEndian::write_i32(&mut bytes[4..8], ENDIAN_MARKER);
        NativeEndian::write_i32(&mut bytes[8..12], i32::from(self.max_depth));
        NativeEndian::write_i32(&mut bytes[12..16], to_i32(self.object_bytes, "object bytes")?);
        NativeEndian::write_i32(&mut bytes[16..20], to_i32(self.object_count, "object count")?);
        NativeEndian::write_i32(&mut bytes[20..24], self.fields.len() as i32);
        NativeEndian::write_i32(&mut bytes[24..28], flags);
        NativeEndian::write_u32(&mut bytes[28..32], 0);

        NativeEndian::write_u32_into(
            &self.histogram,
            &mut bytes[HISTOGRAM_OFFSET..DEPTHS_OFFSET],
        );

        if self.depth_tiers.len() > DEPTH_SLOTS {
            return Err(HtmError::format(format!(
                "{} depth tiers do not fit {} slots",
                self.depth_tiers.len(),
                DEPTH_SLOTS
            )));
        }
        for (slot, tier) in self.depth_tiers.iter().enumerate() {
            let at = DEPTHS_OFFSET + slot * 8;
            NativeEndian::write_f32(&mut bytes[at..at + 4], tier.min);
            NativeEndian::write_f32(&mut bytes[at + 4..at + 8], tier.max);
        }

        for (i, field) in self.fields.iter().enumerate() {
            let at = SCHEMA_HEADER_BYTES + i * FIELD_DESCRIPTOR_BYTES;
            write_symbol(&mut bytes[at..at + SYMBOL_BYTES], &field.symbol)?;
            let at = at + SYMBOL_BYTES;
            NativeEndian::write_u32(&mut bytes[at..at + 4], field.offset);
            NativeEndian::write_u32(&mut bytes[at + 4..at + 8], field.size);
            NativeEndian::write_u32(&mut bytes[at + 8..at + 12], field.kind.code());
        }

        Ok(bytes)
    }

    /// Parses a header and its field descriptors.
    ///
    /// # Errors
    /// [`HtmError::Format`] for a short buffer, a version other than 3, an
    /// endian marker from a machine of the other byte order, or values that
    /// cannot describe a table.
    pub fn from_bytes(bytes: &[u8]) -> HtmResult<Self> {
        if bytes.len() < SCHEMA_HEADER_BYTES {
            return Err(HtmError::format(format!(
                "schema is {} bytes, header needs {}",
                bytes.len(),
                SCHEMA_HEADER_BYTES
            )));
        }

        let version = NativeEndian::read_i32(&bytes[0..4]);
        if version != SCHEMA_VERSION {
            return Err(HtmError::format(format!(
                "unsupported schema version {version}"
            )));
        }
        let marker = NativeEndian::read_i32(&bytes[4..8]);
        if marker == ENDIAN_MARKER.swap_bytes() {
            return Err(HtmError::format(
                "schema was written on a machine of the opposite byte order",
            ));
        }
        if marker != ENDIAN_MARKER {
            return Err(HtmError::format(format!("bad endian marker {marker:#010x}")));
        }

        let max_depth = NativeEndian::read_i32(&bytes[8..12]);
        if !(0..i32::from(HTM_MAX_DEPTH)).contains(&max_depth) {
            return Err(HtmError::format(format!("max depth {max_depth} out of range")));
        }
        let max_depth = max_depth as u8;
        let object_bytes = from_i32(NativeEndian::read_i32(&bytes[12..16]), "object bytes")?;
        let object_count = from_i32(NativeEndian::read_i32(&bytes[16..20]), "object count")?;
        let field_count = from_i32(NativeEndian::read_i32(&bytes[20..24]), "field count")? as usize;
        let flags = NativeEndian::read_i32(&bytes[24..28]);

        let sort = if flags & FLAG_DESCENDING != 0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        let key_kind = if flags & FLAG_DESIGNATION != 0 {
            KeyKind::Designation
        } else {
            KeyKind::Id
        };

        let mut histogram = [0u32; HISTOGRAM_DIVS];
        NativeEndian::read_u32_into(&bytes[HISTOGRAM_OFFSET..DEPTHS_OFFSET], &mut histogram);

        let depth_tiers = (0..=max_depth as usize)
            .map(|slot| {
                let at = DEPTHS_OFFSET + slot * 8;
                DepthRange {
                    min: NativeEndian::read_f32(&bytes[at..at + 4]),
                    max: NativeEndian::read_f32(&bytes[at + 4..at + 8]),
                }
            })
            .collect();

        let needed = SCHEMA_HEADER_BYTES + field_count * FIELD_DESCRIPTOR_BYTES;
        if bytes.len() < needed {
            return Err(HtmError::format(format!(
                "schema declares {field_count} fields but is only {} bytes",
                bytes.len()
            )));
        }
        let fields = (0..field_count)
            .map(|i| {
                let at = SCHEMA_HEADER_BYTES + i * FIELD_DESCRIPTOR_BYTES;
                let symbol = read_symbol(&bytes[at..at + SYMBOL_BYTES])?;
                let at = at + SYMBOL_BYTES;
                let code = NativeEndian::read_u32(&bytes[at + 8..at + 12]);
                let kind = FieldKind::from_code(code).ok_or_else(|| {
                    HtmError::format(format!("field '{symbol}' has unknown kind {code}"))
                })?;
                Ok(FieldDescriptor {
                    symbol,
                    offset: NativeEndian::read_u32(&bytes[at..at + 4]),
                    size: NativeEndian::read_u32(&bytes[at + 4..at + 8]),
                    kind,
                })
            })
            .collect::<HtmResult<Vec<_>>>()?;

        Ok(Self {
            max_depth,
            object_bytes,
            object_count,
            sort,
            key_kind,
            histogram,
            depth_tiers,
            fields,
        })
    }

    /// Rebuilds the empty table this schema describes.
    pub fn into_table(self, mesh: &Mesh, name: &str) -> HtmResult<Table> {
        let depth_map = DepthMap::from_tiers(self.depth_tiers)?;
        let histogram =
            Histogram::from_parts(depth_map.min_value(), depth_map.max_value(), self.histogram)?;
        let spec = TableSpec {
            name: name.to_string(),
            sort: self.sort,
            key_kind: self.key_kind,
            object_bytes: self.object_bytes,
            bounds: None,
            fields: self.fields,
        };
        Table::restore(mesh, spec, histogram, depth_map)
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Max depth: {}", self.max_depth)?;
        writeln!(f, "Record bytes: {}", self.object_bytes)?;
        writeln!(f, "Objects: {}", self.object_count)?;
        writeln!(f, "Sort: {:?}", self.sort)?;
        writeln!(f, "Key: {:?}", self.key_kind)?;
        for (depth, tier) in self.depth_tiers.iter().enumerate() {
            writeln!(f, "Depth {:>2}: [{}, {}]", depth, tier.min, tier.max)?;
        }
        write!(f, "Fields: {}", self.fields.len())
    }
}

fn to_i32(value: u32, what: &str) -> HtmResult<i32> {
    i32::try_from(value).map_err(|_| HtmError::format(format!("{what} {value} overflows i32")))
}

fn from_i32(value: i32, what: &str) -> HtmResult<u32> {
    u32::try_from(value).map_err(|_| HtmError::format(format!("negative {what} {value}")))
}

fn write_symbol(buf: &mut [u8], symbol: &str) -> HtmResult<()> {
    let bytes = symbol.as_bytes();
    // one byte stays NUL
    if bytes.len() >= buf.len() {
        return Err(HtmError::format(format!(
            "field symbol '{symbol}' is longer than {} bytes",
            buf.len() - 1
        )));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn read_symbol(bytes: &[u8]) -> HtmResult<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(str::to_string)
        .map_err(|_| HtmError::format("field symbol is not UTF-8"))
}
