//! Object records and the preorder block stream.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use tracing::{debug, trace};

use super::{BLOCK_HEADER_BYTES, RECORD_HEADER_BYTES};
use crate::config::KeyKind;
use crate::error::{HtmError, HtmResult};
use crate::mesh::{Mesh, TrixelId};
use crate::table::{CatalogObject, ObjectKey, Table, KEY_BYTES};

/// Totals for one written or replayed object stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub blocks: usize,
    pub objects: usize,
    pub bytes: u64,
}

/// Writes one fixed-size record: key, position, attributes, then the
/// object's field bytes zero-padded to `object_bytes`.
pub fn encode_object<W: Write>(
    w: &mut W,
    object: &CatalogObject,
    object_bytes: usize,
) -> HtmResult<()> {
    let mut key = [0u8; KEY_BYTES];
    match &object.key {
        ObjectKey::Id(id) => NativeEndian::write_u64(&mut key[..8], *id),
        ObjectKey::Designation(name) => {
            let name = name.as_bytes();
            if name.len() > KEY_BYTES {
                return Err(HtmError::format(format!(
                    "designation of {} bytes overflows the key",
                    name.len()
                )));
            }
            key[..name.len()].copy_from_slice(name);
        }
    }

    let tail = object_bytes.saturating_sub(RECORD_HEADER_BYTES);
    if object.extra.len() > tail {
        return Err(HtmError::format(format!(
            "object {} has {} field bytes, record holds {}",
            object.key,
            object.extra.len(),
            tail
        )));
    }

    w.write_all(&key)?;
    w.write_f64::<NativeEndian>(object.ra)?;
    w.write_f64::<NativeEndian>(object.dec)?;
    w.write_f32::<NativeEndian>(object.attribute)?;
    w.write_f32::<NativeEndian>(object.secondary)?;
    w.write_all(&object.extra)?;
    w.write_all(&vec![0u8; tail - object.extra.len()])?;
    Ok(())
}

/// Reads one record. The field bytes come back at their full record width.
pub fn decode_object(record: &[u8], key_kind: KeyKind) -> HtmResult<CatalogObject> {
    if record.len() < RECORD_HEADER_BYTES {
        return Err(HtmError::format(format!(
            "record of {} bytes is shorter than its {} byte header",
            record.len(),
            RECORD_HEADER_BYTES
        )));
    }

    let raw_key = &record[..KEY_BYTES];
    let key = match key_kind {
        KeyKind::Id => ObjectKey::Id(NativeEndian::read_u64(&raw_key[..8])),
        KeyKind::Designation => {
            let end = raw_key.iter().position(|&b| b == 0).unwrap_or(KEY_BYTES);
            let name = std::str::from_utf8(&raw_key[..end])
                .map_err(|_| HtmError::format("designation is not UTF-8"))?;
            ObjectKey::Designation(name.to_string())
        }
    };

    let mut header = &record[KEY_BYTES..RECORD_HEADER_BYTES];
    let ra = header.read_f64::<NativeEndian>()?;
    let dec = header.read_f64::<NativeEndian>()?;
    let attribute = header.read_f32::<NativeEndian>()?;
    let secondary = header.read_f32::<NativeEndian>()?;

    Ok(CatalogObject {
        key,
        ra,
        dec,
        attribute,
        secondary,
        extra: record[RECORD_HEADER_BYTES..].to_vec(),
    })
}

/// Writes every populated cell of `table` as a `{u32 id, u32 count}` block
/// followed by its records, visiting trixels in mesh preorder.
pub fn write_objects<W: Write>(w: &mut W, mesh: &Mesh, table: &Table) -> HtmResult<StoreStats> {
    let object_bytes = table.spec().object_bytes as usize;
    let mut stats = StoreStats::default();

    for trixel in mesh.preorder() {
        let objects = table.cell(trixel);
        if objects.is_empty() {
            continue;
        }
        let count = u32::try_from(objects.len())
            .map_err(|_| HtmError::format(format!("{} objects in one cell", objects.len())))?;
        let id = mesh.trixel(trixel).id();

        w.write_u32::<NativeEndian>(id.raw())?;
        w.write_u32::<NativeEndian>(count)?;
        for object in objects {
            encode_object(w, object, object_bytes)?;
        }
        trace!(trixel = %id, count, "wrote block");

        stats.blocks += 1;
        stats.objects += objects.len();
        stats.bytes += (BLOCK_HEADER_BYTES + objects.len() * object_bytes) as u64;
    }

    debug!(
        table = %table.name(),
        blocks = stats.blocks,
        objects = stats.objects,
        bytes = stats.bytes,
        "wrote object blocks"
    );
    Ok(stats)
}

/// Memory-maps an object file and replays its blocks into `table`.
pub fn read_objects(path: &Path, mesh: &Mesh, table: &mut Table) -> HtmResult<StoreStats> {
    let file = File::open(path)?;
    // mapping an empty file fails on some platforms
    if file.metadata()?.len() == 0 {
        return Ok(StoreStats::default());
    }
    let mmap = unsafe { Mmap::map(&file)? };
    replay_blocks(&mmap, mesh, table)
}

/// Replays a block stream into `table` without re-sorting.
pub fn replay_blocks(bytes: &[u8], mesh: &Mesh, table: &mut Table) -> HtmResult<StoreStats> {
    let object_bytes = table.spec().object_bytes as usize;
    let key_kind = table.spec().key_kind;
    let mut stats = StoreStats {
        bytes: bytes.len() as u64,
        ..StoreStats::default()
    };

    let mut cursor = bytes;
    while !cursor.is_empty() {
        if cursor.len() < BLOCK_HEADER_BYTES {
            return Err(HtmError::format(format!(
                "{} trailing bytes after block {}",
                cursor.len(),
                stats.blocks
            )));
        }
        let id = TrixelId::from_raw(cursor.read_u32::<NativeEndian>()?);
        let count = cursor.read_u32::<NativeEndian>()? as usize;

        let len = count
            .checked_mul(object_bytes)
            .filter(|&len| len <= cursor.len())
            .ok_or_else(|| {
                HtmError::format(format!(
                    "block {id} claims {count} objects but {} bytes remain",
                    cursor.len()
                ))
            })?;
        let (records, rest) = cursor.split_at(len);

        let objects = records
            .chunks_exact(object_bytes)
            .map(|record| decode_object(record, key_kind))
            .collect::<HtmResult<Vec<_>>>()?;
        table.insert_block(mesh, id, objects)?;

        stats.blocks += 1;
        stats.objects += count;
        cursor = rest;
    }

    debug!(
        table = %table.name(),
        blocks = stats.blocks,
        objects = stats.objects,
        "replayed object blocks"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, MeshConfig, TableSpec};

    #[test]
    fn test_record_layout() {
        let object = CatalogObject::new(ObjectKey::Id(0xDEAD_BEEF), 1.25, -0.5, 7.5)
            .with_secondary(0.25);
        let mut bytes = Vec::new();
        encode_object(&mut bytes, &object, RECORD_HEADER_BYTES).unwrap();

        assert_eq!(bytes.len(), 40);
        assert_eq!(NativeEndian::read_u64(&bytes[0..8]), 0xDEAD_BEEF);
        assert!(bytes[8..16].iter().all(|&b| b == 0));
        assert_eq!(NativeEndian::read_f64(&bytes[16..24]), 1.25);
        assert_eq!(NativeEndian::read_f64(&bytes[24..32]), -0.5);
        assert_eq!(NativeEndian::read_f32(&bytes[32..36]), 7.5);
        assert_eq!(NativeEndian::read_f32(&bytes[36..40]), 0.25);

        assert_eq!(decode_object(&bytes, KeyKind::Id).unwrap(), object);
    }

    #[test]
    fn test_designation_and_field_bytes() {
        let object = CatalogObject::new(ObjectKey::Designation("NGC 7000".into()), 5.5, 0.77, 4.0)
            .with_extra(vec![1, 2, 3]);
        let mut bytes = Vec::new();
        encode_object(&mut bytes, &object, RECORD_HEADER_BYTES + 8).unwrap();
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[..8], b"NGC 7000");

        let decoded = decode_object(&bytes, KeyKind::Designation).unwrap();
        assert_eq!(decoded.key, object.key);
        assert_eq!(decoded.extra, vec![1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_fields_rejected() {
        let object = CatalogObject::new(ObjectKey::Id(1), 0.0, 0.0, 0.0).with_extra(vec![0; 9]);
        let mut bytes = Vec::new();
        assert!(encode_object(&mut bytes, &object, RECORD_HEADER_BYTES + 8).is_err());
    }

    #[test]
    fn test_blocks_follow_preorder_and_skip_empty_cells() {
        let mesh = Mesh::new(&MeshConfig::new(3, 1)).unwrap();
        let spec = TableSpec::new("stars").with_field("BV", FieldKind::Float, 4);
        let mut table = Table::new(&mesh, spec).unwrap();
        let rows = (0..30u64).map(|i| {
            CatalogObject::new(ObjectKey::Id(i), i as f64 * 0.2, 0.3 - i as f64 * 0.02, i as f32)
                .with_extra(vec![i as u8; 4])
        });
        table.import(&mesh, rows).unwrap();

        let mut bytes = Vec::new();
        let stats = write_objects(&mut bytes, &mesh, &table).unwrap();
        assert_eq!(stats.objects, 30);
        assert_eq!(stats.bytes, bytes.len() as u64);
        assert_eq!(stats.blocks, table.populated_cells().count());

        // block ids appear in preorder
        let order: Vec<TrixelId> = mesh
            .preorder()
            .filter(|&t| !table.cell(t).is_empty())
            .map(|t| mesh.trixel(t).id())
            .collect();
        let mut cursor = bytes.as_slice();
        let mut seen = Vec::new();
        while !cursor.is_empty() {
            let id = cursor.read_u32::<NativeEndian>().unwrap();
            let count = cursor.read_u32::<NativeEndian>().unwrap() as usize;
            assert!(count > 0);
            seen.push(TrixelId::from_raw(id));
            cursor = &cursor[count * 44..];
        }
        assert_eq!(seen, order);

        let mut restored = Table::new(&mesh, table.spec().clone()).unwrap();
        let replayed = replay_blocks(&bytes, &mesh, &mut restored).unwrap();
        assert_eq!(replayed.objects, 30);
        for (trixel, objects) in table.populated_cells() {
            assert_eq!(restored.cell(trixel), objects);
        }
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let mesh = Mesh::new(&MeshConfig::new(2, 1)).unwrap();
        let mut table = Table::new(&mesh, TableSpec::new("stars")).unwrap();
        table
            .import(&mesh, vec![CatalogObject::new(ObjectKey::Id(1), 1.0, 0.1, 3.0)])
            .unwrap();
        let mut bytes = Vec::new();
        write_objects(&mut bytes, &mesh, &table).unwrap();

        let mut restored = Table::new(&mesh, TableSpec::new("stars")).unwrap();
        let err = replay_blocks(&bytes[..bytes.len() - 1], &mesh, &mut restored).unwrap_err();
        assert!(matches!(err, HtmError::Format { .. }));
        assert!(replay_blocks(&bytes[..5], &mesh, &mut restored).is_err());
    }
}
