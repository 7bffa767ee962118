//! Catalog tables: object records bucketed into per-trixel lists.
//!
//! A [`Table`] keeps, for every populated trixel of its mesh, the objects
//! whose home is that trixel at the depth their attribute maps to. Lists
//! stay sorted by attribute (ascending or descending per the table's
//! [`SortOrder`]), so the head of every cell is its brightest or largest
//! object.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::config::{KeyKind, SortOrder, TableSpec};
use crate::depth::{DepthMap, Histogram};
use crate::error::{HtmError, HtmResult};
use crate::geometry::validate_position;
use crate::mesh::{Mesh, TrixelId, TrixelIndex};

/// Bytes reserved for the primary key at the start of every record.
pub const KEY_BYTES: usize = 16;

/// Primary key of a catalog object. Both forms share the same 16 bytes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectKey {
    Id(u64),
    Designation(String),
}

impl ObjectKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Id(_) => KeyKind::Id,
            Self::Designation(_) => KeyKind::Designation,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Designation(name) => f.write_str(name),
        }
    }
}

/// One catalog entry. Positions are in radians.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatalogObject {
    pub key: ObjectKey,
    pub ra: f64,
    pub dec: f64,
    /// Attribute the table is bucketed and sorted on, e.g. magnitude.
    pub attribute: f32,
    /// Second scalar, e.g. angular size.
    pub secondary: f32,
    /// Table-specific field bytes following the record header.
    pub extra: Vec<u8>,
}

impl CatalogObject {
    pub fn new(key: ObjectKey, ra: f64, dec: f64, attribute: f32) -> Self {
        Self {
            key,
            ra,
            dec,
            attribute,
            secondary: 0.0,
            extra: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, secondary: f32) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_extra(mut self, extra: Vec<u8>) -> Self {
        self.extra = extra;
        self
    }
}

/// Outcome of [`Table::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Table {
    spec: TableSpec,
    mesh_depth: u8,
    histogram: Option<Histogram>,
    depth_map: Option<DepthMap>,
    cells: HashMap<TrixelIndex, Vec<CatalogObject>>,
    object_count: usize,
}

impl Table {
    /// An empty table bound to `mesh`. It has no depth map until
    /// [`Table::import`] or [`Table::set_depth_map`] provides one.
    pub fn new(mesh: &Mesh, spec: TableSpec) -> HtmResult<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            mesh_depth: mesh.depth(),
            histogram: None,
            depth_map: None,
            cells: HashMap::new(),
            object_count: 0,
        })
    }

    pub(crate) fn restore(
        mesh: &Mesh,
        spec: TableSpec,
        histogram: Histogram,
        depth_map: DepthMap,
    ) -> HtmResult<Self> {
        let mut table = Self::new(mesh, spec)?;
        table.set_depth_map(depth_map)?;
        table.histogram = Some(histogram);
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    /// Depth of the mesh this table was opened against.
    pub fn mesh_depth(&self) -> u8 {
        self.mesh_depth
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    pub fn depth_map(&self) -> HtmResult<&DepthMap> {
        self.depth_map.as_ref().ok_or_else(|| {
            HtmError::unmappable_depth(format!("table '{}' has no depth map", self.spec.name))
        })
    }

    /// Installs an externally computed depth map on an empty table.
    pub fn set_depth_map(&mut self, depth_map: DepthMap) -> HtmResult<()> {
        if self.object_count > 0 {
            return Err(HtmError::invalid_parameter(format!(
                "table '{}' already holds objects",
                self.spec.name
            )));
        }
        if depth_map.max_depth() > self.mesh_depth {
            return Err(HtmError::depth_out_of_range(
                depth_map.max_depth(),
                self.mesh_depth,
            ));
        }
        self.depth_map = Some(depth_map);
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.object_count
    }

    pub fn is_empty(&self) -> bool {
        self.object_count == 0
    }

    /// Objects resident at `trixel`, head first.
    pub fn cell(&self, trixel: TrixelIndex) -> &[CatalogObject] {
        self.cells.get(&trixel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty cells in arbitrary order.
    pub fn populated_cells(&self) -> impl Iterator<Item = (TrixelIndex, &[CatalogObject])> {
        self.cells
            .iter()
            .filter(|(_, objects)| !objects.is_empty())
            .map(|(&trixel, objects)| (trixel, objects.as_slice()))
    }

    pub fn objects(&self) -> impl Iterator<Item = &CatalogObject> {
        self.cells.values().flatten()
    }

    /// Bulk-loads an empty table.
    ///
    /// Rows with a non-finite attribute, an invalid position, a key of the
    /// wrong kind, an oversized record or (when the table spec declares bounds) an
    /// out-of-range attribute are skipped. The attribute range of the
    /// remaining rows, or the declared bounds, seed the histogram and depth
    /// map before every row is inserted.
    pub fn import<I>(&mut self, mesh: &Mesh, rows: I) -> HtmResult<ImportReport>
    where
        I: IntoIterator<Item = CatalogObject>,
    {
        self.check_mesh(mesh)?;
        if self.object_count > 0 {
            return Err(HtmError::invalid_parameter(format!(
                "table '{}' already holds objects",
                self.spec.name
            )));
        }

        let mut report = ImportReport::default();
        let mut accepted = Vec::new();
        for row in rows {
            match self.screen(&row) {
                Ok(()) => accepted.push(row),
                Err(err) => {
                    debug!(key = %row.key, %err, "skipping import row");
                    report.skipped += 1;
                }
            }
        }

        let (min, max) = match self.spec.bounds {
            Some(bounds) => bounds,
            None => attribute_range(&accepted).ok_or_else(|| {
                HtmError::invalid_parameter(format!(
                    "import into '{}' has no usable rows",
                    self.spec.name
                ))
            })?,
        };

        let values: Vec<f32> = accepted.iter().map(|o| o.attribute).collect();
        let histogram = Histogram::from_values(&values, min, max)?;
        self.depth_map = Some(DepthMap::from_histogram(&histogram, mesh.depth()));
        self.histogram = Some(histogram);

        for object in accepted {
            self.insert(mesh, object)?;
            report.imported += 1;
        }

        if report.skipped > 0 {
            warn!(
                table = %self.spec.name,
                skipped = report.skipped,
                "import skipped unusable rows"
            );
        }
        info!(
            table = %self.spec.name,
            imported = report.imported,
            cells = self.cells.len(),
            min,
            max,
            "imported table"
        );
        Ok(report)
    }

    /// Places one object using the current depth map.
    ///
    /// Ascending tables store the object at the shallowest depth its
    /// attribute maps to and keep each cell in increasing attribute order;
    /// descending tables use the deepest depth and decreasing order. Equal
    /// attributes are inserted ahead of existing ones.
    pub fn insert(&mut self, mesh: &Mesh, object: CatalogObject) -> HtmResult<TrixelIndex> {
        self.check_mesh(mesh)?;
        self.check_record(&object)?;

        let map = self.depth_map()?;
        let depth = match self.spec.sort {
            SortOrder::Ascending => map.depth_for_min(object.attribute)?,
            SortOrder::Descending => map.depth_for_max(object.attribute)?,
        };
        let trixel = mesh.home_trixel(object.ra, object.dec, depth)?;

        let sort = self.spec.sort;
        let cell = self.cells.entry(trixel).or_default();
        let at = match sort {
            SortOrder::Ascending => cell.partition_point(|o| o.attribute < object.attribute),
            SortOrder::Descending => cell.partition_point(|o| o.attribute > object.attribute),
        };
        trace!(key = %object.key, depth, trixel = %mesh.trixel(trixel).id(), at, "insert");
        cell.insert(at, object);
        self.object_count += 1;
        Ok(trixel)
    }

    /// Appends an already ordered block of objects to the trixel named by `id`.
    pub fn insert_block(
        &mut self,
        mesh: &Mesh,
        id: TrixelId,
        objects: Vec<CatalogObject>,
    ) -> HtmResult<TrixelIndex> {
        self.check_mesh(mesh)?;
        let trixel = mesh.trixel_by_id(id)?;
        for object in &objects {
            self.check_record(object)?;
        }
        self.object_count += objects.len();
        self.cells.entry(trixel).or_default().extend(objects);
        Ok(trixel)
    }

    fn check_mesh(&self, mesh: &Mesh) -> HtmResult<()> {
        if mesh.depth() != self.mesh_depth {
            return Err(HtmError::invalid_parameter(format!(
                "table '{}' is bound to a depth {} mesh, got depth {}",
                self.spec.name,
                self.mesh_depth,
                mesh.depth()
            )));
        }
        Ok(())
    }

    fn check_record(&self, object: &CatalogObject) -> HtmResult<()> {
        if object.key.kind() != self.spec.key_kind {
            return Err(HtmError::invalid_parameter(format!(
                "key {} is not a {:?} key",
                object.key, self.spec.key_kind
            )));
        }
        if let ObjectKey::Designation(name) = &object.key {
            if name.len() > KEY_BYTES {
                return Err(HtmError::invalid_parameter(format!(
                    "designation '{name}' is longer than {KEY_BYTES} bytes"
                )));
            }
        }
        if object.extra.len() > self.spec.extra_bytes() {
            return Err(HtmError::invalid_parameter(format!(
                "object {} carries {} field bytes, record allows {}",
                object.key,
                object.extra.len(),
                self.spec.extra_bytes()
            )));
        }
        Ok(())
    }

    fn screen(&self, object: &CatalogObject) -> HtmResult<()> {
        if !object.attribute.is_finite() {
            return Err(HtmError::invalid_parameter("attribute is not a number"));
        }
        validate_position(object.ra, object.dec)?;
        self.check_record(object)?;
        if let Some((min, max)) = self.spec.bounds {
            if object.attribute < min || object.attribute > max {
                return Err(HtmError::attribute_out_of_range(object.attribute, min, max));
            }
        }
        Ok(())
    }
}

fn attribute_range(objects: &[CatalogObject]) -> Option<(f32, f32)> {
    objects.iter().fold(None, |range, o| match range {
        None => Some((o.attribute, o.attribute)),
        Some((min, max)) => Some((min.min(o.attribute), max.max(o.attribute))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeshConfig;
    use crate::depth::DepthRange;

    fn mesh() -> Mesh {
        Mesh::new(&MeshConfig::new(4, 2)).unwrap()
    }

    fn star(id: u64, ra: f64, dec: f64, mag: f32) -> CatalogObject {
        CatalogObject::new(ObjectKey::Id(id), ra, dec, mag)
    }

    fn flat_map(max_depth: u8) -> DepthMap {
        DepthMap::from_tiers(
            (0..=max_depth)
                .map(|d| DepthRange {
                    min: d as f32,
                    max: d as f32 + 1.0,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_import_places_every_row() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        let rows: Vec<_> = (0..200)
            .map(|i| star(i, (i as f64 * 0.031) % 6.28, -1.2 + (i as f64 * 0.011), (i % 13) as f32))
            .collect();

        let report = table.import(&m, rows).unwrap();
        assert_eq!(report, ImportReport { imported: 200, skipped: 0 });
        assert_eq!(table.object_count(), 200);
        assert_eq!(table.objects().count(), 200);

        let map = table.depth_map().unwrap();
        assert_eq!(map.min_value(), 0.0);
        assert_eq!(map.max_value(), 12.0);
        for (trixel, objects) in table.populated_cells() {
            let depth = m.trixel(trixel).depth();
            for o in objects {
                assert_eq!(map.depth_for_min(o.attribute).unwrap(), depth);
            }
        }
    }

    #[test]
    fn test_import_skips_bad_rows() {
        let m = mesh();
        let spec = TableSpec::new("stars").with_bounds(0.0, 10.0);
        let mut table = Table::new(&m, spec).unwrap();
        let rows = vec![
            star(1, 1.0, 0.2, 4.0),
            star(2, 7.0, 0.2, 4.0),
            star(3, 1.0, 0.2, f32::NAN),
            star(4, 1.0, 0.2, 11.0),
            CatalogObject::new(ObjectKey::Designation("M31".into()), 0.2, 0.7, 3.4),
        ];
        let report = table.import(&m, rows).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 4);
    }

    #[test]
    fn test_import_needs_rows_or_bounds() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("empty")).unwrap();
        assert!(table.import(&m, Vec::new()).is_err());

        let mut bounded = Table::new(&m, TableSpec::new("empty").with_bounds(0.0, 1.0)).unwrap();
        assert_eq!(bounded.import(&m, Vec::new()).unwrap().imported, 0);
        assert!(bounded.depth_map().is_ok());
    }

    #[test]
    fn test_ascending_cells_are_sorted() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        table.set_depth_map(flat_map(4)).unwrap();
        for (i, mag) in [2.5f32, 2.1, 2.9, 2.1, 2.2].into_iter().enumerate() {
            table.insert(&m, star(i as u64, 1.0, 0.3, mag)).unwrap();
        }
        let t = m.home_trixel(1.0, 0.3, 2).unwrap();
        let mags: Vec<f32> = table.cell(t).iter().map(|o| o.attribute).collect();
        assert_eq!(mags, vec![2.1, 2.1, 2.2, 2.5, 2.9]);
        // the later 2.1 goes ahead of the earlier one
        assert_eq!(table.cell(t)[0].key, ObjectKey::Id(3));
    }

    #[test]
    fn test_descending_cells_are_sorted_at_inner_depth() {
        let m = mesh();
        let spec = TableSpec::new("galaxies").with_sort(SortOrder::Descending);
        let mut table = Table::new(&m, spec).unwrap();
        table.set_depth_map(flat_map(4)).unwrap();

        // 3.0 sits on the 2|3 boundary and goes to the finer tier
        let t = table.insert(&m, star(1, 2.0, -0.4, 3.0)).unwrap();
        assert_eq!(m.trixel(t).depth(), 3);
        table.insert(&m, star(2, 2.0, -0.4, 3.7)).unwrap();
        table.insert(&m, star(3, 2.0, -0.4, 3.2)).unwrap();

        let sizes: Vec<f32> = table.cell(t).iter().map(|o| o.attribute).collect();
        assert_eq!(sizes, vec![3.7, 3.2, 3.0]);
    }

    #[test]
    fn test_insert_rejects_out_of_range_attribute() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        table.set_depth_map(flat_map(4)).unwrap();
        let err = table.insert(&m, star(1, 1.0, 0.0, 9.0)).unwrap_err();
        assert!(matches!(err, HtmError::AttributeOutOfRange { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_without_depth_map_fails() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        let err = table.insert(&m, star(1, 1.0, 0.0, 1.0)).unwrap_err();
        assert!(err.to_string().contains("no depth map"));
    }

    #[test]
    fn test_table_is_bound_to_its_mesh() {
        let m = mesh();
        let other = Mesh::new(&MeshConfig::new(2, 1)).unwrap();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        table.set_depth_map(flat_map(2)).unwrap();
        assert!(table.insert(&other, star(1, 1.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_depth_map_deeper_than_mesh_rejected() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        assert!(table.set_depth_map(flat_map(6)).is_err());
    }

    #[test]
    fn test_insert_block_uses_trixel_id() {
        let m = mesh();
        let mut table = Table::new(&m, TableSpec::new("stars")).unwrap();
        let target = m.level(3).nth(17).unwrap();
        let id = m.trixel(target).id();

        let placed = table
            .insert_block(&m, id, vec![star(1, 0.0, 0.0, 1.0), star(2, 0.0, 0.0, 2.0)])
            .unwrap();
        assert_eq!(placed, target);
        assert_eq!(table.cell(target).len(), 2);
        assert_eq!(table.object_count(), 2);
    }

    #[test]
    fn test_designation_keys() {
        let m = mesh();
        let spec = TableSpec::new("ngc").with_key_kind(KeyKind::Designation);
        let mut table = Table::new(&m, spec).unwrap();
        table.set_depth_map(flat_map(4)).unwrap();

        let ok = CatalogObject::new(ObjectKey::Designation("NGC 224".into()), 0.19, 0.72, 3.4);
        assert!(table.insert(&m, ok).is_ok());

        let long = CatalogObject::new(
            ObjectKey::Designation("a designation that is too long".into()),
            0.19,
            0.72,
            3.4,
        );
        assert!(table.insert(&m, long).is_err());
        assert!(table.insert(&m, star(5, 0.19, 0.72, 3.4)).is_err());
    }
}
