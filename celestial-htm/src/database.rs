//! A mesh together with the tables opened against it.
//!
//! [`Database`] is the usual entry point: it builds the mesh once, hands out
//! a [`TableHandle`] per open table and lends query sets over them. Imports
//! take `&mut self` and queries take `&self`, so the borrow checker keeps a
//! table's single writer apart from its readers.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::config::{MeshConfig, TableSpec};
use crate::depth::DepthMap;
use crate::error::{HtmError, HtmResult};
use crate::mesh::{Mesh, TrixelId, TrixelIndex};
use crate::query::ObjectSet;
use crate::store::{self, StoreStats};
use crate::table::{CatalogObject, ImportReport, Table};

/// Identifies an open table. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(u32);

impl TableHandle {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

pub struct Database {
    mesh: Mesh,
    tables: HashMap<TableHandle, Table>,
    next_handle: u32,
}

impl Database {
    pub fn new(config: &MeshConfig) -> HtmResult<Self> {
        Ok(Self {
            mesh: Mesh::new(config)?,
            tables: HashMap::new(),
            next_handle: 0,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Open tables, in the order they were opened.
    pub fn handles(&self) -> Vec<TableHandle> {
        let mut handles: Vec<_> = self.tables.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn find_table(&self, name: &str) -> Option<TableHandle> {
        self.tables
            .iter()
            .find(|(_, table)| table.name() == name)
            .map(|(&handle, _)| handle)
    }

    /// Opens an empty table.
    ///
    /// # Errors
    /// [`HtmError::TableSlotsExhausted`] when every slot of the mesh is taken,
    /// [`HtmError::InvalidConfig`] for an invalid spec or a name that is
    /// already open.
    pub fn open_table(&mut self, spec: TableSpec) -> HtmResult<TableHandle> {
        self.check_slots()?;
        self.check_name(&spec.name)?;
        let table = Table::new(&self.mesh, spec)?;
        Ok(self.register(table))
    }

    /// Closes a table and hands it back. The handle is dead afterwards.
    pub fn close_table(&mut self, handle: TableHandle) -> HtmResult<Table> {
        let table = self
            .tables
            .remove(&handle)
            .ok_or_else(|| HtmError::unknown_table(handle.0))?;
        debug!(%handle, table = %table.name(), "closed table");
        Ok(table)
    }

    pub fn table(&self, handle: TableHandle) -> HtmResult<&Table> {
        self.tables
            .get(&handle)
            .ok_or_else(|| HtmError::unknown_table(handle.0))
    }

    fn table_mut(&mut self, handle: TableHandle) -> HtmResult<&mut Table> {
        self.tables
            .get_mut(&handle)
            .ok_or_else(|| HtmError::unknown_table(handle.0))
    }

    pub fn import<I>(&mut self, handle: TableHandle, rows: I) -> HtmResult<ImportReport>
    where
        I: IntoIterator<Item = CatalogObject>,
    {
        let table = self
            .tables
            .get_mut(&handle)
            .ok_or_else(|| HtmError::unknown_table(handle.0))?;
        table.import(&self.mesh, rows)
    }

    pub fn insert(&mut self, handle: TableHandle, object: CatalogObject) -> HtmResult<TrixelIndex> {
        let table = self
            .tables
            .get_mut(&handle)
            .ok_or_else(|| HtmError::unknown_table(handle.0))?;
        table.insert(&self.mesh, object)
    }

    /// A fresh query set over the table, clipped to the whole sky.
    pub fn object_set(&self, handle: TableHandle) -> HtmResult<ObjectSet<'_>> {
        ObjectSet::new(&self.mesh, self.table(handle)?)
    }

    /// `(depth_for_min, depth_for_max)` for `value` in the table's depth map.
    pub fn depth_bounds(&self, handle: TableHandle, value: f32) -> HtmResult<(u8, u8)> {
        let map = self.table(handle)?.depth_map()?;
        Ok((map.depth_for_min(value)?, map.depth_for_max(value)?))
    }

    pub fn trixel_by_id(&self, id: TrixelId) -> HtmResult<TrixelIndex> {
        self.mesh.trixel_by_id(id)
    }

    pub fn save_table(&self, handle: TableHandle, dir: &Path) -> HtmResult<StoreStats> {
        store::save_table(&self.mesh, self.table(handle)?, dir)
    }

    /// Loads a table saved under `dir` into a new slot.
    pub fn load_table(&mut self, dir: &Path, name: &str) -> HtmResult<TableHandle> {
        self.check_slots()?;
        self.check_name(name)?;
        let table = store::load_table(&self.mesh, dir, name)?;
        Ok(self.register(table))
    }

    /// Installs a depth map computed elsewhere on an empty table.
    pub fn set_depth_map(&mut self, handle: TableHandle, depth_map: DepthMap) -> HtmResult<()> {
        self.table_mut(handle)?.set_depth_map(depth_map)
    }

    fn check_slots(&self) -> HtmResult<()> {
        if self.tables.len() >= self.mesh.table_slots() {
            return Err(HtmError::table_slots_exhausted(self.mesh.table_slots()));
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> HtmResult<()> {
        if self.find_table(name).is_some() {
            return Err(HtmError::invalid_config(format!(
                "table '{name}' is already open"
            )));
        }
        Ok(())
    }

    fn register(&mut self, table: Table) -> TableHandle {
        let handle = TableHandle(self.next_handle);
        self.next_handle += 1;
        info!(%handle, table = %table.name(), objects = table.object_count(), "opened table");
        self.tables.insert(handle, table);
        handle
    }
}
