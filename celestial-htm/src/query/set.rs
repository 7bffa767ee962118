//! The per-request covering-set state machine.
//!
//! An [`ObjectSet`] moves through `Uninitialized → Clipped →
//! TrixelsSelected → ObjectsAggregated`. Clipping fixes the centre trixel and
//! the depth span; [`ObjectSet::get_trixels`] expands the centre's vertex
//! neighbourhood up to the coarsest and down to the finest depth in that
//! span; [`ObjectSet::get_objects`] keeps the non-empty cells inside the span.
//! Each stage is cached until the next clip.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::constants::{DEFAULT_FOV, WHOLE_SKY_FOV};
use crate::error::{HtmError, HtmResult};
use crate::geometry::depth_from_resolution;
use crate::mesh::{Mesh, TrixelId, TrixelIndex};
use crate::table::{CatalogObject, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Uninitialized,
    Clipped,
    TrixelsSelected,
    ObjectsAggregated,
}

/// Region and attribute window of a query. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryConstraints {
    pub ra: f64,
    pub dec: f64,
    pub fov: f64,
    pub attr_min: f32,
    pub attr_max: f32,
}

/// One populated cell of the covering set.
#[derive(Debug, Clone, Copy)]
pub struct ObjectHead<'a> {
    pub trixel: TrixelIndex,
    pub id: TrixelId,
    pub depth: u8,
    /// The cell's objects, head first.
    pub objects: &'a [CatalogObject],
}

impl ObjectHead<'_> {
    pub fn count(&self) -> usize {
        self.objects.len()
    }
}

pub struct ObjectSet<'a> {
    mesh: &'a Mesh,
    table: &'a Table,
    state: QueryState,
    constraints: Option<QueryConstraints>,
    centre: Option<TrixelIndex>,
    fov_depth: u8,
    min_depth: u8,
    max_depth: u8,
    capacity: usize,
    neighbours: usize,
    trixels: Vec<TrixelIndex>,
    heads: Vec<ObjectHead<'a>>,
    object_count: usize,
}

impl<'a> ObjectSet<'a> {
    /// Opens a query set over `table`.
    ///
    /// The covering-set buffer is reserved up front for every trixel of the
    /// mesh. If the table has a depth map the set starts clipped to the
    /// whole sky over the table's full attribute range, otherwise it starts
    /// uninitialized.
    pub fn new(mesh: &'a Mesh, table: &'a Table) -> HtmResult<Self> {
        if table.mesh_depth() != mesh.depth() {
            return Err(HtmError::invalid_parameter(format!(
                "table '{}' is bound to a depth {} mesh, got depth {}",
                table.name(),
                table.mesh_depth(),
                mesh.depth()
            )));
        }

        let capacity = mesh.trixel_count();
        let mut trixels = Vec::new();
        trixels
            .try_reserve_exact(capacity)
            .map_err(|_| HtmError::out_of_memory(format!("{capacity} covering-set trixels")))?;

        let mut set = Self {
            mesh,
            table,
            state: QueryState::Uninitialized,
            constraints: None,
            centre: None,
            fov_depth: 0,
            min_depth: 0,
            max_depth: 0,
            capacity,
            neighbours: 0,
            trixels,
            heads: Vec::new(),
            object_count: 0,
        };

        if let Ok(map) = table.depth_map() {
            set.clip(0.0, 0.0, DEFAULT_FOV, map.min_value(), map.max_value())?;
        }
        Ok(set)
    }

    pub fn mesh(&self) -> &'a Mesh {
        self.mesh
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn constraints(&self) -> Option<QueryConstraints> {
        self.constraints
    }

    /// Home trixel of the query centre at [`ObjectSet::fov_depth`].
    pub fn centre(&self) -> Option<TrixelIndex> {
        self.centre
    }

    pub fn fov_depth(&self) -> u8 {
        self.fov_depth
    }

    /// Inclusive `(min_depth, max_depth)` resolved from the attribute window.
    pub fn depth_range(&self) -> (u8, u8) {
        (self.min_depth, self.max_depth)
    }

    /// The covering set selected by the last [`ObjectSet::get_trixels`].
    pub fn trixels(&self) -> &[TrixelIndex] {
        &self.trixels
    }

    /// The seed trixels of the covering set: the centre's vertex neighbours
    /// at the fov depth, or the 8 roots for a whole-sky query.
    pub fn neighbours(&self) -> &[TrixelIndex] {
        &self.trixels[..self.neighbours]
    }

    pub fn heads(&self) -> &[ObjectHead<'a>] {
        &self.heads
    }

    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// Every aggregated object, cell by cell.
    pub fn objects(&self) -> impl Iterator<Item = &'a CatalogObject> + '_ {
        self.heads.iter().flat_map(|head| head.objects.iter())
    }

    /// Centres the set on `(ra, dec)` with field of view `fov` (radians)
    /// and the attribute window `[attr_min, attr_max]`.
    ///
    /// Any cached covering set is dropped. On failure the set returns to
    /// [`QueryState::Uninitialized`].
    pub fn clip(
        &mut self,
        ra: f64,
        dec: f64,
        fov: f64,
        attr_min: f32,
        attr_max: f32,
    ) -> HtmResult<()> {
        self.constrain(QueryConstraints {
            ra,
            dec,
            fov,
            attr_min,
            attr_max,
        })
    }

    pub fn constrain(&mut self, constraints: QueryConstraints) -> HtmResult<()> {
        let resolved = self.resolve(&constraints);
        let (centre, fov_depth, min_depth, max_depth) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                self.invalidate();
                return Err(err);
            }
        };

        self.reset();
        self.constraints = Some(constraints);
        self.centre = Some(centre);
        self.fov_depth = fov_depth;
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self.state = QueryState::Clipped;

        debug!(
            table = %self.table.name(),
            centre = %self.mesh.trixel(centre).id(),
            fov = constraints.fov,
            fov_depth,
            min_depth,
            max_depth,
            "clipped query set"
        );
        Ok(())
    }

    fn resolve(&self, c: &QueryConstraints) -> HtmResult<(TrixelIndex, u8, u8, u8)> {
        if !(c.fov.is_finite() && c.fov > 0.0) {
            return Err(HtmError::invalid_parameter(format!(
                "field of view {} must be positive",
                c.fov
            )));
        }
        let (min_depth, max_depth) = self.table.depth_map()?.clip_range(c.attr_min, c.attr_max)?;
        let max_depth = max_depth.min(self.mesh.depth());
        let fov_depth = depth_from_resolution(c.fov).min(self.mesh.depth());
        let centre = self.mesh.home_trixel(c.ra, c.dec, fov_depth)?;
        Ok((centre, fov_depth, min_depth, max_depth))
    }

    fn reset(&mut self) {
        self.trixels.clear();
        self.heads.clear();
        self.neighbours = 0;
        self.object_count = 0;
    }

    fn invalidate(&mut self) {
        self.reset();
        self.constraints = None;
        self.centre = None;
        self.state = QueryState::Uninitialized;
    }

    /// Selects the covering set for the current clip.
    ///
    /// # Errors
    /// [`HtmError::NotClipped`] before a successful clip, and
    /// [`HtmError::Capacity`] if the set would outgrow the mesh's trixel count.
    pub fn get_trixels(&mut self) -> HtmResult<&[TrixelIndex]> {
        match self.state {
            QueryState::Uninitialized => return Err(HtmError::NotClipped),
            QueryState::TrixelsSelected | QueryState::ObjectsAggregated => {
                return Ok(&self.trixels)
            }
            QueryState::Clipped => {}
        }

        self.reset();
        if let Err(err) = self.select() {
            self.reset();
            return Err(err);
        }
        self.state = QueryState::TrixelsSelected;

        debug!(
            neighbours = self.neighbours,
            trixels = self.trixels.len(),
            "selected covering set"
        );
        Ok(&self.trixels)
    }

    fn select(&mut self) -> HtmResult<()> {
        let mesh = self.mesh;
        let whole_sky = self
            .constraints
            .map_or(true, |c| c.fov >= WHOLE_SKY_FOV);
        let mut seen = HashSet::new();

        if whole_sky {
            for root in mesh.roots() {
                seen.insert(root);
                self.push(root)?;
            }
        } else {
            let centre = self.centre.ok_or(HtmError::NotClipped)?;
            for vertex in mesh.trixel(centre).vertices() {
                for &owner in mesh.vertex_owners(vertex, self.fov_depth) {
                    if seen.insert(owner) {
                        self.push(owner)?;
                    }
                }
            }
        }
        self.neighbours = self.trixels.len();

        // ancestors, one depth per pass
        let (mut start, mut end) = (0, self.neighbours);
        let mut depth = if whole_sky { 0 } else { self.fov_depth };
        while depth > self.min_depth {
            for i in start..end {
                let Some(parent) = mesh.parent(self.trixels[i]) else {
                    continue;
                };
                if seen.insert(parent) {
                    self.push(parent)?;
                }
            }
            start = end;
            end = self.trixels.len();
            depth -= 1;
        }

        for i in 0..self.neighbours {
            self.push_descendants(self.trixels[i])?;
        }
        Ok(())
    }

    fn push_descendants(&mut self, seed: TrixelIndex) -> HtmResult<()> {
        let mesh = self.mesh;
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            if mesh.trixel(current).depth() >= self.max_depth {
                continue;
            }
            let Some(children) = mesh.children(current) else {
                continue;
            };
            for child in children {
                self.push(child)?;
                stack.push(child);
            }
        }
        Ok(())
    }

    fn push(&mut self, trixel: TrixelIndex) -> HtmResult<()> {
        if self.trixels.len() >= self.capacity {
            return Err(HtmError::capacity(
                "covering set",
                self.trixels.len() + 1,
                self.capacity,
            ));
        }
        self.trixels.push(trixel);
        Ok(())
    }

    /// Aggregates the populated cells of the covering set whose depth lies in
    /// the clipped depth span. Returns the number of cells; zero is not an
    /// error. Repeated calls without a new clip reuse the previous result.
    pub fn get_objects(&mut self) -> HtmResult<usize> {
        if self.state == QueryState::ObjectsAggregated {
            return Ok(self.heads.len());
        }
        self.get_trixels()?;

        self.heads.clear();
        self.object_count = 0;
        self.heads
            .try_reserve(self.trixels.len())
            .map_err(|_| HtmError::out_of_memory("object heads"))?;

        let (mesh, table) = (self.mesh, self.table);
        for &trixel in &self.trixels {
            let t = mesh.trixel(trixel);
            let depth = t.depth();
            if depth < self.min_depth || depth > self.max_depth {
                continue;
            }
            let objects = table.cell(trixel);
            if objects.is_empty() {
                continue;
            }
            trace!(trixel = %t.id(), count = objects.len(), "object head");
            self.heads.push(ObjectHead {
                trixel,
                id: t.id(),
                depth,
                objects,
            });
            self.object_count += objects.len();
        }
        self.state = QueryState::ObjectsAggregated;

        debug!(
            heads = self.heads.len(),
            objects = self.object_count,
            "aggregated objects"
        );
        Ok(self.heads.len())
    }
}
