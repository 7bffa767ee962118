//! The fixed octahedral trixel forest.
//!
//! A [`Mesh`] is built once to a configured depth and never changes shape.
//! Trixels and vertices live in flat arenas addressed by [`TrixelIndex`] and
//! [`VertexIndex`]. Parent, child and vertex-owner links are indices into
//! those arenas, so the mesh is plain data and can be shared freely between
//! query threads.
//!
//! Trixels are stored level by level: the 8 roots first, then every depth 1
//! trixel, and so on. The four children of any trixel are contiguous.

mod build;
mod id;
mod trixel;
mod vertex;

pub use id::TrixelId;
pub use trixel::{Hemisphere, Orientation, Trixel};
pub use vertex::Vertex;

use crate::config::MeshConfig;
use crate::constants::ROOT_TRIXELS;
use crate::error::{HtmError, HtmResult};
use crate::geometry::MeshPoint;
use vertex::OwnerSlot;

/// Position of a trixel in its mesh's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrixelIndex(pub(crate) u32);

impl TrixelIndex {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Position of a vertex in its mesh's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIndex(pub(crate) u32);

impl VertexIndex {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Trixels in a mesh of the given depth: `8 * (4^(depth+1) - 1) / 3`.
pub fn trixel_count_for_depth(depth: u8) -> usize {
    ROOT_TRIXELS * ((1usize << (2 * (depth as usize + 1))) - 1) / 3
}

/// Distinct vertices in a mesh of the given depth: `4^(depth+1) + 2`.
pub fn vertex_count_for_depth(depth: u8) -> usize {
    (1usize << (2 * (depth as usize + 1))) + 2
}

pub struct Mesh {
    depth: u8,
    table_slots: usize,
    trixels: Vec<Trixel>,
    vertices: Vec<Vertex>,
    owners: Vec<OwnerSlot>,
    level_starts: Vec<usize>,
}

impl Mesh {
    /// Builds the mesh described by `config`.
    ///
    /// # Errors
    /// Returns [`HtmError::InvalidConfig`] for an out-of-range depth and
    /// [`HtmError::OutOfMemory`] if the arenas cannot be allocated.
    pub fn new(config: &MeshConfig) -> HtmResult<Self> {
        config.validate()?;
        build::build(config)
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn table_slots(&self) -> usize {
        self.table_slots
    }

    pub fn trixel_count(&self) -> usize {
        self.trixels.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn trixel(&self, index: TrixelIndex) -> &Trixel {
        &self.trixels[index.get()]
    }

    pub fn vertex(&self, index: VertexIndex) -> &Vertex {
        &self.vertices[index.get()]
    }

    /// `N0..N3` followed by `S0..S3`.
    pub fn roots(&self) -> impl DoubleEndedIterator<Item = TrixelIndex> {
        (0..ROOT_TRIXELS as u32).map(TrixelIndex)
    }

    /// Every trixel at `depth`, in arena order.
    pub fn level(&self, depth: u8) -> impl Iterator<Item = TrixelIndex> {
        let range = match self.level_starts.get(depth as usize..depth as usize + 2) {
            Some(&[start, end]) => start..end,
            _ => 0..0,
        };
        range.map(|i| TrixelIndex(i as u32))
    }

    pub fn parent(&self, index: TrixelIndex) -> Option<TrixelIndex> {
        self.trixel(index).parent
    }

    pub fn children(&self, index: TrixelIndex) -> Option<[TrixelIndex; 4]> {
        self.trixel(index).children()
    }

    /// The corner positions of a trixel, in `a, b, c` order.
    pub fn corners(&self, index: TrixelIndex) -> [MeshPoint; 3] {
        self.trixel(index)
            .vertices
            .map(|v| self.vertices[v.get()].point)
    }

    /// Trixels at `depth` that use `vertex` as a corner.
    ///
    /// Empty when the vertex did not exist yet at `depth` or `depth` is past
    /// the mesh depth.
    pub fn vertex_owners(&self, vertex: VertexIndex, depth: u8) -> &[TrixelIndex] {
        let v = self.vertex(vertex);
        if depth < v.depth || depth > self.depth {
            return &[];
        }
        self.owners[v.owner_base + (depth - v.depth) as usize].as_slice()
    }

    /// Resolves a packed id to the trixel it names.
    pub fn trixel_by_id(&self, id: TrixelId) -> HtmResult<TrixelIndex> {
        if !id.is_valid() {
            return Err(HtmError::invalid_trixel_id(id.raw(), "valid bit not set"));
        }
        let depth = id.depth();
        if depth > self.depth {
            return Err(HtmError::invalid_trixel_id(
                id.raw(),
                format!("depth {} exceeds mesh depth {}", depth, self.depth),
            ));
        }

        let mut current = TrixelIndex(id.root_index() as u32);
        for level in 1..=depth {
            let children = self.children(current).ok_or_else(|| {
                HtmError::invalid_trixel_id(id.raw(), format!("no children at level {level}"))
            })?;
            current = children[id.position_at(level) as usize];
        }

        if self.trixel(current).id() != id {
            return Err(HtmError::invalid_trixel_id(
                id.raw(),
                "position bits set past the id's depth",
            ));
        }
        Ok(current)
    }

    /// Depth-first walk: each root, then recursively its children, roots in
    /// `N0..N3, S0..S3` order.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            mesh: self,
            stack: self.roots().rev().collect(),
        }
    }
}

pub struct Preorder<'a> {
    mesh: &'a Mesh,
    stack: Vec<TrixelIndex>,
}

impl Iterator for Preorder<'_> {
    type Item = TrixelIndex;

    fn next(&mut self) -> Option<TrixelIndex> {
        let current = self.stack.pop()?;
        if let Some(children) = self.mesh.children(current) {
            self.stack.extend(children.iter().rev());
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn mesh(depth: u8) -> Mesh {
        Mesh::new(&MeshConfig::new(depth, 1)).unwrap()
    }

    #[test]
    fn test_counts_match_formulas() {
        for depth in 0..=5 {
            let m = mesh(depth);
            assert_eq!(m.trixel_count(), trixel_count_for_depth(depth));
            assert_eq!(m.vertex_count(), vertex_count_for_depth(depth));
        }
        assert_eq!(trixel_count_for_depth(0), 8);
        assert_eq!(trixel_count_for_depth(1), 40);
        assert_eq!(vertex_count_for_depth(1), 18);
    }

    #[test]
    fn test_level_layout() {
        let m = mesh(3);
        for depth in 0..=3 {
            let level: Vec<_> = m.level(depth).collect();
            assert_eq!(level.len(), 8 << (2 * depth));
            assert!(level.iter().all(|&t| m.trixel(t).depth() == depth));
        }
        assert_eq!(m.level(4).count(), 0);
    }

    #[test]
    fn test_children_point_back_to_parent() {
        let m = mesh(3);
        for t in m.level(2) {
            let children = m.children(t).unwrap();
            for (k, &child) in children.iter().enumerate() {
                assert_eq!(m.parent(child), Some(t));
                assert_eq!(m.trixel(child).id().position_at(3), k as u8);
            }
        }
        assert!(m.level(3).all(|t| m.children(t).is_none()));
    }

    #[test]
    fn test_child_orientation() {
        let m = mesh(1);
        for root in m.roots() {
            let parent = m.trixel(root).orientation();
            let children = m.children(root).unwrap();
            assert_eq!(m.trixel(children[0]).orientation(), parent.flipped());
            for &child in &children[1..] {
                assert_eq!(m.trixel(child).orientation(), parent);
            }
        }
    }

    #[test]
    fn test_vertex_owner_bounds() {
        let m = mesh(4);
        for v in 0..m.vertex_count() as u32 {
            let v = VertexIndex(v);
            let created = m.vertex(v).depth();
            for depth in created..=4 {
                let owners = m.vertex_owners(v, depth);
                assert!((4..=6).contains(&owners.len()), "{} owners", owners.len());
                for &t in owners {
                    assert_eq!(m.trixel(t).depth(), depth);
                    assert!(m.trixel(t).vertices().contains(&v));
                }
            }
            if created > 0 {
                assert!(m.vertex_owners(v, created - 1).is_empty());
            }
        }
    }

    #[test]
    fn test_octahedron_corners_have_four_owners() {
        let m = mesh(2);
        for v in 0..6 {
            for depth in 0..=2 {
                assert_eq!(m.vertex_owners(VertexIndex(v), depth).len(), 4);
            }
        }
    }

    #[test]
    fn test_vertices_are_unit_directions() {
        let m = mesh(3);
        for v in 0..m.vertex_count() as u32 {
            let vertex = m.vertex(VertexIndex(v));
            let p = vertex.point();
            assert!((p.x.abs() + p.y.abs() + p.z.abs() - 1.0).abs() < 1e-12);
            let (ra, dec) = vertex.radec();
            assert!((0.0..2.0 * std::f64::consts::PI).contains(&ra));
            assert!(dec.abs() <= std::f64::consts::FRAC_PI_2);
        }
    }

    #[test]
    fn test_trixel_by_id_round_trip() {
        let m = mesh(4);
        for t in (0..m.trixel_count() as u32).step_by(7).map(TrixelIndex) {
            let id = m.trixel(t).id();
            assert_eq!(m.trixel_by_id(id).unwrap(), t);
        }
    }

    #[test]
    fn test_trixel_by_id_rejects_bad_ids() {
        let m = mesh(2);
        let deep = TrixelId::new(Hemisphere::North, 0, 3, 0);
        assert!(m.trixel_by_id(deep).is_err());

        let invalid = TrixelId::from_raw(m.trixel(TrixelIndex(3)).id().raw() & !(1 << 31));
        assert!(m.trixel_by_id(invalid).is_err());

        let stray = TrixelId::new(Hemisphere::South, 1, 1, 1 << 4);
        let err = m.trixel_by_id(stray).unwrap_err();
        assert!(err.to_string().contains("position bits"));
    }

    #[test]
    fn test_ids_are_unique() {
        let m = mesh(3);
        let ids: HashSet<_> = (0..m.trixel_count() as u32)
            .map(|t| m.trixel(TrixelIndex(t)).id())
            .collect();
        assert_eq!(ids.len(), m.trixel_count());
    }

    #[test]
    fn test_preorder_visits_parents_first() {
        let m = mesh(2);
        let order: Vec<_> = m.preorder().collect();
        assert_eq!(order.len(), m.trixel_count());
        assert_eq!(order[0], TrixelIndex(0));
        assert_eq!(m.parent(order[1]), Some(TrixelIndex(0)));

        let mut seen = HashSet::new();
        for t in order {
            if let Some(parent) = m.parent(t) {
                assert!(seen.contains(&parent));
            }
            seen.insert(t);
        }
        let last_root = m.preorder().filter(|&t| m.trixel(t).depth() == 0).last();
        assert_eq!(last_root, Some(TrixelIndex(7)));
    }
}
