use std::collections::HashMap;

use tracing::{debug, info};

use super::trixel::{Hemisphere, Orientation, Trixel};
use super::vertex::{OwnerSlot, Vertex};
use super::{trixel_count_for_depth, vertex_count_for_depth, Mesh, TrixelIndex, VertexIndex};
use crate::config::MeshConfig;
use crate::error::{HtmError, HtmResult};
use crate::geometry::MeshPoint;

const OCTAHEDRON: [MeshPoint; 6] = [
    MeshPoint::new(0.0, 1.0, 0.0),
    MeshPoint::new(0.0, 0.0, 1.0),
    MeshPoint::new(1.0, 0.0, 0.0),
    MeshPoint::new(0.0, 0.0, -1.0),
    MeshPoint::new(-1.0, 0.0, 0.0),
    MeshPoint::new(0.0, -1.0, 0.0),
];

/// Corners of `N0..N3, S0..S3` as indices into [`OCTAHEDRON`].
const ROOT_CORNERS: [[usize; 3]; 8] = [
    [0, 1, 2],
    [0, 2, 3],
    [0, 3, 4],
    [0, 4, 1],
    [5, 1, 2],
    [5, 2, 3],
    [5, 3, 4],
    [5, 4, 1],
];

pub(super) fn build(config: &MeshConfig) -> HtmResult<Mesh> {
    let mut builder = MeshBuilder::with_capacity(config)?;
    builder.add_roots()?;
    for depth in 0..config.depth {
        builder.subdivide_level(depth)?;
    }
    let mesh = builder.mesh;

    info!(
        depth = mesh.depth,
        trixels = mesh.trixels.len(),
        vertices = mesh.vertices.len(),
        "built HTM mesh"
    );
    Ok(mesh)
}

/// Owner slots needed: one per vertex per depth from its creation down.
fn owner_slot_count(depth: u8) -> usize {
    (0..=depth)
        .map(|d| {
            let created = if d == 0 {
                vertex_count_for_depth(0)
            } else {
                vertex_count_for_depth(d) - vertex_count_for_depth(d - 1)
            };
            created * (depth - d + 1) as usize
        })
        .sum()
}

fn reserve<T>(what: &str, count: usize) -> HtmResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|_| HtmError::out_of_memory(format!("{count} {what}")))?;
    Ok(v)
}

struct MeshBuilder {
    mesh: Mesh,
    lattice: HashMap<(i64, i64, i64), VertexIndex>,
    scale: f64,
    trixel_capacity: usize,
    vertex_capacity: usize,
}

impl MeshBuilder {
    fn with_capacity(config: &MeshConfig) -> HtmResult<Self> {
        let trixel_capacity = trixel_count_for_depth(config.depth);
        let vertex_capacity = vertex_count_for_depth(config.depth);

        let mut lattice = HashMap::new();
        lattice
            .try_reserve(vertex_capacity)
            .map_err(|_| HtmError::out_of_memory("vertex lattice"))?;

        let mut level_starts = Vec::with_capacity(config.depth as usize + 2);
        level_starts.push(0);

        debug!(
            depth = config.depth,
            trixel_capacity, vertex_capacity, "allocating mesh arenas"
        );

        Ok(Self {
            mesh: Mesh {
                depth: config.depth,
                table_slots: config.table_slots,
                trixels: reserve("trixels", trixel_capacity)?,
                vertices: reserve("vertices", vertex_capacity)?,
                owners: reserve("vertex owner slots", owner_slot_count(config.depth))?,
                level_starts,
            },
            lattice,
            scale: (1u64 << config.depth) as f64,
            trixel_capacity,
            vertex_capacity,
        })
    }

    /// Returns the vertex at `point`, creating it at `depth` if it is new.
    fn vertex_at(&mut self, point: MeshPoint, depth: u8) -> HtmResult<VertexIndex> {
        let key = point.lattice_key(self.scale);
        if let Some(&existing) = self.lattice.get(&key) {
            return Ok(existing);
        }

        let vertices = &mut self.mesh.vertices;
        if vertices.len() == self.vertex_capacity {
            return Err(HtmError::capacity(
                "mesh vertices",
                vertices.len() + 1,
                self.vertex_capacity,
            ));
        }

        let index = VertexIndex(vertices.len() as u32);
        let (ra, dec) = point.to_radec();
        let owner_base = self.mesh.owners.len();
        let slots = (self.mesh.depth - depth) as usize + 1;
        self.mesh
            .owners
            .resize(owner_base + slots, OwnerSlot::default());
        vertices.push(Vertex {
            point,
            ra,
            dec,
            depth,
            owner_base,
        });
        self.lattice.insert(key, index);
        Ok(index)
    }

    fn push_trixel(&mut self, trixel: Trixel) -> HtmResult<TrixelIndex> {
        if self.mesh.trixels.len() == self.trixel_capacity {
            return Err(HtmError::capacity(
                "mesh trixels",
                self.mesh.trixels.len() + 1,
                self.trixel_capacity,
            ));
        }

        let index = TrixelIndex(self.mesh.trixels.len() as u32);
        for v in trixel.vertices {
            let vertex = &self.mesh.vertices[v.get()];
            let slot = vertex.owner_base + (trixel.depth - vertex.depth) as usize;
            self.mesh.owners[slot].push(index)?;
        }
        self.mesh.trixels.push(trixel);
        Ok(index)
    }

    fn add_roots(&mut self) -> HtmResult<()> {
        let mut corners = [VertexIndex(0); 6];
        for (corner, point) in corners.iter_mut().zip(OCTAHEDRON) {
            *corner = self.vertex_at(point, 0)?;
        }

        for (root, [a, b, c]) in ROOT_CORNERS.into_iter().enumerate() {
            let (hemisphere, orientation) = if root < 4 {
                (Hemisphere::North, Orientation::Up)
            } else {
                (Hemisphere::South, Orientation::Down)
            };
            self.push_trixel(Trixel {
                vertices: [corners[a], corners[b], corners[c]],
                parent: None,
                first_child: None,
                orientation,
                hemisphere,
                quadrant: (root % 4) as u8,
                depth: 0,
                position: 0,
            })?;
        }
        self.mesh.level_starts.push(self.mesh.trixels.len());
        Ok(())
    }

    fn subdivide_level(&mut self, depth: u8) -> HtmResult<()> {
        let start = self.mesh.level_starts[depth as usize];
        let end = self.mesh.level_starts[depth as usize + 1];
        for parent in start..end {
            self.subdivide(TrixelIndex(parent as u32))?;
        }
        self.mesh.level_starts.push(self.mesh.trixels.len());
        Ok(())
    }

    /// Appends the 4 children of `parent_index`.
    ///
    /// With parent corners `A, B, C` and new midpoints `a = mid(C, B)`,
    /// `b = mid(A, B)`, `c = mid(C, A)` the children are `(a, b, c)`,
    /// `(A, b, c)`, `(b, B, a)` and `(c, a, C)`. Child 0 is the flipped
    /// central triangle.
    fn subdivide(&mut self, parent_index: TrixelIndex) -> HtmResult<()> {
        let parent = self.mesh.trixels[parent_index.get()].clone();
        let depth = parent.depth + 1;
        let [pa, pb, pc] = parent.vertices;
        let [a_pt, b_pt, c_pt] = parent.vertices.map(|v| self.mesh.vertices[v.get()].point);

        let a = self.vertex_at(c_pt.midpoint(&b_pt), depth)?;
        let b = self.vertex_at(a_pt.midpoint(&b_pt), depth)?;
        let c = self.vertex_at(c_pt.midpoint(&a_pt), depth)?;

        let first = TrixelIndex(self.mesh.trixels.len() as u32);
        let children = [[a, b, c], [pa, b, c], [b, pb, a], [c, a, pc]];
        for (k, vertices) in children.into_iter().enumerate() {
            let orientation = if k == 0 {
                parent.orientation.flipped()
            } else {
                parent.orientation
            };
            self.push_trixel(Trixel {
                vertices,
                parent: Some(parent_index),
                first_child: None,
                orientation,
                hemisphere: parent.hemisphere,
                quadrant: parent.quadrant,
                depth,
                position: parent.position | ((k as u32) << (u32::from(depth) << 1)),
            })?;
        }

        self.mesh.trixels[parent_index.get()].first_child = Some(first);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_slot_count_matches_build() {
        for depth in 0..=4 {
            let mesh = build(&MeshConfig::new(depth, 1)).unwrap();
            assert_eq!(mesh.owners.len(), owner_slot_count(depth));
        }
    }

    #[test]
    fn test_midpoints_are_shared_between_roots() {
        let mesh = build(&MeshConfig::new(1, 1)).unwrap();
        // N0 and S0 share the RA 0..90 equator edge, so they must share its midpoint
        let n0 = mesh.children(TrixelIndex(0)).unwrap()[0];
        let s0 = mesh.children(TrixelIndex(4)).unwrap()[0];
        let n0_vertices = mesh.trixel(n0).vertices();
        let shared = mesh
            .trixel(s0)
            .vertices()
            .iter()
            .filter(|v| n0_vertices.contains(v))
            .count();
        assert_eq!(shared, 1);
    }
}
