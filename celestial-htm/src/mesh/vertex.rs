use crate::constants::TRIXELS_PER_VERTEX;
use crate::error::{HtmError, HtmResult};
use crate::geometry::MeshPoint;

use super::TrixelIndex;

/// A trixel corner shared by every trixel that touches it.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) point: MeshPoint,
    pub(crate) ra: f64,
    pub(crate) dec: f64,
    pub(crate) depth: u8,
    /// First of this vertex's owner slots, one per depth from `depth` down
    /// to the mesh depth.
    pub(crate) owner_base: usize,
}

impl Vertex {
    pub fn point(&self) -> MeshPoint {
        self.point
    }

    /// `(ra, dec)` in radians.
    pub fn radec(&self) -> (f64, f64) {
        (self.ra, self.dec)
    }

    /// Depth at which this vertex first appeared.
    pub fn depth(&self) -> u8 {
        self.depth
    }
}

/// The trixels of one depth that use a vertex as a corner.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OwnerSlot {
    len: u8,
    trixels: [TrixelIndex; TRIXELS_PER_VERTEX],
}

impl Default for OwnerSlot {
    fn default() -> Self {
        Self {
            len: 0,
            trixels: [TrixelIndex(0); TRIXELS_PER_VERTEX],
        }
    }
}

impl OwnerSlot {
    pub(crate) fn push(&mut self, trixel: TrixelIndex) -> HtmResult<()> {
        let len = self.len as usize;
        if len == TRIXELS_PER_VERTEX {
            return Err(HtmError::capacity(
                "vertex owner slot",
                len + 1,
                TRIXELS_PER_VERTEX,
            ));
        }
        self.trixels[len] = trixel;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn as_slice(&self) -> &[TrixelIndex] {
        &self.trixels[..self.len as usize]
    }
}
