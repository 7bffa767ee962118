//! Point-in-trixel tests and home trixel lookup.

use tracing::warn;

use crate::constants::INSIDE_LIMIT;
use crate::error::{HtmError, HtmResult};
use crate::geometry::{validate_position, MeshPoint};
use crate::mesh::{Mesh, Orientation, TrixelIndex};

impl Mesh {
    /// Whether `point` lies inside trixel `index`, within [`INSIDE_LIMIT`].
    ///
    /// Each edge and the origin span a plane; the point must sit on the inner
    /// side of all three. Up trixels wind `a → b → c`, down trixels `a → c → b`.
    pub fn contains(&self, index: TrixelIndex, point: &MeshPoint) -> bool {
        let [a, b, c] = self.corners(index);
        let edges = match self.trixel(index).orientation() {
            Orientation::Up => [(a, b), (b, c), (c, a)],
            Orientation::Down => [(a, c), (c, b), (b, a)],
        };
        edges
            .iter()
            .all(|(from, to)| from.cross(to).dot(point) >= INSIDE_LIMIT)
    }

    /// The trixel at `depth` containing the sky position `(ra, dec)` in radians.
    ///
    /// Roots are tried in `N0..N3, S0..S3` order and the search descends into
    /// the first child that contains the point. A point on a shared edge
    /// therefore always lands in the same trixel.
    ///
    /// # Errors
    /// [`HtmError::DepthOutOfRange`] if `depth` is deeper than the mesh,
    /// [`HtmError::InvalidPosition`] if RA is outside `[0, 2π)` or Dec
    /// outside `[-π/2, π/2]`.
    pub fn home_trixel(&self, ra: f64, dec: f64, depth: u8) -> HtmResult<TrixelIndex> {
        if depth > self.depth() {
            return Err(HtmError::depth_out_of_range(depth, self.depth()));
        }
        validate_position(ra, dec)?;

        let point = MeshPoint::from_radec(ra, dec);
        let root = self
            .roots()
            .find(|&root| self.contains(root, &point))
            .ok_or_else(|| HtmError::unclassified(ra, dec))?;

        Ok(self.descend(root, &point, depth))
    }

    fn descend(&self, mut current: TrixelIndex, point: &MeshPoint, depth: u8) -> TrixelIndex {
        while self.trixel(current).depth() < depth {
            let Some(children) = self.children(current) else {
                break;
            };
            match children.into_iter().find(|&child| self.contains(child, point)) {
                Some(child) => current = child,
                None => {
                    warn!(
                        trixel = %self.trixel(current).id(),
                        x = point.x,
                        y = point.y,
                        z = point.z,
                        "no child trixel contains point, using parent"
                    );
                    break;
                }
            }
        }
        current
    }
}
