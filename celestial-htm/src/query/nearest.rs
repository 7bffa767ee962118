//! Ring-expanding nearest-neighbour search over a query set.

use tracing::debug;

use super::set::ObjectSet;
use crate::constants::{COVERAGE_MARGIN, WHOLE_SKY_FOV};
use crate::error::HtmResult;
use crate::geometry::{angular_separation, resolution, validate_position};
use crate::table::CatalogObject;

/// The closest object found and its separation in radians.
#[derive(Debug, Clone, Copy)]
pub struct Neighbour<'a> {
    pub object: &'a CatalogObject,
    pub separation: f64,
}

impl<'a> ObjectSet<'a> {
    /// Closest object of the table to `(ra, dec)`, or `None` for an empty table.
    ///
    /// The set is re-clipped as the search widens, so any previous clip is lost.
    pub fn nearest_to_position(&mut self, ra: f64, dec: f64) -> HtmResult<Option<Neighbour<'a>>> {
        validate_position(ra, dec)?;
        self.nearest(ra, dec, None)
    }

    /// Closest object to `object` other than `object` itself.
    ///
    /// Identity is by reference, so pass the record held by the table (for
    /// example one taken from [`ObjectSet::objects`]) to have it skipped.
    pub fn nearest_to_object(
        &mut self,
        object: &CatalogObject,
    ) -> HtmResult<Option<Neighbour<'a>>> {
        validate_position(object.ra, object.dec)?;
        self.nearest(object.ra, object.dec, Some(object))
    }

    fn nearest(
        &mut self,
        ra: f64,
        dec: f64,
        exclude: Option<&CatalogObject>,
    ) -> HtmResult<Option<Neighbour<'a>>> {
        let map = self.table().depth_map()?;
        let (attr_min, attr_max) = (map.min_value(), map.max_value());
        let mut fov = resolution(self.mesh().depth());
        let mut rings = 0;

        loop {
            self.clip(ra, dec, fov, attr_min, attr_max)?;
            self.get_objects()?;
            rings += 1;

            let whole_sky = fov >= WHOLE_SKY_FOV;
            match self.closest_candidate(ra, dec, exclude) {
                None if whole_sky => return Ok(None),
                None => fov = (fov * 2.0).min(WHOLE_SKY_FOV),
                Some(best) if whole_sky || best.separation * COVERAGE_MARGIN <= fov => {
                    debug!(
                        key = %best.object.key,
                        separation = best.separation,
                        fov,
                        rings,
                        "nearest neighbour"
                    );
                    return Ok(Some(best));
                }
                // the covering set may not reach everything closer than the
                // best candidate yet
                Some(best) => {
                    fov = (fov * 2.0)
                        .max(best.separation * COVERAGE_MARGIN)
                        .min(WHOLE_SKY_FOV)
                }
            }
        }
    }

    fn closest_candidate(
        &self,
        ra: f64,
        dec: f64,
        exclude: Option<&CatalogObject>,
    ) -> Option<Neighbour<'a>> {
        let mut best: Option<Neighbour<'a>> = None;
        for object in self.objects() {
            if exclude.is_some_and(|e| std::ptr::eq(e, object)) {
                continue;
            }
            let separation = angular_separation(ra, dec, object.ra, object.dec);
            if best.map_or(true, |b| separation < b.separation) {
                best = Some(Neighbour { object, separation });
            }
        }
        best
    }
}
