//! Cone search over the cells of a query set.
//!
//! [`cone_search`] clips the set to a field of view wide enough to cover the
//! cone, aggregates the candidate cells and keeps the objects that are
//! really inside the radius and attribute window, closest first.

use super::set::ObjectSet;
use crate::constants::{COVERAGE_MARGIN, WHOLE_SKY_FOV};
use crate::error::{HtmError, HtmResult};
use crate::geometry::angular_separation;
use crate::table::CatalogObject;

/// Parameters for a cone search. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeSearchParams {
    pub ra: f64,
    pub dec: f64,
    pub radius: f64,
    /// If set, exclude objects with a smaller attribute.
    pub attr_min: Option<f32>,
    /// If set, exclude objects with a larger attribute.
    pub attr_max: Option<f32>,
    /// If set, return at most this many results (closest first).
    pub max_results: Option<usize>,
}

impl ConeSearchParams {
    pub fn new(ra: f64, dec: f64, radius: f64) -> Self {
        Self {
            ra,
            dec,
            radius,
            attr_min: None,
            attr_max: None,
            max_results: None,
        }
    }

    pub fn with_attribute_range(mut self, min: f32, max: f32) -> Self {
        self.attr_min = Some(min);
        self.attr_max = Some(max);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// An object inside the cone.
#[derive(Debug, Clone, Copy)]
pub struct ConeMatch<'a> {
    pub object: &'a CatalogObject,
    /// Angular distance from the cone centre, in radians.
    pub separation: f64,
}

/// Objects within `params.radius` of the cone centre, sorted by separation.
///
/// Re-clips `set`; its previous clip is lost.
pub fn cone_search<'a>(
    set: &mut ObjectSet<'a>,
    params: &ConeSearchParams,
) -> HtmResult<Vec<ConeMatch<'a>>> {
    if !(params.radius.is_finite() && params.radius > 0.0) {
        return Err(HtmError::invalid_parameter(format!(
            "cone radius {} must be positive",
            params.radius
        )));
    }

    let map = set.table().depth_map()?;
    let attr_min = params.attr_min.unwrap_or(map.min_value());
    let attr_max = params.attr_max.unwrap_or(map.max_value());
    let fov = (params.radius * COVERAGE_MARGIN).min(WHOLE_SKY_FOV);

    set.clip(params.ra, params.dec, fov, attr_min, attr_max)?;
    set.get_objects()?;

    let mut results: Vec<ConeMatch<'a>> = set
        .objects()
        .filter(|o| o.attribute >= attr_min && o.attribute <= attr_max)
        .filter_map(|object| {
            let separation = angular_separation(params.ra, params.dec, object.ra, object.dec);
            (separation <= params.radius).then_some(ConeMatch { object, separation })
        })
        .collect();

    results.sort_by(|a, b| {
        a.separation
            .partial_cmp(&b.separation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(max_results) = params.max_results {
        results.truncate(max_results);
    }

    Ok(results)
}
