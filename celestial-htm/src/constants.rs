//! Fixed parameters of the mesh, the classifier and the depth bucketer.

/// Number of addressable depth tiers; valid mesh depths are `0..HTM_MAX_DEPTH`.
///
/// The packed trixel id keeps the depth in 4 bits and the per-level child
/// positions in the 24 bits below it, so depth 11 is the deepest level whose
/// position bits stay clear of the depth field.
pub const HTM_MAX_DEPTH: u8 = 12;

/// The 4 northern and 4 southern octant trixels.
pub const ROOT_TRIXELS: usize = 8;

/// Most trixels that can share one vertex at one depth.
pub const TRIXELS_PER_VERTEX: usize = 6;

/// Slack for the edge-plane containment test, in signed-square units.
pub const INSIDE_LIMIT: f64 = -1.0e-5;

/// Equal-width bins in a table's attribute histogram.
pub const HISTOGRAM_DIVS: usize = 100;

/// Share of the still-unassigned population each depth tier absorbs,
/// starting from the finest depth and recycled when depths outnumber entries.
pub const DEPTH_FILL_THRESHOLDS: [f64; 4] = [0.8, 0.75, 0.66, 0.5];

/// A field of view at or beyond this covers the whole sky.
pub const WHOLE_SKY_FOV: f64 = std::f64::consts::PI;

/// Field of view given to a freshly opened query set.
pub const DEFAULT_FOV: f64 = 2.0 * std::f64::consts::PI;

/// Ratio between a query's field of view and the radius its covering set
/// is guaranteed to reach.
///
/// Signed-square cells narrow to about 2/π of their nominal size along the
/// root edges, and a vertex neighbourhood reaches at least half a cell
/// height past any point of the centre trixel.
pub const COVERAGE_MARGIN: f64 = 6.0;

pub const DEFAULT_MESH_DEPTH: u8 = 7;
pub const DEFAULT_TABLE_SLOTS: usize = 8;
