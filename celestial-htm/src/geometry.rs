//! Sky geometry used by the mesh.
//!
//! Mesh vertices live in *signed-square* coordinates: the Cartesian unit
//! vector of a sky position with every component replaced by `c * |c|`.
//! The octahedron's faces stay flat in this space (`|x| + |y| + |z| = 1`), so
//! edge midpoints need no renormalisation and subdivision is exact in
//! binary floating point. This is not the linear octahedral projection of
//! the classic HTM; cell sizes vary by roughly a factor of π across an
//! octant.
//!
//! The axes follow the catalog convention: `y` points at the north pole,
//! `z` at (RA 0, Dec 0) and `x` at (RA 90°, Dec 0).

use std::f64::consts::{FRAC_PI_2, PI};
use std::ops::{Add, Mul, Sub};

use crate::constants::HTM_MAX_DEPTH;
use crate::error::{HtmError, HtmResult};

const TWO_PI: f64 = 2.0 * PI;

/// A point on the octahedron surface in signed-square coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MeshPoint {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Maps a sky position (radians) into signed-square space.
    pub fn from_radec(ra: f64, dec: f64) -> Self {
        let [x, y, z] = unit_vector(ra, dec);
        Self::new(signed_square(x), signed_square(y), signed_square(z))
    }

    /// Recovers `(ra, dec)` in radians, with RA in `[0, 2π)`.
    pub fn to_radec(&self) -> (f64, f64) {
        let x = signed_sqrt(self.x);
        let y = signed_sqrt(self.y);
        let z = signed_sqrt(self.z);

        let dec = libm::asin(y.clamp(-1.0, 1.0));
        let mut ra = libm::atan2(x, z);
        if ra < 0.0 {
            ra += TWO_PI;
        }
        if ra >= TWO_PI {
            ra = 0.0;
        }
        (ra, dec)
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        (*self + *other) * 0.5
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Integer lattice coordinates at `scale` subdivisions per unit.
    ///
    /// Every vertex of a mesh built to depth `d` sits exactly on the lattice
    /// with `scale = 2^d`, which makes this a lossless deduplication key.
    pub(crate) fn lattice_key(&self, scale: f64) -> (i64, i64, i64) {
        (
            (self.x * scale).round() as i64,
            (self.y * scale).round() as i64,
            (self.z * scale).round() as i64,
        )
    }
}

impl Add for MeshPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for MeshPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for MeshPoint {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

fn signed_square(c: f64) -> f64 {
    c * c.abs()
}

fn signed_sqrt(c: f64) -> f64 {
    libm::sqrt(c.abs()).copysign(c)
}

/// Cartesian unit vector for a sky position in radians.
pub fn unit_vector(ra: f64, dec: f64) -> [f64; 3] {
    let (sin_ra, cos_ra) = libm::sincos(ra);
    let (sin_dec, cos_dec) = libm::sincos(dec);
    [cos_dec * sin_ra, sin_dec, cos_dec * cos_ra]
}

/// Great-circle separation in radians.
///
/// Uses `atan2(|a × b|, a · b)`, which stays accurate for both tiny and
/// near-antipodal separations.
pub fn angular_separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let [ax, ay, az] = unit_vector(ra1, dec1);
    let [bx, by, bz] = unit_vector(ra2, dec2);

    let cx = ay * bz - az * by;
    let cy = az * bx - ax * bz;
    let cz = ax * by - ay * bx;

    let sin_theta = libm::sqrt(cx * cx + cy * cy + cz * cz);
    let cos_theta = ax * bx + ay * by + az * bz;
    libm::atan2(sin_theta, cos_theta)
}

/// Checks RA ∈ `[0, 2π)` and Dec ∈ `[-π/2, π/2]`.
pub fn validate_position(ra: f64, dec: f64) -> HtmResult<()> {
    if !(0.0..TWO_PI).contains(&ra) || !(-FRAC_PI_2..=FRAC_PI_2).contains(&dec) {
        return Err(HtmError::invalid_position(ra, dec));
    }
    Ok(())
}

/// Nominal angular size of a trixel at `depth`, in radians.
pub fn resolution(depth: u8) -> f64 {
    FRAC_PI_2 / (1u64 << depth) as f64
}

/// Finest depth whose nominal cell size is still at least `fov`.
///
/// Returns 0 for any field of view wider than a root trixel. The result
/// never increases as `fov` grows.
pub fn depth_from_resolution(fov: f64) -> u8 {
    (0..HTM_MAX_DEPTH)
        .rev()
        .find(|&depth| resolution(depth) >= fov)
        .unwrap_or(0)
}
