use serde::{Deserialize, Serialize};

use crate::error::ProjError;
use crate::latlon::LatLon;

/// Reference ellipsoid parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major axis (metres)
    pub a: f64,
    /// Flattening (dimensionless)
    pub f: f64,
    /// Semi-minor axis: a * (1 - f)
    pub b: f64,
    /// First eccentricity squared: (a² - b²) / a²
    pub e2: f64,
}

impl Ellipsoid {
    pub const fn new(a: f64, f: f64) -> Self {
        let b = a * (1.0 - f);
        let e2 = 2.0 * f - f * f;
        Self { a, f, b, e2 }
    }

    /// Create from both semi-axes, keeping `b` exactly as given.
    pub const fn from_axes(a: f64, b: f64) -> Self {
        Self {
            a,
            f: (a - b) / a,
            b,
            e2: (a * a - b * b) / (a * a),
        }
    }

    /// Get the first eccentricity (computed at runtime).
    pub fn eccentricity(&self) -> f64 {
        self.e2.sqrt()
    }

    /// Radius of curvature in the prime vertical at latitude `phi`.
    pub fn prime_vertical_radius(&self, phi: f64) -> f64 {
        let s = phi.sin();
        self.a / (1.0 - self.e2 * s * s).sqrt()
    }

    /// Radius of curvature in the meridian at latitude `phi`.
    pub fn meridian_radius(&self, phi: f64) -> f64 {
        let s = phi.sin();
        self.a * (1.0 - self.e2) / (1.0 - self.e2 * s * s).powf(1.5)
    }

    fn validate(&self) -> Result<(), ProjError> {
        if !(self.a.is_finite() && self.b.is_finite()) || self.b <= 0.0 || self.a < self.b {
            return Err(ProjError::InvalidParameter(format!(
                "ellipsoid axes must satisfy a >= b > 0, got a={}, b={}",
                self.a, self.b
            )));
        }
        Ok(())
    }
}

pub const WGS84: Ellipsoid = Ellipsoid::new(6_378_137.0, 1.0 / 298.257_223_563);
/// WGS84 given by its axes, semi-minor axis rounded to 0.1 mm.
pub const WGS84_AXES: Ellipsoid = Ellipsoid::from_axes(6_378_137.0, 6_356_752.3142);

/// Ellipsoid plus the tangent point of the local map plane.
///
/// The sine/cosine of the tangent latitude and the prime-vertical radius `v0`
/// at the tangent point are cached. They are private and only change through
/// [`TangentPlane::set_center`], which recomputes them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TangentPlane {
    ellipsoid: Ellipsoid,
    center: LatLon,
    // Precomputed
    sin_center_latitude: f64,
    cos_center_latitude: f64,
    v0: f64,
}

impl TangentPlane {
    pub fn new(ellipsoid: Ellipsoid, center: LatLon) -> Result<Self, ProjError> {
        ellipsoid.validate()?;
        check_center(center)?;
        Ok(Self::compute(ellipsoid, center))
    }

    fn compute(ellipsoid: Ellipsoid, center: LatLon) -> Self {
        let (sin_center_latitude, cos_center_latitude) = center.latitude.sin_cos();
        let v0 = ellipsoid.a
            / (1.0 - ellipsoid.e2 * sin_center_latitude * sin_center_latitude).sqrt();
        Self {
            ellipsoid,
            center,
            sin_center_latitude,
            cos_center_latitude,
            v0,
        }
    }

    /// Move the tangent point.
    pub fn set_center(&mut self, center: LatLon) -> Result<(), ProjError> {
        check_center(center)?;
        *self = Self::compute(self.ellipsoid, center);
        Ok(())
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn center(&self) -> LatLon {
        self.center
    }

    pub fn e2(&self) -> f64 {
        self.ellipsoid.e2
    }

    pub fn sin_center_latitude(&self) -> f64 {
        self.sin_center_latitude
    }

    pub fn cos_center_latitude(&self) -> f64 {
        self.cos_center_latitude
    }

    /// Prime-vertical radius of curvature at the tangent point.
    pub fn v0(&self) -> f64 {
        self.v0
    }
}

impl Default for TangentPlane {
    fn default() -> Self {
        Self::compute(WGS84_AXES, LatLon::default())
    }
}

fn check_center(center: LatLon) -> Result<(), ProjError> {
    // The inverse iteration is singular with the tangent point on a pole.
    if !center.is_finite() || center.latitude.abs() >= std::f64::consts::FRAC_PI_2 {
        return Err(ProjError::InvalidParameter(format!(
            "tangent point out of range: {center:?}"
        )));
    }
    Ok(())
}
