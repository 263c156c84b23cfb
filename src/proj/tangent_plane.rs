//! Oblique tangent-plane projection on the ellipsoid.
//!
//! Forward is closed-form. Inverse is Newton–Raphson started at the tangent
//! point, at most [`MAX_ITERATIONS`] steps, stopping once both corrections
//! fall below [`CONVERGENCE_TOLERANCE`] radians.

use tracing::debug;

use crate::error::ProjError;
use crate::geometry::MapPoint;
use crate::latlon::LatLon;
use crate::proj::ellipsoid::TangentPlane;

pub const MAX_ITERATIONS: usize = 20;
pub const CONVERGENCE_TOLERANCE: f64 = 1e-9;

/// Result of the inverse iteration, including whether it met the tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InverseSolution {
    pub latlon: LatLon,
    pub iterations: usize,
    pub converged: bool,
}

impl TangentPlane {
    /// Geographic position to tangent-plane coordinates (metres, y down).
    pub fn forward(&self, latlon: LatLon) -> MapPoint {
        let (x, n) = self.easting_northing(latlon.latitude, latlon.longitude);
        MapPoint::new(x, -n)
    }

    /// Easting/northing relative to the tangent point (northing up).
    fn easting_northing(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (sin_l, cos_l) = lat.sin_cos();
        let (sin_dlon, cos_dlon) = (lon - self.center().longitude).sin_cos();
        let e2 = self.e2();
        let v = self.ellipsoid().prime_vertical_radius(lat);

        let e = v * cos_l * sin_dlon;
        let n = v
            * (sin_l * self.cos_center_latitude()
                - cos_l * self.sin_center_latitude() * cos_dlon)
            + e2 * (self.v0() * self.sin_center_latitude() - v * sin_l)
                * self.cos_center_latitude();
        (e, n)
    }

    /// Tangent-plane coordinates to geographic position.
    ///
    /// Returns the last iterate even if the iteration limit was hit before
    /// the tolerance was met. Use [`TangentPlane::try_inverse`] to treat that
    /// as an error.
    pub fn inverse(&self, point: MapPoint) -> LatLon {
        self.solve_inverse(point).latlon
    }

    /// Like [`TangentPlane::inverse`], but fails when the iteration did not converge.
    pub fn try_inverse(&self, point: MapPoint) -> Result<LatLon, ProjError> {
        let solution = self.solve_inverse(point);
        if solution.converged {
            Ok(solution.latlon)
        } else {
            Err(ProjError::NotConverged {
                iterations: solution.iterations,
            })
        }
    }

    pub fn solve_inverse(&self, point: MapPoint) -> InverseSolution {
        let target_e = point.x;
        let target_n = -point.y;

        let e2 = self.e2();
        let a = self.ellipsoid().a;
        let sin_c = self.sin_center_latitude();
        let cos_c = self.cos_center_latitude();

        let mut latitude = self.center().latitude;
        let mut longitude = self.center().longitude;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < MAX_ITERATIONS {
            iterations += 1;

            let (sin_l, cos_l) = latitude.sin_cos();
            let (sin_dlon, cos_dlon) = (longitude - self.center().longitude).sin_cos();

            let denominator_inner = 1.0 - e2 * sin_l * sin_l;
            let v = a / denominator_inner.sqrt();
            let p = a * (1.0 - e2) / denominator_inner.powf(1.5);

            let (e_test, n_test) = self.easting_northing(latitude, longitude);

            // Jacobian of (E, N) with respect to (latitude, longitude)
            let j11 = -p * sin_l * sin_dlon;
            let j12 = v * cos_l * cos_dlon;
            let j21 = p * (cos_l * cos_c + sin_l * sin_c * cos_dlon);
            let j22 = v * sin_c * cos_l * sin_dlon;
            let d = j11 * j22 - j12 * j21;

            let de = target_e - e_test;
            let dn = target_n - n_test;

            let d_latitude = (j22 * de - j12 * dn) / d;
            let d_longitude = (-j21 * de + j11 * dn) / d;
            latitude += d_latitude;
            longitude += d_longitude;

            if d_latitude.abs().max(d_longitude.abs()) < CONVERGENCE_TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!(
                x = point.x,
                y = point.y,
                iterations,
                "tangent plane inverse did not converge"
            );
        }

        InverseSolution {
            latlon: LatLon::new(latitude, longitude),
            iterations,
            converged,
        }
    }
}
