//! Common helpers for projection math (meridional arc, convergence, scale factor).

use std::f64::consts::FRAC_PI_2;

use super::ellipsoid::Ellipsoid;
use super::Projection;
use crate::error::ProjError;
use crate::geometry::ProjectedPoint;
use crate::latlon::LatLon;

/// Half length of the meridian segment used for finite differences (radians).
const MERIDIAN_STEP: f64 = 1e-6;

/// Third flattening n = (a - b) / (a + b).
pub fn third_flattening(ellipsoid: &Ellipsoid) -> f64 {
    ellipsoid.f / (2.0 - ellipsoid.f)
}

/// Compute the meridional arc length from the equator to latitude phi.
/// Uses the series expansion in powers of n (third flattening).
pub fn meridional_arc(ellipsoid: &Ellipsoid, phi: f64) -> f64 {
    let n = third_flattening(ellipsoid);
    let n2 = n * n;
    let n3 = n2 * n;
    let n4 = n3 * n;

    let a = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

    let a2 = -3.0 / 2.0 * n + 9.0 / 16.0 * n3;
    let a4 = 15.0 / 16.0 * n2 - 15.0 / 32.0 * n4;
    let a6 = -35.0 / 48.0 * n3;
    let a8 = 315.0 / 512.0 * n4;

    a * (phi
        + a2 * (2.0 * phi).sin()
        + a4 * (4.0 * phi).sin()
        + a6 * (6.0 * phi).sin()
        + a8 * (8.0 * phi).sin())
}

/// Projects a short meridian segment centred on `latlon`.
///
/// Returns the grid vector from its southern to its northern end and the
/// latitude span actually used (shortened near the poles).
fn meridian_segment<P: Projection + ?Sized>(
    proj: &P,
    latlon: LatLon,
) -> Result<(ProjectedPoint, f64), ProjError> {
    if !latlon.is_finite() {
        return Err(ProjError::InvalidParameter(format!(
            "non-finite position: {latlon:?}"
        )));
    }
    let north = (latlon.latitude + MERIDIAN_STEP).min(FRAC_PI_2);
    let south = (latlon.latitude - MERIDIAN_STEP).max(-FRAC_PI_2);

    let p1 = proj.forward(LatLon::new(south, latlon.longitude))?;
    let p2 = proj.forward(LatLon::new(north, latlon.longitude))?;
    let delta = ProjectedPoint::new(p2.x - p1.x, p2.y - p1.y);
    if !delta.is_finite() || (delta.x == 0.0 && delta.y == 0.0) {
        return Err(ProjError::TransformFailed(format!(
            "degenerate meridian at {latlon:?}"
        )));
    }
    Ok((delta, north - south))
}

/// Meridian convergence in degrees, from the grid direction of true north.
pub fn convergence<P: Projection + ?Sized>(proj: &P, latlon: LatLon) -> Result<f64, ProjError> {
    let (delta, _) = meridian_segment(proj, latlon)?;
    Ok(-delta.x.atan2(delta.y).to_degrees())
}

/// Grid length of a short meridian segment over its length on the ellipsoid.
pub fn grid_scale_factor<P: Projection + ?Sized>(
    proj: &P,
    latlon: LatLon,
) -> Result<f64, ProjError> {
    let (delta, span) = meridian_segment(proj, latlon)?;
    let arc = proj.ellipsoid().meridian_radius(latlon.latitude) * span;
    Ok(delta.x.hypot(delta.y) / arc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj::ellipsoid::WGS84;
    use approx::assert_relative_eq;

    /// Plate carrée on a sphere of the WGS84 semi-major axis, optionally rotated.
    #[derive(Debug)]
    struct RotatedPlateCarree {
        rotation: f64,
        scale: f64,
    }

    impl Projection for RotatedPlateCarree {
        fn forward(&self, latlon: LatLon) -> Result<ProjectedPoint, ProjError> {
            let r = WGS84.a * self.scale;
            let (x, y) = (r * latlon.longitude, r * latlon.latitude);
            let (s, c) = self.rotation.sin_cos();
            Ok(ProjectedPoint::new(c * x + s * y, -s * x + c * y))
        }

        fn inverse(&self, point: ProjectedPoint) -> Result<LatLon, ProjError> {
            let r = WGS84.a * self.scale;
            let (s, c) = self.rotation.sin_cos();
            let x = c * point.x - s * point.y;
            let y = s * point.x + c * point.y;
            Ok(LatLon::new(y / r, x / r))
        }

        fn ellipsoid(&self) -> &Ellipsoid {
            &WGS84
        }
    }

    #[test]
    fn test_meridional_arc_equator() {
        let m = meridional_arc(&WGS84, 0.0);
        assert_relative_eq!(m, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_meridional_arc_positive() {
        let m = meridional_arc(&WGS84, std::f64::consts::FRAC_PI_4);
        // Arc to 45 degrees should be ~4984944m (approx)
        assert!(m > 4_900_000.0 && m < 5_100_000.0);
    }

    #[test]
    fn test_third_flattening() {
        let n = third_flattening(&WGS84);
        assert_relative_eq!(n, (WGS84.a - WGS84.b) / (WGS84.a + WGS84.b), epsilon = 1e-15);
    }

    #[test]
    fn test_convergence_of_rotated_grid() {
        let proj = RotatedPlateCarree {
            rotation: 3.0_f64.to_radians(),
            scale: 1.0,
        };
        // True north points 3° east of grid north.
        let c = convergence(&proj, LatLon::from_degrees(45.0, 10.0)).unwrap();
        assert_relative_eq!(c, -3.0, epsilon = 1e-9);

        let unrotated = RotatedPlateCarree {
            rotation: 0.0,
            scale: 1.0,
        };
        let c = convergence(&unrotated, LatLon::from_degrees(45.0, 10.0)).unwrap();
        assert_relative_eq!(c, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_scale_factor_against_meridian_radius() {
        let proj = RotatedPlateCarree {
            rotation: 0.3,
            scale: 2.0,
        };
        let lat = 30.0_f64.to_radians();
        let k = grid_scale_factor(&proj, LatLon::new(lat, 0.0)).unwrap();
        assert_relative_eq!(k, 2.0 * WGS84.a / WGS84.meridian_radius(lat), epsilon = 1e-6);
    }

    #[test]
    fn test_trait_defaults_use_finite_differences() {
        let proj = RotatedPlateCarree {
            rotation: -1.5_f64.to_radians(),
            scale: 1.0,
        };
        let ll = LatLon::from_degrees(-20.0, 40.0);
        assert_relative_eq!(proj.convergence(ll).unwrap(), 1.5, epsilon = 1e-9);
        assert_eq!(
            proj.grid_scale_factor(ll).unwrap(),
            grid_scale_factor(&proj, ll).unwrap()
        );
    }

    #[test]
    fn test_pole_segment_is_shortened() {
        let proj = RotatedPlateCarree {
            rotation: 0.0,
            scale: 1.0,
        };
        let pole = LatLon::new(FRAC_PI_2, 0.0);
        let c = convergence(&proj, pole).unwrap();
        assert_relative_eq!(c, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let proj = RotatedPlateCarree {
            rotation: 0.0,
            scale: 1.0,
        };
        let result = convergence(&proj, LatLon::new(f64::NAN, 0.0));
        assert!(matches!(result, Err(ProjError::InvalidParameter(_))));
    }
}
