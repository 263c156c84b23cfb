//! Geographic to earth-centred cartesian coordinates.

use serde::{Deserialize, Serialize};

use crate::latlon::LatLon;
use crate::proj::ellipsoid::{Ellipsoid, TangentPlane};

/// Earth-centred, earth-fixed cartesian coordinates (metres).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geocentric {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ellipsoid {
    /// Cartesian coordinates of `latlon` at `height` metres above the ellipsoid.
    ///
    /// Uses the angular eccentricity α = acos(b/a), so that cos²α = 1 − e².
    pub fn to_geocentric(&self, latlon: LatLon, height: f64) -> Geocentric {
        let alpha = (self.b / self.a).acos();
        let (sin_lat, cos_lat) = latlon.latitude.sin_cos();
        let (sin_lon, cos_lon) = latlon.longitude.sin_cos();
        let s = sin_lat * alpha.sin();
        let n = self.a / (1.0 - s * s).sqrt();
        let cos_alpha = alpha.cos();

        Geocentric {
            x: (n + height) * cos_lat * cos_lon,
            y: (n + height) * cos_lat * sin_lon,
            z: (cos_alpha * cos_alpha * n + height) * sin_lat,
        }
    }
}

impl TangentPlane {
    pub fn to_geocentric(&self, latlon: LatLon, height: f64) -> Geocentric {
        self.ellipsoid().to_geocentric(latlon, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj::ellipsoid::{WGS84, WGS84_AXES};
    use approx::assert_relative_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let g = WGS84_AXES.to_geocentric(LatLon::default(), 0.0);
        assert_relative_eq!(g.x, WGS84_AXES.a, epsilon = 1e-6);
        assert_relative_eq!(g.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(g.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_poles_reach_semi_minor_axis() {
        let north = WGS84_AXES.to_geocentric(LatLon::from_degrees(90.0, 0.0), 0.0);
        assert_relative_eq!(north.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(north.z, WGS84_AXES.b, epsilon = 1e-6);

        let south = WGS84_AXES.to_geocentric(LatLon::from_degrees(-90.0, 0.0), 100.0);
        assert_relative_eq!(south.z, -(WGS84_AXES.b + 100.0), epsilon = 1e-6);
    }

    #[test]
    fn test_height_extends_along_normal() {
        let ll = LatLon::from_degrees(45.0, 90.0);
        let ground = WGS84.to_geocentric(ll, 0.0);
        let raised = WGS84.to_geocentric(ll, 1000.0);
        let dx = raised.x - ground.x;
        let dy = raised.y - ground.y;
        let dz = raised.z - ground.z;
        assert_relative_eq!((dx * dx + dy * dy + dz * dz).sqrt(), 1000.0, epsilon = 1e-6);
        // Longitude 90°: everything in the y/z plane
        assert_relative_eq!(ground.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_matches_eccentricity_form() {
        // Standard form: N = a / sqrt(1 - e² sin²φ), z = (N (1 - e²) + h) sin φ
        let ll = LatLon::from_degrees(-33.8568, 151.2153);
        let h = 58.0;
        let g = WGS84.to_geocentric(ll, h);

        let n = WGS84.prime_vertical_radius(ll.latitude);
        let expected_z = (n * (1.0 - WGS84.e2) + h) * ll.latitude.sin();
        let expected_x = (n + h) * ll.latitude.cos() * ll.longitude.cos();
        assert_relative_eq!(g.z, expected_z, epsilon = 1e-6);
        assert_relative_eq!(g.x, expected_x, epsilon = 1e-6);
    }

    #[test]
    fn test_tangent_plane_delegates() {
        let plane = TangentPlane::default();
        let ll = LatLon::from_degrees(10.0, 20.0);
        assert_eq!(plane.to_geocentric(ll, 5.0), WGS84_AXES.to_geocentric(ll, 5.0));
    }
}
