use std::fmt;

use proj4rs::Proj;

use crate::error::ProjError;
use crate::geometry::ProjectedPoint;
use crate::latlon::LatLon;
use crate::proj::ellipsoid::{Ellipsoid, WGS84};
use crate::proj::Projection;

/// Geographic reference system all positions are expressed in.
pub const GEOGRAPHIC_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A projected CRS backed by proj4rs.
///
/// proj4rs works in radians for geographic coordinates, which is what
/// [`LatLon`] holds, so no unit conversion happens on that side.
pub struct Proj4Crs {
    definition: String,
    geographic: Proj,
    projected: Proj,
}

impl Proj4Crs {
    /// Create from an EPSG code ("EPSG:32633") or a PROJ string ("+proj=utm +zone=33 ...").
    pub fn new(definition: &str) -> Result<Self, ProjError> {
        let definition = definition.trim();
        if definition.is_empty() {
            return Err(ProjError::UnknownCrs("empty CRS definition".into()));
        }
        let geographic = Proj::from_user_string(GEOGRAPHIC_DEFINITION)
            .map_err(|e| ProjError::UnknownCrs(format!("{GEOGRAPHIC_DEFINITION}: {e}")))?;
        let projected = Proj::from_user_string(definition)
            .map_err(|e| ProjError::UnknownCrs(format!("{definition}: {e}")))?;
        if projected.is_latlong() {
            return Err(ProjError::InvalidParameter(format!(
                "{definition} is a geographic CRS, a projected CRS is required"
            )));
        }
        Ok(Self {
            definition: definition.to_owned(),
            geographic,
            projected,
        })
    }

    /// Create for an EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, ProjError> {
        Self::new(&format!("EPSG:{code}"))
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }
}

impl fmt::Debug for Proj4Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proj4Crs")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl Projection for Proj4Crs {
    fn forward(&self, latlon: LatLon) -> Result<ProjectedPoint, ProjError> {
        if !latlon.is_finite() {
            return Err(ProjError::TransformFailed(format!(
                "non-finite position: {latlon:?}"
            )));
        }
        let mut point = (latlon.longitude, latlon.latitude);
        proj4rs::transform::transform(&self.geographic, &self.projected, &mut point)
            .map_err(|e| ProjError::TransformFailed(e.to_string()))?;

        let result = ProjectedPoint::new(point.0, point.1);
        if !result.is_finite() {
            return Err(ProjError::TransformFailed(format!(
                "{} produced a non-finite result for {latlon:?}",
                self.definition
            )));
        }
        Ok(result)
    }

    fn inverse(&self, point: ProjectedPoint) -> Result<LatLon, ProjError> {
        if !point.is_finite() {
            return Err(ProjError::TransformFailed(format!(
                "non-finite grid point: {point:?}"
            )));
        }
        let mut coords = (point.x, point.y);
        proj4rs::transform::transform(&self.projected, &self.geographic, &mut coords)
            .map_err(|e| ProjError::TransformFailed(e.to_string()))?;

        let result = LatLon::new(coords.1, coords.0);
        if !result.is_finite() {
            return Err(ProjError::TransformFailed(format!(
                "{} produced a non-finite result for {point:?}",
                self.definition
            )));
        }
        Ok(result)
    }

    fn ellipsoid(&self) -> &Ellipsoid {
        &WGS84
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj::transverse_mercator::TransverseMercator;
    use approx::assert_relative_eq;

    #[test]
    fn test_roundtrip_32633() {
        // Oslo, Norway: ~10.75°E, ~59.91°N
        let crs = Proj4Crs::from_epsg(32633).unwrap();
        let ll = LatLon::from_degrees(59.91, 10.75);

        let p = crs.forward(ll).unwrap();
        // UTM zone 33 easting should be near 500000 + offset, northing near 6.6M
        assert!(p.x > 200_000.0 && p.x < 800_000.0, "easting out of range: {}", p.x);
        assert!(
            p.y > 6_000_000.0 && p.y < 7_000_000.0,
            "northing out of range: {}",
            p.y
        );

        let back = crs.inverse(p).unwrap();
        assert_relative_eq!(back.longitude, ll.longitude, epsilon = 1e-10);
        assert_relative_eq!(back.latitude, ll.latitude, epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_crs() {
        assert!(Proj4Crs::from_epsg(99999).is_err());
        assert!(Proj4Crs::new("   ").is_err());
    }

    #[test]
    fn test_geographic_crs_rejected() {
        let result = Proj4Crs::from_epsg(4326);
        assert!(matches!(result, Err(ProjError::InvalidParameter(_))));
    }

    #[test]
    fn test_proj_string() {
        let crs = Proj4Crs::new("+proj=utm +zone=32 +datum=WGS84 +units=m +no_defs").unwrap();
        assert_eq!(crs.definition(), "+proj=utm +zone=32 +datum=WGS84 +units=m +no_defs");
        let p = crs.forward(LatLon::from_degrees(48.0, 9.0)).unwrap();
        assert_relative_eq!(p.x, 500_000.0, epsilon = 0.01);
    }

    #[test]
    fn test_matches_native_transverse_mercator() {
        let proj4 = Proj4Crs::from_epsg(32633).unwrap();
        let native = TransverseMercator::utm_zone(33, true).unwrap();

        let test_points: &[ProjectedPoint] = &[
            ProjectedPoint::new(500000.0, 5760000.0),
            ProjectedPoint::new(400000.0, 6000000.0),
            ProjectedPoint::new(600000.0, 5500000.0),
        ];

        for &p in test_points {
            let a = proj4.inverse(p).unwrap();
            let b = native.inverse(p).unwrap();
            assert_relative_eq!(a.longitude, b.longitude, epsilon = 1e-8);
            assert_relative_eq!(a.latitude, b.latitude, epsilon = 1e-8);
        }

        let ll = LatLon::from_degrees(51.0, 16.2);
        assert_relative_eq!(
            proj4.convergence(ll).unwrap(),
            native.convergence(ll).unwrap(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_non_finite_input() {
        let crs = Proj4Crs::from_epsg(32633).unwrap();
        assert!(crs.forward(LatLon::new(f64::NAN, 0.0)).is_err());
        assert!(crs.inverse(ProjectedPoint::new(0.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_debug_shows_definition() {
        let crs = Proj4Crs::from_epsg(32633).unwrap();
        assert!(format!("{crs:?}").contains("EPSG:32633"));
    }
}
