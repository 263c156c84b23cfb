pub mod common;
pub mod crs;
pub mod ellipsoid;
pub mod geocentric;
pub mod resolver;
pub mod tangent_plane;
pub mod transverse_mercator;

use std::fmt::Debug;

use crate::error::ProjError;
use crate::geometry::ProjectedPoint;
use crate::latlon::LatLon;

/// A projected coordinate reference system.
///
/// Geographic positions are on the WGS84 datum, angles in radians.
pub trait Projection: Send + Sync + Debug {
    /// Forward: geographic position -> (easting, northing)
    fn forward(&self, latlon: LatLon) -> Result<ProjectedPoint, ProjError>;

    /// Inverse: (easting, northing) -> geographic position
    fn inverse(&self, point: ProjectedPoint) -> Result<LatLon, ProjError>;

    /// Angle from true north to grid north at `latlon`, in degrees,
    /// positive when grid north lies east of true north.
    fn convergence(&self, latlon: LatLon) -> Result<f64, ProjError> {
        common::convergence(self, latlon)
    }

    /// Ratio of grid distance to ellipsoidal distance at `latlon`.
    fn grid_scale_factor(&self, latlon: LatLon) -> Result<f64, ProjError> {
        common::grid_scale_factor(self, latlon)
    }

    fn ellipsoid(&self) -> &ellipsoid::Ellipsoid;
}
