//! Georeferencing for orienteering maps.
//!
//! Relates map coordinates (millimetres on paper) to a projected CRS and to
//! geographic coordinates, keeping grivation, declination, convergence and
//! the scale factors consistent with each other.

pub mod error;
pub mod geometry;
pub mod latlon;
pub mod affine;
pub mod proj;
pub mod georef;
pub mod declination;
pub mod config;

pub use config::GeorefConfig;
pub use error::{ConfigError, DeclinationError, GeorefError, ParseError, ProjError};
pub use geometry::{MapPoint, ProjectedPoint};
pub use georef::{Changes, GeorefState, Georeferencing, UpdatePolicy};
pub use latlon::{LatLon, LatLonFormat};
pub use proj::ellipsoid::{Ellipsoid, TangentPlane, WGS84};
pub use proj::resolver::{CrsResolver, CrsSelection, ProjResolver};
pub use proj::Projection;
