//! Stored form of a [`Georeferencing`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_finite, check_scale_factor, GeorefState, Georeferencing, UpdatePolicy};
use crate::error::GeorefError;
use crate::geometry::{MapPoint, ProjectedPoint};
use crate::latlon::LatLon;
use crate::proj::resolver::{CrsResolver, CrsSelection, LOCAL_CRS_ID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoreferencingRecord {
    pub scale_denominator: u32,
    pub map_ref_point: MapPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<CrsSelection>,
    pub projected_ref_point: ProjectedPoint,
    /// Informational; recomputed from the projected reference point on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_ref_point: Option<LatLon>,
    pub grivation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declination: Option<f64>,
    pub combined_scale_factor: f64,
    pub auxiliary_scale_factor: f64,
}

impl Georeferencing {
    pub fn to_record(&self) -> GeoreferencingRecord {
        GeoreferencingRecord {
            scale_denominator: self.scale_denominator,
            map_ref_point: self.map_ref_point,
            crs: self.crs.clone(),
            projected_ref_point: self.projected_ref_point,
            geographic_ref_point: self.geographic_ref_point,
            grivation: self.grivation,
            declination: self.declination,
            combined_scale_factor: self.combined_scale_factor,
            auxiliary_scale_factor: self.auxiliary_scale_factor,
        }
    }

    /// Restore from a record.
    ///
    /// The projected reference point and the grid parameters (grivation,
    /// combined scale factor) are taken as stored. With a CRS, the geographic
    /// reference point, the auxiliary scale factor and a stored declination
    /// are derived again from them.
    pub fn from_record(
        record: &GeoreferencingRecord,
        resolver: Arc<dyn CrsResolver>,
    ) -> Result<Self, GeorefError> {
        if record.scale_denominator == 0 {
            return Err(GeorefError::InvalidParameter(
                "scale denominator must be positive".into(),
            ));
        }
        if !record.map_ref_point.is_finite() || !record.projected_ref_point.is_finite() {
            return Err(GeorefError::InvalidParameter(
                "reference points must be finite".into(),
            ));
        }
        check_finite("grivation", record.grivation)?;
        if let Some(declination) = record.declination {
            check_finite("declination", declination)?;
        }
        check_scale_factor("combined scale factor", record.combined_scale_factor)?;
        check_scale_factor("auxiliary scale factor", record.auxiliary_scale_factor)?;

        let mut georef = Self::with_resolver(resolver);
        georef.scale_denominator = record.scale_denominator;
        georef.map_ref_point = record.map_ref_point;
        georef.projected_ref_point = record.projected_ref_point;
        georef.grivation = record.grivation;
        georef.combined_scale_factor = record.combined_scale_factor;
        georef.auxiliary_scale_factor = record.auxiliary_scale_factor;

        let crs = record
            .crs
            .as_ref()
            .filter(|crs| !crs.id.trim().is_empty() && crs.id != LOCAL_CRS_ID);
        if let Some(crs) = crs {
            georef.crs = Some(crs.clone());
            georef.declination = record.declination;
            georef.state = GeorefState::BrokenGeospatial;
            georef.update_geographic_ref_point(UpdatePolicy::UpdateGeographicParameter);
        }
        debug!(state = ?georef.state, "georeferencing restored");
        Ok(georef)
    }
}
