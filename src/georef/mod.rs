//! Georeferencing of a map: the relation between map coordinates, a projected
//! grid and geographic coordinates, kept consistent across edits.
//!
//! The map is tied to the grid by a reference point, a rotation (grivation)
//! and a scale. With a projected CRS selected, the reference point also has
//! a geographic position, and declination, convergence and the scale factors
//! are related by
//!
//!   declination = grivation + convergence
//!   combined scale factor = auxiliary scale factor * grid scale factor
//!
//! Every mutator returns the [`Changes`] it caused.

pub mod record;

use std::sync::Arc;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::affine::Affine;
use crate::config::GeorefConfig;
use crate::error::{GeorefError, ProjError};
use crate::geometry::{MapPoint, ProjectedPoint};
use crate::latlon::LatLon;
use crate::proj::resolver::{CrsResolver, CrsSelection, ProjResolver, LOCAL_CRS_ID};
use crate::proj::Projection;

/// Decimal places kept when applying a looked-up declination.
pub const DECLINATION_PRECISION: i32 = 2;
/// Decimal places shown for scale factors.
pub const SCALE_FACTOR_PRECISION: i32 = 6;

pub fn round_declination(value: f64) -> f64 {
    round_to(value, DECLINATION_PRECISION)
}

pub fn round_scale_factor(value: f64) -> f64 {
    round_to(value, SCALE_FACTOR_PRECISION)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GeorefState {
    /// No CRS: projected coordinates are plain local coordinates.
    #[default]
    Local,
    /// A CRS is selected and the reference point transforms.
    Geospatial,
    /// A CRS is selected but could not be resolved or did not transform
    /// the reference point.
    BrokenGeospatial,
}

/// Which parameters follow when the reference point moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdatePolicy {
    /// Keep declination and the auxiliary scale factor, re-derive grivation
    /// and the combined scale factor.
    UpdateGridParameter,
    /// Keep grivation and the combined scale factor, re-derive declination
    /// and the auxiliary scale factor.
    UpdateGeographicParameter,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Changes: u8 {
        const STATE = 0b0_0001;
        /// Map to projected transformation (reference points, grivation, scale).
        const TRANSFORMATION = 0b0_0010;
        /// CRS selection or geographic reference point.
        const PROJECTION = 0b0_0100;
        const DECLINATION = 0b0_1000;
        const AUXILIARY_SCALE_FACTOR = 0b1_0000;
    }
}

/// Observable fields, compared before and after each edit.
#[derive(Clone, Debug, PartialEq)]
struct Snapshot {
    state: GeorefState,
    scale_denominator: u32,
    map_ref_point: MapPoint,
    projected_ref_point: ProjectedPoint,
    grivation: f64,
    combined_scale_factor: f64,
    crs: Option<CrsSelection>,
    geographic_ref_point: Option<LatLon>,
    declination: Option<f64>,
    auxiliary_scale_factor: f64,
}

impl Snapshot {
    fn changes_to(&self, after: &Snapshot) -> Changes {
        let mut changes = Changes::empty();
        if self.state != after.state {
            changes |= Changes::STATE;
        }
        if self.scale_denominator != after.scale_denominator
            || self.map_ref_point != after.map_ref_point
            || self.projected_ref_point != after.projected_ref_point
            || self.grivation != after.grivation
            || self.combined_scale_factor != after.combined_scale_factor
        {
            changes |= Changes::TRANSFORMATION;
        }
        if self.crs != after.crs || self.geographic_ref_point != after.geographic_ref_point {
            changes |= Changes::PROJECTION;
        }
        if self.declination != after.declination {
            changes |= Changes::DECLINATION;
        }
        if self.auxiliary_scale_factor != after.auxiliary_scale_factor {
            changes |= Changes::AUXILIARY_SCALE_FACTOR;
        }
        changes
    }
}

/// Georeferencing of a single map.
#[derive(Clone, Debug)]
pub struct Georeferencing {
    state: GeorefState,
    scale_denominator: u32,
    map_ref_point: MapPoint,
    projected_ref_point: ProjectedPoint,
    geographic_ref_point: Option<LatLon>,
    crs: Option<CrsSelection>,
    projection: Option<Arc<dyn Projection>>,
    /// Degrees, map north clockwise from grid north
    grivation: f64,
    /// Degrees, magnetic north clockwise from true north
    declination: Option<f64>,
    combined_scale_factor: f64,
    auxiliary_scale_factor: f64,
    error_text: Option<String>,
    resolver: Arc<dyn CrsResolver>,
}

impl Default for Georeferencing {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Georeferencing {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot() && self.error_text == other.error_text
    }
}

impl Georeferencing {
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(ProjResolver))
    }

    pub fn with_resolver(resolver: Arc<dyn CrsResolver>) -> Self {
        Self {
            state: GeorefState::Local,
            scale_denominator: 1000,
            map_ref_point: MapPoint::default(),
            projected_ref_point: ProjectedPoint::default(),
            geographic_ref_point: None,
            crs: None,
            projection: None,
            grivation: 0.0,
            declination: None,
            combined_scale_factor: 1.0,
            auxiliary_scale_factor: 1.0,
            error_text: None,
            resolver,
        }
    }

    /// Local georeferencing using the configured defaults.
    pub fn with_config(config: &GeorefConfig) -> Self {
        let mut georef = Self::new();
        georef.scale_denominator = config.defaults.scale_denominator.max(1);
        georef
    }

    // --- Accessors ---

    pub fn state(&self) -> GeorefState {
        self.state
    }

    /// True unless the selected CRS is broken.
    pub fn is_valid(&self) -> bool {
        match self.state {
            GeorefState::Local | GeorefState::Geospatial => true,
            GeorefState::BrokenGeospatial => false,
        }
    }

    /// Description of the last projection failure.
    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    pub fn scale_denominator(&self) -> u32 {
        self.scale_denominator
    }

    pub fn map_ref_point(&self) -> MapPoint {
        self.map_ref_point
    }

    pub fn projected_ref_point(&self) -> ProjectedPoint {
        self.projected_ref_point
    }

    pub fn geographic_ref_point(&self) -> Option<LatLon> {
        self.geographic_ref_point
    }

    pub fn crs(&self) -> Option<&CrsSelection> {
        self.crs.as_ref()
    }

    pub fn projection(&self) -> Option<&dyn Projection> {
        self.projection.as_deref()
    }

    pub fn resolver(&self) -> &Arc<dyn CrsResolver> {
        &self.resolver
    }

    pub fn grivation(&self) -> f64 {
        self.grivation
    }

    pub fn declination(&self) -> Option<f64> {
        self.declination
    }

    pub fn combined_scale_factor(&self) -> f64 {
        self.combined_scale_factor
    }

    pub fn auxiliary_scale_factor(&self) -> f64 {
        self.auxiliary_scale_factor
    }

    /// Meridian convergence at the geographic reference point (degrees).
    pub fn convergence(&self) -> Option<f64> {
        let (projection, latlon) = self.geospatial_parts()?;
        projection.convergence(latlon).ok()
    }

    /// Grid scale factor at the geographic reference point.
    pub fn grid_scale_factor(&self) -> Option<f64> {
        let (projection, latlon) = self.geospatial_parts()?;
        projection.grid_scale_factor(latlon).ok()
    }

    // --- Conversions ---

    pub fn to_projected(&self, point: MapPoint) -> ProjectedPoint {
        Affine::from_reference(
            self.map_ref_point,
            self.projected_ref_point,
            self.grivation,
            self.combined_scale_factor,
            self.scale_denominator,
        )
        .map_to_projected(point)
    }

    pub fn to_map(&self, point: ProjectedPoint) -> MapPoint {
        Affine::inverse_from_reference(
            self.map_ref_point,
            self.projected_ref_point,
            self.grivation,
            self.combined_scale_factor,
            self.scale_denominator,
        )
        .projected_to_map(point)
    }

    pub fn to_geographic(&self, point: MapPoint) -> Result<LatLon, GeorefError> {
        self.projected_to_geographic(self.to_projected(point))
    }

    pub fn projected_to_geographic(&self, point: ProjectedPoint) -> Result<LatLon, GeorefError> {
        Ok(self.geospatial_projection()?.inverse(point)?)
    }

    pub fn geographic_to_projected(&self, latlon: LatLon) -> Result<ProjectedPoint, GeorefError> {
        Ok(self.geospatial_projection()?.forward(latlon)?)
    }

    pub fn geographic_to_map(&self, latlon: LatLon) -> Result<MapPoint, GeorefError> {
        Ok(self.to_map(self.geographic_to_projected(latlon)?))
    }

    // --- Mutators ---

    /// Replace everything with the contents of `other`.
    pub fn assign(&mut self, other: &Georeferencing) -> Changes {
        self.transact(|georef| *georef = other.clone())
    }

    pub fn set_scale_denominator(&mut self, value: u32) -> Result<Changes, GeorefError> {
        if value == 0 {
            return Err(GeorefError::InvalidParameter(
                "scale denominator must be positive".into(),
            ));
        }
        Ok(self.transact(|georef| georef.scale_denominator = value))
    }

    /// Move the map reference point without changing the map to grid relation.
    pub fn set_map_ref_point(&mut self, point: MapPoint) -> Result<Changes, GeorefError> {
        if !point.is_finite() {
            return Err(GeorefError::InvalidParameter(format!(
                "map reference point must be finite, got {point:?}"
            )));
        }
        Ok(self.transact(|georef| {
            georef.projected_ref_point = georef.to_projected(point);
            georef.map_ref_point = point;
            if georef.state != GeorefState::Local {
                georef.update_geographic_ref_point(UpdatePolicy::UpdateGeographicParameter);
            }
        }))
    }

    pub fn set_projected_ref_point(
        &mut self,
        point: ProjectedPoint,
        policy: UpdatePolicy,
    ) -> Result<Changes, GeorefError> {
        if !point.is_finite() {
            return Err(GeorefError::InvalidParameter(format!(
                "projected reference point must be finite, got {point:?}"
            )));
        }
        Ok(self.transact(|georef| {
            georef.projected_ref_point = point;
            match georef.state {
                GeorefState::Local => {}
                GeorefState::Geospatial | GeorefState::BrokenGeospatial => {
                    georef.update_geographic_ref_point(policy)
                }
            }
        }))
    }

    pub fn set_geographic_ref_point(
        &mut self,
        latlon: LatLon,
        policy: UpdatePolicy,
    ) -> Result<Changes, GeorefError> {
        self.require_crs()?;
        if !latlon.is_finite() {
            return Err(GeorefError::InvalidParameter(format!(
                "geographic reference point must be finite, got {latlon:?}"
            )));
        }
        Ok(self.transact(|georef| {
            let derived = georef.resolve_projection().and_then(|projection| {
                let point = projection.forward(latlon)?;
                let (c, k) = local_distortion(projection.as_ref(), latlon)?;
                Ok((point, c, k))
            });
            match derived {
                Ok((point, c, k)) => {
                    georef.projected_ref_point = point;
                    georef.mark_geospatial(latlon, policy, c, k);
                }
                Err(error) => georef.mark_broken(error),
            }
        }))
    }

    /// Drop the CRS. The map to grid relation stays as it is.
    pub fn set_local_state(&mut self) -> Changes {
        self.transact(|georef| {
            georef.state = GeorefState::Local;
            georef.crs = None;
            georef.projection = None;
            georef.geographic_ref_point = None;
            georef.declination = None;
            georef.error_text = None;
        })
    }

    /// Select a projected CRS and derive the geographic reference point.
    ///
    /// Failure to resolve the CRS or to transform the reference point leaves
    /// the georeferencing in [`GeorefState::BrokenGeospatial`]. Selecting
    /// [`LOCAL_CRS_ID`] is the same as [`Georeferencing::set_local_state`].
    pub fn set_projected_crs(
        &mut self,
        selection: CrsSelection,
        policy: UpdatePolicy,
    ) -> Result<Changes, GeorefError> {
        if selection.id.trim().is_empty() {
            return Err(GeorefError::InvalidParameter("CRS id must not be empty".into()));
        }
        if selection.id == LOCAL_CRS_ID {
            return Ok(self.set_local_state());
        }
        Ok(self.transact(|georef| {
            georef.projection = None;
            georef.crs = Some(selection);
            if georef.state == GeorefState::Local {
                // Leave Local so that failures below are recorded as broken.
                georef.state = GeorefState::BrokenGeospatial;
            }
            georef.update_geographic_ref_point(policy);
        }))
    }

    /// Set grivation in degrees. With a working CRS, declination follows.
    pub fn set_grivation(&mut self, value: f64) -> Result<Changes, GeorefError> {
        check_finite("grivation", value)?;
        Ok(self.transact(|georef| {
            georef.grivation = value;
            if let Some(c) = georef.geospatial_convergence() {
                georef.declination = Some(value + c);
            }
        }))
    }

    /// Set declination in degrees. With a working CRS, grivation follows.
    pub fn set_declination(&mut self, value: f64) -> Result<Changes, GeorefError> {
        check_finite("declination", value)?;
        self.require_crs()?;
        Ok(self.transact(|georef| {
            georef.declination = Some(value);
            if let Some(c) = georef.geospatial_convergence() {
                georef.grivation = value - c;
            }
        }))
    }

    /// Apply a declination obtained from a lookup service, rounded to
    /// [`DECLINATION_PRECISION`] decimals.
    pub fn apply_declination_lookup(
        &mut self,
        value: f64,
        policy: UpdatePolicy,
    ) -> Result<Changes, GeorefError> {
        check_finite("declination", value)?;
        let c = match self.state {
            GeorefState::Geospatial => self.convergence(),
            GeorefState::Local | GeorefState::BrokenGeospatial => None,
        }
        .ok_or(GeorefError::NotGeospatial { state: self.state })?;

        match policy {
            UpdatePolicy::UpdateGridParameter => self.set_declination(round_declination(value)),
            UpdatePolicy::UpdateGeographicParameter => {
                self.set_grivation(round_declination(value - c))
            }
        }
    }

    pub fn set_combined_scale_factor(&mut self, value: f64) -> Result<Changes, GeorefError> {
        check_scale_factor("combined scale factor", value)?;
        Ok(self.transact(|georef| {
            georef.combined_scale_factor = value;
            if let Some(k) = georef.geospatial_grid_scale_factor() {
                georef.auxiliary_scale_factor = value / k;
            }
        }))
    }

    pub fn set_auxiliary_scale_factor(&mut self, value: f64) -> Result<Changes, GeorefError> {
        check_scale_factor("auxiliary scale factor", value)?;
        Ok(self.transact(|georef| {
            georef.auxiliary_scale_factor = value;
            if let Some(k) = georef.geospatial_grid_scale_factor() {
                georef.combined_scale_factor = value * k;
            }
        }))
    }

    // --- Internals ---

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            scale_denominator: self.scale_denominator,
            map_ref_point: self.map_ref_point,
            projected_ref_point: self.projected_ref_point,
            grivation: self.grivation,
            combined_scale_factor: self.combined_scale_factor,
            crs: self.crs.clone(),
            geographic_ref_point: self.geographic_ref_point,
            declination: self.declination,
            auxiliary_scale_factor: self.auxiliary_scale_factor,
        }
    }

    /// Run an edit and report what it changed.
    fn transact(&mut self, edit: impl FnOnce(&mut Self)) -> Changes {
        let before = self.snapshot();
        edit(self);
        let changes = before.changes_to(&self.snapshot());
        if changes.contains(Changes::STATE) {
            debug!(from = ?before.state, to = ?self.state, "georeferencing state changed");
        }
        changes
    }

    fn require_crs(&self) -> Result<(), GeorefError> {
        match self.state {
            GeorefState::Local => Err(GeorefError::NotGeospatial { state: self.state }),
            GeorefState::Geospatial | GeorefState::BrokenGeospatial => Ok(()),
        }
    }

    fn geospatial_parts(&self) -> Option<(&dyn Projection, LatLon)> {
        match self.state {
            GeorefState::Geospatial => {
                Some((self.projection.as_deref()?, self.geographic_ref_point?))
            }
            GeorefState::Local | GeorefState::BrokenGeospatial => None,
        }
    }

    fn geospatial_projection(&self) -> Result<&dyn Projection, GeorefError> {
        self.geospatial_parts()
            .map(|(projection, _)| projection)
            .ok_or(GeorefError::NotGeospatial { state: self.state })
    }

    fn geospatial_convergence(&mut self) -> Option<f64> {
        self.geospatial_parts()?;
        let convergence = self.convergence();
        if convergence.is_none() {
            self.mark_broken(ProjError::TransformFailed(
                "convergence unavailable at the reference point".into(),
            ));
        }
        convergence
    }

    fn geospatial_grid_scale_factor(&mut self) -> Option<f64> {
        self.geospatial_parts()?;
        let k = self.grid_scale_factor();
        if k.is_none() {
            self.mark_broken(ProjError::TransformFailed(
                "grid scale factor unavailable at the reference point".into(),
            ));
        }
        k
    }

    /// The resolved projection, resolving the CRS selection on first use.
    fn resolve_projection(&mut self) -> Result<Arc<dyn Projection>, ProjError> {
        if let Some(projection) = &self.projection {
            return Ok(Arc::clone(projection));
        }
        let selection = self
            .crs
            .as_ref()
            .ok_or_else(|| ProjError::UnknownCrs("no CRS selected".into()))?;
        let projection = self.resolver.resolve(selection)?;
        self.projection = Some(Arc::clone(&projection));
        Ok(projection)
    }

    /// Derive the geographic reference point from the projected one.
    fn update_geographic_ref_point(&mut self, policy: UpdatePolicy) {
        let projected = self.projected_ref_point;
        let derived = self.resolve_projection().and_then(|projection| {
            let latlon = projection.inverse(projected)?;
            let (c, k) = local_distortion(projection.as_ref(), latlon)?;
            Ok((latlon, c, k))
        });
        match derived {
            Ok((latlon, c, k)) => self.mark_geospatial(latlon, policy, c, k),
            Err(error) => self.mark_broken(error),
        }
    }

    fn mark_geospatial(&mut self, latlon: LatLon, policy: UpdatePolicy, c: f64, k: f64) {
        self.state = GeorefState::Geospatial;
        self.geographic_ref_point = Some(latlon);
        self.error_text = None;
        match policy {
            UpdatePolicy::UpdateGridParameter => {
                if let Some(declination) = self.declination {
                    self.grivation = declination - c;
                }
                self.combined_scale_factor = self.auxiliary_scale_factor * k;
            }
            UpdatePolicy::UpdateGeographicParameter => {
                if self.declination.is_some() {
                    self.declination = Some(self.grivation + c);
                }
                self.auxiliary_scale_factor = self.combined_scale_factor / k;
            }
        }
    }

    fn mark_broken(&mut self, error: ProjError) {
        warn!(
            crs = ?self.crs.as_ref().map(|crs| crs.id.as_str()),
            error = %error,
            "georeferencing projection failed"
        );
        self.state = GeorefState::BrokenGeospatial;
        self.geographic_ref_point = None;
        self.error_text = Some(error.to_string());
    }
}

/// Convergence and grid scale factor at `latlon`.
fn local_distortion(projection: &dyn Projection, latlon: LatLon) -> Result<(f64, f64), ProjError> {
    let c = projection.convergence(latlon)?;
    let k = projection.grid_scale_factor(latlon)?;
    if !c.is_finite() || !k.is_finite() || k <= 0.0 {
        return Err(ProjError::TransformFailed(format!(
            "invalid distortion at {latlon:?}: convergence {c}, scale factor {k}"
        )));
    }
    Ok((c, k))
}

fn check_finite(name: &str, value: f64) -> Result<(), GeorefError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GeorefError::InvalidParameter(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

fn check_scale_factor(name: &str, value: f64) -> Result<(), GeorefError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeorefError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}
