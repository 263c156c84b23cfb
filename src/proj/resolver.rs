//! CRS resolution: turns a selected CRS (template id, spec string and
//! template parameters) into a [`Projection`], dispatching between native
//! pure-Rust projections and the proj4rs fallback.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProjError;
use crate::proj::crs::Proj4Crs;
use crate::proj::transverse_mercator::TransverseMercator;
use crate::proj::Projection;

/// A projected CRS as chosen by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsSelection {
    /// Template id such as `"UTM"`, `"EPSG"` or a custom name.
    pub id: String,
    /// Full definition string (PROJ string or `EPSG:<code>`).
    pub spec: String,
    /// Template parameters, e.g. `["33 N"]` for UTM.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

impl CrsSelection {
    pub fn new(id: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            spec: spec.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// UTM zone selection, e.g. `CrsSelection::utm(33, true)`.
    pub fn utm(zone: u8, north: bool) -> Self {
        let hemisphere = if north { "N" } else { "S" };
        let south = if north { "" } else { " +south" };
        Self::new(
            "UTM",
            format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs"),
        )
        .with_parameters([format!("{zone} {hemisphere}")])
    }

    /// EPSG code selection.
    pub fn epsg(code: u32) -> Self {
        Self::new("EPSG", format!("EPSG:{code}")).with_parameters([code.to_string()])
    }
}

/// CRS id of a map without a projected CRS.
pub const LOCAL_CRS_ID: &str = "Local";

/// Resolves a [`CrsSelection`] into a usable projection.
pub trait CrsResolver: Send + Sync + Debug {
    fn resolve(&self, selection: &CrsSelection) -> Result<Arc<dyn Projection>, ProjError>;
}

/// Default resolver.
///
/// UTM zones and the WGS84 UTM EPSG codes use the native Transverse Mercator.
/// Anything else goes to proj4rs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjResolver;

impl CrsResolver for ProjResolver {
    fn resolve(&self, selection: &CrsSelection) -> Result<Arc<dyn Projection>, ProjError> {
        match selection.id.as_str() {
            LOCAL_CRS_ID => Err(ProjError::UnknownCrs(
                "a local coordinate system has no projection".into(),
            )),
            "UTM" => {
                let (zone, north) = match selection.parameters.first() {
                    Some(parameter) => parse_utm_zone(parameter)?,
                    None => return from_spec(&selection.spec),
                };
                debug!(zone, north, "resolved native UTM projection");
                Ok(Arc::new(TransverseMercator::utm_zone(zone, north)?))
            }
            "EPSG" => {
                let code = match selection.parameters.first() {
                    Some(parameter) => parameter.trim().parse::<u32>().map_err(|_| {
                        ProjError::InvalidParameter(format!("invalid EPSG code {parameter:?}"))
                    })?,
                    None => match parse_epsg(&selection.spec) {
                        Some(code) => code,
                        None => return from_spec(&selection.spec),
                    },
                };
                from_epsg(code)
            }
            _ => match parse_epsg(&selection.spec) {
                Some(code) => from_epsg(code),
                None => from_spec(&selection.spec),
            },
        }
    }
}

fn from_epsg(code: u32) -> Result<Arc<dyn Projection>, ProjError> {
    match code {
        // UTM North: EPSG:326XX (zone 1–60)
        32601..=32660 => Ok(Arc::new(TransverseMercator::utm_zone(
            (code - 32600) as u8,
            true,
        )?)),
        // UTM South: EPSG:327XX (zone 1–60)
        32701..=32760 => Ok(Arc::new(TransverseMercator::utm_zone(
            (code - 32700) as u8,
            false,
        )?)),
        _ => Ok(Arc::new(Proj4Crs::from_epsg(code)?)),
    }
}

fn from_spec(spec: &str) -> Result<Arc<dyn Projection>, ProjError> {
    if spec.trim().is_empty() {
        return Err(ProjError::UnknownCrs("no CRS specification given".into()));
    }
    Ok(Arc::new(Proj4Crs::new(spec)?))
}

/// Try to parse an `EPSG:<code>` spec string.
fn parse_epsg(spec: &str) -> Option<u32> {
    let spec = spec.trim();
    spec.strip_prefix("EPSG:")
        .or_else(|| spec.strip_prefix("epsg:"))?
        .parse::<u32>()
        .ok()
}

/// Parses a UTM zone parameter such as `"33 N"`, `"33N"` or `"7 s"`.
fn parse_utm_zone(parameter: &str) -> Result<(u8, bool), ProjError> {
    let invalid = || ProjError::InvalidParameter(format!("invalid UTM zone {parameter:?}"));

    let parameter = parameter.trim();
    let split = parameter
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, rest) = parameter.split_at(split);
    let zone = digits.parse::<u8>().map_err(|_| invalid())?;
    let north = match rest.trim() {
        "N" | "n" => true,
        "S" | "s" => false,
        _ => return Err(invalid()),
    };
    Ok((zone, north))
}
