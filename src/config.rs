//! TOML configuration.
//!
//! ```toml
//! [declination]
//! service_url = "https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination"
//! timeout_secs = 30
//! user_agent = "map-georef/0.1.0"
//!
//! [defaults]
//! scale_denominator = 15000
//! ```
//!
//! Missing keys take their default values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::declination::NOAA_SERVICE_URL;
use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeorefConfig {
    pub declination: DeclinationConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclinationConfig {
    pub service_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DeclinationConfig {
    fn default() -> Self {
        Self {
            service_url: NOAA_SERVICE_URL.to_string(),
            timeout_secs: 30,
            user_agent: format!("map-georef/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Initial values for new georeferencings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub scale_denominator: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            scale_denominator: 1000,
        }
    }
}

impl GeorefConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.declination.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "declination.timeout_secs must be positive".into(),
            ));
        }
        if self.declination.service_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "declination.service_url must not be empty".into(),
            ));
        }
        if self.defaults.scale_denominator == 0 {
            return Err(ConfigError::Invalid(
                "defaults.scale_denominator must be positive".into(),
            ));
        }
        Ok(())
    }
}
