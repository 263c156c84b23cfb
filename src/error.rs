use thiserror::Error;

use crate::georef::GeorefState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjError {
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Transform failed: {0}")]
    TransformFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Inverse projection did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character {character:?} at position {index}")]
    UnexpectedCharacter { character: char, index: usize },

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeorefError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Operation requires geospatial georeferencing (state is {state:?})")]
    NotGeospatial { state: GeorefState },

    #[error("Projection error: {0}")]
    Projection(#[from] ProjError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeclinationError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Declination lookup timed out")]
    Timeout,

    #[error("Declination service reported: {0}")]
    Service(String),

    #[error("Declination value not found")]
    NotFound,

    #[error("Could not parse declination value: {0:?}")]
    InvalidValue(String),

    #[error("Malformed reply: {0}")]
    Xml(String),

    #[error(transparent)]
    Georef(#[from] GeorefError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cannot write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}
