//! Online magnetic declination lookup.
//!
//! A lookup is a request/response exchange with an external service. Replies
//! arriving after the lookup was cancelled or superseded are dropped by
//! [`DeclinationLookup`].

use std::future::Future;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::config::DeclinationConfig;
use crate::error::{DeclinationError, GeorefError};
use crate::georef::{Changes, GeorefState, Georeferencing, UpdatePolicy};
use crate::latlon::LatLon;

/// NOAA magnetic field calculator endpoint.
pub const NOAA_SERVICE_URL: &str =
    "https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination";

/// Position (degrees) and date of a declination query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeclinationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
}

impl DeclinationRequest {
    pub fn new(latlon: LatLon, date: NaiveDate) -> Self {
        Self {
            latitude: latlon.latitude_degrees(),
            longitude: latlon.longitude_degrees(),
            date,
        }
    }

    /// Query for the geographic reference point of a geospatial georeferencing.
    pub fn for_georef(georef: &Georeferencing, date: NaiveDate) -> Result<Self, GeorefError> {
        match (georef.state(), georef.geographic_ref_point()) {
            (GeorefState::Geospatial, Some(latlon)) => Ok(Self::new(latlon, date)),
            (state, _) => Err(GeorefError::NotGeospatial { state }),
        }
    }

    /// Like [`DeclinationRequest::for_georef`], dated today (local time).
    pub fn for_georef_today(georef: &Georeferencing) -> Result<Self, GeorefError> {
        Self::for_georef(georef, chrono::Local::now().date_naive())
    }

    /// Query parameters understood by the NOAA calculator.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat1", self.latitude.to_string()),
            ("lon1", self.longitude.to_string()),
            ("startYear", self.date.year().to_string()),
            ("startMonth", self.date.month().to_string()),
            ("startDay", self.date.day().to_string()),
            ("resultFormat", "xml".to_string()),
        ]
    }
}

/// A source of magnetic declination values (degrees, east positive).
pub trait DeclinationService: Send + Sync {
    fn lookup(
        &self,
        request: &DeclinationRequest,
    ) -> impl Future<Output = Result<f64, DeclinationError>> + Send;
}

/// Runs a lookup, failing with [`DeclinationError::Timeout`] after `timeout`.
pub async fn lookup_with_timeout<S: DeclinationService>(
    service: &S,
    request: &DeclinationRequest,
    timeout: Duration,
) -> Result<f64, DeclinationError> {
    tokio::time::timeout(timeout, service.lookup(request))
        .await
        .map_err(|_| DeclinationError::Timeout)?
}

/// HTTP client for the NOAA declination calculator.
pub struct NoaaDeclinationService {
    client: reqwest::Client,
    service_url: String,
}

impl NoaaDeclinationService {
    pub fn new() -> Result<Self, DeclinationError> {
        Self::from_config(&DeclinationConfig::default())
    }

    pub fn from_config(config: &DeclinationConfig) -> Result<Self, DeclinationError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeclinationError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            service_url: config.service_url.clone(),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn request_url(&self, request: &DeclinationRequest) -> Result<reqwest::Url, DeclinationError> {
        reqwest::Url::parse_with_params(&self.service_url, request.query_pairs())
            .map_err(|e| DeclinationError::Network(format!("{}: {e}", self.service_url)))
    }
}

impl DeclinationService for NoaaDeclinationService {
    async fn lookup(&self, request: &DeclinationRequest) -> Result<f64, DeclinationError> {
        let url = self.request_url(request)?;
        debug!(%url, "requesting declination");

        let response = self.client.get(url).send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(DeclinationError::Network(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }
        let body = response.text().await.map_err(network_error)?;
        parse_declination_reply(&body)
    }
}

fn network_error(error: reqwest::Error) -> DeclinationError {
    if error.is_timeout() {
        DeclinationError::Timeout
    } else {
        DeclinationError::Network(error.to_string())
    }
}

/// Extracts `maggridresult/result/declination` from a calculator reply.
pub fn parse_declination_reply(xml: &str) -> Result<f64, DeclinationError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut declination: Option<String> = None;
    let mut errors = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| DeclinationError::Xml(e.to_string()))?;
                if path.iter().any(|name| name == "errors") {
                    errors.push_str(text.trim());
                    errors.push(' ');
                } else if declination.is_none() && is_declination_element(&path) {
                    declination = Some(text.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DeclinationError::Xml(e.to_string())),
            _ => {}
        }
    }

    if let Some(value) = declination.as_deref().and_then(|text| text.parse::<f64>().ok()) {
        if value.is_finite() {
            return Ok(value);
        }
    }
    let errors = errors.trim();
    if !errors.is_empty() {
        return Err(DeclinationError::Service(errors.to_string()));
    }
    match declination {
        Some(text) => Err(DeclinationError::InvalidValue(text)),
        None => Err(DeclinationError::NotFound),
    }
}

fn is_declination_element(path: &[String]) -> bool {
    matches!(path, [.., grid, result, declination]
        if grid == "maggridresult" && result == "result" && declination == "declination")
}

/// Identifies one lookup started with [`DeclinationLookup::begin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// Tracks the single lookup in flight for an editing session.
#[derive(Debug, Default)]
pub struct DeclinationLookup {
    generation: u64,
    pending: Option<u64>,
}

impl DeclinationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a lookup. Any earlier one becomes stale.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.pending = Some(self.generation);
        Ticket(self.generation)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply the reply for `ticket` to `georef`.
    ///
    /// Returns `Ok(None)` for a stale ticket without touching `georef`.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<f64, DeclinationError>,
        georef: &mut Georeferencing,
        policy: UpdatePolicy,
    ) -> Result<Option<Changes>, DeclinationError> {
        if self.pending != Some(ticket.0) {
            warn!(ticket = ticket.0, "ignoring stale declination reply");
            return Ok(None);
        }
        self.pending = None;
        let value = result?;
        Ok(Some(georef.apply_declination_lookup(value, policy)?))
    }
}
