//! Geographic coordinates and their free-form text representation.
//!
//! The parser accepts decimal degrees (signed or with hemisphere letters) and
//! degree/minute/second notation such as `48°31'43.9"N 12°8'25.3"E`. Fields are
//! separated by whitespace. A hemisphere letter and its value separated by an
//! inner space inside a DMS coordinate (`S 48° 31' 43.9"`) is not supported.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A geographic position, angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// Output styles of [`LatLon::format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatLonFormat {
    /// Signed decimal degrees: `48.528870000 -12.140370000`
    Decimal,
    /// Decimal degrees with hemisphere letters: `48.528870000°N 12.140370000°W`
    Hemisphere,
    /// Degrees, minutes and seconds: `48°31'43.9320"N 12°8'25.3320"W`
    Dms,
}

impl LatLon {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude.to_radians(), longitude.to_radians())
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude.to_degrees()
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Returns the same position with the longitude wrapped to (−π, π].
    pub fn normalized(&self) -> Self {
        let mut longitude = self.longitude.rem_euclid(2.0 * PI);
        if longitude > PI {
            longitude -= 2.0 * PI;
        }
        Self::new(self.latitude, longitude)
    }

    /// Parses a coordinate string into a position.
    ///
    /// A field without hemisphere letter goes to the latitude if none was
    /// assigned yet, otherwise to the longitude. `S` and `W` negate the field.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut buffer = String::new();
        let mut latitude = 0.0;
        let mut longitude = 0.0;
        let mut latitude_set = false;

        let mut letter: Option<char> = None;
        let mut degrees = 0.0;
        let mut degrees_set = false;
        let mut minutes_set = false;

        // The trailing space terminates the last field.
        let mut chars = text
            .chars()
            .chain(std::iter::once(' '))
            .map(|c| c.to_ascii_uppercase())
            .enumerate()
            .peekable();

        while let Some((index, c)) = chars.next() {
            match c {
                '0'..='9' | '.' | '-' => buffer.push(c),
                '°' => {
                    degrees = parse_number(&buffer)?;
                    degrees_set = true;
                    buffer.clear();
                }
                // Latin-1 reading of the UTF-8 lead byte of '°'
                'Â' => continue,
                '"' => {
                    degrees += parse_number(&buffer)? / 3600.0;
                    buffer.clear();
                }
                '\'' => {
                    if chars.next_if(|&(_, next)| next == '\'').is_some() {
                        degrees += parse_number(&buffer)? / 3600.0;
                        // A trailing field after '' counts as seconds.
                        minutes_set = true;
                    } else {
                        degrees += parse_number(&buffer)? / 60.0;
                        minutes_set = true;
                    }
                    buffer.clear();
                }
                'N' | 'E' | 'S' | 'W' => letter = Some(c),
                ' ' | '\t' | '\r' | '\n' => {
                    if buffer.is_empty() && !degrees_set {
                        continue;
                    }

                    if !buffer.is_empty() {
                        let value = parse_number(&buffer)?;
                        if !degrees_set {
                            degrees = value;
                        } else if !minutes_set {
                            degrees += value / 60.0;
                        } else {
                            degrees += value / 3600.0;
                        }
                        buffer.clear();
                    }

                    if matches!(letter, Some('S' | 'W')) {
                        degrees = -degrees;
                    }

                    match letter {
                        Some('N' | 'S') => {
                            latitude = degrees;
                            latitude_set = true;
                        }
                        Some(_) => longitude = degrees,
                        None if latitude_set => longitude = degrees,
                        None => {
                            latitude = degrees;
                            latitude_set = true;
                        }
                    }

                    letter = None;
                    degrees = 0.0;
                    degrees_set = false;
                    minutes_set = false;
                }
                character => return Err(ParseError::UnexpectedCharacter { character, index }),
            }
        }

        Ok(Self::from_degrees(latitude, longitude))
    }

    /// Formats the position so that [`LatLon::parse`] reads it back.
    pub fn format(&self, format: LatLonFormat) -> String {
        let lat = self.latitude_degrees();
        let lon = self.longitude_degrees();
        match format {
            LatLonFormat::Decimal => format!("{lat:.9} {lon:.9}"),
            LatLonFormat::Hemisphere => format!(
                "{:.9}°{} {:.9}°{}",
                lat.abs(),
                hemisphere(lat, 'N', 'S'),
                lon.abs(),
                hemisphere(lon, 'E', 'W'),
            ),
            LatLonFormat::Dms => format!(
                "{}{} {}{}",
                dms(lat),
                hemisphere(lat, 'N', 'S'),
                dms(lon),
                hemisphere(lon, 'E', 'W'),
            ),
        }
    }
}

fn parse_number(buffer: &str) -> Result<f64, ParseError> {
    if buffer.is_empty() {
        return Ok(0.0);
    }
    buffer
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(buffer.to_string()))
}

fn hemisphere(value: f64, positive: char, negative: char) -> char {
    if value < 0.0 {
        negative
    } else {
        positive
    }
}

/// Unsigned `D°M'S.ssss"` with seconds rounded before splitting, so that
/// 59.99999" carries into the minutes instead of printing as 60.0000".
fn dms(value: f64) -> String {
    const SECOND_STEPS: u64 = 10_000;
    let total = (value.abs() * 3600.0 * SECOND_STEPS as f64).round() as u64;
    let degrees = total / (3600 * SECOND_STEPS);
    let minutes = (total / (60 * SECOND_STEPS)) % 60;
    let seconds = (total % (60 * SECOND_STEPS)) as f64 / SECOND_STEPS as f64;
    format!("{degrees}°{minutes}'{seconds:.4}\"")
}

impl FromStr for LatLon {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(LatLonFormat::Hemisphere))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn degrees(text: &str) -> (f64, f64) {
        let ll = LatLon::parse(text).unwrap();
        (ll.latitude_degrees(), ll.longitude_degrees())
    }

    #[test]
    fn test_single_dms_latitude() {
        let (lat, lon) = degrees("48°31'43.932\" N");
        assert_relative_eq!(lat, 48.0 + 31.0 / 60.0 + 43.932 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(lat, 48.528870, epsilon = 1e-6);
        assert_relative_eq!(lon, 0.0);
    }

    #[test]
    fn test_dms_pair() {
        let (lat, lon) = degrees("48°31'43.9\"N 12°8'25.3\"E");
        assert_relative_eq!(lat, 48.0 + 31.0 / 60.0 + 43.9 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(lon, 12.0 + 8.0 / 60.0 + 25.3 / 3600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_doubled_quote_means_seconds() {
        let (lat, lon) = degrees("48°31'43.9''S 12°8'25.3''W");
        assert_relative_eq!(lat, -(48.0 + 31.0 / 60.0 + 43.9 / 3600.0), epsilon = 1e-9);
        assert_relative_eq!(lon, -(12.0 + 8.0 / 60.0 + 25.3 / 3600.0), epsilon = 1e-9);
    }

    #[test]
    fn test_doubled_quote_then_trailing_field() {
        // The field after '' is read as further seconds, not as minutes
        let (lat, lon) = degrees("48°30''15");
        assert_relative_eq!(lat, 48.0 + 30.0 / 3600.0 + 15.0 / 3600.0, epsilon = 1e-12);
        assert_relative_eq!(lat, 48.0125, epsilon = 1e-12);
        assert_relative_eq!(lon, 0.0);
    }

    #[test]
    fn test_signed_decimal_pair() {
        let (lat, lon) = degrees("-33.8568 151.2153");
        assert_relative_eq!(lat, -33.8568, epsilon = 1e-12);
        assert_relative_eq!(lon, 151.2153, epsilon = 1e-12);
    }

    #[test]
    fn test_hemisphere_letters_any_position() {
        let (lat, lon) = degrees("s33.8568 E151.2153");
        assert_relative_eq!(lat, -33.8568, epsilon = 1e-12);
        assert_relative_eq!(lon, 151.2153, epsilon = 1e-12);

        // A letter separated by a space carries over to the next value.
        let (lat, lon) = degrees("N 48.5 W 12.25");
        assert_relative_eq!(lat, 48.5, epsilon = 1e-12);
        assert_relative_eq!(lon, -12.25, epsilon = 1e-12);
    }

    #[test]
    fn test_east_before_north() {
        let (lat, lon) = degrees("12.25E 48.5N");
        assert_relative_eq!(lat, 48.5, epsilon = 1e-12);
        assert_relative_eq!(lon, 12.25, epsilon = 1e-12);
    }

    #[test]
    fn test_degree_minutes_without_seconds() {
        let (lat, lon) = degrees("48°31.732 12°08.422");
        assert_relative_eq!(lat, 48.0 + 31.732 / 60.0, epsilon = 1e-9);
        assert_relative_eq!(lon, 12.0 + 8.422 / 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_latin1_degree_lead_byte_is_skipped() {
        let (lat, lon) = degrees("48Â°30' 12Â°15'");
        assert_relative_eq!(lat, 48.5, epsilon = 1e-12);
        assert_relative_eq!(lon, 12.25, epsilon = 1e-12);
    }

    #[test]
    fn test_other_whitespace_separates_fields() {
        let (lat, lon) = degrees("\t47.1\r\n8.2\n");
        assert_relative_eq!(lat, 47.1, epsilon = 1e-12);
        assert_relative_eq!(lon, 8.2, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_character_fails() {
        let err = LatLon::parse("48X31").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedCharacter {
                character: 'X',
                index: 2
            }
        );
        assert!("48°31'43\" N, 12° E".parse::<LatLon>().is_err());
    }

    #[test]
    fn test_invalid_number_fails() {
        assert_eq!(
            LatLon::parse("1.2.3 4"),
            Err(ParseError::InvalidNumber("1.2.3".into()))
        );
        assert!(LatLon::parse("- 4").is_err());
    }

    #[test]
    fn test_empty_input_is_origin() {
        assert_eq!(LatLon::parse("   ").unwrap(), LatLon::default());
    }

    #[test]
    fn test_result_is_in_radians() {
        let ll = LatLon::parse("90 180").unwrap();
        assert_relative_eq!(ll.latitude, std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
        assert_relative_eq!(ll.longitude, PI, epsilon = 1e-15);
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let points: &[(f64, f64)] = &[
            (48.528870, 12.140370),
            (-33.856800, 151.215300),
            (0.0, 0.0),
            (-0.000001, -179.999999),
            (89.999999, -0.5),
            (12.999999999, 7.99999999),
        ];
        for &(lat, lon) in points {
            let original = LatLon::from_degrees(lat, lon);
            for format in [LatLonFormat::Decimal, LatLonFormat::Hemisphere, LatLonFormat::Dms] {
                let text = original.format(format);
                let parsed = LatLon::parse(&text).unwrap();
                assert_relative_eq!(parsed.latitude, original.latitude, epsilon = 1e-9);
                assert_relative_eq!(parsed.longitude, original.longitude, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_dms_formatting_carries_seconds() {
        let ll = LatLon::from_degrees(10.0 - 1e-10, -(20.0 + 0.5 / 60.0));
        assert_eq!(ll.format(LatLonFormat::Dms), "10°0'0.0000\"N 20°0'30.0000\"W");
    }

    #[test]
    fn test_display_uses_hemisphere_letters() {
        let ll = LatLon::from_degrees(-12.5, 45.25);
        assert_eq!(ll.to_string(), "12.500000000°S 45.250000000°E");
    }

    #[test]
    fn test_normalized_longitude() {
        let ll = LatLon::from_degrees(10.0, 190.0).normalized();
        assert_relative_eq!(ll.longitude_degrees(), -170.0, epsilon = 1e-9);
        let ll = LatLon::from_degrees(10.0, -190.0).normalized();
        assert_relative_eq!(ll.longitude_degrees(), 170.0, epsilon = 1e-9);
    }
}
