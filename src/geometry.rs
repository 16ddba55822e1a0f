//! Point geometry parsing.
//!
//! PLACES extracts encode location as WKT-style `POINT (lng lat)` strings.
//! Parsing only extracts the pair; the envelope check is separate so callers
//! can count the two kinds of rejection independently.

use crate::config::BoundingEnvelope;
use crate::error::{PlacesError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static POINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"POINT \(([^ ]+) ([^)]+)\)").expect("point pattern is a valid regex")
});

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parse `POINT (lng lat)` into a `GeoPoint`.
///
/// Returns `ParseFailure` when the pattern does not match or either component
/// is not a finite number.
pub fn parse_point(input: &str) -> Result<GeoPoint> {
    let failure = || PlacesError::ParseFailure {
        input: input.to_string(),
    };

    let captures = POINT_PATTERN.captures(input).ok_or_else(failure)?;
    let longitude = parse_component(&captures[1]).ok_or_else(failure)?;
    let latitude = parse_component(&captures[2]).ok_or_else(failure)?;

    Ok(GeoPoint {
        latitude,
        longitude,
    })
}

/// Parse and require the point to fall inside the envelope
pub fn parse_point_within(input: &str, envelope: &BoundingEnvelope) -> Result<GeoPoint> {
    let point = parse_point(input)?;
    if envelope.contains(point.latitude, point.longitude) {
        Ok(point)
    } else {
        Err(PlacesError::OutOfEnvelope {
            lat: point.latitude,
            lng: point.longitude,
        })
    }
}

fn parse_component(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
