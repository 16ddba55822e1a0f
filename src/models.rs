//! Core data structures for PLACES processing.
//!
//! Each pipeline stage has its own record type: `RawRecord` as read,
//! `CleanedRecord` after coercion and geometry validation, and
//! `StateAggregate` / `LocationSummary` as derived rows. Statistics and build
//! reports live here too.

use crate::config::BoundingEnvelope;
use crate::error::{PlacesError, Result};
use crate::geometry::GeoPoint;
use serde::{Deserialize, Serialize};

/// One observation exactly as it appears in the raw extract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub location_name: Option<String>,
    /// Location identifier such as a county FIPS code, when configured
    pub location_id: Option<String>,
    pub state: Option<String>,
    pub measure: Option<String>,
    pub value: Option<String>,
    pub value_unit: Option<String>,
    pub value_type: Option<String>,
    pub low_confidence: Option<String>,
    pub high_confidence: Option<String>,
    pub population: Option<String>,
    pub geolocation: Option<String>,
}

/// Field values for a `CleanedRecord` before its invariants are checked
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecordDraft {
    pub location_name: String,
    pub state: String,
    pub measure: String,
    pub short_label: String,
    pub value: f64,
    pub value_unit: Option<String>,
    pub value_type: Option<String>,
    pub low_confidence: Option<f64>,
    pub high_confidence: Option<f64>,
    pub population: f64,
    pub point: GeoPoint,
}

/// An observation that passed cleaning.
///
/// Every instance has a finite value, a finite non-negative population, and
/// coordinates inside the envelope it was validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    location_name: String,
    location_id: Option<String>,
    state: String,
    measure: String,
    short_label: String,
    value: f64,
    value_unit: Option<String>,
    value_type: Option<String>,
    low_confidence: Option<f64>,
    high_confidence: Option<f64>,
    population: f64,
    point: GeoPoint,
}

impl CleanedRecord {
    /// Validate a draft against the record invariants
    pub fn try_new(draft: CleanedRecordDraft, envelope: &BoundingEnvelope) -> Result<Self> {
        if !draft.value.is_finite() {
            return Err(PlacesError::MalformedNumeric {
                field: "value",
                input: draft.value.to_string(),
            });
        }
        if !draft.population.is_finite() || draft.population < 0.0 {
            return Err(PlacesError::MalformedNumeric {
                field: "population",
                input: draft.population.to_string(),
            });
        }
        let GeoPoint {
            latitude,
            longitude,
        } = draft.point;
        if !envelope.contains(latitude, longitude) {
            return Err(PlacesError::OutOfEnvelope {
                lat: latitude,
                lng: longitude,
            });
        }

        Ok(Self {
            location_name: draft.location_name,
            location_id: None,
            state: draft.state,
            measure: draft.measure,
            short_label: draft.short_label,
            value: draft.value,
            value_unit: draft.value_unit,
            value_type: draft.value_type,
            // NaN bounds carry no information; store them as absent
            low_confidence: draft.low_confidence.filter(|v| v.is_finite()),
            high_confidence: draft.high_confidence.filter(|v| v.is_finite()),
            population: draft.population,
            point: draft.point,
        })
    }

    /// Attach a location identifier
    pub fn with_location_id(mut self, location_id: Option<String>) -> Self {
        self.location_id = location_id;
        self
    }

    pub fn location_name(&self) -> &str {
        &self.location_name
    }

    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn measure(&self) -> &str {
        &self.measure
    }

    pub fn short_label(&self) -> &str {
        &self.short_label
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn value_unit(&self) -> Option<&str> {
        self.value_unit.as_deref()
    }

    pub fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }

    pub fn low_confidence(&self) -> Option<f64> {
        self.low_confidence
    }

    pub fn high_confidence(&self) -> Option<f64> {
        self.high_confidence
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    pub fn latitude(&self) -> f64 {
        self.point.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.point.longitude
    }
}

/// One row per unique location in a dataset snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub location_name: String,
    pub location_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub state: String,
    pub population: f64,
    pub measure_count: u32,
}

/// Population-weighted rollup of one measure within one state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAggregate {
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: f64,
    pub value: f64,
    pub value_unit: Option<String>,
    pub value_type: Option<String>,
    pub low_confidence: Option<f64>,
    pub high_confidence: Option<f64>,
    pub short_label: String,
    pub location_count: u32,
}

/// Catalog row linking a measure label to its storage key and display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureCatalogEntry {
    pub label: String,
    pub key: String,
    pub short_label: String,
}

/// Row counts after each cleaning stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningStats {
    /// Rows read from the raw extract
    pub total_input: usize,
    /// Rows left after dropping those missing both value and geometry
    pub after_presence_check: usize,
    /// Rows left after dropping those without location, state or measure
    pub after_identity_check: usize,
    /// Rows left after value coercion
    pub after_value_coercion: usize,
    /// Rows left after population coercion
    pub after_population_coercion: usize,
    /// Rows left after geometry parsing and the envelope check
    pub after_geometry_filter: usize,
    /// Rows without a location, state or measure label
    pub missing_identity: usize,
    /// Rows whose value was present but not numeric
    pub malformed_value: usize,
    /// Rows whose population was missing or not numeric
    pub malformed_population: usize,
    /// Rows whose geometry string did not parse
    pub geometry_parse_failures: usize,
    /// Rows whose coordinates fell outside the envelope
    pub out_of_envelope: usize,
}

impl CleaningStats {
    /// Final number of cleaned rows
    pub fn retained(&self) -> usize {
        self.after_geometry_filter
    }

    /// Rows dropped across all stages
    pub fn dropped(&self) -> usize {
        self.total_input - self.retained()
    }

    /// Percentage of input rows that survived cleaning
    pub fn retention_rate(&self) -> f64 {
        if self.total_input == 0 {
            100.0
        } else {
            (self.retained() as f64 / self.total_input as f64) * 100.0
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Cleaning Summary: {} -> {} rows ({:.1}% retained) | \
             Missing value+geometry: {} | Missing identity: {} | Malformed value: {} | \
             Malformed population: {} | Unparseable geometry: {} | Outside envelope: {}",
            self.total_input,
            self.retained(),
            self.retention_rate(),
            self.total_input - self.after_presence_check,
            self.missing_identity,
            self.malformed_value,
            self.malformed_population,
            self.geometry_parse_failures,
            self.out_of_envelope
        )
    }
}

/// A measure whose artifacts could not be built
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureFailure {
    pub label: String,
    pub key: String,
    pub reason: String,
}

/// Outcome of one derived-artifact build
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub measures_built: usize,
    /// Labels whose artifacts were written, in label order
    pub built_labels: Vec<String>,
    pub locations: usize,
    pub rows_written: usize,
    pub failures: Vec<MeasureFailure>,
    pub cleaning: CleaningStats,
    pub processing_time_ms: u128,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure recorded for a given measure key, if any
    pub fn failure_for_key(&self, key: &str) -> Option<&MeasureFailure> {
        self.failures.iter().find(|f| f.key == key)
    }

    /// Whether a label's artifacts were written by this build
    pub fn built(&self, label: &str) -> bool {
        self.built_labels.iter().any(|built| built == label)
    }

    /// Failure recorded for a given measure label, if any
    pub fn failure_for_label(&self, label: &str) -> Option<&MeasureFailure> {
        self.failures.iter().find(|f| f.label == label)
    }

    pub fn summary(&self) -> String {
        format!(
            "Build Summary: {} measures, {} locations, {} rows written, {} failures in {}ms",
            self.measures_built,
            self.locations,
            self.rows_written,
            self.failures.len(),
            self.processing_time_ms
        )
    }
}
