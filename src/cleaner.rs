//! Record cleaning for raw PLACES observations.
//!
//! Cleaning runs as ordered stages, each logging how many rows it dropped:
//!
//! 1. **Presence**: drop rows missing both value and geometry
//! 2. **Identity**: drop rows without location, state or measure label
//! 3. **Value coercion**: drop rows whose value is missing or not numeric
//! 4. **Population coercion**: strip grouping commas, drop unusable counts
//! 5. **Geometry**: parse `POINT (lng lat)` and apply the envelope
//!
//! Dropped rows are counted, never raised.

use crate::config::PipelineConfig;
use crate::error::PlacesError;
use crate::geometry::{GeoPoint, parse_point_within};
use crate::measure_key::short_label;
use crate::models::{CleanedRecord, CleanedRecordDraft, CleaningStats, RawRecord};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parse a numeric field, treating blank text as missing
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a population count, removing thousands separators first
pub fn coerce_population(text: &str) -> Option<f64> {
    let ungrouped: String = text.chars().filter(|c| *c != ',').collect();
    coerce_numeric(&ungrouped).filter(|v| *v >= 0.0)
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Intermediate row between value coercion and geometry parsing
struct CoercedRow {
    raw: RawRecord,
    value: f64,
    population: f64,
}

/// Turns raw observations into validated `CleanedRecord`s
#[derive(Debug, Clone)]
pub struct RecordCleaner {
    config: PipelineConfig,
}

impl RecordCleaner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every cleaning stage over a raw batch
    pub fn clean(&self, raw: Vec<RawRecord>) -> (Vec<CleanedRecord>, CleaningStats) {
        let mut stats = CleaningStats {
            total_input: raw.len(),
            ..Default::default()
        };

        // Stage 1: presence
        let present: Vec<RawRecord> = raw
            .into_iter()
            .filter(|r| !(is_blank(&r.value) && is_blank(&r.geolocation)))
            .collect();
        stats.after_presence_check = present.len();
        self.log_stage("presence check", stats.total_input, present.len());

        // Stage 2: identity
        let identified: Vec<RawRecord> = present
            .into_iter()
            .filter(|r| {
                let ok = !is_blank(&r.location_name) && !is_blank(&r.state) && !is_blank(&r.measure);
                if !ok {
                    debug!("Dropping row without identity: {:?}", r);
                }
                ok
            })
            .collect();
        stats.after_identity_check = identified.len();
        stats.missing_identity = stats.after_presence_check - identified.len();
        self.log_stage(
            "identity check",
            stats.after_presence_check,
            identified.len(),
        );

        // Stage 3: value coercion
        let mut with_values = Vec::with_capacity(identified.len());
        for record in identified {
            let parsed = record.value.as_deref().map(coerce_numeric);
            match parsed {
                Some(Some(value)) => with_values.push((record, value)),
                Some(None) if !is_blank(&record.value) => {
                    stats.malformed_value += 1;
                    debug!(
                        "{}",
                        PlacesError::MalformedNumeric {
                            field: "value",
                            input: record.value.clone().unwrap_or_default(),
                        }
                    );
                }
                _ => {}
            }
        }
        stats.after_value_coercion = with_values.len();
        self.log_stage(
            "value coercion",
            stats.after_identity_check,
            with_values.len(),
        );

        // Stage 4: population coercion
        let mut coerced = Vec::with_capacity(with_values.len());
        for (record, value) in with_values {
            let parsed = record.population.as_deref().and_then(coerce_population);
            match parsed {
                Some(population) => coerced.push(CoercedRow {
                    raw: record,
                    value,
                    population,
                }),
                None => {
                    stats.malformed_population += 1;
                    debug!(
                        "{}",
                        PlacesError::MalformedNumeric {
                            field: "population",
                            input: record.population.clone().unwrap_or_default(),
                        }
                    );
                }
            }
        }
        stats.after_population_coercion = coerced.len();
        self.log_stage(
            "population coercion",
            stats.after_value_coercion,
            coerced.len(),
        );

        // Stage 5: geometry
        let mut short_labels: HashMap<String, String> = HashMap::new();
        let mut cleaned = Vec::with_capacity(coerced.len());
        for row in coerced {
            let parsed = row
                .raw
                .geolocation
                .as_deref()
                .map(|text| parse_point_within(text, &self.config.envelope));
            let point = match parsed {
                Some(Ok(point)) => point,
                Some(Err(PlacesError::OutOfEnvelope { lat, lng })) => {
                    stats.out_of_envelope += 1;
                    debug!("Dropping row outside envelope: ({}, {})", lat, lng);
                    continue;
                }
                Some(Err(e)) => {
                    stats.geometry_parse_failures += 1;
                    debug!("{}", e);
                    continue;
                }
                None => {
                    stats.geometry_parse_failures += 1;
                    continue;
                }
            };

            match self.finish(row, point, &mut short_labels) {
                Ok(record) => cleaned.push(record),
                // try_new only reports numeric or envelope problems, which
                // the earlier stages already screen for
                Err(e) => warn!("Dropping row that failed validation: {}", e),
            }
        }
        stats.after_geometry_filter = cleaned.len();
        self.log_stage(
            "geometry filter",
            stats.after_population_coercion,
            cleaned.len(),
        );

        if stats.malformed_value > 0 || stats.malformed_population > 0 {
            warn!(
                "Dropped {} rows with malformed values and {} with malformed population",
                stats.malformed_value, stats.malformed_population
            );
        }
        info!("{}", stats.summary());

        (cleaned, stats)
    }

    fn finish(
        &self,
        row: CoercedRow,
        point: GeoPoint,
        short_labels: &mut HashMap<String, String>,
    ) -> crate::error::Result<CleanedRecord> {
        let CoercedRow {
            raw,
            value,
            population,
        } = row;

        let measure = raw.measure.unwrap_or_default().trim().to_string();
        let short = short_labels
            .entry(measure.clone())
            .or_insert_with(|| short_label(&measure, &self.config.short_label))
            .clone();

        let draft = CleanedRecordDraft {
            location_name: raw.location_name.unwrap_or_default().trim().to_string(),
            state: raw.state.unwrap_or_default().trim().to_string(),
            measure,
            short_label: short,
            value,
            value_unit: non_blank(raw.value_unit),
            value_type: non_blank(raw.value_type),
            low_confidence: raw.low_confidence.as_deref().and_then(coerce_numeric),
            high_confidence: raw.high_confidence.as_deref().and_then(coerce_numeric),
            population,
            point,
        };

        let location_id = non_blank(raw.location_id);
        Ok(CleanedRecord::try_new(draft, &self.config.envelope)?.with_location_id(location_id))
    }

    fn log_stage(&self, stage: &str, before: usize, after: usize) {
        info!(
            "Cleaning stage '{}': {} -> {} rows ({} dropped)",
            stage,
            before,
            after,
            before - after
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(location: &str, value: &str, population: &str, geometry: &str) -> RawRecord {
        RawRecord {
            location_name: Some(location.to_string()),
            location_id: None,
            state: Some("California".to_string()),
            measure: Some("Current asthma among adults aged >=18 years".to_string()),
            value: Some(value.to_string()),
            value_unit: Some("%".to_string()),
            value_type: Some("Crude prevalence".to_string()),
            low_confidence: Some("9.1".to_string()),
            high_confidence: Some("10.4".to_string()),
            population: Some(population.to_string()),
            geolocation: Some(geometry.to_string()),
        }
    }

    fn cleaner() -> RecordCleaner {
        RecordCleaner::new(PipelineConfig::default())
    }

    #[test]
    fn test_coerce_population_strips_grouping() {
        assert_eq!(coerce_population("1,234"), Some(1234.0));
        assert_eq!(coerce_population("1,234,567"), Some(1_234_567.0));
        assert_eq!(coerce_population(" 980 "), Some(980.0));
        assert_eq!(coerce_population("n/a"), None);
        assert_eq!(coerce_population("-5"), None);
        assert_eq!(coerce_population(""), None);
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric("12.5"), Some(12.5));
        assert_eq!(coerce_numeric(" 7 "), Some(7.0));
        assert_eq!(coerce_numeric("~"), None);
        assert_eq!(coerce_numeric("inf"), None);
        assert_eq!(coerce_numeric(""), None);
    }

    #[test]
    fn test_clean_valid_row() {
        let (records, stats) =
            cleaner().clean(vec![raw("Fresno", "9.8", "1,234", "POINT (-119.79 36.78)")]);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.population(), 1234.0);
        assert_eq!(record.value(), 9.8);
        assert_eq!(record.latitude(), 36.78);
        assert_eq!(record.longitude(), -119.79);
        assert_eq!(record.short_label(), "Asthma");
        assert_eq!(record.low_confidence(), Some(9.1));
        assert_eq!(stats.retained(), 1);
    }

    #[test]
    fn test_clean_counts_each_stage() {
        let mut missing_both = raw("A", "", "100", "");
        missing_both.value = None;
        missing_both.geolocation = None;

        let mut no_measure = raw("B", "1.0", "100", "POINT (-100 40)");
        no_measure.measure = None;

        let rows = vec![
            raw("Good", "5.0", "100", "POINT (-100 40)"),
            missing_both,
            no_measure,
            raw("BadValue", "suppressed", "100", "POINT (-100 40)"),
            raw("NoValue", "", "100", "POINT (-100 40)"),
            raw("BadPop", "5.0", "lots", "POINT (-100 40)"),
            raw("BadGeom", "5.0", "100", "POINT (west north)"),
            raw("London", "5.0", "100", "POINT (-0.1 51.5)"),
        ];

        let (records, stats) = cleaner().clean(rows);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location_name(), "Good");
        assert_eq!(stats.total_input, 8);
        assert_eq!(stats.after_presence_check, 7);
        assert_eq!(stats.after_identity_check, 6);
        assert_eq!(stats.missing_identity, 1);
        assert_eq!(stats.malformed_value, 1);
        assert_eq!(stats.after_value_coercion, 4);
        assert_eq!(stats.malformed_population, 1);
        assert_eq!(stats.after_population_coercion, 3);
        assert_eq!(stats.geometry_parse_failures, 1);
        assert_eq!(stats.out_of_envelope, 1);
        assert_eq!(stats.after_geometry_filter, 1);
    }

    #[test]
    fn test_clean_keeps_row_missing_only_geometry_until_geometry_stage() {
        let mut row = raw("NoGeom", "5.0", "100", "");
        row.geolocation = None;

        let (records, stats) = cleaner().clean(vec![row]);

        assert!(records.is_empty());
        assert_eq!(stats.after_presence_check, 1);
        assert_eq!(stats.after_population_coercion, 1);
        assert_eq!(stats.geometry_parse_failures, 1);
    }

    #[test]
    fn test_identity_drops_are_not_counted_as_value_drops() {
        let mut no_state = raw("Fresno", "9.8", "100", "POINT (-119.79 36.78)");
        no_state.state = Some("  ".to_string());

        let (records, stats) = cleaner().clean(vec![
            no_state,
            raw("Clovis", "8.1", "100", "POINT (-119.7 36.82)"),
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(stats.after_identity_check, 1);
        assert_eq!(stats.after_value_coercion, 1);
        assert_eq!(stats.malformed_value, 0);
    }

    #[test]
    fn test_clean_carries_location_id() {
        let mut row = raw("Autauga", "33.1", "55,869", "POINT (-86.64 32.53)");
        row.location_id = Some(" 01001 ".to_string());

        let (records, _) = cleaner().clean(vec![row]);

        assert_eq!(records[0].location_id(), Some("01001"));
    }

    #[test]
    fn test_clean_empty_batch() {
        let (records, stats) = cleaner().clean(Vec::new());
        assert!(records.is_empty());
        assert_eq!(stats, CleaningStats::default());
    }

    #[test]
    fn test_clean_trims_measure_label() {
        let mut row = raw("Fresno", "9.8", "100", "POINT (-119.79 36.78)");
        row.measure = Some("  Obesity among adults aged >=18 years ".to_string());
        let (records, _) = cleaner().clean(vec![row]);
        assert_eq!(records[0].measure(), "Obesity among adults aged >=18 years");
        assert_eq!(records[0].short_label(), "Obesity");
    }
}
