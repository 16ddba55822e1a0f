//! Population-weighted state rollups.
//!
//! Takes the cleaned records of one measure partition and produces one
//! `StateAggregate` per state, ordered by state name.
//!
//! Confidence bounds are the plain mean of each location's bounds, not
//! population-weighted like the value. Display label, unit and value type
//! come from the first record seen in each state; `partition_inconsistencies`
//! lets callers check that those fields really are constant beforehand.

use crate::models::{CleanedRecord, StateAggregate};
use std::collections::BTreeMap;

/// Weighted mean of `(value, weight)` pairs.
///
/// Falls back to the unweighted mean when every weight is zero. Returns
/// `None` for an empty slice.
pub fn weighted_mean(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }

    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        let weighted: f64 = pairs.iter().map(|(v, w)| v * w).sum();
        Some(weighted / total_weight)
    } else {
        Some(pairs.iter().map(|(v, _)| v).sum::<f64>() / pairs.len() as f64)
    }
}

/// Mean of the present values, `None` when none are present
fn mean_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    sum / count as f64
}

/// Roll one measure's records up to one row per state
pub fn aggregate_by_state(records: &[CleanedRecord]) -> Vec<StateAggregate> {
    let mut groups: BTreeMap<&str, Vec<&CleanedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.state()).or_default().push(record);
    }

    groups
        .into_iter()
        .filter_map(|(state, group)| {
            let first = group.first()?;
            let pairs: Vec<(f64, f64)> = group
                .iter()
                .map(|r| (r.value(), r.population()))
                .collect();
            let value = weighted_mean(&pairs)?;

            Some(StateAggregate {
                state: state.to_string(),
                latitude: mean(group.iter().map(|r| r.latitude())),
                longitude: mean(group.iter().map(|r| r.longitude())),
                population: group.iter().map(|r| r.population()).sum(),
                value,
                value_unit: first.value_unit().map(str::to_string),
                value_type: first.value_type().map(str::to_string),
                low_confidence: mean_present(group.iter().map(|r| r.low_confidence())),
                high_confidence: mean_present(group.iter().map(|r| r.high_confidence())),
                short_label: first.short_label().to_string(),
                location_count: group.len() as u32,
            })
        })
        .collect()
}

/// Names of the per-measure fields that vary within a partition
pub fn partition_inconsistencies(records: &[CleanedRecord]) -> Vec<&'static str> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    if records.iter().any(|r| r.short_label() != first.short_label()) {
        fields.push("short_label");
    }
    if records.iter().any(|r| r.value_unit() != first.value_unit()) {
        fields.push("value_unit");
    }
    if records.iter().any(|r| r.value_type() != first.value_type()) {
        fields.push("value_type");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundingEnvelope;
    use crate::geometry::GeoPoint;
    use crate::models::CleanedRecordDraft;

    fn record(state: &str, population: f64, value: f64, lat: f64, lng: f64) -> CleanedRecord {
        CleanedRecord::try_new(
            CleanedRecordDraft {
                location_name: format!("{}-{}", state, population),
                state: state.to_string(),
                measure: "Obesity among adults aged >=18 years".to_string(),
                short_label: "Obesity".to_string(),
                value,
                value_unit: Some("%".to_string()),
                value_type: Some("Crude prevalence".to_string()),
                low_confidence: Some(value - 1.0),
                high_confidence: Some(value + 1.0),
                population,
                point: GeoPoint {
                    latitude: lat,
                    longitude: lng,
                },
            },
            &BoundingEnvelope::us(),
        )
        .unwrap()
    }

    #[test]
    fn test_weighted_mean_for_two_locations() {
        let records = vec![
            record("CA", 100.0, 10.0, 36.0, -120.0),
            record("CA", 300.0, 20.0, 38.0, -122.0),
        ];

        let states = aggregate_by_state(&records);

        assert_eq!(states.len(), 1);
        let ca = &states[0];
        assert_eq!(ca.state, "CA");
        assert_eq!(ca.value, 17.5);
        assert_eq!(ca.population, 400.0);
        assert_eq!(ca.location_count, 2);
        assert_eq!(ca.latitude, 37.0);
        assert_eq!(ca.longitude, -121.0);
        assert_eq!(ca.short_label, "Obesity");
        assert_eq!(ca.value_unit.as_deref(), Some("%"));
    }

    #[test]
    fn test_confidence_bounds_are_unweighted_means() {
        let records = vec![
            record("CA", 100.0, 10.0, 36.0, -120.0),
            record("CA", 300.0, 20.0, 38.0, -122.0),
        ];

        let ca = &aggregate_by_state(&records)[0];

        assert_eq!(ca.low_confidence, Some(14.0));
        assert_eq!(ca.high_confidence, Some(16.0));
    }

    #[test]
    fn test_zero_weights_fall_back_to_plain_mean() {
        let records = vec![
            record("WY", 0.0, 10.0, 42.0, -107.0),
            record("WY", 0.0, 30.0, 43.0, -108.0),
            record("WY", 0.0, 35.0, 44.0, -106.0),
        ];

        let wy = &aggregate_by_state(&records)[0];

        assert_eq!(wy.value, 25.0);
        assert_eq!(wy.population, 0.0);
    }

    #[test]
    fn test_weighted_mean_within_value_range() {
        let cases: Vec<Vec<(f64, f64)>> = vec![
            vec![(1.0, 5.0), (9.0, 0.0), (4.0, 1.0)],
            vec![(12.5, 1_000_000.0), (13.0, 1.0)],
            vec![(0.0, 3.0), (100.0, 7.0), (50.0, 0.0), (25.0, 2.0)],
            vec![(-3.0, 0.5), (3.0, 0.5)],
        ];

        for pairs in cases {
            let mean = weighted_mean(&pairs).unwrap();
            let min = pairs.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min);
            let max = pairs
                .iter()
                .map(|(v, _)| *v)
                .fold(f64::NEG_INFINITY, f64::max);
            assert!(
                mean >= min && mean <= max,
                "{} outside [{}, {}]",
                mean,
                min,
                max
            );
        }
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        assert!(aggregate_by_state(&[]).is_empty());
        assert_eq!(weighted_mean(&[]), None);
    }

    #[test]
    fn test_states_sorted_and_separate() {
        let records = vec![
            record("Texas", 10.0, 5.0, 31.0, -99.0),
            record("Alabama", 10.0, 7.0, 33.0, -86.0),
            record("Texas", 30.0, 9.0, 30.0, -97.0),
        ];

        let states = aggregate_by_state(&records);

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].state, "Alabama");
        assert_eq!(states[0].location_count, 1);
        assert_eq!(states[1].state, "Texas");
        assert_eq!(states[1].value, 8.0);
        assert_eq!(states[1].location_count, 2);
    }

    #[test]
    fn test_missing_bounds_are_skipped() {
        let mut draft_records = vec![record("OR", 10.0, 5.0, 44.0, -120.0)];
        let without_bounds = CleanedRecord::try_new(
            CleanedRecordDraft {
                location_name: "Bend".to_string(),
                state: "OR".to_string(),
                measure: "Obesity among adults aged >=18 years".to_string(),
                short_label: "Obesity".to_string(),
                value: 7.0,
                value_unit: Some("%".to_string()),
                value_type: Some("Crude prevalence".to_string()),
                low_confidence: None,
                high_confidence: None,
                population: 10.0,
                point: GeoPoint {
                    latitude: 44.0,
                    longitude: -121.3,
                },
            },
            &BoundingEnvelope::us(),
        )
        .unwrap();
        draft_records.push(without_bounds);

        let or = &aggregate_by_state(&draft_records)[0];

        assert_eq!(or.low_confidence, Some(4.0));
        assert_eq!(or.high_confidence, Some(6.0));
        assert_eq!(or.value, 6.0);
    }

    #[test]
    fn test_partition_inconsistencies() {
        let consistent = vec![
            record("CA", 1.0, 1.0, 36.0, -120.0),
            record("NV", 1.0, 1.0, 39.0, -117.0),
        ];
        assert!(partition_inconsistencies(&consistent).is_empty());

        let mut mixed = consistent.clone();
        mixed.push(
            CleanedRecord::try_new(
                CleanedRecordDraft {
                    location_name: "Reno".to_string(),
                    state: "NV".to_string(),
                    measure: "Obesity among adults aged >=18 years".to_string(),
                    short_label: "Obesity".to_string(),
                    value: 2.0,
                    value_unit: Some("%".to_string()),
                    value_type: Some("Age-adjusted prevalence".to_string()),
                    low_confidence: None,
                    high_confidence: None,
                    population: 1.0,
                    point: GeoPoint {
                        latitude: 39.5,
                        longitude: -119.8,
                    },
                },
                &BoundingEnvelope::us(),
            )
            .unwrap(),
        );
        assert_eq!(partition_inconsistencies(&mixed), vec!["value_type"]);
    }
}
