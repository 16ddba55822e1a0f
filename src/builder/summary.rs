//! Dataset-wide summaries: the location summary and the measure catalog.

use crate::measure_key::MeasureKeyRegistry;
use crate::models::{CleanedRecord, LocationSummary, MeasureCatalogEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Identity of a location: name, id, state and the exact point/population seen
type LocationKey = (String, Option<String>, String, u64, u64, u64);

/// One row per unique location with the number of distinct measures observed
pub fn summarize_locations(records: &[CleanedRecord]) -> Vec<LocationSummary> {
    let mut groups: BTreeMap<LocationKey, (&CleanedRecord, BTreeSet<&str>)> = BTreeMap::new();

    for record in records {
        let key = (
            record.location_name().to_string(),
            record.location_id().map(str::to_string),
            record.state().to_string(),
            record.latitude().to_bits(),
            record.longitude().to_bits(),
            record.population().to_bits(),
        );
        groups
            .entry(key)
            .or_insert_with(|| (record, BTreeSet::new()))
            .1
            .insert(record.measure());
    }

    let mut summaries: Vec<LocationSummary> = groups
        .into_values()
        .map(|(record, measures)| LocationSummary {
            location_name: record.location_name().to_string(),
            location_id: record.location_id().map(str::to_string),
            latitude: record.latitude(),
            longitude: record.longitude(),
            state: record.state().to_string(),
            population: record.population(),
            measure_count: measures.len() as u32,
        })
        .collect();

    summaries.sort_by(|a, b| {
        a.location_name
            .cmp(&b.location_name)
            .then_with(|| a.state.cmp(&b.state))
            .then_with(|| a.latitude.total_cmp(&b.latitude))
            .then_with(|| a.longitude.total_cmp(&b.longitude))
    });
    summaries
}

/// Catalog rows for every label with a collision-free key.
///
/// `short_labels` maps full labels to display labels; labels missing from it
/// are skipped.
pub fn catalog_entries(
    registry: &MeasureKeyRegistry,
    short_labels: &BTreeMap<String, String>,
) -> Vec<MeasureCatalogEntry> {
    registry
        .assignments()
        .filter_map(|(label, key)| {
            short_labels.get(label).map(|short| MeasureCatalogEntry {
                label: label.to_string(),
                key: key.to_string(),
                short_label: short.clone(),
            })
        })
        .collect()
}
