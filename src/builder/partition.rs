//! Per-measure partition writing and re-reading.

use crate::aggregate::{aggregate_by_state, partition_inconsistencies};
use crate::builder::writer::{measure_frame, state_frame, write_frame};
use crate::cleaner::coerce_numeric;
use crate::config::{ArtifactLayout, BoundingEnvelope};
use crate::constants::artifact_columns as cols;
use crate::error::Result;
use crate::geometry::GeoPoint;
use crate::models::{CleanedRecord, CleanedRecordDraft};
use crate::reader::{optional_string_column, string_column};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

/// Write the per-location and per-state artifacts for one measure.
///
/// Returns the total number of rows written across both files.
pub fn write_partition(
    layout: &ArtifactLayout,
    file_name: &str,
    label: &str,
    records: &[CleanedRecord],
) -> Result<usize> {
    let inconsistent = partition_inconsistencies(records);
    if !inconsistent.is_empty() {
        warn!(
            "Measure '{}' varies in {} across rows; state rollups use the first row",
            label,
            inconsistent.join(", ")
        );
    }

    let mut measure_df = measure_frame(records)?;
    let mut rows = write_frame(&layout.measure_file(file_name), &mut measure_df)?;

    let states = aggregate_by_state(records);
    let mut state_df = state_frame(label, &states)?;
    rows += write_frame(&layout.state_measure_file(file_name), &mut state_df)?;

    debug!(
        "Wrote partition '{}': {} locations, {} states",
        label,
        records.len(),
        states.len()
    );
    Ok(rows)
}

/// Rebuild cleaned records from a persisted per-location artifact.
///
/// Only rows whose `Measure` column equals `label` are returned. Rows that no
/// longer validate are skipped with a warning.
pub fn records_from_partition(
    df: &DataFrame,
    label: &str,
    envelope: &BoundingEnvelope,
) -> Result<Vec<CleanedRecord>> {
    let names = string_column(df, cols::LOCATION_NAME)?;
    let lats = string_column(df, cols::LAT)?;
    let lngs = string_column(df, cols::LNG)?;
    let states = string_column(df, cols::STATE)?;
    let populations = string_column(df, cols::POPULATION)?;
    let values = string_column(df, cols::VALUE)?;
    let measures = string_column(df, cols::MEASURE)?;
    let shorts = string_column(df, cols::MEASURE_SHORT)?;
    let units = optional_string_column(df, cols::VALUE_UNIT)?;
    let types = optional_string_column(df, cols::VALUE_TYPE)?;
    let lows = optional_string_column(df, cols::LOW_CONFIDENCE)?;
    let highs = optional_string_column(df, cols::HIGH_CONFIDENCE)?;

    let mut records = Vec::new();
    for i in 0..df.height() {
        if measures[i].as_deref() != Some(label) {
            continue;
        }

        let draft = (|| {
            Some(CleanedRecordDraft {
                location_name: names[i].clone()?,
                state: states[i].clone()?,
                measure: label.to_string(),
                short_label: shorts[i].clone().unwrap_or_default(),
                value: coerce_numeric(values[i].as_deref()?)?,
                value_unit: units[i].clone(),
                value_type: types[i].clone(),
                low_confidence: lows[i].as_deref().and_then(coerce_numeric),
                high_confidence: highs[i].as_deref().and_then(coerce_numeric),
                population: coerce_numeric(populations[i].as_deref()?)?,
                point: GeoPoint {
                    latitude: coerce_numeric(lats[i].as_deref()?)?,
                    longitude: coerce_numeric(lngs[i].as_deref()?)?,
                },
            })
        })();

        let Some(draft) = draft else {
            warn!("Skipping incomplete row {} in partition '{}'", i, label);
            continue;
        };

        match CleanedRecord::try_new(draft, envelope) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping row {} in partition '{}': {}", i, label, e),
        }
    }

    Ok(records)
}
