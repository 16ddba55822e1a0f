//! Artifact frame construction and CSV writing.
//!
//! Converts typed rows into Polars frames with the artifact column names
//! and writes them through a temporary file, so a reader never observes a
//! half-written artifact.

use crate::constants::artifact_columns as cols;
use crate::error::Result;
use crate::models::{CleanedRecord, LocationSummary, MeasureCatalogEntry, StateAggregate};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-location rows of one measure partition
pub fn measure_frame(records: &[CleanedRecord]) -> Result<DataFrame> {
    let df = df!(
        cols::LOCATION_NAME => records.iter().map(|r| r.location_name().to_string()).collect::<Vec<_>>(),
        cols::LAT => records.iter().map(|r| r.latitude()).collect::<Vec<_>>(),
        cols::LNG => records.iter().map(|r| r.longitude()).collect::<Vec<_>>(),
        cols::STATE => records.iter().map(|r| r.state().to_string()).collect::<Vec<_>>(),
        cols::POPULATION => records.iter().map(|r| r.population()).collect::<Vec<_>>(),
        cols::VALUE => records.iter().map(|r| r.value()).collect::<Vec<_>>(),
        cols::VALUE_UNIT => records.iter().map(|r| r.value_unit().map(str::to_string)).collect::<Vec<_>>(),
        cols::VALUE_TYPE => records.iter().map(|r| r.value_type().map(str::to_string)).collect::<Vec<_>>(),
        cols::LOW_CONFIDENCE => records.iter().map(|r| r.low_confidence()).collect::<Vec<_>>(),
        cols::HIGH_CONFIDENCE => records.iter().map(|r| r.high_confidence()).collect::<Vec<_>>(),
        cols::MEASURE_SHORT => records.iter().map(|r| r.short_label().to_string()).collect::<Vec<_>>(),
        cols::MEASURE => records.iter().map(|r| r.measure().to_string()).collect::<Vec<_>>()
    )?;
    Ok(df)
}

/// Per-state rollup rows of one measure
pub fn state_frame(label: &str, aggregates: &[StateAggregate]) -> Result<DataFrame> {
    let df = df!(
        cols::STATE => aggregates.iter().map(|a| a.state.clone()).collect::<Vec<_>>(),
        cols::LAT => aggregates.iter().map(|a| a.latitude).collect::<Vec<_>>(),
        cols::LNG => aggregates.iter().map(|a| a.longitude).collect::<Vec<_>>(),
        cols::POPULATION => aggregates.iter().map(|a| a.population).collect::<Vec<_>>(),
        cols::VALUE => aggregates.iter().map(|a| a.value).collect::<Vec<_>>(),
        cols::VALUE_UNIT => aggregates.iter().map(|a| a.value_unit.clone()).collect::<Vec<_>>(),
        cols::VALUE_TYPE => aggregates.iter().map(|a| a.value_type.clone()).collect::<Vec<_>>(),
        cols::LOW_CONFIDENCE => aggregates.iter().map(|a| a.low_confidence).collect::<Vec<_>>(),
        cols::HIGH_CONFIDENCE => aggregates.iter().map(|a| a.high_confidence).collect::<Vec<_>>(),
        cols::MEASURE_SHORT => aggregates.iter().map(|a| a.short_label.clone()).collect::<Vec<_>>(),
        cols::LOCATION_COUNT => aggregates.iter().map(|a| a.location_count).collect::<Vec<_>>(),
        cols::LOCATION_NAME => aggregates.iter().map(|a| a.state.clone()).collect::<Vec<_>>(),
        cols::MEASURE => aggregates.iter().map(|_| label.to_string()).collect::<Vec<_>>()
    )?;
    Ok(df)
}

/// One row per unique location.
///
/// `id_column` names the identifier column when locations carry one;
/// `location_type` adds a constant kind column.
pub fn locations_frame(
    locations: &[LocationSummary],
    id_column: Option<&str>,
    location_type: Option<&str>,
) -> Result<DataFrame> {
    let mut df = df!(
        cols::LOCATION_NAME => locations.iter().map(|l| l.location_name.clone()).collect::<Vec<_>>(),
        cols::LAT => locations.iter().map(|l| l.latitude).collect::<Vec<_>>(),
        cols::LNG => locations.iter().map(|l| l.longitude).collect::<Vec<_>>(),
        cols::STATE => locations.iter().map(|l| l.state.clone()).collect::<Vec<_>>(),
        cols::POPULATION => locations.iter().map(|l| l.population).collect::<Vec<_>>(),
        cols::MEASURE_COUNT => locations.iter().map(|l| l.measure_count).collect::<Vec<_>>()
    )?;

    if let Some(name) = id_column {
        let ids: Vec<Option<String>> = locations.iter().map(|l| l.location_id.clone()).collect();
        df.with_column(Column::new(name.into(), ids))?;
    }
    if let Some(kind) = location_type {
        let kinds: Vec<&str> = vec![kind; locations.len()];
        df.with_column(Column::new(cols::LOCATION_TYPE.into(), kinds))?;
    }
    Ok(df)
}

/// Label -> key -> display label catalog
pub fn catalog_frame(entries: &[MeasureCatalogEntry]) -> Result<DataFrame> {
    let df = df!(
        cols::MEASURE_CLEAN => entries.iter().map(|e| e.label.clone()).collect::<Vec<_>>(),
        cols::MEASURE_KEY => entries.iter().map(|e| e.key.clone()).collect::<Vec<_>>(),
        cols::MEASURE_SHORT => entries.iter().map(|e| e.short_label.clone()).collect::<Vec<_>>()
    )?;
    Ok(df)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a frame as CSV, creating parent directories as needed
pub fn write_frame(path: &Path, df: &mut DataFrame) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temporary_path(path);
    {
        let mut file = std::fs::File::create(&tmp)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)?;
    }
    std::fs::rename(&tmp, path)?;

    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(df.height())
}
