//! Raw extract inspection.
//!
//! A read-only look at a raw extract before building from it: shape, missing
//! values per column, value and population ranges, how many distinct
//! measures it holds and how much of its geometry parses.

use crate::cleaner::{coerce_numeric, coerce_population};
use crate::config::PipelineConfig;
use crate::error::{PlacesError, Result};
use crate::geometry::parse_point;
use crate::reader::{optional_string_column, read_string_frame};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

const SAMPLE_MEASURES: usize = 10;

/// What `inspect_raw` found in a raw extract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionReport {
    pub rows: usize,
    pub columns: Vec<String>,
    /// Columns with at least one missing value, with the count
    pub missing: Vec<(String, usize)>,
    pub numeric_values: usize,
    pub value_range: Option<(f64, f64)>,
    pub distinct_measures: usize,
    pub sample_measures: Vec<String>,
    pub geometry_parsed: usize,
    pub population_range: Option<(f64, f64)>,
}

impl InspectionReport {
    /// Percentage of rows whose geometry parsed
    pub fn geometry_share(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            (self.geometry_parsed as f64 / self.rows as f64) * 100.0
        }
    }

    pub fn summary(&self) -> String {
        let range = |r: Option<(f64, f64)>| match r {
            Some((min, max)) => format!("{:.1} - {:.1}", min, max),
            None => "n/a".to_string(),
        };
        format!(
            "Inspection Summary: {} rows x {} columns | {} columns with gaps | \
             Values: {} numeric, range {} | {} measures | \
             Geometry parsed: {} ({:.1}%) | Population range {}",
            self.rows,
            self.columns.len(),
            self.missing.len(),
            self.numeric_values,
            range(self.value_range),
            self.distinct_measures,
            self.geometry_parsed,
            self.geometry_share(),
            range(self.population_range)
        )
    }
}

fn extend_range(range: Option<(f64, f64)>, v: f64) -> Option<(f64, f64)> {
    Some(match range {
        Some((min, max)) => (min.min(v), max.max(v)),
        None => (v, v),
    })
}

/// Inspect a raw extract without cleaning it
pub fn inspect_raw(path: &Path, config: &PipelineConfig) -> Result<InspectionReport> {
    if !path.exists() {
        return Err(PlacesError::RawInputNotFound {
            path: path.to_path_buf(),
        });
    }

    let df = read_string_frame(path)?;
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let missing: Vec<(String, usize)> = df
        .get_columns()
        .iter()
        .map(|column| (column.name().to_string(), column.null_count()))
        .filter(|(_, count)| *count > 0)
        .collect();

    let names = &config.columns;

    let mut numeric_values = 0;
    let mut value_range = None;
    for v in optional_string_column(&df, &names.value)?
        .iter()
        .flatten()
        .filter_map(|text| coerce_numeric(text))
    {
        numeric_values += 1;
        value_range = extend_range(value_range, v);
    }

    let mut population_range = None;
    for v in optional_string_column(&df, &names.population)?
        .iter()
        .flatten()
        .filter_map(|text| coerce_population(text))
    {
        population_range = extend_range(population_range, v);
    }

    let mut measures: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    for label in optional_string_column(&df, &names.measure)?.into_iter().flatten() {
        if seen.insert(label.clone()) {
            measures.push(label);
        }
    }

    let geometry_parsed = optional_string_column(&df, &names.geolocation)?
        .iter()
        .flatten()
        .filter(|text| parse_point(text).is_ok())
        .count();

    let report = InspectionReport {
        rows: df.height(),
        columns,
        missing,
        numeric_values,
        value_range,
        distinct_measures: measures.len(),
        sample_measures: measures.into_iter().take(SAMPLE_MEASURES).collect(),
        geometry_parsed,
        population_range,
    };
    info!("{}", report.summary());
    Ok(report)
}
