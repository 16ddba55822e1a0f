//! Builder tests against small raw extracts written to temporary directories.

pub mod collision_tests;

use crate::config::PipelineConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const ASTHMA: &str = "Current asthma among adults aged >=18 years";
pub const OBESITY: &str = "Obesity among adults aged >=18 years";

const RAW_HEADER: &str = "StateAbbr,StateDesc,LocationName,Measure,Data_Value_Unit,Data_Value_Type,Data_Value,Low_Confidence_Limit,High_Confidence_Limit,TotalPopulation,Geolocation";

/// One raw extract line with a `POINT (lng lat)` geometry
pub fn raw_row(
    state: &str,
    location: &str,
    measure: &str,
    value: f64,
    population: &str,
    lng: f64,
    lat: f64,
) -> String {
    format!(
        "XX,{},{},{},%,Crude prevalence,{},{},{},\"{}\",POINT ({} {})",
        state,
        location,
        measure,
        value,
        value - 1.0,
        value + 1.0,
        population,
        lng,
        lat
    )
}

/// Write a raw extract and return its path
pub fn write_raw(dir: &Path, rows: &[String]) -> PathBuf {
    let path = dir.join("places_raw.csv");
    let mut contents = String::from(RAW_HEADER);
    for row in rows {
        contents.push('\n');
        contents.push_str(row);
    }
    contents.push('\n');
    fs::write(&path, contents).unwrap();
    path
}

/// The two-state fixture: California asthma rolls up to 17.5
pub fn sample_rows() -> Vec<String> {
    vec![
        raw_row("California", "Fresno", ASTHMA, 10.0, "100", -120.0, 36.0),
        raw_row("California", "Los Angeles", ASTHMA, 20.0, "300", -122.0, 38.0),
        raw_row("Texas", "Austin", ASTHMA, 8.0, "1,000", -97.7, 30.3),
        raw_row("California", "Fresno", OBESITY, 30.0, "100", -120.0, 36.0),
        raw_row("Texas", "Austin", OBESITY, 25.0, "1,000", -97.7, 30.3),
        // dropped: outside the envelope
        raw_row("Texas", "Nowhere", OBESITY, 25.0, "10", 10.0, 10.0),
    ]
}

pub fn test_config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig::default().with_output_dir(output_dir)
}
