//! Application constants for the PLACES processor
//!
//! Default column names, artifact file names, and the default short-label
//! vocabulary. Everything here is a default for `PipelineConfig`; the
//! pipeline itself reads values from configuration.

// =============================================================================
// Raw input column names (PLACES place-level release)
// =============================================================================

pub mod columns {
    pub const LOCATION_NAME: &str = "LocationName";
    pub const COUNTY_NAME: &str = "CountyName";
    pub const COUNTY_FIPS: &str = "CountyFIPS";
    pub const STATE: &str = "StateDesc";
    pub const MEASURE: &str = "Measure";
    pub const VALUE: &str = "Data_Value";
    pub const VALUE_UNIT: &str = "Data_Value_Unit";
    pub const VALUE_TYPE: &str = "Data_Value_Type";
    pub const LOW_CONFIDENCE: &str = "Low_Confidence_Limit";
    pub const HIGH_CONFIDENCE: &str = "High_Confidence_Limit";
    pub const POPULATION: &str = "TotalPopulation";
    pub const GEOLOCATION: &str = "Geolocation";
}

// =============================================================================
// Derived artifact column names
// =============================================================================

pub mod artifact_columns {
    pub const LOCATION_NAME: &str = "LocationName";
    pub const LAT: &str = "lat";
    pub const LNG: &str = "lng";
    pub const STATE: &str = "StateDesc";
    pub const POPULATION: &str = "TotalPopulation";
    pub const VALUE: &str = "Data_Value";
    pub const VALUE_UNIT: &str = "Data_Value_Unit";
    pub const VALUE_TYPE: &str = "Data_Value_Type";
    pub const LOW_CONFIDENCE: &str = "Low_Confidence_Limit";
    pub const HIGH_CONFIDENCE: &str = "High_Confidence_Limit";
    pub const MEASURE: &str = "Measure";
    pub const MEASURE_SHORT: &str = "Measure_Short";
    pub const MEASURE_CLEAN: &str = "Measure_Clean";
    pub const MEASURE_KEY: &str = "Measure_Key";
    pub const MEASURE_COUNT: &str = "measure_count";
    pub const LOCATION_COUNT: &str = "LocationCount";
    pub const LOCATION_TYPE: &str = "location_type";
}

// =============================================================================
// Artifact layout
// =============================================================================

pub const LOCATIONS_SUMMARY_FILE: &str = "locations_summary.csv";
pub const MEASURE_CATALOG_FILE: &str = "available_measures.csv";
pub const MEASURES_DIR: &str = "measures";
pub const STATE_MEASURES_DIR: &str = "state_measures";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_ARTIFACT_SUFFIX: &str = ".csv";

// =============================================================================
// Measure keys and short labels
// =============================================================================

pub const DEFAULT_MAX_KEY_LENGTH: usize = 50;
pub const DEFAULT_SHORT_LABEL_MAX_TERMS: usize = 3;
pub const DEFAULT_SHORT_LABEL_FALLBACK_WORDS: usize = 4;
pub const DEFAULT_SHORT_LABEL_MIN_WORD_LENGTH: usize = 3;
pub const DEFAULT_SHORT_LABEL_FALLBACK_LENGTH: usize = 50;
pub const SHORT_LABEL_SEPARATOR: &str = " - ";

/// Health conditions recognised when shortening measure labels
pub const DEFAULT_CONDITION_TERMS: &[&str] = &[
    "asthma",
    "diabetes",
    "cancer",
    "heart disease",
    "high blood pressure",
    "high cholesterol",
    "obesity",
    "smoking",
    "drinking",
    "arthritis",
    "copd",
];

/// Clinical actions recognised when shortening measure labels
pub const DEFAULT_ACTION_TERMS: &[&str] = &[
    "screening",
    "checkup",
    "visit",
    "control",
    "medication",
    "vaccination",
];

// =============================================================================
// Coordinate envelope (continental US plus Alaska)
// =============================================================================

pub const US_MIN_LAT: f64 = 24.0;
pub const US_MAX_LAT: f64 = 72.0;
pub const US_MIN_LNG: f64 = -180.0;
pub const US_MAX_LNG: f64 = -65.0;

// =============================================================================
// Processing defaults
// =============================================================================

pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 4;

/// Location kind recorded in summaries built from the county release
pub const COUNTY_LOCATION_TYPE: &str = "County";

/// Raw extract file name looked up in the output directory when serving
pub const DEFAULT_RAW_FILE: &str = "places_raw.csv";
