//! Configuration management and validation.
//!
//! Provides the coordinate envelope, measure-key and short-label settings,
//! raw column names, and artifact layout used by the pipeline. All of these
//! are supplied externally; the defaults describe the US PLACES release.

use crate::constants::{self, columns};
use crate::error::{PlacesError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bounding box a cleaned record's coordinates must fall inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingEnvelope {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Default for BoundingEnvelope {
    fn default() -> Self {
        Self::us()
    }
}

impl BoundingEnvelope {
    /// Envelope covering the continental US, Alaska and Hawaii
    pub fn us() -> Self {
        Self {
            min_lat: constants::US_MIN_LAT,
            max_lat: constants::US_MAX_LAT,
            min_lng: constants::US_MIN_LNG,
            max_lng: constants::US_MAX_LNG,
        }
    }

    /// Inclusive containment check
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Vocabulary and limits for display-label derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortLabelConfig {
    /// Health-condition terms, matched first
    pub condition_terms: Vec<String>,

    /// Clinical-action terms, matched after conditions
    pub action_terms: Vec<String>,

    /// Maximum number of terms joined into one label
    pub max_terms: usize,

    /// Leading words considered when no term matches
    pub fallback_words: usize,

    /// Words shorter than this are skipped in the fallback
    pub min_word_length: usize,

    /// Length of the raw-label truncation used as a last resort
    pub fallback_length: usize,
}

impl Default for ShortLabelConfig {
    fn default() -> Self {
        Self {
            condition_terms: constants::DEFAULT_CONDITION_TERMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            action_terms: constants::DEFAULT_ACTION_TERMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_terms: constants::DEFAULT_SHORT_LABEL_MAX_TERMS,
            fallback_words: constants::DEFAULT_SHORT_LABEL_FALLBACK_WORDS,
            min_word_length: constants::DEFAULT_SHORT_LABEL_MIN_WORD_LENGTH,
            fallback_length: constants::DEFAULT_SHORT_LABEL_FALLBACK_LENGTH,
        }
    }
}

/// Names of the raw input columns the pipeline consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    pub location_name: String,
    /// Optional identifier column carried into the location summary
    #[serde(default)]
    pub location_id: Option<String>,
    pub state: String,
    pub measure: String,
    pub value: String,
    pub value_unit: String,
    pub value_type: String,
    pub low_confidence: String,
    pub high_confidence: String,
    pub population: String,
    pub geolocation: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self::places()
    }
}

impl ColumnNames {
    /// Place-level PLACES release
    pub fn places() -> Self {
        Self {
            location_name: columns::LOCATION_NAME.to_string(),
            location_id: None,
            state: columns::STATE.to_string(),
            measure: columns::MEASURE.to_string(),
            value: columns::VALUE.to_string(),
            value_unit: columns::VALUE_UNIT.to_string(),
            value_type: columns::VALUE_TYPE.to_string(),
            low_confidence: columns::LOW_CONFIDENCE.to_string(),
            high_confidence: columns::HIGH_CONFIDENCE.to_string(),
            population: columns::POPULATION.to_string(),
            geolocation: columns::GEOLOCATION.to_string(),
        }
    }

    /// County-level GIS-friendly release, where locations are counties
    pub fn county() -> Self {
        Self {
            location_name: columns::COUNTY_NAME.to_string(),
            location_id: Some(columns::COUNTY_FIPS.to_string()),
            ..Self::places()
        }
    }
}

/// Where derived artifacts live on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    pub output_dir: PathBuf,
    pub locations_file: String,
    pub catalog_file: String,
    pub measures_dir: String,
    pub state_measures_dir: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(constants::DEFAULT_OUTPUT_DIR)
    }
}

impl ArtifactLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            locations_file: constants::LOCATIONS_SUMMARY_FILE.to_string(),
            catalog_file: constants::MEASURE_CATALOG_FILE.to_string(),
            measures_dir: constants::MEASURES_DIR.to_string(),
            state_measures_dir: constants::STATE_MEASURES_DIR.to_string(),
        }
    }

    pub fn locations_path(&self) -> PathBuf {
        self.output_dir.join(&self.locations_file)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.output_dir.join(&self.catalog_file)
    }

    pub fn measures_path(&self) -> PathBuf {
        self.output_dir.join(&self.measures_dir)
    }

    pub fn state_measures_path(&self) -> PathBuf {
        self.output_dir.join(&self.state_measures_dir)
    }

    /// Per-location partition file for a measure key's file name
    pub fn measure_file(&self, file_name: &str) -> PathBuf {
        self.measures_path().join(file_name)
    }

    /// Per-state rollup file for a measure key's file name
    pub fn state_measure_file(&self, file_name: &str) -> PathBuf {
        self.state_measures_path().join(file_name)
    }
}

/// Global configuration for PLACES processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Coordinate validity envelope
    pub envelope: BoundingEnvelope,

    /// Maximum measure-key length before the suffix is appended
    pub max_key_length: usize,

    /// Storage discriminator appended to every measure key
    pub artifact_suffix: String,

    /// Display-label vocabulary
    pub short_label: ShortLabelConfig,

    /// Raw input column names
    pub columns: ColumnNames,

    /// Derived artifact layout
    pub layout: ArtifactLayout,

    /// Maximum partition files written concurrently
    pub max_concurrent_writes: usize,

    /// Kind of location written to every location summary row, e.g. "County"
    #[serde(default)]
    pub location_type: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            envelope: BoundingEnvelope::default(),
            max_key_length: constants::DEFAULT_MAX_KEY_LENGTH,
            artifact_suffix: constants::DEFAULT_ARTIFACT_SUFFIX.to_string(),
            short_label: ShortLabelConfig::default(),
            columns: ColumnNames::default(),
            layout: ArtifactLayout::default(),
            max_concurrent_writes: constants::DEFAULT_MAX_CONCURRENT_WRITES,
            location_type: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the output directory for derived artifacts
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.layout.output_dir = output_dir.into();
        self
    }

    /// Set the coordinate envelope
    pub fn with_envelope(mut self, envelope: BoundingEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Set the maximum key length
    pub fn with_max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    /// Use a different set of raw column names
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    /// Tag every location summary row with a location kind
    pub fn with_location_type(mut self, location_type: impl Into<String>) -> Self {
        self.location_type = Some(location_type.into());
        self
    }

    /// Set the display-label vocabulary
    pub fn with_short_label(mut self, short_label: ShortLabelConfig) -> Self {
        self.short_label = short_label;
        self
    }

    /// Set maximum concurrent partition writes
    pub fn with_max_concurrent_writes(mut self, max_writes: usize) -> Self {
        self.max_concurrent_writes = max_writes;
        self
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let e = &self.envelope;
        if !(e.min_lat <= e.max_lat && e.min_lng <= e.max_lng) {
            return Err(PlacesError::Configuration {
                message: format!(
                    "Inverted bounding envelope: lat [{}, {}], lng [{}, {}]",
                    e.min_lat, e.max_lat, e.min_lng, e.max_lng
                ),
            });
        }
        if self.max_key_length == 0 {
            return Err(PlacesError::Configuration {
                message: "max_key_length must be greater than zero".to_string(),
            });
        }
        if self.artifact_suffix.is_empty() {
            return Err(PlacesError::Configuration {
                message: "artifact_suffix must not be empty".to_string(),
            });
        }
        if self.max_concurrent_writes == 0 {
            return Err(PlacesError::Configuration {
                message: "max_concurrent_writes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
