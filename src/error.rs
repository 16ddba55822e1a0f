//! Error handling for PLACES processing operations.
//!
//! Row-level data quality problems (`ParseFailure`, `MalformedNumeric`) are
//! recovered locally by dropping the row; they exist as variants so the
//! cleaning stages can describe what they dropped. Structural problems
//! (collisions, missing raw input, unavailable artifacts) propagate to callers.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Raw input not found at path: {path}")]
    RawInputNotFound { path: PathBuf },

    #[error("Required column '{column}' missing from {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Unparseable geometry '{input}'")]
    ParseFailure { input: String },

    #[error("Coordinates ({lat}, {lng}) fall outside the configured envelope")]
    OutOfEnvelope { lat: f64, lng: f64 },

    #[error("Malformed numeric value for {field}: '{input}'")]
    MalformedNumeric { field: &'static str, input: String },

    #[error("Measure key collision on '{key}': '{existing}' and '{incoming}'")]
    KeyCollision {
        key: String,
        existing: String,
        incoming: String,
    },

    #[error("Artifact '{name}' unavailable: {reason}")]
    ArtifactUnavailable {
        name: String,
        reason: UnavailableReason,
    },

    #[error("Build failed for {label}: {reason}")]
    BuildFailed { label: String, reason: String },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a requested artifact could not be served.
///
/// Cloneable so a single in-flight build can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The raw input was read and built, but holds no data for this name.
    NotInSource,
    /// The raw input file itself is missing.
    MissingRawInput { path: PathBuf },
    /// The build ran and failed for this artifact.
    BuildFailed { message: String },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NotInSource => write!(f, "no data for this name in the raw input"),
            UnavailableReason::MissingRawInput { path } => {
                write!(f, "raw input missing at {}", path.display())
            }
            UnavailableReason::BuildFailed { message } => write!(f, "build error: {}", message),
        }
    }
}

impl PlacesError {
    /// Whether this error came from a missing file rather than a bad one.
    pub fn is_not_found(&self) -> bool {
        match self {
            PlacesError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            PlacesError::Polars(polars::error::PolarsError::IO { error, .. }) => {
                error.kind() == std::io::ErrorKind::NotFound
            }
            PlacesError::RawInputNotFound { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlacesError>;
