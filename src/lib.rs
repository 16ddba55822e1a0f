//! PLACES Processor Library
//!
//! Turns a CDC PLACES extract (one row per location and health measure)
//! into derived artifacts for serving:
//!
//! - Cleaning raw observations and parsing `POINT (lng lat)` geometry
//! - Deriving filesystem-safe measure keys and short display labels
//! - Population-weighted per-state rollups of every measure
//! - Writing per-measure, per-state, location summary and catalog files
//! - A lazy cache that loads artifacts on demand and builds them on a miss,
//!   with one in-flight build per artifact name

pub mod aggregate;
pub mod builder;
pub mod cache;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod inspect;
pub mod measure_key;
pub mod models;
pub mod reader;

// Re-export commonly used types
pub use builder::DerivedArtifactBuilder;
pub use cache::{ArtifactCache, ArtifactRequest, ArtifactSource, DerivedArtifactSource, LoadedArtifact};
pub use config::PipelineConfig;
pub use error::{PlacesError, Result, UnavailableReason};
pub use measure_key::{MeasureKey, MeasureKeyRegistry};
pub use models::{BuildReport, CleanedRecord, CleaningStats, LocationSummary, StateAggregate};
