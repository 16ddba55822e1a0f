//! Command-line argument definitions for the PLACES processor

use crate::cache::ArtifactRequest;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the PLACES processor
///
/// Builds per-measure, per-state and summary artifacts from a CDC PLACES
/// extract and serves them as JSON records.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "places_processor",
    version,
    about = "Aggregate CDC PLACES health measures into per-measure and per-state artifacts"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress output except errors"
    )]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Build every derived artifact from a raw extract
    Build(BuildArgs),
    /// Print one artifact as JSON records, building it on a miss
    Get(GetArgs),
    /// Report shape and data quality of a raw extract
    Inspect(InspectArgs),
}

/// Options shared by every command that needs a pipeline configuration
#[derive(Debug, Clone, ClapArgs)]
pub struct PipelineArgs {
    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for derived artifacts
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Read the county-level release (CountyName as the location column)
    #[arg(long = "county")]
    pub county: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct BuildArgs {
    /// Raw PLACES CSV extract
    #[arg(value_name = "RAW_CSV")]
    pub raw_path: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Maximum number of measure partitions written at once
    #[arg(long = "max-concurrent-writes", value_name = "N")]
    pub max_concurrent_writes: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
pub struct GetArgs {
    /// `locations`, `measures`, or a full measure label
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Serve the per-state rollup of a measure
    #[arg(long = "states")]
    pub states: bool,

    /// Raw extract used when the artifact has to be built
    #[arg(long = "raw", value_name = "RAW_CSV")]
    pub raw_path: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl GetArgs {
    /// Which artifact this invocation asks for
    pub fn request(&self) -> ArtifactRequest {
        match self.name.as_str() {
            "locations" => ArtifactRequest::Locations,
            "measures" => ArtifactRequest::MeasureCatalog,
            label if self.states => ArtifactRequest::MeasureStates(label.to_string()),
            label => ArtifactRequest::MeasureLocations(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct InspectArgs {
    /// Raw PLACES CSV extract
    #[arg(value_name = "RAW_CSV")]
    pub raw_path: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(long = "output-format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

/// Output format for reports
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON for scripting
    Json,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are hidden in quiet mode
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}
