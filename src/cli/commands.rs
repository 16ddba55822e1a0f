//! Command implementations for the PLACES processor CLI

use crate::builder::DerivedArtifactBuilder;
use crate::cache::{ArtifactCache, DerivedArtifactSource};
use crate::cli::args::{Args, BuildArgs, Commands, GetArgs, InspectArgs, OutputFormat, PipelineArgs};
use crate::config::{ColumnNames, PipelineConfig};
use crate::constants::{COUNTY_LOCATION_TYPE, DEFAULT_RAW_FILE};
use crate::inspect::inspect_raw;
use crate::models::BuildReport;
use anyhow::{Context, Result};
use colored::*;
use tracing::debug;

/// Run the parsed command
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;

    match &args.command {
        Commands::Build(build) => run_build(build, args.show_progress()).await,
        Commands::Get(get) => run_get(get).await,
        Commands::Inspect(inspect) => run_inspect(inspect),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("places_processor={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Layer configuration: defaults, then the JSON file, then CLI flags
pub fn load_configuration(pipeline: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &pipeline.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if pipeline.county {
        config = config
            .with_columns(ColumnNames::county())
            .with_location_type(COUNTY_LOCATION_TYPE);
    }
    if let Some(output_dir) = &pipeline.output_dir {
        config = config.with_output_dir(output_dir);
    }

    config.validate()?;
    Ok(config)
}

async fn run_build(args: &BuildArgs, show_progress: bool) -> Result<()> {
    let mut config = load_configuration(&args.pipeline)?;
    if let Some(max_writes) = args.max_concurrent_writes {
        config = config.with_max_concurrent_writes(max_writes);
        config.validate()?;
    }

    if show_progress {
        println!("{}", "Building PLACES artifacts".bright_green().bold());
        println!("  {} {}", "Raw extract:".bright_cyan(), args.raw_path.display());
        println!(
            "  {} {}",
            "Output:".bright_cyan(),
            config.layout.output_dir.display()
        );
    }

    let builder = DerivedArtifactBuilder::new(&args.raw_path, config).with_progress(show_progress);
    let report = builder
        .build()
        .await
        .with_context(|| format!("Build from {} failed", args.raw_path.display()))?;

    if show_progress {
        print_build_report(&report);
    }
    Ok(())
}

async fn run_get(args: &GetArgs) -> Result<()> {
    let config = load_configuration(&args.pipeline)?;
    let raw_path = args
        .raw_path
        .clone()
        .unwrap_or_else(|| config.layout.output_dir.join(DEFAULT_RAW_FILE));

    let cache = ArtifactCache::new(DerivedArtifactSource::new(DerivedArtifactBuilder::new(
        raw_path, config,
    )));
    let request = args.request();
    let records = cache.get_records(&request).await?;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let config = load_configuration(&args.pipeline)?;
    let report = inspect_raw(&args.raw_path, &config)?;

    if args.output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "PLACES extract inspection".bright_green().bold());
    println!(
        "  {} {} rows x {} columns",
        "Shape:".bright_cyan(),
        report.rows,
        report.columns.len()
    );
    if report.missing.is_empty() {
        println!("  {} none", "Missing values:".bright_cyan());
    } else {
        println!("  {}", "Missing values:".bright_cyan());
        for (column, count) in &report.missing {
            println!(
                "    {}: {} ({:.1}%)",
                column,
                count,
                *count as f64 / report.rows.max(1) as f64 * 100.0
            );
        }
    }
    if let Some((min, max)) = report.value_range {
        println!(
            "  {} {} numeric, range {:.1} - {:.1}",
            "Data_Value:".bright_cyan(),
            report.numeric_values,
            min,
            max
        );
    }
    println!(
        "  {} {}",
        "Distinct measures:".bright_cyan(),
        report.distinct_measures
    );
    for (i, measure) in report.sample_measures.iter().enumerate() {
        println!("    {}. {}", i + 1, measure);
    }
    println!(
        "  {} {} ({:.1}%)",
        "Parsed geometry:".bright_cyan(),
        report.geometry_parsed,
        report.geometry_share()
    );
    if let Some((min, max)) = report.population_range {
        println!("  {} {} - {}", "Population:".bright_cyan(), min, max);
    }
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    println!("\n{}", "Build complete".bright_green().bold());
    println!("  {}", report.cleaning.summary());
    println!(
        "  {} {}",
        "Measures built:".bright_cyan(),
        report.measures_built.to_string().bright_white().bold()
    );
    println!("  {} {}", "Locations:".bright_cyan(), report.locations);
    println!("  {} {}", "Rows written:".bright_cyan(), report.rows_written);
    println!(
        "  {} {}ms",
        "Processing time:".bright_cyan(),
        report.processing_time_ms
    );

    if !report.is_complete() {
        println!(
            "\n{} {}",
            "Failed measures:".bright_yellow().bold(),
            report.failures.len()
        );
        for failure in &report.failures {
            println!("  {} {}", "-".yellow(), failure.label);
            println!("    {}", failure.reason.dimmed());
        }
    }
}
