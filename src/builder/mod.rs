//! Derived artifact builder.
//!
//! Runs the whole pipeline for one raw extract: read, clean, partition by
//! measure label, register measure keys, then write every partition's
//! per-location and per-state artifacts followed by the location summary and
//! the measure catalog.
//!
//! Key registration sees every label before any partition is written, so a
//! truncation collision is known up front and none of the colliding labels
//! gets written. Partitions are otherwise independent and are written
//! concurrently; one failing partition is reported in the `BuildReport`
//! without stopping the rest.

pub mod partition;
pub mod summary;
pub mod writer;

#[cfg(test)]
mod tests;

use crate::aggregate::aggregate_by_state;
use crate::cleaner::RecordCleaner;
use crate::config::{ArtifactLayout, PipelineConfig};
use crate::error::{PlacesError, Result};
use crate::measure_key::{MeasureKey, MeasureKeyRegistry};
use crate::models::{BuildReport, CleanedRecord, MeasureFailure};
use crate::reader::{read_raw_records, read_string_frame};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use partition::{records_from_partition, write_partition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use summary::{catalog_entries, summarize_locations};
use tokio::task;
use tracing::{debug, info, warn};
use writer::{catalog_frame, locations_frame, state_frame, write_frame};

/// Builds every derived artifact for one raw PLACES extract
#[derive(Debug, Clone)]
pub struct DerivedArtifactBuilder {
    raw_path: PathBuf,
    config: PipelineConfig,
    show_progress: bool,
}

impl DerivedArtifactBuilder {
    pub fn new(raw_path: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            raw_path: raw_path.into(),
            config,
            show_progress: false,
        }
    }

    /// Show a progress bar while partitions are written
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.config.layout
    }

    /// Storage key a label maps to under this builder's configuration
    pub fn measure_key(&self, label: &str) -> MeasureKey {
        MeasureKey::derive(label, self.config.max_key_length)
    }

    /// File name of a label's per-measure artifacts
    pub fn measure_file_name(&self, label: &str) -> String {
        self.measure_key(label).file_name(&self.config.artifact_suffix)
    }

    /// Run the full pipeline and write every artifact
    pub async fn build(&self) -> Result<BuildReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        info!(
            "Building derived artifacts from {} into {}",
            self.raw_path.display(),
            self.config.layout.output_dir.display()
        );

        let (records, cleaning) = task::spawn_blocking({
            let raw_path = self.raw_path.clone();
            let config = self.config.clone();
            move || -> Result<_> {
                let raw = read_raw_records(&raw_path, &config.columns)?;
                Ok(RecordCleaner::new(config).clean(raw))
            }
        })
        .await??;

        let locations = summarize_locations(&records);

        let mut short_labels: BTreeMap<String, String> = BTreeMap::new();
        let mut partitions: BTreeMap<String, Vec<CleanedRecord>> = BTreeMap::new();
        for record in records {
            short_labels
                .entry(record.measure().to_string())
                .or_insert_with(|| record.short_label().to_string());
            partitions
                .entry(record.measure().to_string())
                .or_default()
                .push(record);
        }
        info!("Partitioned cleaned records into {} measures", partitions.len());

        let (registry, mut failures) = self.register_keys(partitions.keys());
        let assigned: BTreeMap<String, MeasureKey> = registry
            .assignments()
            .map(|(label, key)| (label.to_string(), key.clone()))
            .collect();

        let writable: Vec<(String, MeasureKey, Vec<CleanedRecord>)> = partitions
            .into_iter()
            .filter_map(|(label, records)| {
                let key = assigned.get(&label)?.clone();
                Some((label, key, records))
            })
            .collect();

        let pb = self.progress_bar(writable.len());
        let concurrency = self.config.max_concurrent_writes.max(1);
        let results: Vec<(String, String, Result<usize>)> = stream::iter(writable)
            .map(|(label, key, records)| {
                let layout = self.config.layout.clone();
                let file_name = key.file_name(&self.config.artifact_suffix);
                async move {
                    let outcome = task::spawn_blocking({
                        let label = label.clone();
                        move || write_partition(&layout, &file_name, &label, &records)
                    })
                    .await
                    .unwrap_or_else(|e| Err(PlacesError::from(e)));
                    (label, key.to_string(), outcome)
                }
            })
            .buffer_unordered(concurrency)
            .inspect(|(label, _, _)| {
                pb.set_message(label.clone());
                pb.inc(1);
            })
            .collect()
            .await;
        pb.finish_and_clear();

        let mut built: BTreeSet<String> = BTreeSet::new();
        let mut rows_written = 0;
        for (label, key, outcome) in results {
            match outcome {
                Ok(rows) => {
                    rows_written += rows;
                    built.insert(label);
                }
                Err(e) => {
                    warn!("Failed to build measure '{}': {}", label, e);
                    failures.push(MeasureFailure {
                        label,
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.label.cmp(&b.label));

        let mut catalog = catalog_entries(&registry, &short_labels);
        catalog.retain(|entry| built.contains(&entry.label));

        rows_written += task::spawn_blocking({
            let layout = self.config.layout.clone();
            let locations = locations.clone();
            let id_column = self.config.columns.location_id.clone();
            let location_type = self.config.location_type.clone();
            move || -> Result<usize> {
                let mut locations_df =
                    locations_frame(&locations, id_column.as_deref(), location_type.as_deref())?;
                let mut rows = write_frame(&layout.locations_path(), &mut locations_df)?;
                rows += write_frame(&layout.catalog_path(), &mut catalog_frame(&catalog)?)?;
                Ok(rows)
            }
        })
        .await??;

        let report = BuildReport {
            measures_built: built.len(),
            built_labels: built.into_iter().collect(),
            locations: locations.len(),
            rows_written,
            failures,
            cleaning,
            processing_time_ms: start_time.elapsed().as_millis(),
        };
        info!("{}", report.summary());
        Ok(report)
    }

    /// Recompute a measure's per-state artifact from its per-location artifact.
    ///
    /// Used when the state file is missing but the partition survived, which
    /// avoids re-running the whole build. Returns the number of state rows.
    pub async fn rebuild_state_partition(&self, label: &str) -> Result<usize> {
        let file_name = self.measure_file_name(label);
        let layout = self.config.layout.clone();
        let envelope = self.config.envelope.clone();
        let label = label.to_string();

        task::spawn_blocking(move || -> Result<usize> {
            let df = read_string_frame(&layout.measure_file(&file_name))?;
            let records = records_from_partition(&df, &label, &envelope)?;
            if records.is_empty() {
                return Err(PlacesError::BuildFailed {
                    label,
                    reason: "per-location artifact holds no rows for this measure".to_string(),
                });
            }

            let states = aggregate_by_state(&records);
            let mut state_df = state_frame(&label, &states)?;
            let rows = write_frame(&layout.state_measure_file(&file_name), &mut state_df)?;
            info!(
                "Rebuilt state rollup for '{}' from {} locations",
                label,
                records.len()
            );
            Ok(rows)
        })
        .await?
    }

    /// Register every label, poisoning whole collision groups
    fn register_keys<'a>(
        &self,
        labels: impl Iterator<Item = &'a String>,
    ) -> (MeasureKeyRegistry, Vec<MeasureFailure>) {
        let mut registry = MeasureKeyRegistry::new(self.config.max_key_length);
        let mut failures = Vec::new();
        let mut claims: BTreeMap<MeasureKey, Vec<String>> = BTreeMap::new();

        for label in labels {
            match registry.register(label) {
                Ok(key) => claims.entry(key).or_default().push(label.clone()),
                Err(PlacesError::KeyCollision { .. }) => claims
                    .entry(self.measure_key(label))
                    .or_default()
                    .push(label.clone()),
                Err(e) => failures.push(MeasureFailure {
                    label: label.clone(),
                    key: String::new(),
                    reason: e.to_string(),
                }),
            }
        }

        for (key, group) in claims.iter().filter(|(key, _)| registry.is_collided(key)) {
            self.remove_stale_partition(key);
            for label in group {
                let others: Vec<&str> = group
                    .iter()
                    .filter(|other| *other != label)
                    .map(String::as_str)
                    .collect();
                failures.push(MeasureFailure {
                    label: label.clone(),
                    key: key.to_string(),
                    reason: PlacesError::KeyCollision {
                        key: key.to_string(),
                        existing: others.join("', '"),
                        incoming: label.clone(),
                    }
                    .to_string(),
                });
            }
        }

        (registry, failures)
    }

    /// Drop artifacts a previous build left under a now-collided key
    fn remove_stale_partition(&self, key: &MeasureKey) {
        let file_name = key.file_name(&self.config.artifact_suffix);
        for path in [
            self.config.layout.measure_file(&file_name),
            self.config.layout.state_measure_file(&file_name),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove stale artifact {}: {}", path.display(), e),
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}
