//! Lazy artifact cache with single-flight loading.
//!
//! Each named artifact is either unloaded or loaded. The first request for an
//! unloaded name starts one flight: read the persisted file, and on a miss
//! ask the source to build it, then read again. Concurrent requests for the
//! same name join that flight and observe the same outcome. A failed flight
//! leaves the name unloaded so a later request can retry; a loaded artifact
//! stays until it is invalidated.

use crate::builder::DerivedArtifactBuilder;
use crate::constants::artifact_columns as cols;
use crate::error::{PlacesError, Result, UnavailableReason};
use crate::models::BuildReport;
use crate::reader::read_artifact_frame;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::task;
use tracing::{debug, info, warn};

/// A named derived artifact a consumer can ask for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactRequest {
    /// The one-row-per-location summary
    Locations,
    /// The label -> key -> display label catalog
    MeasureCatalog,
    /// Per-location rows of one measure, by full label
    MeasureLocations(String),
    /// Per-state rollups of one measure, by full label
    MeasureStates(String),
}

impl ArtifactRequest {
    /// Cache key for this request
    pub fn name(&self) -> String {
        match (self, self.label()) {
            (ArtifactRequest::MeasureLocations(_), Some(label)) => format!("measure:{}", label),
            (ArtifactRequest::MeasureStates(_), Some(label)) => format!("states:{}", label),
            (ArtifactRequest::MeasureCatalog, _) => "measures".to_string(),
            _ => "locations".to_string(),
        }
    }

    /// Measure label for per-measure requests, trimmed the way cleaned
    /// labels are
    pub fn label(&self) -> Option<&str> {
        match self {
            ArtifactRequest::MeasureLocations(label) | ArtifactRequest::MeasureStates(label) => {
                Some(label.trim())
            }
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// An artifact read into memory
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    name: String,
    frame: DataFrame,
}

impl LoadedArtifact {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Rows as field -> value maps, with nulls and NaN as JSON `null`
    pub fn to_records(&self) -> Result<Vec<Map<String, Value>>> {
        let columns = self.frame.get_columns();
        let mut records = Vec::with_capacity(self.frame.height());

        for i in 0..self.frame.height() {
            let mut record = Map::with_capacity(columns.len());
            for column in columns {
                let value = column.as_materialized_series().get(i)?;
                record.insert(column.name().to_string(), json_value(value));
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn json_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_value(v as f64),
        AnyValue::Float64(v) => float_value(v),
        other => Value::String(other.to_string()),
    }
}

/// Where artifacts come from: a persisted read, and a build on miss
pub trait ArtifactSource: Send + Sync + 'static {
    /// Read a persisted artifact. A missing file is an error for which
    /// `PlacesError::is_not_found` holds.
    fn load(&self, request: &ArtifactRequest)
    -> impl Future<Output = Result<LoadedArtifact>> + Send;

    /// Produce the persisted artifact for a request
    fn ensure(
        &self,
        request: &ArtifactRequest,
    ) -> impl Future<Output = std::result::Result<(), UnavailableReason>> + Send;
}

type FlightOutcome = std::result::Result<Arc<LoadedArtifact>, UnavailableReason>;
type Flight = Shared<BoxFuture<'static, FlightOutcome>>;

/// Process-lifetime cache of loaded artifacts
pub struct ArtifactCache<S> {
    source: Arc<S>,
    loaded: RwLock<HashMap<String, Arc<LoadedArtifact>>>,
    in_flight: Mutex<HashMap<String, (u64, Flight)>>,
    next_flight: AtomicU64,
}

impl<S: ArtifactSource> ArtifactCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            loaded: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Serve an artifact, loading or building it on first request
    pub async fn get(&self, request: &ArtifactRequest) -> Result<Arc<LoadedArtifact>> {
        let name = request.name();
        if let Some(artifact) = self.cached(&name) {
            return Ok(artifact);
        }

        let (id, flight) = {
            let mut in_flight = self.lock_in_flight();
            // A flight may have finished between the fast path and the lock
            if let Some(artifact) = self.cached(&name) {
                return Ok(artifact);
            }
            match in_flight.get(&name) {
                Some((id, flight)) => {
                    debug!("Joining in-flight load of '{}'", name);
                    (*id, flight.clone())
                }
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let flight = start_flight(Arc::clone(&self.source), request.clone());
                    in_flight.insert(name.clone(), (id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let outcome = flight.await;

        {
            let mut in_flight = self.lock_in_flight();
            if let Ok(artifact) = &outcome {
                self.loaded
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(name.clone())
                    .or_insert_with(|| Arc::clone(artifact));
            }
            if in_flight.get(&name).is_some_and(|(current, _)| *current == id) {
                in_flight.remove(&name);
            }
        }

        outcome.map_err(|reason| PlacesError::ArtifactUnavailable { name, reason })
    }

    /// Serve an artifact as field -> value records
    pub async fn get_records(&self, request: &ArtifactRequest) -> Result<Vec<Map<String, Value>>> {
        self.get(request).await?.to_records()
    }

    /// Drop one loaded artifact; the next request reloads it.
    ///
    /// A load already in flight is not cancelled.
    pub fn invalidate(&self, request: &ArtifactRequest) -> bool {
        let removed = self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request.name())
            .is_some();
        if removed {
            debug!("Invalidated '{}'", request);
        }
        removed
    }

    /// Drop every loaded artifact
    pub fn clear(&self) {
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        info!("Clearing {} cached artifacts", loaded.len());
        loaded.clear();
    }

    pub fn is_loaded(&self, request: &ArtifactRequest) -> bool {
        self.cached(&request.name()).is_some()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn cached(&self, name: &str) -> Option<Arc<LoadedArtifact>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, (u64, Flight)>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Classify a load error as "go build it" or a final outcome
fn load_miss(error: PlacesError) -> std::result::Result<(), UnavailableReason> {
    match error {
        PlacesError::ArtifactUnavailable { reason, .. } => Err(reason),
        e if e.is_not_found() => Ok(()),
        e => Err(UnavailableReason::BuildFailed {
            message: e.to_string(),
        }),
    }
}

fn start_flight<S: ArtifactSource>(source: Arc<S>, request: ArtifactRequest) -> Flight {
    async move {
        match source.load(&request).await {
            Ok(artifact) => return Ok(Arc::new(artifact)),
            Err(e) => load_miss(e)?,
        }

        info!("Artifact '{}' not on disk, building", request);
        source.ensure(&request).await?;

        match source.load(&request).await {
            Ok(artifact) => Ok(Arc::new(artifact)),
            Err(e) => {
                load_miss(e)?;
                Err(UnavailableReason::NotInSource)
            }
        }
    }
    .boxed()
    .shared()
}

/// Artifact source over the on-disk layout, building with a
/// `DerivedArtifactBuilder` on a miss.
///
/// Builds are serialized through one lock, so two different artifact names
/// never run overlapping full rebuilds.
pub struct DerivedArtifactSource {
    builder: DerivedArtifactBuilder,
    build_lock: tokio::sync::Mutex<Option<BuildReport>>,
    builds: AtomicUsize,
}

impl DerivedArtifactSource {
    pub fn new(builder: DerivedArtifactBuilder) -> Self {
        Self {
            builder,
            build_lock: tokio::sync::Mutex::new(None),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn builder(&self) -> &DerivedArtifactBuilder {
        &self.builder
    }

    /// Report of the most recent full build run through this source
    pub async fn last_report(&self) -> Option<BuildReport> {
        self.build_lock.lock().await.clone()
    }

    /// Number of full builds run through this source
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Persisted path for a request; `None` for labels that map to no key
    pub fn path_for(&self, request: &ArtifactRequest) -> Option<PathBuf> {
        let layout = self.builder.layout();
        match (request, request.label()) {
            (ArtifactRequest::MeasureLocations(_), Some(label)) => {
                self.file_name(label).map(|f| layout.measure_file(&f))
            }
            (ArtifactRequest::MeasureStates(_), Some(label)) => {
                self.file_name(label).map(|f| layout.state_measure_file(&f))
            }
            (ArtifactRequest::MeasureCatalog, _) => Some(layout.catalog_path()),
            _ => Some(layout.locations_path()),
        }
    }

    fn file_name(&self, label: &str) -> Option<String> {
        let key = self.builder.measure_key(label);
        (!key.is_empty()).then(|| key.file_name(&self.builder.config().artifact_suffix))
    }

    fn is_present(&self, request: &ArtifactRequest) -> bool {
        self.path_for(request).is_some_and(|path| path.is_file())
    }
}

/// Check that every row of a per-measure artifact belongs to `label`
fn belongs_to(frame: &DataFrame, label: &str) -> bool {
    let Ok(column) = frame.column(cols::MEASURE) else {
        return false;
    };
    let Ok(values) = column.as_materialized_series().str() else {
        return false;
    };
    values.into_iter().all(|value| value == Some(label))
}

impl ArtifactSource for DerivedArtifactSource {
    async fn load(&self, request: &ArtifactRequest) -> Result<LoadedArtifact> {
        let name = request.name();
        let Some(path) = self.path_for(request) else {
            return Err(PlacesError::ArtifactUnavailable {
                name,
                reason: UnavailableReason::NotInSource,
            });
        };

        let frame = task::spawn_blocking(move || read_artifact_frame(&path)).await??;

        if let Some(label) = request.label() {
            if !belongs_to(&frame, label) {
                warn!(
                    "Artifact for '{}' holds another measure under the same key",
                    label
                );
                return Err(PlacesError::ArtifactUnavailable {
                    name,
                    reason: UnavailableReason::NotInSource,
                });
            }
        }

        debug!("Loaded '{}' ({} rows)", name, frame.height());
        Ok(LoadedArtifact::new(name, frame))
    }

    async fn ensure(&self, request: &ArtifactRequest) -> std::result::Result<(), UnavailableReason> {
        let mut last_report = self.build_lock.lock().await;

        // Another request may have built it while this one waited on the lock
        if self.is_present(request) {
            return Ok(());
        }

        if let (ArtifactRequest::MeasureStates(_), Some(label)) = (request, request.label()) {
            if self.is_present(&ArtifactRequest::MeasureLocations(label.to_string())) {
                match self.builder.rebuild_state_partition(label).await {
                    Ok(_) => return Ok(()),
                    Err(e) => warn!(
                        "Could not rebuild state rollup for '{}' from its partition: {}",
                        label, e
                    ),
                }
            }
        }

        // After a build through this source, per-measure misses are answered
        // from its report
        if let (Some(report), Some(label)) = (last_report.as_ref(), request.label()) {
            if let Some(failure) = report.failure_for_label(label) {
                return Err(UnavailableReason::BuildFailed {
                    message: failure.reason.clone(),
                });
            }
            if !report.built(label) {
                debug!("'{}' was not in the last build, not rebuilding", label);
                return Err(UnavailableReason::NotInSource);
            }
        }

        let raw_path = self.builder.raw_path();
        if !raw_path.is_file() {
            return Err(UnavailableReason::MissingRawInput {
                path: raw_path.to_path_buf(),
            });
        }

        self.builds.fetch_add(1, Ordering::Relaxed);
        let report = match self.builder.build().await {
            Ok(report) => report,
            Err(e) => {
                return Err(UnavailableReason::BuildFailed {
                    message: e.to_string(),
                });
            }
        };
        *last_report = Some(report);

        if self.is_present(request) {
            return Ok(());
        }

        let failure = request.label().and_then(|label| {
            last_report
                .as_ref()
                .and_then(|report| report.failure_for_label(label))
                .cloned()
        });
        match failure {
            Some(failure) => Err(UnavailableReason::BuildFailed {
                message: failure.reason,
            }),
            None => Err(UnavailableReason::NotInSource),
        }
    }
}
