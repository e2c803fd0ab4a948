//! PyO3 bindings for trialsync Rust components.
//!
//! Exposes the alignment core to the Python conversion pipeline:
//! - Trial start resolution
//! - Session alignment with per-trial failures and inconsistencies
//! - Stream interpolation onto the acquisition clock
//! - Trial intervals, event groups and continuous reconstruction

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::BTreeMap;

use trialsync_alignment::{SessionAligner, SessionAlignment as RustSessionAlignment, TrialStartResolver};
use trialsync_core::config::{
    AlignmentConfig, ContinuousConfig, EventConfig, MarkerOverlapPolicy, StreamConfig, TrialTableConfig,
    TrialWindow,
};
use trialsync_core::time::{relative_seconds, unix_seconds_to_datetime};
use trialsync_core::{
    AlignedTrial as RustAlignedTrial, AlignmentInconsistency as RustAlignmentInconsistency,
    Config as RustConfig, Error as RustError, EventCode, InconsistencyKind,
    TrialRecord as RustTrialRecord,
};
use trialsync_timeline::{
    EventGroup as RustEventGroup, StreamTrialRow as RustStreamTrialRow, TrialInterval as RustTrialInterval,
};

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One behavioral trial with its acquisition-system markers.
#[pyclass]
#[derive(Clone)]
pub struct TrialRecord {
    #[pyo3(get, set)]
    pub intended_start_time: f64,
    #[pyo3(get, set)]
    pub trial_type: String,
    #[pyo3(get, set)]
    pub marker_timestamps: Vec<f64>,
    #[pyo3(get, set)]
    pub marker_codes: Vec<i32>,
}

#[pymethods]
impl TrialRecord {
    #[new]
    fn new(
        intended_start_time: f64,
        trial_type: String,
        marker_timestamps: Vec<f64>,
        marker_codes: Vec<i32>,
    ) -> Self {
        TrialRecord {
            intended_start_time,
            trial_type,
            marker_timestamps,
            marker_codes,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "TrialRecord(intended_start_time={}, trial_type={:?}, markers={})",
            self.intended_start_time,
            self.trial_type,
            self.marker_codes.len()
        )
    }
}

impl From<&TrialRecord> for RustTrialRecord {
    fn from(t: &TrialRecord) -> Self {
        RustTrialRecord::new(
            t.intended_start_time,
            t.trial_type.clone(),
            t.marker_timestamps.clone(),
            t.marker_codes.iter().copied().map(EventCode).collect(),
        )
    }
}

fn to_rust_trials(trials: &[TrialRecord]) -> Vec<RustTrialRecord> {
    trials.iter().map(RustTrialRecord::from).collect()
}

/// A trial resolved onto the acquisition clock.
#[pyclass]
#[derive(Clone)]
pub struct AlignedTrial {
    #[pyo3(get)]
    pub trial_index: usize,
    #[pyo3(get)]
    pub acquisition_start_time: f64,
    #[pyo3(get)]
    pub session_relative_start_time: f64,
    #[pyo3(get)]
    pub trial_type: String,
    #[pyo3(get)]
    pub marker_index: usize,
    #[pyo3(get)]
    pub discrepancy: f64,
}

#[pymethods]
impl AlignedTrial {
    fn __repr__(&self) -> String {
        format!(
            "AlignedTrial(trial_index={}, session_relative_start_time={})",
            self.trial_index, self.session_relative_start_time
        )
    }
}

impl From<&RustAlignedTrial> for AlignedTrial {
    fn from(t: &RustAlignedTrial) -> Self {
        AlignedTrial {
            trial_index: t.trial_index,
            acquisition_start_time: t.acquisition_start_time,
            session_relative_start_time: t.session_relative_start_time,
            trial_type: t.trial_type.clone(),
            marker_index: t.marker_index,
            discrepancy: t.discrepancy,
        }
    }
}

/// A trial that could not be aligned.
#[pyclass]
#[derive(Clone)]
pub struct TrialFailure {
    #[pyo3(get)]
    pub trial_index: usize,
    /// "no_marker_found", "marker_length_mismatch", "alignment_inconsistency" or "data".
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub message: String,
}

#[pymethods]
impl TrialFailure {
    fn __repr__(&self) -> String {
        format!("TrialFailure(trial_index={}, kind={:?})", self.trial_index, self.kind)
    }
}

fn failure_kind(err: &RustError) -> &'static str {
    match err {
        RustError::NoMarkerFound { .. } => "no_marker_found",
        RustError::MarkerLengthMismatch { .. } => "marker_length_mismatch",
        RustError::AlignmentInconsistency(_) => "alignment_inconsistency",
        _ => "data",
    }
}

/// A cross-trial inconsistency.
#[pyclass]
#[derive(Clone)]
pub struct AlignmentInconsistency {
    #[pyo3(get)]
    pub trial_index: usize,
    /// "negative_offset", "non_monotonic" or "shared_marker".
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub message: String,
}

#[pymethods]
impl AlignmentInconsistency {
    fn __repr__(&self) -> String {
        format!(
            "AlignmentInconsistency(trial_index={}, kind={:?})",
            self.trial_index, self.kind
        )
    }
}

impl From<&RustAlignmentInconsistency> for AlignmentInconsistency {
    fn from(i: &RustAlignmentInconsistency) -> Self {
        let kind = match i.kind {
            InconsistencyKind::NegativeOffset { .. } => "negative_offset",
            InconsistencyKind::NonMonotonic { .. } => "non_monotonic",
            InconsistencyKind::SharedMarker { .. } => "shared_marker",
        };
        AlignmentInconsistency {
            trial_index: i.trial_index,
            kind: kind.to_string(),
            message: i.to_string(),
        }
    }
}

/// A row of the trial table.
#[pyclass]
#[derive(Clone)]
pub struct TrialInterval {
    #[pyo3(get)]
    pub trial_index: usize,
    #[pyo3(get)]
    pub start_time: f64,
    #[pyo3(get)]
    pub stop_time: f64,
    #[pyo3(get)]
    pub midpoint_time: Option<f64>,
    #[pyo3(get)]
    pub trial_type: String,
}

impl From<RustTrialInterval> for TrialInterval {
    fn from(t: RustTrialInterval) -> Self {
        TrialInterval {
            trial_index: t.trial_index,
            start_time: t.start_time,
            stop_time: t.stop_time,
            midpoint_time: t.midpoint_time,
            trial_type: t.trial_type,
        }
    }
}

/// A row of a trial-aligned stream table.
#[pyclass]
#[derive(Clone)]
pub struct StreamTrialRow {
    #[pyo3(get)]
    pub trial_index: usize,
    #[pyo3(get)]
    pub start_time: f64,
    #[pyo3(get)]
    pub stop_time: f64,
    #[pyo3(get)]
    pub rate: f64,
}

impl From<RustStreamTrialRow> for StreamTrialRow {
    fn from(r: RustStreamTrialRow) -> Self {
        StreamTrialRow {
            trial_index: r.trial_index,
            start_time: r.start_time,
            stop_time: r.stop_time,
            rate: r.rate,
        }
    }
}

/// All occurrences of one labelled event code.
#[pyclass]
#[derive(Clone)]
pub struct EventGroup {
    #[pyo3(get)]
    pub code: i32,
    #[pyo3(get)]
    pub label: String,
    #[pyo3(get)]
    pub times: Vec<f64>,
}

impl From<RustEventGroup> for EventGroup {
    fn from(g: RustEventGroup) -> Self {
        EventGroup {
            code: g.code.0,
            label: g.label,
            times: g.times,
        }
    }
}

// ============================================================================
// Python-exposed Alignment Result
// ============================================================================

/// Alignment of a whole session.
#[pyclass]
pub struct SessionAlignment {
    inner: RustSessionAlignment,
}

#[pymethods]
impl SessionAlignment {
    /// Successfully aligned trials, in input order.
    #[getter]
    fn aligned(&self) -> Vec<AlignedTrial> {
        self.inner.aligned().map(AlignedTrial::from).collect()
    }

    /// Failed trials, in input order.
    #[getter]
    fn failures(&self) -> Vec<TrialFailure> {
        self.inner
            .failures()
            .map(|f| TrialFailure {
                trial_index: f.trial_index,
                kind: failure_kind(&f.error).to_string(),
                message: f.error.to_string(),
            })
            .collect()
    }

    /// Cross-trial inconsistencies.
    #[getter]
    fn inconsistencies(&self) -> Vec<AlignmentInconsistency> {
        self.inner
            .inconsistencies()
            .iter()
            .map(AlignmentInconsistency::from)
            .collect()
    }

    /// Acquisition-clock start per trial; None for failed trials.
    #[getter]
    fn acquisition_start_times(&self) -> Vec<Option<f64>> {
        self.inner.acquisition_start_times()
    }

    /// Session-relative start per trial; None for failed trials.
    #[getter]
    fn session_relative_start_times(&self) -> Vec<Option<f64>> {
        self.inner.session_relative_start_times()
    }

    #[getter]
    fn session_start_time(&self) -> f64 {
        self.inner.session_start_time()
    }

    fn is_clean(&self) -> bool {
        self.inner.is_clean()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Trial table rows. With `half_width`, windows are centered on each start.
    #[pyo3(signature = (half_width=None))]
    fn trial_intervals(&self, half_width: Option<f64>) -> PyResult<Vec<TrialInterval>> {
        Ok(self
            .intervals(half_width)?
            .into_iter()
            .map(TrialInterval::from)
            .collect())
    }

    /// Trial-aligned stream rows at the given stream sampling rate.
    #[pyo3(signature = (sampling_frequency=10.0, half_width=None))]
    fn stream_rows(&self, sampling_frequency: f64, half_width: Option<f64>) -> PyResult<Vec<StreamTrialRow>> {
        let config = RustConfig {
            stream: StreamConfig { sampling_frequency },
            ..RustConfig::default()
        };
        config.validate().map_err(to_py_err)?;
        let intervals = self.intervals(half_width)?;
        Ok(trialsync_timeline::build_stream_rows(&intervals, &config.stream)
            .into_iter()
            .map(StreamTrialRow::from)
            .collect())
    }

    /// Remap native-clock sample times onto session-relative acquisition
    /// time, using per-trial native anchors.
    fn remap_timestamps(&self, trial_anchors: Vec<f64>, samples: Vec<f64>) -> PyResult<Vec<f64>> {
        trialsync_alignment::remap_timestamps(&trial_anchors, &self.inner, &samples).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "SessionAlignment(trials={}, aligned={}, inconsistencies={})",
            self.inner.len(),
            self.inner.aligned_count(),
            self.inner.inconsistencies().len()
        )
    }
}

impl SessionAlignment {
    fn intervals(&self, half_width: Option<f64>) -> PyResult<Vec<RustTrialInterval>> {
        let window = match half_width {
            Some(half_width) => TrialWindow::Centered { half_width },
            None => TrialWindow::NextTrialStart,
        };
        let config = RustConfig {
            trials: TrialTableConfig { window },
            ..RustConfig::default()
        };
        config.validate().map_err(to_py_err)?;
        Ok(trialsync_timeline::build_trial_intervals(&self.inner, &config.trials))
    }
}

// ============================================================================
// Python-exposed Functions
// ============================================================================

fn parse_overlap_policy(name: &str) -> PyResult<MarkerOverlapPolicy> {
    match name {
        "allow" => Ok(MarkerOverlapPolicy::Allow),
        "report" => Ok(MarkerOverlapPolicy::Report),
        "reject" => Ok(MarkerOverlapPolicy::Reject),
        other => Err(PyValueError::new_err(format!(
            "unknown marker_overlap policy '{other}', expected allow, report or reject"
        ))),
    }
}

/// Resolve a trial's start timestamp on the acquisition clock.
#[pyfunction]
#[pyo3(signature = (record, trial_start_code=128, discrepancy_warn_threshold=1.0))]
fn resolve_trial_start(
    record: &TrialRecord,
    trial_start_code: i32,
    discrepancy_warn_threshold: f64,
) -> PyResult<f64> {
    TrialStartResolver::new(EventCode(trial_start_code), discrepancy_warn_threshold)
        .resolve(&RustTrialRecord::from(record))
        .map(|resolved| resolved.timestamp)
        .map_err(to_py_err)
}

/// Align every trial of a session.
#[pyfunction]
#[pyo3(signature = (
    trials,
    session_start_time,
    trial_start_code=128,
    discrepancy_warn_threshold=1.0,
    marker_overlap="report",
    max_trials=None,
))]
fn align_session(
    trials: Vec<TrialRecord>,
    session_start_time: f64,
    trial_start_code: i32,
    discrepancy_warn_threshold: f64,
    marker_overlap: &str,
    max_trials: Option<usize>,
) -> PyResult<SessionAlignment> {
    let config = RustConfig {
        alignment: AlignmentConfig {
            trial_start_code: EventCode(trial_start_code),
            discrepancy_warn_threshold,
            marker_overlap: parse_overlap_policy(marker_overlap)?,
        },
        max_trials,
        ..RustConfig::default()
    };
    config.validate().map_err(to_py_err)?;

    let trials = to_rust_trials(&trials);
    let inner = SessionAligner::new(&config.alignment).align(config.stub_trials(&trials), session_start_time);
    Ok(SessionAlignment { inner })
}

/// Remap sample timestamps from a native clock onto the acquisition clock.
#[pyfunction]
fn interpolate_stream(
    native_anchors: Vec<f64>,
    acquisition_anchors: Vec<f64>,
    samples: Vec<f64>,
) -> PyResult<Vec<f64>> {
    trialsync_alignment::interpolate_stream(&native_anchors, &acquisition_anchors, &samples)
        .map_err(to_py_err)
}

/// Group marker events of all trials by labelled event code.
#[pyfunction]
fn group_events(
    trials: Vec<TrialRecord>,
    session_start_time: f64,
    event_mapping: BTreeMap<i32, String>,
) -> PyResult<Vec<EventGroup>> {
    let config = RustConfig {
        events: EventConfig {
            mapping: event_mapping
                .into_iter()
                .map(|(code, label)| (EventCode(code), label))
                .collect(),
        },
        ..RustConfig::default()
    };
    config.validate().map_err(to_py_err)?;

    trialsync_timeline::group_events(&to_rust_trials(&trials), session_start_time, &config.events)
        .map(|groups| groups.into_iter().map(EventGroup::from).collect())
        .map_err(to_py_err)
}

/// Rebuild a continuous signal from per-trial segments.
///
/// Returns `(timestamps, values)`.
#[pyfunction]
#[pyo3(signature = (segments, trial_start_times, sampling_frequency=1000.0, time_offset=30.0))]
fn reconstruct_continuous(
    segments: Vec<Vec<f64>>,
    trial_start_times: Vec<f64>,
    sampling_frequency: f64,
    time_offset: f64,
) -> PyResult<(Vec<f64>, Vec<f64>)> {
    let config = RustConfig {
        continuous: ContinuousConfig {
            sampling_frequency,
            time_offset,
        },
        ..RustConfig::default()
    };
    config.validate().map_err(to_py_err)?;

    let series = trialsync_timeline::reconstruct_continuous(&segments, &trial_start_times, &config.continuous)
        .map_err(to_py_err)?;
    Ok((series.timestamps, series.values))
}

/// Express timestamps relative to `start`, or to the first timestamp.
#[pyfunction]
#[pyo3(signature = (timestamps, start=None))]
fn relative_timestamps(timestamps: Vec<f64>, start: Option<f64>) -> PyResult<Vec<f64>> {
    relative_seconds(&timestamps, start).map_err(to_py_err)
}

/// Format a Unix epoch in seconds as an RFC 3339 UTC string.
#[pyfunction]
fn session_start_iso(unix_seconds: f64) -> PyResult<String> {
    unix_seconds_to_datetime(unix_seconds)
        .map(|dt| dt.to_rfc3339())
        .map_err(to_py_err)
}

/// Install a tracing subscriber writing to stderr.
///
/// Returns False if a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

// ============================================================================
// Module Definition
// ============================================================================

/// trialsync - cross-clock trial alignment for Python conversion pipelines.
#[pymodule]
fn trialsync(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<TrialRecord>()?;
    m.add_class::<AlignedTrial>()?;
    m.add_class::<TrialFailure>()?;
    m.add_class::<AlignmentInconsistency>()?;
    m.add_class::<TrialInterval>()?;
    m.add_class::<StreamTrialRow>()?;
    m.add_class::<EventGroup>()?;
    m.add_class::<SessionAlignment>()?;

    // Functions
    m.add_function(wrap_pyfunction!(resolve_trial_start, m)?)?;
    m.add_function(wrap_pyfunction!(align_session, m)?)?;
    m.add_function(wrap_pyfunction!(interpolate_stream, m)?)?;
    m.add_function(wrap_pyfunction!(group_events, m)?)?;
    m.add_function(wrap_pyfunction!(reconstruct_continuous, m)?)?;
    m.add_function(wrap_pyfunction!(relative_timestamps, m)?)?;
    m.add_function(wrap_pyfunction!(session_start_iso, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
