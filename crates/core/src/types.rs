//! Core data types for the trialsync system.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time in seconds. Absolute values are unix epoch seconds on the clock that
/// recorded them; session-relative values are offsets from the session start.
pub type Seconds = f64;

/// Integer tag identifying a class of marker event on the acquisition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(pub i32);

impl EventCode {
    /// Neuralynx TTL code broadcast at the start of every trial.
    pub const TRIAL_START: EventCode = EventCode(128);
}

impl From<i32> for EventCode {
    fn from(code: i32) -> Self {
        EventCode(code)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the clock a timestamp array was recorded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockId {
    /// Behavioral task computer.
    Behavior,
    /// Electrophysiology acquisition system (the reference clock).
    Acquisition,
    /// Fast-scan cyclic voltammetry rig.
    Voltammetry,
    /// Eye tracker.
    EyeTracking,
    /// Any other independently clocked source.
    Other(String),
}

/// Timestamps plus a parallel value array, tagged with the recording clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampSeries {
    /// Clock the timestamps were recorded on.
    pub clock: ClockId,
    /// Sample times in seconds.
    pub timestamps: Vec<Seconds>,
    /// Sample values, same length as `timestamps`.
    pub values: Vec<f64>,
}

impl TimestampSeries {
    /// Create a series, rejecting mismatched array lengths.
    pub fn new(clock: ClockId, timestamps: Vec<Seconds>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(Error::data(format!(
                "timestamp series has {} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }
        Ok(Self {
            clock,
            timestamps,
            values,
        })
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether timestamps never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] <= w[1])
    }

    /// First timestamp, if any.
    pub fn first_timestamp(&self) -> Option<Seconds> {
        self.timestamps.first().copied()
    }
}

/// One behavioral trial with the acquisition-system markers seen during it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial start according to the behavioral clock.
    pub intended_start_time: Seconds,
    /// Trial type tag.
    pub trial_type: String,
    /// Marker times on the acquisition clock, in occurrence order.
    pub marker_timestamps: Vec<Seconds>,
    /// Marker codes, parallel to `marker_timestamps`.
    pub marker_codes: Vec<EventCode>,
}

impl TrialRecord {
    /// Create a trial record.
    pub fn new(
        intended_start_time: Seconds,
        trial_type: impl Into<String>,
        marker_timestamps: Vec<Seconds>,
        marker_codes: Vec<EventCode>,
    ) -> Self {
        Self {
            intended_start_time,
            trial_type: trial_type.into(),
            marker_timestamps,
            marker_codes,
        }
    }

    /// Check that marker timestamps and codes are parallel.
    pub fn validate(&self) -> Result<()> {
        if self.marker_timestamps.len() != self.marker_codes.len() {
            return Err(Error::MarkerLengthMismatch {
                timestamps: self.marker_timestamps.len(),
                codes: self.marker_codes.len(),
            });
        }
        Ok(())
    }

    /// Iterate over `(timestamp, code)` marker pairs.
    pub fn markers(&self) -> impl Iterator<Item = (Seconds, EventCode)> + '_ {
        self.marker_timestamps
            .iter()
            .copied()
            .zip(self.marker_codes.iter().copied())
    }
}

/// A trial whose start has been resolved onto the acquisition clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedTrial {
    /// Position of the trial in the session input.
    pub trial_index: usize,
    /// Chosen marker timestamp (acquisition clock).
    pub acquisition_start_time: Seconds,
    /// `acquisition_start_time - session_start_time`.
    pub session_relative_start_time: Seconds,
    /// Trial type tag carried from the record.
    pub trial_type: String,
    /// Index of the chosen marker within the trial's marker arrays.
    pub marker_index: usize,
    /// Signed difference `acquisition_start_time - intended_start_time`.
    pub discrepancy: Seconds,
}

/// A recording session: its trials and the acquisition recording start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Trial records in acquisition order.
    pub trials: Vec<TrialRecord>,
    /// Moment the acquisition system began recording (epoch seconds).
    pub session_start_time: Seconds,
}

impl Session {
    /// Create a session.
    pub fn new(trials: Vec<TrialRecord>, session_start_time: Seconds) -> Self {
        Self {
            trials,
            session_start_time,
        }
    }

    /// Number of trials.
    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }
}

/// A stream recorded on its own clock, with per-trial start anchors on that
/// same clock. Trial anchors are indexed by trial index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalStream {
    /// Raw samples on the stream's native clock.
    pub series: TimestampSeries,
    /// Trial start times on the native clock, one per trial.
    pub trial_anchors: Vec<Seconds>,
}

impl ExternalStream {
    /// Create an external stream.
    pub fn new(series: TimestampSeries, trial_anchors: Vec<Seconds>) -> Self {
        Self {
            series,
            trial_anchors,
        }
    }
}

/// What went wrong with a trial's resolved start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InconsistencyKind {
    /// The resolved start precedes the session start.
    NegativeOffset {
        acquisition_start_time: Seconds,
        session_start_time: Seconds,
    },
    /// The resolved start does not come after the previous aligned trial's.
    NonMonotonic {
        previous_trial_index: usize,
        previous_start_time: Seconds,
        start_time: Seconds,
    },
    /// The same marker was chosen by an earlier trial.
    SharedMarker {
        first_trial_index: usize,
        timestamp: Seconds,
    },
}

/// An inconsistency found after all trials of a session were resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentInconsistency {
    /// Offending trial.
    pub trial_index: usize,
    /// Nature of the inconsistency.
    pub kind: InconsistencyKind,
}

impl fmt::Display for AlignmentInconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InconsistencyKind::NegativeOffset {
                acquisition_start_time,
                session_start_time,
            } => write!(
                f,
                "trial {} starts at {} before session start {}",
                self.trial_index, acquisition_start_time, session_start_time
            ),
            InconsistencyKind::NonMonotonic {
                previous_trial_index,
                previous_start_time,
                start_time,
            } => write!(
                f,
                "trial {} starts at {} which is not after trial {} at {}",
                self.trial_index, start_time, previous_trial_index, previous_start_time
            ),
            InconsistencyKind::SharedMarker {
                first_trial_index,
                timestamp,
            } => write!(
                f,
                "trial {} claims marker at {} already claimed by trial {}",
                self.trial_index, timestamp, first_trial_index
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_length_mismatch() {
        let result = TimestampSeries::new(ClockId::Voltammetry, vec![0.0, 0.1], vec![1.0]);
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_series_monotonic() {
        let series =
            TimestampSeries::new(ClockId::Voltammetry, vec![0.0, 0.1, 0.1, 0.3], vec![0.0; 4]).unwrap();
        assert!(series.is_monotonic());
        assert_eq!(series.first_timestamp(), Some(0.0));

        let series = TimestampSeries::new(ClockId::Voltammetry, vec![0.0, 0.2, 0.1], vec![0.0; 3]).unwrap();
        assert!(!series.is_monotonic());
    }

    #[test]
    fn test_trial_record_validate() {
        let record = TrialRecord::new(1.0, "reward", vec![1.0, 2.0], vec![EventCode(128)]);
        assert!(matches!(
            record.validate(),
            Err(Error::MarkerLengthMismatch { timestamps: 2, codes: 1 })
        ));

        let record = TrialRecord::new(1.0, "reward", vec![1.0], vec![EventCode(128)]);
        assert!(record.validate().is_ok());
        assert_eq!(record.markers().collect::<Vec<_>>(), vec![(1.0, EventCode(128))]);
    }

    #[test]
    fn test_event_code_serde_transparent() {
        let json = serde_json::to_string(&EventCode(128)).unwrap();
        assert_eq!(json, "128");
        let code: EventCode = serde_json::from_str("9").unwrap();
        assert_eq!(code, EventCode(9));
    }

    #[test]
    fn test_inconsistency_display_names_trial() {
        let inconsistency = AlignmentInconsistency {
            trial_index: 4,
            kind: InconsistencyKind::SharedMarker {
                first_trial_index: 3,
                timestamp: 12.5,
            },
        };
        let text = inconsistency.to_string();
        assert!(text.contains("trial 4"));
        assert!(text.contains("trial 3"));
    }
}
