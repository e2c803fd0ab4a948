//! Trial interval rows.

use serde::{Deserialize, Serialize};
use trialsync_alignment::SessionAlignment;
use trialsync_core::config::{StreamConfig, TrialTableConfig, TrialWindow};
use trialsync_core::Seconds;

/// One row of the trial table, in session-relative seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialInterval {
    pub trial_index: usize,
    pub start_time: Seconds,
    /// NaN when the interval is open-ended.
    pub stop_time: Seconds,
    /// Resolved trial start, present for centered windows.
    pub midpoint_time: Option<Seconds>,
    pub trial_type: String,
}

/// Build trial intervals from aligned trials. Failed trials get no row.
pub fn build_trial_intervals(alignment: &SessionAlignment, config: &TrialTableConfig) -> Vec<TrialInterval> {
    let aligned: Vec<_> = alignment.aligned().collect();

    match config.window {
        TrialWindow::NextTrialStart => aligned
            .iter()
            .enumerate()
            .map(|(i, trial)| TrialInterval {
                trial_index: trial.trial_index,
                start_time: trial.session_relative_start_time,
                stop_time: aligned
                    .get(i + 1)
                    .map_or(f64::NAN, |next| next.session_relative_start_time),
                midpoint_time: None,
                trial_type: trial.trial_type.clone(),
            })
            .collect(),
        TrialWindow::Centered { half_width } => aligned
            .iter()
            .map(|trial| {
                let midpoint = trial.session_relative_start_time;
                TrialInterval {
                    trial_index: trial.trial_index,
                    start_time: midpoint - half_width,
                    stop_time: midpoint + half_width,
                    midpoint_time: Some(midpoint),
                    trial_type: trial.trial_type.clone(),
                }
            })
            .collect(),
    }
}

/// Row of a trial-aligned stream table: the trial's interval plus the rate
/// of the per-trial stream segment recorded within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTrialRow {
    pub trial_index: usize,
    pub start_time: Seconds,
    pub stop_time: Seconds,
    /// Hz.
    pub rate: f64,
}

/// Rows for a trial-aligned stream, one per trial interval.
pub fn build_stream_rows(intervals: &[TrialInterval], config: &StreamConfig) -> Vec<StreamTrialRow> {
    intervals
        .iter()
        .map(|interval| StreamTrialRow {
            trial_index: interval.trial_index,
            start_time: interval.start_time,
            stop_time: interval.stop_time,
            rate: config.sampling_frequency,
        })
        .collect()
}
