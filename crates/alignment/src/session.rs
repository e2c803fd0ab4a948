//! Session-wide trial alignment.
//!
//! Resolves every trial of a session independently, then checks the
//! assembled trial table for inconsistencies that only show up across trials.

use crate::resolver::TrialStartResolver;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use trialsync_core::config::{AlignmentConfig, MarkerOverlapPolicy};
use trialsync_core::{
    AlignedTrial, AlignmentInconsistency, Error, InconsistencyKind, Seconds, Session, TrialRecord,
};

/// A trial that could not be aligned.
#[derive(Debug)]
pub struct TrialFailure {
    /// Position of the trial in the session input.
    pub trial_index: usize,
    /// Why it failed.
    pub error: Error,
}

/// Alignment result for a single trial.
#[derive(Debug)]
pub enum TrialOutcome {
    Aligned(AlignedTrial),
    Failed(TrialFailure),
}

impl TrialOutcome {
    /// Index of the trial this outcome belongs to.
    pub fn trial_index(&self) -> usize {
        match self {
            TrialOutcome::Aligned(trial) => trial.trial_index,
            TrialOutcome::Failed(failure) => failure.trial_index,
        }
    }

    /// The aligned trial, if alignment succeeded.
    pub fn as_aligned(&self) -> Option<&AlignedTrial> {
        match self {
            TrialOutcome::Aligned(trial) => Some(trial),
            TrialOutcome::Failed(_) => None,
        }
    }

    /// The failure, if alignment failed.
    pub fn as_failed(&self) -> Option<&TrialFailure> {
        match self {
            TrialOutcome::Aligned(_) => None,
            TrialOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn is_aligned(&self) -> bool {
        matches!(self, TrialOutcome::Aligned(_))
    }
}

/// Alignment of a whole session: one outcome per input trial, in input order,
/// plus the inconsistencies found across trials.
#[derive(Debug)]
pub struct SessionAlignment {
    session_start_time: Seconds,
    outcomes: Vec<TrialOutcome>,
    inconsistencies: Vec<AlignmentInconsistency>,
}

impl SessionAlignment {
    /// Acquisition-clock epoch the relative times are measured from.
    pub fn session_start_time(&self) -> Seconds {
        self.session_start_time
    }

    /// One outcome per input trial, in input order.
    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    /// Successfully aligned trials, in input order.
    pub fn aligned(&self) -> impl Iterator<Item = &AlignedTrial> {
        self.outcomes.iter().filter_map(TrialOutcome::as_aligned)
    }

    /// Failed trials, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &TrialFailure> {
        self.outcomes.iter().filter_map(TrialOutcome::as_failed)
    }

    /// Cross-trial inconsistencies, in trial order per check.
    pub fn inconsistencies(&self) -> &[AlignmentInconsistency] {
        &self.inconsistencies
    }

    /// Number of trials considered.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of successfully aligned trials.
    pub fn aligned_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_aligned()).count()
    }

    /// True when every trial aligned and nothing inconsistent was found.
    pub fn is_clean(&self) -> bool {
        self.inconsistencies.is_empty() && self.outcomes.iter().all(TrialOutcome::is_aligned)
    }

    /// Outcome for a trial index.
    pub fn get(&self, trial_index: usize) -> Option<&TrialOutcome> {
        self.outcomes.get(trial_index)
    }

    /// Acquisition-clock start per trial index; `None` for failed trials.
    pub fn acquisition_start_times(&self) -> Vec<Option<Seconds>> {
        self.outcomes
            .iter()
            .map(|o| o.as_aligned().map(|t| t.acquisition_start_time))
            .collect()
    }

    /// Session-relative start per trial index; `None` for failed trials.
    pub fn session_relative_start_times(&self) -> Vec<Option<Seconds>> {
        self.outcomes
            .iter()
            .map(|o| o.as_aligned().map(|t| t.session_relative_start_time))
            .collect()
    }
}

/// Aligns all trials of a session against the acquisition clock.
#[derive(Debug, Clone)]
pub struct SessionAligner {
    resolver: TrialStartResolver,
    marker_overlap: MarkerOverlapPolicy,
}

impl SessionAligner {
    /// Create an aligner from configuration.
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            resolver: TrialStartResolver::new(
                config.trial_start_code,
                config.discrepancy_warn_threshold,
            ),
            marker_overlap: config.marker_overlap,
        }
    }

    /// Align a session's trials.
    pub fn align_session(&self, session: &Session) -> SessionAlignment {
        self.align(&session.trials, session.session_start_time)
    }

    /// Align trials against a session start time. Returns one outcome per
    /// input trial.
    pub fn align(&self, trials: &[TrialRecord], session_start_time: Seconds) -> SessionAlignment {
        // Each trial resolves independently; outcomes stay at their trial index.
        let mut outcomes: Vec<TrialOutcome> = trials
            .iter()
            .enumerate()
            .map(|(trial_index, record)| self.align_trial(trial_index, record, session_start_time))
            .collect();

        let mut inconsistencies = Vec::new();
        fail_negative_offsets(&mut outcomes, session_start_time, &mut inconsistencies);
        if self.marker_overlap != MarkerOverlapPolicy::Allow {
            check_shared_markers(&mut outcomes, self.marker_overlap, &mut inconsistencies);
        }
        check_monotonic(&outcomes, &mut inconsistencies);

        for inconsistency in &inconsistencies {
            warn!(trial_index = inconsistency.trial_index, "{}", inconsistency);
        }

        let alignment = SessionAlignment {
            session_start_time,
            outcomes,
            inconsistencies,
        };
        info!(
            trials = alignment.len(),
            aligned = alignment.aligned_count(),
            inconsistencies = alignment.inconsistencies.len(),
            "session aligned"
        );
        alignment
    }

    fn align_trial(
        &self,
        trial_index: usize,
        record: &TrialRecord,
        session_start_time: Seconds,
    ) -> TrialOutcome {
        match self.resolver.resolve(record) {
            Ok(resolved) => {
                debug!(
                    trial_index,
                    start = resolved.timestamp,
                    discrepancy = resolved.discrepancy,
                    "trial start resolved"
                );
                TrialOutcome::Aligned(AlignedTrial {
                    trial_index,
                    acquisition_start_time: resolved.timestamp,
                    session_relative_start_time: resolved.timestamp - session_start_time,
                    trial_type: record.trial_type.clone(),
                    marker_index: resolved.marker_index,
                    discrepancy: resolved.discrepancy,
                })
            }
            Err(error) => {
                warn!(trial_index, %error, "trial start unresolved");
                TrialOutcome::Failed(TrialFailure { trial_index, error })
            }
        }
    }
}

/// Align trials with the given configuration.
pub fn align_session(
    trials: &[TrialRecord],
    session_start_time: Seconds,
    config: &AlignmentConfig,
) -> SessionAlignment {
    SessionAligner::new(config).align(trials, session_start_time)
}

fn fail_inconsistent(outcome: &mut TrialOutcome, inconsistency: AlignmentInconsistency) {
    *outcome = TrialOutcome::Failed(TrialFailure {
        trial_index: inconsistency.trial_index,
        error: Error::AlignmentInconsistency(inconsistency),
    });
}

/// Trials starting before the session start (or at an undefined offset) are
/// failed and reported, never clamped.
fn fail_negative_offsets(
    outcomes: &mut [TrialOutcome],
    session_start_time: Seconds,
    inconsistencies: &mut Vec<AlignmentInconsistency>,
) {
    for outcome in outcomes.iter_mut() {
        let negative = match outcome {
            TrialOutcome::Aligned(trial) if !(trial.session_relative_start_time >= 0.0) => {
                Some(AlignmentInconsistency {
                    trial_index: trial.trial_index,
                    kind: InconsistencyKind::NegativeOffset {
                        acquisition_start_time: trial.acquisition_start_time,
                        session_start_time,
                    },
                })
            }
            _ => None,
        };
        if let Some(inconsistency) = negative {
            inconsistencies.push(inconsistency.clone());
            fail_inconsistent(outcome, inconsistency);
        }
    }
}

fn check_shared_markers(
    outcomes: &mut [TrialOutcome],
    policy: MarkerOverlapPolicy,
    inconsistencies: &mut Vec<AlignmentInconsistency>,
) {
    let mut claimed: HashMap<OrderedFloat<f64>, usize> = HashMap::new();
    for outcome in outcomes.iter_mut() {
        let shared = match outcome {
            TrialOutcome::Aligned(trial) => {
                let key = OrderedFloat(trial.acquisition_start_time);
                match claimed.get(&key) {
                    Some(&first_trial_index) => Some(AlignmentInconsistency {
                        trial_index: trial.trial_index,
                        kind: InconsistencyKind::SharedMarker {
                            first_trial_index,
                            timestamp: trial.acquisition_start_time,
                        },
                    }),
                    None => {
                        claimed.insert(key, trial.trial_index);
                        None
                    }
                }
            }
            TrialOutcome::Failed(_) => None,
        };
        if let Some(inconsistency) = shared {
            inconsistencies.push(inconsistency.clone());
            if policy == MarkerOverlapPolicy::Reject {
                fail_inconsistent(outcome, inconsistency);
            }
        }
    }
}

/// Reports trials not starting strictly after the previous aligned trial.
/// Input order is kept as is.
fn check_monotonic(outcomes: &[TrialOutcome], inconsistencies: &mut Vec<AlignmentInconsistency>) {
    let mut previous: Option<&AlignedTrial> = None;
    for trial in outcomes.iter().filter_map(TrialOutcome::as_aligned) {
        if let Some(prev) = previous {
            if trial.acquisition_start_time <= prev.acquisition_start_time {
                inconsistencies.push(AlignmentInconsistency {
                    trial_index: trial.trial_index,
                    kind: InconsistencyKind::NonMonotonic {
                        previous_trial_index: prev.trial_index,
                        previous_start_time: prev.acquisition_start_time,
                        start_time: trial.acquisition_start_time,
                    },
                });
            }
        }
        previous = Some(trial);
    }
}
