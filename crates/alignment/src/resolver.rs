//! Trial start resolution.
//!
//! Picks, among the acquisition-system markers recorded during a trial, the
//! trial-start marker closest to the behavioral clock's intended start.

use trialsync_core::{Error, EventCode, Result, Seconds, TrialRecord};
use tracing::warn;

/// A resolved trial start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStart {
    /// Chosen marker timestamp (acquisition clock).
    pub timestamp: Seconds,
    /// Index of the chosen marker within the trial's marker arrays.
    pub marker_index: usize,
    /// Signed difference `timestamp - intended_start_time`.
    pub discrepancy: Seconds,
}

/// Resolves trial starts for a configured trial-start code.
#[derive(Debug, Clone)]
pub struct TrialStartResolver {
    trial_start_code: EventCode,
    discrepancy_warn_threshold: f64,
}

impl TrialStartResolver {
    /// Create a resolver.
    pub fn new(trial_start_code: EventCode, discrepancy_warn_threshold: f64) -> Self {
        Self {
            trial_start_code,
            discrepancy_warn_threshold,
        }
    }

    /// Trial-start code this resolver matches.
    pub fn trial_start_code(&self) -> EventCode {
        self.trial_start_code
    }

    /// Whether a resolved start lies further from its intended start than
    /// the warning threshold allows.
    pub fn is_discrepant(&self, resolved: &ResolvedStart) -> bool {
        resolved.discrepancy.abs() > self.discrepancy_warn_threshold
    }

    /// Resolve the start of one trial.
    ///
    /// Candidates are markers carrying the trial-start code with a finite
    /// timestamp. The candidate nearest the intended start wins; on a tie the
    /// earliest marker wins.
    pub fn resolve(&self, record: &TrialRecord) -> Result<ResolvedStart> {
        record.validate()?;
        let intended = record.intended_start_time;
        if !intended.is_finite() {
            return Err(Error::data(format!("intended start time {intended} is not finite")));
        }

        let mut best: Option<(usize, Seconds, f64)> = None;
        for (i, (ts, code)) in record.markers().enumerate() {
            if code != self.trial_start_code || !ts.is_finite() {
                continue;
            }
            let distance = (ts - intended).abs();
            // Strict comparison keeps the lowest index on ties.
            if best.map_or(true, |(_, _, d)| distance < d) {
                best = Some((i, ts, distance));
            }
        }

        let (marker_index, timestamp, _) = best.ok_or_else(|| Error::NoMarkerFound {
            code: self.trial_start_code,
            marker_count: record.marker_codes.len(),
        })?;

        let resolved = ResolvedStart {
            timestamp,
            marker_index,
            discrepancy: timestamp - intended,
        };
        if self.is_discrepant(&resolved) {
            warn!(
                intended_start_time = intended,
                resolved_start_time = timestamp,
                discrepancy = resolved.discrepancy,
                "trial start marker far from intended start"
            );
        }
        Ok(resolved)
    }
}

/// Resolve a trial's start timestamp on the acquisition clock.
pub fn resolve_trial_start(record: &TrialRecord, trial_start_code: EventCode) -> Result<Seconds> {
    TrialStartResolver::new(trial_start_code, f64::INFINITY)
        .resolve(record)
        .map(|resolved| resolved.timestamp)
}
