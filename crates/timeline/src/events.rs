//! Marker events grouped by event code.
//!
//! Every marker of every trial is collected under its code, converted to
//! session-relative time and labelled from the event mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use trialsync_core::config::EventConfig;
use trialsync_core::time::relative_seconds;
use trialsync_core::{Error, EventCode, Result, Seconds, TrialRecord};

/// All occurrences of one labelled event code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    pub code: EventCode,
    pub label: String,
    /// Session-relative times in trial then marker order.
    pub times: Vec<Seconds>,
}

/// Group marker events across trials by code.
///
/// Codes missing from the mapping are skipped with a warning. A marker
/// preceding the session start is an error.
pub fn group_events(
    trials: &[TrialRecord],
    session_start_time: Seconds,
    config: &EventConfig,
) -> Result<Vec<EventGroup>> {
    let mut by_code: BTreeMap<EventCode, Vec<Seconds>> = BTreeMap::new();

    for (trial_index, record) in trials.iter().enumerate() {
        record
            .validate()
            .map_err(|e| Error::data(format!("trial {trial_index}: {e}")))?;
        let (timestamps, codes): (Vec<Seconds>, Vec<EventCode>) =
            record.markers().filter(|(ts, _)| ts.is_finite()).unzip();
        let relative = relative_seconds(&timestamps, Some(session_start_time))
            .map_err(|e| Error::data(format!("trial {trial_index}: {e}")))?;
        for (code, t) in codes.into_iter().zip(relative) {
            by_code.entry(code).or_default().push(t);
        }
    }

    let mut groups = Vec::with_capacity(by_code.len());
    for (code, times) in by_code {
        match config.label(code) {
            Some(label) => groups.push(EventGroup {
                code,
                label: label.to_string(),
                times,
            }),
            None => warn!(%code, occurrences = times.len(), "event code not in mapping, skipped"),
        }
    }
    Ok(groups)
}
