//! Configuration structures for the trialsync system.

use crate::error::{Error, Result};
use crate::types::{EventCode, TrialRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration for a conversion session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trial start alignment configuration.
    pub alignment: AlignmentConfig,
    /// Event code labelling.
    pub events: EventConfig,
    /// Trial interval table configuration.
    pub trials: TrialTableConfig,
    /// Continuous signal reconstruction configuration.
    pub continuous: ContinuousConfig,
    /// Externally clocked stream configuration.
    pub stream: StreamConfig,
    /// Convert only the first N trials (stub conversions).
    pub max_trials: Option<usize>,
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every section for values that cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.max_trials == Some(0) {
            return Err(Error::config("max_trials must be at least 1"));
        }
        self.alignment.validate()?;
        self.events.validate()?;
        self.trials.validate()?;
        self.continuous.validate()?;
        self.stream.validate()
    }

    /// The trials a conversion should handle: all of them, or the first
    /// `max_trials` in stub mode.
    pub fn stub_trials<'a>(&self, trials: &'a [TrialRecord]) -> &'a [TrialRecord] {
        match self.max_trials {
            Some(limit) if limit < trials.len() => &trials[..limit],
            _ => trials,
        }
    }
}

/// What to do when two trials resolve to the same marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerOverlapPolicy {
    /// Accept shared markers silently.
    Allow,
    /// Keep both trials aligned and report the later one.
    #[default]
    Report,
    /// Fail the later claimant.
    Reject,
}

/// Trial start alignment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Marker code broadcast at every trial start.
    pub trial_start_code: EventCode,
    /// Discrepancy (seconds) above which a resolved start is logged.
    pub discrepancy_warn_threshold: f64,
    /// Handling of markers claimed by more than one trial.
    pub marker_overlap: MarkerOverlapPolicy,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            trial_start_code: EventCode::TRIAL_START,
            discrepancy_warn_threshold: 1.0,
            marker_overlap: MarkerOverlapPolicy::Report,
        }
    }
}

impl AlignmentConfig {
    fn validate(&self) -> Result<()> {
        if !(self.discrepancy_warn_threshold >= 0.0) {
            return Err(Error::config(format!(
                "alignment.discrepancy_warn_threshold must be >= 0, got {}",
                self.discrepancy_warn_threshold
            )));
        }
        Ok(())
    }
}

/// Labels for acquisition-system event codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Event code to human-readable label.
    pub mapping: BTreeMap<EventCode, String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        let mut mapping = BTreeMap::new();
        mapping.insert(EventCode::TRIAL_START, "intended trial start".to_string());
        Self { mapping }
    }
}

impl EventConfig {
    /// Label for a code, if mapped.
    pub fn label(&self, code: EventCode) -> Option<&str> {
        self.mapping.get(&code).map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        if let Some((code, _)) = self.mapping.iter().find(|(_, label)| label.trim().is_empty()) {
            return Err(Error::config(format!("events.mapping label for code {code} is empty")));
        }
        Ok(())
    }
}

/// How trial intervals are derived from aligned start times.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialWindow {
    /// A trial runs until the next trial starts; the last is open-ended.
    #[default]
    NextTrialStart,
    /// A fixed window centered on the resolved start time.
    Centered { half_width: f64 },
}

/// Trial interval table configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialTableConfig {
    /// Interval derivation.
    pub window: TrialWindow,
}

impl TrialTableConfig {
    fn validate(&self) -> Result<()> {
        if let TrialWindow::Centered { half_width } = self.window {
            if !(half_width >= 0.0) || !half_width.is_finite() {
                return Err(Error::config(format!(
                    "trials.window.half_width must be a finite value >= 0, got {half_width}"
                )));
            }
        }
        Ok(())
    }
}

/// Reconstruction of a continuous signal from per-trial segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousConfig {
    /// Sampling frequency of the segments in Hz.
    pub sampling_frequency: f64,
    /// Seconds between a segment's first sample and its trial start.
    pub time_offset: f64,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: 1000.0,
            time_offset: 30.0,
        }
    }
}

impl ContinuousConfig {
    fn validate(&self) -> Result<()> {
        validate_frequency("continuous.sampling_frequency", self.sampling_frequency)?;
        if !self.time_offset.is_finite() {
            return Err(Error::config("continuous.time_offset must be finite"));
        }
        Ok(())
    }
}

/// Externally clocked stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Scan frequency of the stream in Hz.
    pub sampling_frequency: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: 10.0,
        }
    }
}

impl StreamConfig {
    fn validate(&self) -> Result<()> {
        validate_frequency("stream.sampling_frequency", self.sampling_frequency)
    }
}

fn validate_frequency(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(Error::config(format!("{name} must be a finite value > 0, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.alignment.trial_start_code, EventCode(128));
        assert_eq!(config.alignment.marker_overlap, MarkerOverlapPolicy::Report);
        assert_eq!(config.events.label(EventCode(128)), Some("intended trial start"));
        assert_eq!(config.trials.window, TrialWindow::NextTrialStart);
        assert_eq!(config.continuous.sampling_frequency, 1000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{
            "max_trials": 100,
            "alignment": { "trial_start_code": 64, "marker_overlap": "reject" },
            "events": { "mapping": { "64": "trial start", "9": "reward" } },
            "trials": { "window": { "kind": "centered", "half_width": 30.0 } }
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.alignment.trial_start_code, EventCode(64));
        assert_eq!(config.alignment.marker_overlap, MarkerOverlapPolicy::Reject);
        assert_eq!(config.max_trials, Some(100));
        assert_eq!(config.alignment.discrepancy_warn_threshold, 1.0);
        assert_eq!(config.events.label(EventCode(9)), Some("reward"));
        assert_eq!(config.events.label(EventCode(128)), None);
        assert_eq!(config.trials.window, TrialWindow::Centered { half_width: 30.0 });
        assert_eq!(config.stream.sampling_frequency, 10.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            Config::from_json_str(r#"{ "continuous": { "sampling_frequency": 0.0 } }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{ "max_trials": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{ "events": { "mapping": { "5": " " } } }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{ "trials": { "window": { "kind": "centered", "half_width": -1.0 } } }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stub_trials_limits_input() {
        let trials: Vec<TrialRecord> = (0..3)
            .map(|i| TrialRecord::new(f64::from(i), "reward", vec![], vec![]))
            .collect();

        assert_eq!(Config::default().stub_trials(&trials).len(), 3);

        let config = Config {
            max_trials: Some(2),
            ..Config::default()
        };
        let stub = config.stub_trials(&trials);
        assert_eq!(stub.len(), 2);
        assert_eq!(stub[1].intended_start_time, 1.0);

        let config = Config {
            max_trials: Some(100),
            ..Config::default()
        };
        assert_eq!(config.stub_trials(&trials).len(), 3);
    }

    #[test]
    fn test_trial_window_default() {
        assert_eq!(TrialWindow::default(), TrialWindow::NextTrialStart);
        let config: TrialTableConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.window, TrialWindow::NextTrialStart);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Config::from_json_str("{ not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/trialsync/config.json"),
            Err(Error::Io(_))
        ));
    }
}
