//! Error types for the trialsync system.

use crate::types::{AlignmentInconsistency, EventCode};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trialsync system.
#[derive(Error, Debug)]
pub enum Error {
    /// The trial-start code never appears among a trial's markers.
    #[error("No marker with code {code} among {marker_count} trial markers")]
    NoMarkerFound { code: EventCode, marker_count: usize },

    /// Marker timestamps and codes are not parallel.
    #[error("Marker arrays differ in length: {timestamps} timestamps, {codes} codes")]
    MarkerLengthMismatch { timestamps: usize, codes: usize },

    /// A resolved start time is inconsistent with the rest of the session.
    #[error("Alignment inconsistency: {0}")]
    AlignmentInconsistency(AlignmentInconsistency),

    /// Interpolation anchors are malformed.
    #[error("Invalid anchor set: {reason}")]
    InvalidAnchorSet { reason: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an invalid anchor set error.
    pub fn invalid_anchors(reason: impl Into<String>) -> Self {
        Error::InvalidAnchorSet {
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single trial.
    pub fn is_per_trial(&self) -> bool {
        matches!(
            self,
            Error::NoMarkerFound { .. }
                | Error::MarkerLengthMismatch { .. }
                | Error::AlignmentInconsistency(_)
        )
    }
}
