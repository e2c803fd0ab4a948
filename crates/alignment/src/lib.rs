//! Cross-clock temporal alignment for the trialsync system.
//!
//! This crate handles:
//! - Trial start resolution against acquisition-system markers
//! - Session-wide alignment with per-trial failures and inconsistency checks
//! - Remapping independently clocked streams onto the acquisition clock

pub mod resolver;
pub mod session;
pub mod interpolate;

pub use resolver::{resolve_trial_start, ResolvedStart, TrialStartResolver};
pub use session::{align_session, SessionAligner, SessionAlignment, TrialFailure, TrialOutcome};
pub use interpolate::{anchor_pairs, interpolate_stream, remap_stream, remap_timestamps, StreamInterpolator};
