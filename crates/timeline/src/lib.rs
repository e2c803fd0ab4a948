//! Session timeline tables built from aligned trials.
//!
//! This crate handles:
//! - Trial interval rows (start/stop/midpoint, session-relative)
//! - Trial-aligned stream rows carrying the stream's sampling rate
//! - Marker events grouped by labelled event code
//! - Continuous signal reconstruction from per-trial segments

pub mod trials;
pub mod events;
pub mod continuous;

pub use trials::{build_stream_rows, build_trial_intervals, StreamTrialRow, TrialInterval};
pub use events::{group_events, EventGroup};
pub use continuous::reconstruct_continuous;
