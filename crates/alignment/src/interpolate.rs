//! Remapping of independently clocked streams onto the acquisition clock.
//!
//! Trial starts seen on both clocks act as control points of a piecewise
//! linear map. Outside the anchor range the edge segments are extended, so
//! samples before the first or after the last trial keep their spacing.

use crate::session::SessionAlignment;
use tracing::debug;
use trialsync_core::{ClockId, Error, ExternalStream, Result, Seconds, TimestampSeries};

/// Piecewise-linear map from a native clock to the acquisition clock.
#[derive(Debug, Clone)]
pub struct StreamInterpolator {
    native: Vec<Seconds>,
    acquisition: Vec<Seconds>,
}

impl StreamInterpolator {
    /// Build from anchor pairs, paired by index.
    ///
    /// Native anchors must be strictly ascending and acquisition anchors
    /// must not decrease; both must be finite, equally long and hold at
    /// least two anchors.
    pub fn new(native: &[Seconds], acquisition: &[Seconds]) -> Result<Self> {
        if native.len() != acquisition.len() {
            return Err(Error::invalid_anchors(format!(
                "{} native anchors but {} acquisition anchors",
                native.len(),
                acquisition.len()
            )));
        }
        if native.len() < 2 {
            return Err(Error::invalid_anchors(format!(
                "need at least 2 anchors, got {}",
                native.len()
            )));
        }
        if let Some(i) = native
            .iter()
            .zip(acquisition)
            .position(|(n, a)| !n.is_finite() || !a.is_finite())
        {
            return Err(Error::invalid_anchors(format!(
                "anchor {} is not finite (native {}, acquisition {})",
                i, native[i], acquisition[i]
            )));
        }
        if let Some(i) = native.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::invalid_anchors(format!(
                "native anchors not strictly ascending at {}: {} then {}",
                i + 1,
                native[i],
                native[i + 1]
            )));
        }
        if let Some(i) = acquisition.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::invalid_anchors(format!(
                "acquisition anchors descend at {}: {} then {}",
                i + 1,
                acquisition[i],
                acquisition[i + 1]
            )));
        }

        Ok(Self {
            native: native.to_vec(),
            acquisition: acquisition.to_vec(),
        })
    }

    /// Number of anchor pairs.
    pub fn anchor_count(&self) -> usize {
        self.native.len()
    }

    /// Map one native timestamp. Non-finite input maps to NaN.
    pub fn map(&self, t: Seconds) -> Seconds {
        if !t.is_finite() {
            return f64::NAN;
        }
        // Segment whose left anchor is the last one <= t, limited to the
        // first and last segments so the edges extrapolate.
        let upper = self.native.partition_point(|&x| x <= t);
        let i = upper.saturating_sub(1).min(self.native.len() - 2);

        let (x0, x1) = (self.native[i], self.native[i + 1]);
        let (y0, y1) = (self.acquisition[i], self.acquisition[i + 1]);
        y0 + (t - x0) * (y1 - y0) / (x1 - x0)
    }

    /// Map a sequence of native timestamps, preserving length and order.
    pub fn map_all(&self, samples: &[Seconds]) -> Vec<Seconds> {
        samples.iter().map(|&t| self.map(t)).collect()
    }
}

/// Remap sample timestamps from a native clock onto the acquisition clock.
pub fn interpolate_stream(
    native_anchors: &[Seconds],
    acquisition_anchors: &[Seconds],
    samples: &[Seconds],
) -> Result<Vec<Seconds>> {
    Ok(StreamInterpolator::new(native_anchors, acquisition_anchors)?.map_all(samples))
}

/// Pair a stream's per-trial native anchors with aligned acquisition start
/// times by trial index. Failed trials, trials without a native anchor and
/// non-finite native anchors are skipped.
pub fn anchor_pairs(
    stream_anchors: &[Seconds],
    alignment: &SessionAlignment,
) -> (Vec<Seconds>, Vec<Seconds>) {
    let mut native = Vec::new();
    let mut acquisition = Vec::new();
    for trial in alignment.aligned() {
        match stream_anchors.get(trial.trial_index) {
            Some(&anchor) if anchor.is_finite() => {
                native.push(anchor);
                acquisition.push(trial.acquisition_start_time);
            }
            _ => debug!(trial_index = trial.trial_index, "no native anchor for trial"),
        }
    }
    (native, acquisition)
}

/// Remap native-clock sample times onto session-relative acquisition-clock
/// time, anchored on the stream's per-trial native start times.
pub fn remap_timestamps(
    stream_anchors: &[Seconds],
    alignment: &SessionAlignment,
    samples: &[Seconds],
) -> Result<Vec<Seconds>> {
    let (native, acquisition) = anchor_pairs(stream_anchors, alignment);
    let interpolator = StreamInterpolator::new(&native, &acquisition)?;
    let session_start = alignment.session_start_time();
    debug!(
        anchors = interpolator.anchor_count(),
        samples = samples.len(),
        "stream timestamps remapped"
    );
    Ok(samples
        .iter()
        .map(|&t| interpolator.map(t) - session_start)
        .collect())
}

/// Remap an external stream onto session-relative acquisition-clock time.
pub fn remap_stream(stream: &ExternalStream, alignment: &SessionAlignment) -> Result<TimestampSeries> {
    let timestamps = remap_timestamps(&stream.trial_anchors, alignment, &stream.series.timestamps)?;
    TimestampSeries::new(ClockId::Acquisition, timestamps, stream.series.values.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::align_session;
    use approx::assert_relative_eq;
    use trialsync_core::config::AlignmentConfig;
    use trialsync_core::{EventCode, TrialRecord};

    #[test]
    fn test_midpoint() {
        let mapped = interpolate_stream(&[0.0, 10.0], &[100.0, 120.0], &[5.0]).unwrap();
        assert_relative_eq!(mapped[0], 110.0);
    }

    #[test]
    fn test_extrapolates_both_edges() {
        let mapped = interpolate_stream(&[0.0, 10.0], &[100.0, 120.0], &[-5.0, 15.0]).unwrap();
        assert_relative_eq!(mapped[0], 90.0);
        assert_relative_eq!(mapped[1], 130.0);
    }

    #[test]
    fn test_hits_anchors_exactly() {
        let native = [0.0, 10.0, 30.0];
        let acquisition = [100.0, 120.0, 130.0];
        let mapped = interpolate_stream(&native, &acquisition, &native).unwrap();
        assert_eq!(mapped, acquisition.to_vec());
    }

    #[test]
    fn test_piecewise_segments_and_edge_slopes() {
        // Slope 2 on the first segment, 0.5 on the second.
        let interpolator = StreamInterpolator::new(&[0.0, 10.0, 30.0], &[100.0, 120.0, 130.0]).unwrap();
        assert_relative_eq!(interpolator.map(20.0), 125.0);
        assert_relative_eq!(interpolator.map(-1.0), 98.0);
        assert_relative_eq!(interpolator.map(40.0), 135.0);
    }

    #[test]
    fn test_preserves_length_and_order() {
        let samples = [7.0, -3.0, 2.0, 2.0, 12.0];
        let mapped = interpolate_stream(&[0.0, 10.0], &[100.0, 120.0], &samples).unwrap();
        assert_eq!(mapped.len(), samples.len());
        assert_relative_eq!(mapped[0], 114.0);
        assert_relative_eq!(mapped[1], 94.0);
        assert_relative_eq!(mapped[4], 124.0);
    }

    #[test]
    fn test_nan_sample_maps_to_nan() {
        let mapped = interpolate_stream(&[0.0, 10.0], &[100.0, 120.0], &[f64::NAN, 1.0]).unwrap();
        assert!(mapped[0].is_nan());
        assert_relative_eq!(mapped[1], 102.0);
    }

    #[test]
    fn test_empty_samples() {
        let mapped = interpolate_stream(&[0.0, 10.0], &[100.0, 120.0], &[]).unwrap();
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_too_few_anchors() {
        assert!(matches!(
            interpolate_stream(&[0.0], &[100.0], &[1.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
        assert!(matches!(
            interpolate_stream(&[], &[], &[1.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
    }

    #[test]
    fn test_invalid_anchor_sets() {
        // Length mismatch.
        assert!(matches!(
            StreamInterpolator::new(&[0.0, 1.0, 2.0], &[0.0, 1.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
        // Native not strictly ascending.
        assert!(matches!(
            StreamInterpolator::new(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
        // Acquisition descending.
        assert!(matches!(
            StreamInterpolator::new(&[0.0, 1.0], &[5.0, 4.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
        // Non-finite.
        assert!(matches!(
            StreamInterpolator::new(&[0.0, f64::NAN], &[0.0, 1.0]),
            Err(Error::InvalidAnchorSet { .. })
        ));
    }

    #[test]
    fn test_error_names_offending_anchor() {
        let err = StreamInterpolator::new(&[0.0, 2.0, 1.0], &[0.0, 1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("at 2: 2 then 1"));
    }

    #[test]
    fn test_error_names_non_finite_anchor() {
        let err = StreamInterpolator::new(&[0.0, 1.0, 2.0], &[0.0, f64::INFINITY, 2.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidAnchorSet { .. }));
        assert!(err.to_string().contains("anchor 1 is not finite"));
    }

    fn aligned_session() -> SessionAlignment {
        let trials: Vec<TrialRecord> = [10.0, 20.0, 30.0, 40.0]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                // Trial 2 lost its start marker.
                let code = if i == 2 { 9 } else { 128 };
                TrialRecord::new(t, "reward", vec![t], vec![EventCode(code)])
            })
            .collect();
        align_session(&trials, 5.0, &AlignmentConfig::default())
    }

    #[test]
    fn test_anchor_pairs_skip_failed_and_missing() {
        let alignment = aligned_session();
        // Native clock runs 1000 s ahead; trial 3 has no native anchor.
        let (native, acquisition) = anchor_pairs(&[1010.0, 1020.0, 1030.0], &alignment);
        assert_eq!(native, vec![1010.0, 1020.0]);
        assert_eq!(acquisition, vec![10.0, 20.0]);
    }

    #[test]
    fn test_remap_stream_session_relative() {
        let alignment = aligned_session();
        let series = TimestampSeries::new(
            ClockId::Voltammetry,
            vec![1000.0, 1015.0, 1050.0],
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        let stream = ExternalStream::new(series, vec![1010.0, 1020.0, 1030.0, 1040.0]);

        let remapped = remap_stream(&stream, &alignment).unwrap();
        assert_eq!(remapped.clock, ClockId::Acquisition);
        assert_eq!(remapped.values, vec![0.1, 0.2, 0.3]);
        assert_relative_eq!(remapped.timestamps[0], -5.0);
        assert_relative_eq!(remapped.timestamps[1], 10.0);
        assert_relative_eq!(remapped.timestamps[2], 45.0);
    }

    #[test]
    fn test_remap_timestamps_matches_stream() {
        let alignment = aligned_session();
        let anchors = [1010.0, 1020.0, 1030.0, 1040.0];
        let samples = [1000.0, 1015.0, f64::NAN];

        let remapped = remap_timestamps(&anchors, &alignment, &samples).unwrap();
        assert_relative_eq!(remapped[0], -5.0);
        assert_relative_eq!(remapped[1], 10.0);
        assert!(remapped[2].is_nan());
    }

    #[test]
    fn test_remap_stream_needs_two_pairs() {
        let alignment = aligned_session();
        let series = TimestampSeries::new(ClockId::Voltammetry, vec![1000.0], vec![0.1]).unwrap();
        let stream = ExternalStream::new(series, vec![1010.0]);
        assert!(matches!(
            remap_stream(&stream, &alignment),
            Err(Error::InvalidAnchorSet { .. })
        ));
    }
}
