//! Continuous signal reconstruction from per-trial segments.
//!
//! Segments are cut around each trial start. Placing them back on the
//! session timeline leaves gaps between distant trials and overlaps between
//! close ones: gaps are filled with NaN samples, overlapping samples are
//! dropped in favour of the earlier segment.

use tracing::debug;
use trialsync_core::config::ContinuousConfig;
use trialsync_core::{ClockId, Error, Result, Seconds, TimestampSeries};

/// Rebuild one continuous series from trial segments.
///
/// Segment `i` starts at `trial_start_times[i] - time_offset` and is sampled
/// at `sampling_frequency`. The result's timestamps are strictly increasing.
pub fn reconstruct_continuous(
    segments: &[Vec<f64>],
    trial_start_times: &[Seconds],
    config: &ContinuousConfig,
) -> Result<TimestampSeries> {
    if segments.len() > trial_start_times.len() {
        return Err(Error::data(format!(
            "{} segments but only {} trial start times",
            segments.len(),
            trial_start_times.len()
        )));
    }

    let dt = 1.0 / config.sampling_frequency;
    let mut timestamps: Vec<Seconds> = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for (trial_index, (segment, &start)) in segments.iter().zip(trial_start_times).enumerate() {
        if segment.is_empty() {
            continue;
        }
        if !start.is_finite() {
            return Err(Error::data(format!("trial {trial_index}: start time {start} is not finite")));
        }
        let first = start - config.time_offset;
        let segment_time = |k: usize| first + k as f64 * dt;

        let Some(&last) = timestamps.last() else {
            timestamps.extend((0..segment.len()).map(segment_time));
            values.extend_from_slice(segment);
            continue;
        };

        let gap = first - last - dt;
        if gap > dt {
            let missing = (gap / dt).round() as usize;
            debug!(trial_index, missing, "filling gap before segment");
            timestamps.extend((1..=missing).map(|k| last + k as f64 * dt));
            values.extend(std::iter::repeat(f64::NAN).take(missing));
        }

        for (k, &value) in segment.iter().enumerate() {
            let t = segment_time(k);
            if t > last {
                timestamps.push(t);
                values.push(value);
            }
        }
    }

    if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
        return Err(Error::data(format!(
            "reconstructed timestamps not strictly increasing at sample {}: {} then {}",
            i + 1,
            timestamps[i],
            timestamps[i + 1]
        )));
    }

    TimestampSeries::new(ClockId::Acquisition, timestamps, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> ContinuousConfig {
        ContinuousConfig {
            sampling_frequency: 2.0,
            time_offset: 1.0,
        }
    }

    #[test]
    fn test_single_segment() {
        let series = reconstruct_continuous(&[vec![1.0, 2.0, 3.0]], &[11.0], &config()).unwrap();
        assert_eq!(series.timestamps, vec![10.0, 10.5, 11.0]);
        assert_eq!(series.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.clock, ClockId::Acquisition);
    }

    #[test]
    fn test_gap_filled_with_nan() {
        // First segment ends at 11.0, second starts at 13.0.
        let segments = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]];
        let series = reconstruct_continuous(&segments, &[11.0, 14.0], &config()).unwrap();

        assert_eq!(series.len(), 8);
        assert_relative_eq!(series.timestamps[3], 11.5);
        assert_relative_eq!(series.timestamps[5], 12.5);
        assert!(series.values[3..6].iter().all(|v| v.is_nan()));
        assert_relative_eq!(series.timestamps[6], 13.0);
        assert_eq!(series.values[6..], [4.0, 5.0]);
        assert!(series.is_monotonic());
    }

    #[test]
    fn test_adjacent_segments_no_gap() {
        let segments = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let series = reconstruct_continuous(&segments, &[11.0, 12.0], &config()).unwrap();
        assert_eq!(series.timestamps, vec![10.0, 10.5, 11.0, 11.5]);
        assert_eq!(series.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_overlap_clipped() {
        // Second segment starts at 10.5, inside the first one.
        let segments = vec![vec![1.0, 2.0, 3.0], vec![7.0, 8.0, 9.0, 10.0]];
        let series = reconstruct_continuous(&segments, &[11.0, 11.5], &config()).unwrap();
        assert_eq!(series.timestamps, vec![10.0, 10.5, 11.0, 11.5, 12.0]);
        assert_eq!(series.values, vec![1.0, 2.0, 3.0, 9.0, 10.0]);
    }

    #[test]
    fn test_empty_segments_skipped() {
        let segments = vec![vec![], vec![1.0]];
        let series = reconstruct_continuous(&segments, &[5.0, 11.0], &config()).unwrap();
        assert_eq!(series.timestamps, vec![10.0]);
    }

    #[test]
    fn test_more_segments_than_starts() {
        let segments = vec![vec![1.0], vec![2.0]];
        assert!(matches!(
            reconstruct_continuous(&segments, &[11.0], &config()),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_non_finite_start() {
        let segments = vec![vec![1.0]];
        assert!(matches!(
            reconstruct_continuous(&segments, &[f64::NAN], &config()),
            Err(Error::Data(_))
        ));
    }
}
