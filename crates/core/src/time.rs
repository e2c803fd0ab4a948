//! Unix epoch and session-relative time helpers.

use crate::error::{Error, Result};
use crate::types::Seconds;
use chrono::{DateTime, Utc};

/// Convert float unix seconds to a UTC datetime.
pub fn unix_seconds_to_datetime(seconds: Seconds) -> Result<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(Error::data(format!("cannot convert {seconds} to a datetime")));
    }
    let mut whole = seconds.floor() as i64;
    let mut nanos = ((seconds - seconds.floor()) * 1e9).round() as u32;
    // Rounding up to a full second carries into the next one.
    if nanos >= 1_000_000_000 {
        whole += 1;
        nanos = 0;
    }
    DateTime::<Utc>::from_timestamp(whole, nanos)
        .ok_or_else(|| Error::data(format!("unix timestamp {seconds} is out of range")))
}

/// Convert a UTC datetime to float unix seconds.
pub fn datetime_to_unix_seconds(datetime: &DateTime<Utc>) -> Seconds {
    datetime.timestamp() as f64 + f64::from(datetime.timestamp_subsec_nanos()) * 1e-9
}

/// Express timestamps relative to `start`, or to the first timestamp when no
/// start is given. Fails if any timestamp precedes the reference.
pub fn relative_seconds(timestamps: &[Seconds], start: Option<Seconds>) -> Result<Vec<Seconds>> {
    let Some(reference) = start.or_else(|| timestamps.first().copied()) else {
        return Ok(Vec::new());
    };
    let relative: Vec<Seconds> = timestamps.iter().map(|ts| ts - reference).collect();
    if let Some(position) = relative.iter().position(|r| *r < 0.0) {
        return Err(Error::data(format!(
            "timestamp {} at position {} precedes reference start {}",
            timestamps[position], position, reference
        )));
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_subsecond_rounding_carries() {
        let dt = unix_seconds_to_datetime(1.999_999_999_9).unwrap();
        assert_eq!(dt.timestamp(), 2);
        assert_eq!(dt.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_unix_round_trip_subsecond() {
        let dt = unix_seconds_to_datetime(1_727_366_400.25).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 9, 26, 16, 0, 0).unwrap() + chrono::Duration::milliseconds(250));
        assert_relative_eq!(datetime_to_unix_seconds(&dt), 1_727_366_400.25, epsilon = 1e-6);
    }

    #[test]
    fn test_unix_rejects_nan() {
        assert!(unix_seconds_to_datetime(f64::NAN).is_err());
    }

    #[test]
    fn test_relative_to_first() {
        let relative = relative_seconds(&[10.0, 12.5, 20.0], None).unwrap();
        assert_eq!(relative, vec![0.0, 2.5, 10.0]);
    }

    #[test]
    fn test_relative_to_start() {
        let relative = relative_seconds(&[10.0, 12.5], Some(4.0)).unwrap();
        assert_eq!(relative, vec![6.0, 8.5]);
    }

    #[test]
    fn test_relative_negative_fails() {
        assert!(matches!(relative_seconds(&[3.0, 10.0], Some(4.0)), Err(Error::Data(_))));
    }

    #[test]
    fn test_relative_empty() {
        assert!(relative_seconds(&[], None).unwrap().is_empty());
    }
}
