//! Time and duration conversion utilities.
//!
//! Playback positions travel through the engine as `f64` seconds, the unit
//! media players report them in. These helpers convert to and from
//! [`Duration`] with explicit saturation instead of panicking.

use std::time::Duration;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Convert duration to milliseconds as i64, saturating at `i64::MAX`.
    ///
    /// Useful for database storage.
    fn as_millis_i64(&self) -> i64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_millis_i64(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Convert seconds to a [`Duration`].
///
/// Negative and NaN inputs become zero, overly large ones saturate at
/// [`Duration::MAX`].
#[must_use]
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Convert D-Bus style microseconds to seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}
