//! General time utility functions

use chrono::{self, Utc};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Number of microseconds in a second
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a microsecond timestamp into seconds.
pub fn micros_to_seconds(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

/// The rover clock.
///
/// All timestamps exchanged on the bus are microseconds since the rover started up. The startup
/// epoch (microseconds since the Unix epoch) is published once by the rover and read by every
/// process which needs to timestamp data.
#[derive(Debug, Copy, Clone)]
pub struct RoverClock {
    startup_epoch_us: i64
}

impl RoverClock {
    /// Create a clock from the rover's startup epoch in microseconds since the Unix epoch.
    pub fn new(startup_epoch_us: i64) -> Self {
        Self { startup_epoch_us }
    }

    /// The startup epoch this clock counts from.
    pub fn startup_epoch_us(&self) -> i64 {
        self.startup_epoch_us
    }

    /// Microseconds elapsed since the rover started.
    ///
    /// Saturates at zero if the local clock is behind the rover's epoch.
    pub fn now_us(&self) -> u64 {
        let elapsed = Utc::now().timestamp_micros() - self.startup_epoch_us;
        if elapsed < 0 { 0 } else { elapsed as u64 }
    }
}
