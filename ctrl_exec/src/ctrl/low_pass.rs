//! Exponential low pass filter

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// First order exponential smoothing filter.
///
/// The higher the gain the more weight is given to the previous estimate, and so the more the
/// output lags the input. A gain of zero passes the input straight through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    gain: f64,
    previous_estimate: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LowPassFilter {
    /// Create a new filter. The gain is clamped into `[0, 1]`.
    pub fn new(gain: f64) -> Self {
        Self {
            gain: clamp_gain(gain),
            previous_estimate: 0.0
        }
    }

    /// Filter a new measurement, returning the new estimate.
    pub fn estimate(&mut self, measurement: f64) -> f64 {
        let estimate = self.gain * self.previous_estimate + (1.0 - self.gain) * measurement;
        self.previous_estimate = estimate;
        estimate
    }

    /// Change the gain, keeping the current estimate.
    pub fn set_gain(&mut self, gain: f64) {
        self.gain = clamp_gain(gain);
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// The most recent estimate.
    pub fn previous_estimate(&self) -> f64 {
        self.previous_estimate
    }

    pub fn reset(&mut self) {
        self.previous_estimate = 0.0;
    }
}

fn clamp_gain(gain: f64) -> f64 {
    // NaN gains become zero rather than poisoning every estimate
    if gain.is_nan() {
        0.0
    }
    else {
        util::maths::clamp(&gain, &0.0, &1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pass_through() {
        let mut f = LowPassFilter::new(0.0);
        assert_eq!(f.estimate(3.0), 3.0);
        assert_eq!(f.estimate(-1.0), -1.0);
    }

    #[test]
    fn test_smoothing() {
        let mut f = LowPassFilter::new(0.5);
        assert_eq!(f.estimate(1.0), 0.5);
        assert_eq!(f.estimate(1.0), 0.75);
        assert_eq!(f.previous_estimate(), 0.75);

        f.reset();
        assert_eq!(f.estimate(2.0), 1.0);
    }

    #[test]
    fn test_gain_clamped() {
        assert_eq!(LowPassFilter::new(1.5).gain(), 1.0);
        assert_eq!(LowPassFilter::new(-0.5).gain(), 0.0);
        assert_eq!(LowPassFilter::new(std::f64::NAN).gain(), 0.0);

        // Full gain holds the initial estimate forever
        let mut f = LowPassFilter::new(1.0);
        assert_eq!(f.estimate(10.0), 0.0);
    }
}
