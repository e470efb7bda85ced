//! Feedforward compensation

use comms_if::bus::records::FeedForwardGains;

/// Open loop mapping from the target velocity and acceleration to an output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedForward {
    gains: FeedForwardGains
}

impl FeedForward {
    pub fn new(gains: FeedForwardGains) -> Self {
        Self { gains }
    }

    /// Calculate the feedforward output.
    ///
    /// The target position is accepted so all controllers share one shape, it does not contribute
    /// to the output.
    pub fn calculate(&self, _position: f64, velocity: f64, acceleration: f64) -> f64 {
        velocity * self.gains.k_v + acceleration * self.gains.k_a
    }

    pub fn set_gains(&mut self, gains: FeedForwardGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> &FeedForwardGains {
        &self.gains
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_calculate() {
        let ff = FeedForward::new(FeedForwardGains { k_v: 0.012, k_a: 0.002 });

        assert_eq!(ff.calculate(100.0, 0.0, 0.0), 0.0);
        assert!((ff.calculate(0.0, 1.0, 2.0) - 0.016).abs() < 1e-12);
        assert!((ff.calculate(0.0, -0.5, 0.0) + 0.006).abs() < 1e-12);
    }
}
