//! Angle controller

use comms_if::bus::records::PidGains;
use util::maths::{norm_ang_delta, wrap_2pi};

use super::{CtrlError, FeedbackController, Pid};

/// Wraps a [`Pid`] so that it acts on the shortest signed angle between the reference and the
/// state.
///
/// Both angles are wrapped into `[0, 2pi)` and their difference is normalised into `(-pi, pi]`,
/// so a reference of 0.1 rad with a state of `2pi - 0.1` rad is an error of 0.2 rad rather than
/// almost a full turn.
#[derive(Debug, Clone)]
pub struct AngleController {
    pid: Pid
}

impl AngleController {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }

    /// The shortest signed angle from `state` to `reference`.
    pub fn error(reference: f64, state: f64) -> f64 {
        norm_ang_delta(wrap_2pi(reference) - wrap_2pi(state))
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

impl FeedbackController for AngleController {
    fn calculate(&mut self, reference: f64, state: f64, time_s: f64) -> f64 {
        // The inner controller sees the wrapped error against a zero state
        let error = Self::error(reference, state);
        self.pid.calculate(error, 0.0, time_s)
    }

    fn set_gains(&mut self, gains: &PidGains) -> Result<(), CtrlError> {
        self.pid.set_gains(gains)
    }

    fn reset(&mut self) {
        self.pid.reset()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;

    #[test]
    fn test_wrapped_error() {
        assert!((AngleController::error(0.1, TAU - 0.1) - 0.2).abs() < 1e-9);
        assert!((AngleController::error(TAU - 0.1, 0.1) + 0.2).abs() < 1e-9);
        assert!((AngleController::error(-0.1, 0.1) + 0.2).abs() < 1e-9);
        assert!((AngleController::error(3.0 * TAU + 0.5, 0.0) - 0.5).abs() < 1e-9);
        assert!(AngleController::error(std::f64::NAN, 0.0).is_nan());
    }

    #[test]
    fn test_calculate_uses_wrapped_error() {
        let mut c = AngleController::new(Pid::new(PidGains::new(1.0, 0.0, 0.0)).unwrap());

        let out = c.calculate(0.1, TAU - 0.1, 0.0);
        assert!((out - 0.2).abs() < 1e-9);
        assert!((c.pid().previous_error().unwrap() - 0.2).abs() < 1e-9);

        assert!(c.calculate(std::f64::NAN, 0.0, 1.0).is_nan());
    }
}
