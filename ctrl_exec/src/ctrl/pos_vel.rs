//! Cascaded position and velocity control of a single axis

use comms_if::bus::records::AxisGains;

use crate::loc::{Estimator, LocFrame};
use super::{CtrlError, FeedForward, FeedbackController, Pid};

/// Combines position feedback, velocity feedback and feedforward into one output for an axis.
///
/// The position feedback controller is generic so that the heading axis can use an
/// [`super::AngleController`].
#[derive(Debug, Clone)]
pub struct PositionVelocitySystem<P, E> {
    position_estimator: E,
    velocity_estimator: E,
    feedforward: FeedForward,
    position_feedback: P,
    velocity_feedback: Pid,

    last_output: Option<AxisOutput>
}

/// Breakdown of the most recent output of a [`PositionVelocitySystem`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AxisOutput {
    pub position: f64,
    pub velocity: f64,
    pub position_feedback: f64,
    pub velocity_feedback: f64,
    pub feedforward: f64
}

impl<P, E> PositionVelocitySystem<P, E>
where
    P: FeedbackController,
    E: Estimator
{
    pub fn new(
        position_estimator: E,
        velocity_estimator: E,
        feedforward: FeedForward,
        position_feedback: P,
        velocity_feedback: Pid
    ) -> Self {
        Self {
            position_estimator,
            velocity_estimator,
            feedforward,
            position_feedback,
            velocity_feedback,
            last_output: None
        }
    }

    /// Calculate the output for the given targets.
    ///
    /// Both estimates are taken before any controller is run, so an estimator error leaves every
    /// controller untouched.
    pub fn update(
        &mut self,
        frame: &LocFrame,
        target_position: f64,
        target_velocity: f64,
        target_acceleration: f64
    ) -> Result<f64, CtrlError> {
        let position = self.position_estimator.update(frame)?;
        let velocity = self.velocity_estimator.update(frame)?;

        let fb_p = self.position_feedback.calculate(
            target_position, position.value, position.time_s
        );
        let fb_v = self.velocity_feedback.calculate(
            target_velocity, velocity.value, velocity.time_s
        );
        let ff = self.feedforward.calculate(
            target_position, target_velocity, target_acceleration
        );

        self.last_output = Some(AxisOutput {
            position: position.value,
            velocity: velocity.value,
            position_feedback: fb_p,
            velocity_feedback: fb_v,
            feedforward: ff
        });

        Ok(fb_p + fb_v + ff)
    }

    /// Replace the gains of all three controllers.
    ///
    /// All gains are checked before any is applied.
    pub fn set_gains(&mut self, gains: &AxisGains) -> Result<(), CtrlError> {
        super::validate_gains(&gains.position)?;
        super::validate_gains(&gains.velocity)?;
        super::validate_feedforward(&gains.feedforward)?;

        self.position_feedback.set_gains(&gains.position)?;
        self.velocity_feedback.set_gains(&gains.velocity)?;
        self.feedforward.set_gains(gains.feedforward);

        Ok(())
    }

    pub fn reset(&mut self) {
        self.position_feedback.reset();
        self.velocity_feedback.reset();
        self.last_output = None;
    }

    pub fn last_output(&self) -> Option<AxisOutput> {
        self.last_output
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::{Axis, AxisEstimator, LocError, Measurement, Pose, Velocity};
    use comms_if::bus::records::{FeedForwardGains, PidGains};
    use nalgebra::Vector2;

    fn frame(t_us: u64, x: f64, vx: f64) -> LocFrame {
        LocFrame {
            pose: Pose {
                timestamp_us: t_us,
                position_m: Vector2::new(x, 0.0),
                heading_rad: 0.0
            },
            velocity: Velocity {
                timestamp_us: t_us,
                linear_ms: Vector2::new(vx, 0.0),
                yaw_rate_rads: 0.0
            }
        }
    }

    fn x_system() -> PositionVelocitySystem<Pid, AxisEstimator> {
        PositionVelocitySystem::new(
            AxisEstimator::position(Axis::X),
            AxisEstimator::velocity(Axis::X),
            FeedForward::new(FeedForwardGains { k_v: 0.5, k_a: 0.1 }),
            Pid::new(PidGains::new(1.0, 0.0, 0.0)).unwrap(),
            Pid::new(PidGains::new(2.0, 0.0, 0.0)).unwrap()
        )
    }

    #[test]
    fn test_update_sums_terms() {
        let mut sys = x_system();

        // Position error 0.5, velocity error 0.2, feedforward 0.5*0.3 + 0.1*1.0
        let out = sys.update(&frame(0, 0.5, 0.1), 1.0, 0.3, 1.0).unwrap();
        assert!((out - (0.5 + 0.4 + 0.25)).abs() < 1e-12);

        let parts = sys.last_output().unwrap();
        assert!((parts.position_feedback - 0.5).abs() < 1e-12);
        assert!((parts.velocity_feedback - 0.4).abs() < 1e-12);
        assert!((parts.feedforward - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_estimator_failure_leaves_state() {
        struct Failing;
        impl Estimator for Failing {
            fn update(&mut self, _: &LocFrame) -> Result<Measurement, LocError> {
                Err(LocError::NoEstimate("pose"))
            }
        }

        let mut sys = PositionVelocitySystem::new(
            Failing,
            Failing,
            FeedForward::new(FeedForwardGains { k_v: 0.0, k_a: 0.0 }),
            Pid::new(PidGains::new(1.0, 1.0, 0.0)).unwrap(),
            Pid::new(PidGains::new(1.0, 1.0, 0.0)).unwrap()
        );

        assert!(matches!(
            sys.update(&frame(0, 0.0, 0.0), 1.0, 0.0, 0.0),
            Err(CtrlError::EstimatorError(_))
        ));
        assert!(sys.last_output().is_none());
    }

    #[test]
    fn test_set_gains_atomic() {
        let mut sys = x_system();

        let mut gains = AxisGains {
            position: PidGains::new(3.0, 0.0, 0.0),
            velocity: PidGains::new(std::f64::NAN, 0.0, 0.0),
            feedforward: FeedForwardGains { k_v: 0.0, k_a: 0.0 }
        };

        // Bad velocity gains mean the position gains aren't applied either
        assert!(sys.set_gains(&gains).is_err());
        let out = sys.update(&frame(0, 0.0, 0.0), 1.0, 0.0, 0.0).unwrap();
        assert!((out - 1.0).abs() < 1e-12);

        gains.velocity = PidGains::new(0.0, 0.0, 0.0);
        sys.set_gains(&gains).unwrap();
        let out = sys.update(&frame(1, 0.0, 0.0), 1.0, 0.0, 0.0).unwrap();
        assert!((out - 3.0).abs() < 1e-12);
    }
}
