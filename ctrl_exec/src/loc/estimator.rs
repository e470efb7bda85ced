//! Estimators extracting a single axis from a localisation frame

use super::{LocError, LocFrame};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides one scalar estimate per cycle.
pub trait Estimator {
    /// Get the current estimate from the frame.
    fn update(&mut self, frame: &LocFrame) -> Result<Measurement, LocError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A scalar estimate and the time it was made at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,

    /// Seconds since rover startup
    pub time_s: f64
}

/// Estimates one quantity of one axis directly from the frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AxisEstimator {
    pub axis: Axis,
    pub quantity: Quantity
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The three controlled axes of the rover.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Heading
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Quantity {
    Position,
    Velocity
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AxisEstimator {
    pub fn position(axis: Axis) -> Self {
        Self { axis, quantity: Quantity::Position }
    }

    pub fn velocity(axis: Axis) -> Self {
        Self { axis, quantity: Quantity::Velocity }
    }
}

impl Estimator for AxisEstimator {
    fn update(&mut self, frame: &LocFrame) -> Result<Measurement, LocError> {
        let (value, time_s) = match self.quantity {
            Quantity::Position => (
                match self.axis {
                    Axis::X => frame.pose.position_m[0],
                    Axis::Y => frame.pose.position_m[1],
                    Axis::Heading => frame.pose.heading_rad
                },
                frame.pose_time_s()
            ),
            Quantity::Velocity => (
                match self.axis {
                    Axis::X => frame.velocity.linear_ms[0],
                    Axis::Y => frame.velocity.linear_ms[1],
                    Axis::Heading => frame.velocity.yaw_rate_rads
                },
                frame.velocity_time_s()
            )
        };

        if !value.is_finite() {
            return Err(LocError::NonFinite(match self.quantity {
                Quantity::Position => "pose",
                Quantity::Velocity => "velocity"
            }))
        }

        Ok(Measurement { value, time_s })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::{Pose, Velocity};
    use nalgebra::Vector2;

    fn frame() -> LocFrame {
        LocFrame {
            pose: Pose {
                timestamp_us: 2_000_000,
                position_m: Vector2::new(1.0, 2.0),
                heading_rad: 3.0
            },
            velocity: Velocity {
                timestamp_us: 1_500_000,
                linear_ms: Vector2::new(0.1, 0.2),
                yaw_rate_rads: 0.3
            }
        }
    }

    #[test]
    fn test_axis_estimators() {
        let f = frame();

        let m = AxisEstimator::position(Axis::Y).update(&f).unwrap();
        assert_eq!(m, Measurement { value: 2.0, time_s: 2.0 });

        let m = AxisEstimator::position(Axis::Heading).update(&f).unwrap();
        assert_eq!(m.value, 3.0);

        let m = AxisEstimator::velocity(Axis::X).update(&f).unwrap();
        assert_eq!(m, Measurement { value: 0.1, time_s: 1.5 });

        let m = AxisEstimator::velocity(Axis::Heading).update(&f).unwrap();
        assert_eq!(m.value, 0.3);
    }

    #[test]
    fn test_non_finite() {
        let mut f = frame();
        f.velocity.yaw_rate_rads = std::f64::INFINITY;

        assert!(AxisEstimator::velocity(Axis::Heading).update(&f).is_err());
        assert!(AxisEstimator::position(Axis::Heading).update(&f).is_ok());
    }
}
