//! # Bus records
//!
//! Records exchanged over the bus. All timestamps are microseconds since the rover started up
//! unless stated otherwise.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pose of the rover as estimated by the localisation system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// Time the pose was estimated at.
    pub timestamp: u64,

    /// Position in the world frame, 2 or 3 elements (m).
    pub pos: Vec<f64>,

    /// Attitude quaternion in `[w, x, y, z]` order.
    pub rot: [f64; 4]
}

/// Velocity of the rover as estimated by the localisation system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseVelocityRecord {
    pub timestamp: u64,

    /// Linear velocity, 2 or 3 elements (m/s).
    pub pos: Vec<f64>,

    /// Angular velocity, 1 or 3 elements, the last of which is the yaw rate (rad/s).
    pub theta: Vec<f64>
}

/// Wheel speed demands sent to the motor drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelVelocityCommand {
    pub timestamp: u64,

    /// Wheel speeds in RPM in motor channel order.
    pub velocity: [i32; 4]
}

/// A point to point motion request.
///
/// The timestamp identifies the target, a motion is only started when a target with a new
/// timestamp is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionTarget {
    pub timestamp: u64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub duration_s: f64
}

/// Gains for the position controller of all three axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoverParameters {
    pub x: AxisGains,
    pub y: AxisGains,
    pub theta: AxisGains
}

/// Gains for a single axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisGains {
    /// Position feedback loop
    pub position: PidGains,

    /// Velocity feedback loop
    pub velocity: PidGains,

    pub feedforward: FeedForwardGains
}

/// PID gains and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,

    /// Gain of the derivative low pass filter in `[0, 1]`, zero disables filtering.
    #[serde(default)]
    pub low_pass_gain: f64,

    /// Integration is skipped while the derivative magnitude is above this value. `None` never
    /// skips.
    #[serde(default)]
    pub stability_threshold: Option<f64>,

    /// Maximum magnitude of the integral sum. `None` is unbounded.
    #[serde(default)]
    pub max_integral_sum: Option<f64>
}

/// Feedforward gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardGains {
    /// Velocity gain
    pub k_v: f64,

    /// Acceleration gain
    pub k_a: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WheelVelocityCommand {
    /// The all-zero stop command.
    pub fn stop(timestamp: u64) -> Self {
        Self {
            timestamp,
            velocity: [0; 4]
        }
    }

    /// Returns true if every wheel is commanded to stop.
    pub fn is_stop(&self) -> bool {
        self.velocity.iter().all(|v| *v == 0)
    }
}

impl PidGains {
    /// Gains with no limits and no derivative filtering.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            low_pass_gain: 0.0,
            stability_threshold: None,
            max_integral_sum: None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pose_from_json() {
        let pose: PoseRecord = serde_json::from_str(
            r#"{"timestamp": 1500, "pos": [0.5, -0.25], "rot": [1.0, 0.0, 0.0, 0.0]}"#
        ).unwrap();

        assert_eq!(pose.timestamp, 1500);
        assert_eq!(pose.pos, vec![0.5, -0.25]);
        assert_eq!(pose.rot[0], 1.0);
    }

    #[test]
    fn test_non_finite_pose_rejected() {
        // serde_json writes NaN as null, which must not decode as a number
        let pose = PoseRecord {
            timestamp: 10,
            pos: vec![std::f64::NAN, 0.0],
            rot: [1.0, 0.0, 0.0, 0.0]
        };
        let payload = serde_json::to_vec(&pose).unwrap();

        assert!(serde_json::from_slice::<PoseRecord>(&payload).is_err());
    }

    #[test]
    fn test_pid_gains_defaults() {
        let gains: PidGains = serde_json::from_str(
            r#"{"k_p": 0.25, "k_i": 0.01, "k_d": 0.01}"#
        ).unwrap();

        assert_eq!(gains, PidGains::new(0.25, 0.01, 0.01));
    }
}
