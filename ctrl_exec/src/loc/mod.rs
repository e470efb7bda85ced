//! # Localisation module
//!
//! The rover's pose and velocity are estimated by an external localisation system and published
//! on the bus. This module reads those estimates once per cycle, checks them, applies the axis
//! sign conventions, and presents them as a [`LocFrame`] to the controllers.
//!
//! A frame is rejected if either record is missing or undecodable, contains non-finite values, has
//! a degenerate attitude quaternion, or has a timestamp older than the previous accepted frame. A
//! timestamp equal to the previous one is a stale estimate, which is accepted.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod estimator;
mod params;

pub use estimator::*;
pub use params::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::bus::{
    self,
    Bus,
    BusError,
    records::{PoseRecord, PoseVelocityRecord}
};
use log::trace;
use nalgebra::{Quaternion, Rotation2, UnitQuaternion, Vector2};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Quaternions with a norm below this value cannot be normalised.
const MIN_QUATERNION_NORM: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose of the rover in the world frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    /// Time of the estimate in microseconds since rover startup
    pub timestamp_us: u64,

    /// Position in the world frame
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Heading, the angle from the world X axis to the rover's forward axis, counter clockwise
    /// positive
    ///
    /// Units: radians
    pub heading_rad: f64
}

/// The velocity of the rover in the world frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Velocity {
    pub timestamp_us: u64,

    /// Units: meters/second
    pub linear_ms: Vector2<f64>,

    /// Units: radians/second
    pub yaw_rate_rads: f64
}

/// A checked pair of pose and velocity estimates for one cycle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocFrame {
    pub pose: Pose,
    pub velocity: Velocity
}

/// Reads the localisation estimates from the bus.
#[derive(Debug, Clone)]
pub struct LocMgr {
    params: LocParams,

    /// Timestamps of the last accepted pose and velocity
    last_timestamps: Option<(u64, u64)>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Invalid localisation parameter: {0}")]
    InvalidParam(String),

    #[error("Could not read {0} from the bus: {1}")]
    BusError(&'static str, BusError),

    #[error("No {0} estimate is available")]
    NoEstimate(&'static str),

    #[error("The {0} estimate has {1} elements, expected {2}")]
    InvalidDimension(&'static str, usize, &'static str),

    #[error("The {0} estimate contains non-finite values")]
    NonFinite(&'static str),

    #[error("The attitude quaternion cannot be normalised")]
    DegenerateQuaternion,

    #[error("The {0} timestamp went backwards from {1} us to {2} us")]
    TimestampBackwards(&'static str, u64, u64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocFrame {
    /// Time of the pose estimate in seconds since rover startup.
    pub fn pose_time_s(&self) -> f64 {
        util::time::micros_to_seconds(self.pose.timestamp_us)
    }

    /// Time of the velocity estimate in seconds since rover startup.
    pub fn velocity_time_s(&self) -> f64 {
        util::time::micros_to_seconds(self.velocity.timestamp_us)
    }
}

impl LocError {
    /// True if the error is caused by the bus connection rather than the estimates themselves.
    pub fn is_transient(&self) -> bool {
        match self {
            LocError::BusError(_, e) => e.is_transient(),
            _ => false
        }
    }
}

impl LocMgr {
    pub fn new(params: LocParams) -> Result<Self, LocError> {
        params.validate()?;

        Ok(Self {
            params,
            last_timestamps: None
        })
    }

    /// Read the latest frame from the bus.
    pub fn read<B: Bus>(&mut self, bus: &mut B) -> Result<LocFrame, LocError> {
        let pose: PoseRecord = bus.get_record(bus::KEY_POSE)
            .map_err(|e| LocError::BusError("pose", e))?
            .ok_or(LocError::NoEstimate("pose"))?;
        let velocity: PoseVelocityRecord = bus.get_record(bus::KEY_POSE_VELOCITY)
            .map_err(|e| LocError::BusError("velocity", e))?
            .ok_or(LocError::NoEstimate("velocity"))?;

        self.accept(&pose, &velocity)
    }

    /// Check a pair of records and build the frame from them.
    ///
    /// The frame's timestamps are only remembered if both records are valid.
    pub fn accept(
        &mut self,
        pose: &PoseRecord,
        velocity: &PoseVelocityRecord
    ) -> Result<LocFrame, LocError> {

        if let Some((last_pose_us, last_vel_us)) = self.last_timestamps {
            if pose.timestamp < last_pose_us {
                return Err(LocError::TimestampBackwards("pose", last_pose_us, pose.timestamp))
            }
            if velocity.timestamp < last_vel_us {
                return Err(LocError::TimestampBackwards(
                    "velocity", last_vel_us, velocity.timestamp
                ))
            }
        }

        // ---- POSE ----

        let position = planar(&pose.pos, "pose")?;

        if pose.rot.iter().any(|v| !v.is_finite()) {
            return Err(LocError::NonFinite("attitude"))
        }
        let q = Quaternion::new(pose.rot[0], pose.rot[1], pose.rot[2], pose.rot[3]);
        if q.norm() < MIN_QUATERNION_NORM {
            return Err(LocError::DegenerateQuaternion)
        }
        let raw_heading_rad = UnitQuaternion::from_quaternion(q).euler_angles().2;

        // ---- VELOCITY ----

        let mut linear_ms = planar(&velocity.pos, "velocity")?;

        let yaw_rate_rads = match velocity.theta.len() {
            1 | 3 => velocity.theta[velocity.theta.len() - 1],
            n => return Err(LocError::InvalidDimension("angular velocity", n, "1 or 3"))
        };
        if velocity.theta.iter().any(|v| !v.is_finite()) {
            return Err(LocError::NonFinite("angular velocity"))
        }

        if self.params.velocity_frame == VelocityFrame::Chassis {
            linear_ms = Rotation2::new(raw_heading_rad) * linear_ms;
        }

        // ---- CONVENTIONS ----

        let signs = Vector2::new(self.params.x_sign, self.params.y_sign);

        let frame = LocFrame {
            pose: Pose {
                timestamp_us: pose.timestamp,
                position_m: position.component_mul(&signs),
                heading_rad: raw_heading_rad * self.params.heading_sign
            },
            velocity: Velocity {
                timestamp_us: velocity.timestamp,
                linear_ms: linear_ms.component_mul(&signs),
                yaw_rate_rads: yaw_rate_rads * self.params.heading_sign
            }
        };

        trace!("Localisation frame: {:?}", frame);

        self.last_timestamps = Some((pose.timestamp, velocity.timestamp));

        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the X and Y components of a 2 or 3 element vector, rejecting non-finite values.
fn planar(v: &[f64], name: &'static str) -> Result<Vector2<f64>, LocError> {
    if v.len() != 2 && v.len() != 3 {
        return Err(LocError::InvalidDimension(name, v.len(), "2 or 3"))
    }
    if v.iter().any(|e| !e.is_finite()) {
        return Err(LocError::NonFinite(name))
    }

    Ok(Vector2::new(v[0], v[1]))
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::bus::MemBus;

    const FRAC_PI_2: f64 = std::f64::consts::FRAC_PI_2;

    fn pose(timestamp: u64, x: f64, y: f64, heading: f64) -> PoseRecord {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, heading);
        PoseRecord {
            timestamp,
            pos: vec![x, y, 0.0],
            rot: [q.w, q.i, q.j, q.k]
        }
    }

    fn velocity(timestamp: u64, vx: f64, vy: f64, yaw_rate: f64) -> PoseVelocityRecord {
        PoseVelocityRecord {
            timestamp,
            pos: vec![vx, vy],
            theta: vec![0.0, 0.0, yaw_rate]
        }
    }

    #[test]
    fn test_accept() {
        let mut mgr = LocMgr::new(LocParams::default()).unwrap();

        let frame = mgr.accept(&pose(100, 1.0, 2.0, 0.5), &velocity(90, 0.1, 0.2, 0.3)).unwrap();
        assert_eq!(frame.pose.timestamp_us, 100);
        assert_eq!(frame.pose.position_m, Vector2::new(1.0, 2.0));
        assert!((frame.pose.heading_rad - 0.5).abs() < 1e-9);
        assert_eq!(frame.velocity.linear_ms, Vector2::new(0.1, 0.2));
        assert_eq!(frame.velocity.yaw_rate_rads, 0.3);
        assert!((frame.pose_time_s() - 100e-6).abs() < 1e-15);

        // Single element angular velocity is the yaw rate
        let mut v = velocity(91, 0.0, 0.0, 0.0);
        v.theta = vec![0.7];
        assert_eq!(mgr.accept(&pose(100, 1.0, 2.0, 0.5), &v).unwrap().velocity.yaw_rate_rads, 0.7);
    }

    #[test]
    fn test_axis_signs() {
        let mut mgr = LocMgr::new(LocParams {
            x_sign: -1.0,
            y_sign: -1.0,
            ..Default::default()
        }).unwrap();

        let frame = mgr.accept(&pose(1, 1.0, 2.0, 0.5), &velocity(1, 0.1, 0.2, 0.3)).unwrap();
        assert_eq!(frame.pose.position_m, Vector2::new(-1.0, -2.0));
        assert_eq!(frame.velocity.linear_ms, Vector2::new(-0.1, -0.2));
        assert!((frame.pose.heading_rad - 0.5).abs() < 1e-9);

        assert!(LocMgr::new(LocParams { heading_sign: 0.5, ..Default::default() }).is_err());
    }

    #[test]
    fn test_chassis_velocity_frame() {
        let mut mgr = LocMgr::new(LocParams {
            velocity_frame: VelocityFrame::Chassis,
            ..Default::default()
        }).unwrap();

        // Driving forwards while facing +Y is moving along world +Y
        let frame = mgr.accept(&pose(1, 0.0, 0.0, FRAC_PI_2), &velocity(1, 1.0, 0.0, 0.0))
            .unwrap();
        assert!(frame.velocity.linear_ms[0].abs() < 1e-9);
        assert!((frame.velocity.linear_ms[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_records() {
        let mut mgr = LocMgr::new(LocParams::default()).unwrap();
        let v = velocity(1, 0.0, 0.0, 0.0);

        let mut p = pose(1, 0.0, 0.0, 0.0);
        p.pos[1] = std::f64::NAN;
        assert!(matches!(mgr.accept(&p, &v), Err(LocError::NonFinite("pose"))));

        let mut p = pose(1, 0.0, 0.0, 0.0);
        p.rot = [0.0; 4];
        assert!(matches!(mgr.accept(&p, &v), Err(LocError::DegenerateQuaternion)));

        let mut p = pose(1, 0.0, 0.0, 0.0);
        p.pos = vec![1.0];
        assert!(matches!(mgr.accept(&p, &v), Err(LocError::InvalidDimension(..))));

        let mut bad_v = v.clone();
        bad_v.theta = vec![0.0, 0.0];
        assert!(mgr.accept(&pose(1, 0.0, 0.0, 0.0), &bad_v).is_err());
    }

    #[test]
    fn test_timestamps() {
        let mut mgr = LocMgr::new(LocParams::default()).unwrap();

        mgr.accept(&pose(100, 0.0, 0.0, 0.0), &velocity(100, 0.0, 0.0, 0.0)).unwrap();

        // Stale is fine
        mgr.accept(&pose(100, 0.0, 0.0, 0.0), &velocity(100, 0.0, 0.0, 0.0)).unwrap();

        // Backwards is not
        assert!(matches!(
            mgr.accept(&pose(99, 0.0, 0.0, 0.0), &velocity(100, 0.0, 0.0, 0.0)),
            Err(LocError::TimestampBackwards("pose", 100, 99))
        ));

        // A rejected frame doesn't move the reference forward
        let mut bad = pose(200, 0.0, 0.0, 0.0);
        bad.rot = [0.0; 4];
        assert!(mgr.accept(&bad, &velocity(200, 0.0, 0.0, 0.0)).is_err());
        mgr.accept(&pose(150, 0.0, 0.0, 0.0), &velocity(150, 0.0, 0.0, 0.0)).unwrap();
    }

    #[test]
    fn test_read_from_bus() {
        let mut mgr = LocMgr::new(LocParams::default()).unwrap();
        let mut bus = MemBus::new();

        assert!(matches!(mgr.read(&mut bus), Err(LocError::NoEstimate("pose"))));

        bus.set_and_publish(bus::KEY_POSE, &pose(5, 1.0, 0.0, 0.0)).unwrap();
        assert!(matches!(mgr.read(&mut bus), Err(LocError::NoEstimate("velocity"))));

        bus.set_and_publish(bus::KEY_POSE_VELOCITY, &velocity(5, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(mgr.read(&mut bus).unwrap().pose.position_m, Vector2::new(1.0, 0.0));

        // Undecodable records are not transient
        bus.set(bus::KEY_POSE, b"{\"timestamp\": 6}").unwrap();
        let err = mgr.read(&mut bus).unwrap_err();
        assert!(!err.is_transient());

        bus.set_offline(true);
        assert!(mgr.read(&mut bus).unwrap_err().is_transient());
    }
}
