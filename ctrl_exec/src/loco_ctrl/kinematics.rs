//! # Mecanum kinematics
//!
//! Wheels are numbered front-left, front-right, rear-left, rear-right. With `lx` half the track
//! width, `ly` half the wheel base and `r` the wheel radius, the wheel rates for a chassis demand
//! of `(x, y, z)` are
//!
//! ```text
//! w0 = (x - y - (lx + ly) z) / r
//! w1 = (x + y + (lx + ly) z) / r
//! w2 = (x + y - (lx + ly) z) / r
//! w3 = (x - y + (lx + ly) z) / r
//! ```
//!
//! where `x` is forwards, `y` is to the left and `z` is the yaw rate, counter clockwise positive.
//! The forward kinematics is the least squares solution of the same system, which is exact for
//! any set of wheel rates the inverse kinematics can produce.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3x4, Matrix4x3, Vector3, Vector4};

use super::{ChassisDemand, LocoCtrlError, Params, NUM_WHEELS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MecanumKinematics {
    /// Chassis velocity to wheel rates
    inverse: Matrix4x3<f64>,

    /// Pseudo-inverse of `inverse`
    forward: Matrix3x4<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MecanumKinematics {
    pub fn new(params: &Params) -> Result<Self, LocoCtrlError> {
        params.validate()?;

        let k = 1.0 / params.wheel_radius_m;
        let l = (params.track_width_m + params.wheel_base_m) / 2.0;

        let inverse = Matrix4x3::new(
            k, -k, -k * l,
            k,  k,  k * l,
            k,  k, -k * l,
            k, -k,  k * l
        );

        let forward = (inverse.transpose() * inverse)
            .try_inverse()
            .map(|jtj_inv| jtj_inv * inverse.transpose())
            .ok_or_else(|| LocoCtrlError::InvalidParam(
                "the kinematic constants give a singular wheel matrix".into()
            ))?;

        Ok(Self { inverse, forward })
    }

    /// Get the wheel rates (rad/s) in wheel order for a chassis demand.
    pub fn inverse(&self, demand: &ChassisDemand) -> [f64; NUM_WHEELS] {
        let w: Vector4<f64> = self.inverse
            * Vector3::new(demand.x_ms, demand.y_ms, demand.yaw_rads);

        [w[0], w[1], w[2], w[3]]
    }

    /// Get the chassis velocity which best matches the wheel rates (rad/s) given in wheel order.
    pub fn forward(&self, wheels_rads: &[f64; NUM_WHEELS]) -> ChassisDemand {
        let v = self.forward * Vector4::from_row_slice(wheels_rads);

        ChassisDemand {
            x_ms: v[0],
            y_ms: v[1],
            yaw_rads: v[2]
        }
    }
}

/// Convert an angular rate into revolutions per minute.
pub fn rads_to_rpm(rate_rads: f64) -> f64 {
    rate_rads * 60.0 / std::f64::consts::TAU
}
