//! Position control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::bus::records::{AxisGains, RoverParameters};
use serde::Deserialize;

// Internal
use super::PosCtrlError;
use crate::ctrl::{validate_feedforward, validate_gains};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for position control
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Initial gains of every axis, replaced at runtime by `rover_parameters`
    pub gains: RoverParameters,

    pub tolerances: Tolerances
}

/// How close to a held pose the rover must be to stop driving.
#[derive(Debug, Copy, Clone, Deserialize, PartialEq)]
pub struct Tolerances {
    /// Units: meters
    pub position_m: f64,

    /// Units: radians
    pub heading_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    pub fn validate(&self) -> Result<(), PosCtrlError> {
        validate_rover_parameters(&self.gains)?;

        for (name, tol) in [
            ("position_m", self.tolerances.position_m),
            ("heading_rad", self.tolerances.heading_rad)
        ].iter() {
            if !tol.is_finite() || *tol < 0.0 {
                return Err(PosCtrlError::InvalidParam(format!(
                    "tolerance {} must be finite and non-negative, found {}", name, tol
                )))
            }
        }

        Ok(())
    }
}

/// Check the gains of every axis.
pub fn validate_rover_parameters(gains: &RoverParameters) -> Result<(), PosCtrlError> {
    validate_axis("x", &gains.x)?;
    validate_axis("y", &gains.y)?;
    validate_axis("theta", &gains.theta)
}

fn validate_axis(name: &'static str, gains: &AxisGains) -> Result<(), PosCtrlError> {
    validate_gains(&gains.position)
        .and_then(|_| validate_gains(&gains.velocity))
        .and_then(|_| validate_feedforward(&gains.feedforward))
        .map_err(|e| PosCtrlError::CtrlError(name, e))
}
