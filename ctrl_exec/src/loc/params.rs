//! Localisation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::LocError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for reading the localisation estimates off the bus.
#[derive(Debug, Clone, Deserialize)]
pub struct LocParams {
    /// Sign applied to the X position and velocity, either `1.0` or `-1.0`.
    pub x_sign: f64,

    /// Sign applied to the Y position and velocity, either `1.0` or `-1.0`.
    pub y_sign: f64,

    /// Sign applied to the heading and yaw rate, either `1.0` or `-1.0`.
    pub heading_sign: f64,

    /// Frame the linear velocity estimate is given in.
    pub velocity_frame: VelocityFrame
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum VelocityFrame {
    /// Velocity is given along the world axes
    World,

    /// Velocity is given along the rover's forward and left axes
    Chassis
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocParams {
    pub fn validate(&self) -> Result<(), LocError> {
        for (name, sign) in [
            ("x_sign", self.x_sign),
            ("y_sign", self.y_sign),
            ("heading_sign", self.heading_sign)
        ].iter() {
            if *sign != 1.0 && *sign != -1.0 {
                return Err(LocError::InvalidParam(format!(
                    "{} must be 1.0 or -1.0, found {}", name, sign
                )))
            }
        }

        Ok(())
    }
}

impl Default for LocParams {
    fn default() -> Self {
        Self {
            x_sign: 1.0,
            y_sign: 1.0,
            heading_sign: 1.0,
            velocity_frame: VelocityFrame::World
        }
    }
}
