//! Locomotion control module
//!
//! Converts a chassis velocity demand into integer RPM demands for the four mecanum wheels, in
//! motor channel order.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod kinematics;
mod params;
mod state;
mod wheel_map;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use kinematics::*;
pub use params::*;
pub use state::*;
pub use wheel_map::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of wheels on the rover.
pub const NUM_WHEELS: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A velocity demand in the chassis frame.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ChassisDemand {
    /// Forwards velocity
    ///
    /// Units: meters/second
    pub x_ms: f64,

    /// Leftwards velocity
    ///
    /// Units: meters/second
    pub y_ms: f64,

    /// Yaw rate, counter clockwise positive
    ///
    /// Units: radians/second
    pub yaw_rads: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LocoCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum LocoCtrlError {
    #[error("Invalid LocoCtrl parameter: {0}")]
    InvalidParam(String),

    #[error("The wheel map {0:?} is not a permutation of 0..4")]
    InvalidWheelMap([usize; NUM_WHEELS]),

    #[error("Received a non-finite chassis demand: {0:?}")]
    NonFiniteDemand(ChassisDemand),

    #[error("Channel {0} demand of {1:.1} RPM exceeds the limit of {2:.1} RPM")]
    OverSpeed(usize, f64, f64)
}

impl ChassisDemand {
    pub fn is_finite(&self) -> bool {
        self.x_ms.is_finite() && self.y_ms.is_finite() && self.yaw_rads.is_finite()
    }
}
