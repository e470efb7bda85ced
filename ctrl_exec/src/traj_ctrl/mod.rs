//! Trajectory control module
//!
//! Selects the setpoint the position controller follows each cycle. With no motion in progress
//! the rover holds a fixed pose. A motion target with a new id starts three quintic profiles,
//! one per axis, from the pose at the time the target is seen. Once the profiles finish the rover
//! holds the target pose.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod profile;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use profile::*;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pose to hold or move to.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PoseTarget {
    pub x_m: f64,
    pub y_m: f64,

    /// Units: radians
    pub heading_rad: f64
}

/// Target position, velocity and acceleration for a single axis.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AxisSetpoint {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64
}

/// The setpoint of all three axes for one cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Setpoint {
    pub x: AxisSetpoint,
    pub y: AxisSetpoint,
    pub heading: AxisSetpoint,

    /// True while a profile is being followed
    pub profile_active: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Invalid TrajCtrl parameter: {0}")]
    InvalidParam(String),

    #[error("Could not generate the profile: {0}")]
    ProfileError(#[from] ProfileError),

    #[error("Invalid motion target: {0}")]
    InvalidTarget(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseTarget {
    pub fn is_finite(&self) -> bool {
        self.x_m.is_finite() && self.y_m.is_finite() && self.heading_rad.is_finite()
    }
}

impl AxisSetpoint {
    /// A setpoint standing still at `position`.
    pub fn hold(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            acceleration: 0.0
        }
    }
}

impl From<&ProfileSample> for AxisSetpoint {
    fn from(s: &ProfileSample) -> Self {
        Self {
            position: s.position,
            velocity: s.velocity,
            acceleration: s.acceleration
        }
    }
}

impl Setpoint {
    /// A setpoint standing still at `target`.
    pub fn hold(target: &PoseTarget) -> Self {
        Self {
            x: AxisSetpoint::hold(target.x_m),
            y: AxisSetpoint::hold(target.y_m),
            heading: AxisSetpoint::hold(target.heading_rad),
            profile_active: false
        }
    }
}
