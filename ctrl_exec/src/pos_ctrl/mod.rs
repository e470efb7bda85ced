//! Position control module
//!
//! Runs one [`PositionVelocitySystem`](crate::ctrl::PositionVelocitySystem) per axis against the
//! setpoint chosen by trajectory control and turns their outputs into a chassis velocity demand.
//! The X and Y outputs are world frame velocities, which are rotated into the chassis frame by the
//! measured heading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

use crate::{ctrl::CtrlError, loco_ctrl::ChassisDemand};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PosCtrlError {
    #[error("Invalid PosCtrl parameter: {0}")]
    InvalidParam(String),

    #[error("Controller error on the {0} axis: {1}")]
    CtrlError(&'static str, CtrlError),

    #[error("The controllers produced a non-finite demand: {0:?}")]
    NonFiniteOutput(ChassisDemand)
}
