//! # Control module
//!
//! Building blocks for the position controller: a low pass filter, feedforward, a PID controller,
//! an angle wrapping wrapper around the PID, and the cascaded position/velocity system which
//! combines them for a single axis.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod angle;
mod feedforward;
mod low_pass;
mod pid;
mod pos_vel;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use angle::*;
pub use feedforward::*;
pub use low_pass::*;
pub use pid::*;
pub use pos_vel::*;

use comms_if::bus::records::{FeedForwardGains, PidGains};

use crate::loc::LocError;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A closed loop controller acting on the difference between a reference and a state.
pub trait FeedbackController {
    /// Calculate the controller output for a state measured at `time_s` seconds.
    ///
    /// Non-finite inputs give a NaN output and leave the controller state untouched.
    fn calculate(&mut self, reference: f64, state: f64, time_s: f64) -> f64;

    /// Replace the gains, keeping the accumulated state.
    fn set_gains(&mut self, gains: &PidGains) -> Result<(), CtrlError>;

    /// Clear the accumulated state.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CtrlError {
    #[error("Invalid gain {0} = {1}")]
    InvalidGain(&'static str, f64),

    #[error("Could not get an estimate: {0}")]
    EstimatorError(#[from] LocError)
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check that a set of PID gains is usable.
pub fn validate_gains(gains: &PidGains) -> Result<(), CtrlError> {
    for (name, value) in [
        ("k_p", gains.k_p),
        ("k_i", gains.k_i),
        ("k_d", gains.k_d)
    ].iter() {
        if !value.is_finite() {
            return Err(CtrlError::InvalidGain(*name, *value))
        }
    }

    if !(0.0..=1.0).contains(&gains.low_pass_gain) {
        return Err(CtrlError::InvalidGain("low_pass_gain", gains.low_pass_gain))
    }

    // Limits may be infinite but never negative or NaN
    if let Some(t) = gains.stability_threshold {
        if t.is_nan() || t < 0.0 {
            return Err(CtrlError::InvalidGain("stability_threshold", t))
        }
    }
    if let Some(m) = gains.max_integral_sum {
        if m.is_nan() || m < 0.0 {
            return Err(CtrlError::InvalidGain("max_integral_sum", m))
        }
    }

    Ok(())
}

/// Check that a set of feedforward gains is usable.
pub fn validate_feedforward(gains: &FeedForwardGains) -> Result<(), CtrlError> {
    if !gains.k_v.is_finite() {
        return Err(CtrlError::InvalidGain("k_v", gains.k_v))
    }
    if !gains.k_a.is_finite() {
        return Err(CtrlError::InvalidGain("k_a", gains.k_a))
    }

    Ok(())
}
