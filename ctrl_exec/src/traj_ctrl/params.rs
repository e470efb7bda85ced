//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::{TrajCtrlError, TrajProfile};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Time between two samples of a profile
    ///
    /// Units: seconds
    pub sample_interval_s: f64,

    /// Longest motion that will be profiled, longer targets are rejected
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    /// A motion to perform as soon as the first pose is known.
    #[serde(default)]
    pub initial_motion: Option<InitialMotion>
}

/// A motion given in the parameter file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InitialMotion {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub duration_s: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters, including that the initial motion can be profiled.
    pub fn validate(&self) -> Result<(), TrajCtrlError> {
        // The longest allowed motion must fit in a profile
        TrajProfile::quintic(0.0, 1.0, self.max_duration_s, self.sample_interval_s)?;

        let duration_s = match self.initial_motion {
            Some(ref m) => {
                for v in [m.x_m, m.y_m, m.heading_rad].iter() {
                    if !v.is_finite() {
                        return Err(TrajCtrlError::InvalidParam(format!(
                            "initial motion target {:?} is not finite", m
                        )))
                    }
                }
                m.duration_s
            },
            None => return Ok(())
        };

        self.check_duration(duration_s)?;

        Ok(())
    }

    /// Check that a motion of `duration_s` may be profiled.
    pub fn check_duration(&self, duration_s: f64) -> Result<(), TrajCtrlError> {
        if !duration_s.is_finite() || duration_s <= 0.0 || duration_s > self.max_duration_s {
            return Err(TrajCtrlError::InvalidTarget(format!(
                "motion duration {} s is outside (0, {}] s", duration_s, self.max_duration_s
            )))
        }

        Ok(())
    }
}
