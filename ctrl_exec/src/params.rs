//! # Control Executable Parameters
//!
//! This module provides parameters for the control executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::bus_client::BusParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CtrlExecParams {
    /// Target period of one cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Time allowed for the final stop command to be sent on shutdown
    ///
    /// Units: seconds
    pub safe_stop_deadline_s: f64,

    /// Number of consecutive cycles with a bus error tolerated before safe mode is entered
    pub max_consec_bus_errors: u64,

    pub bus: BusParams
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlExecParams {
    /// Check the parameters, returning a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cycle_period_s.is_finite() || self.cycle_period_s <= 0.0 {
            return Err(format!(
                "cycle_period_s must be positive, found {}", self.cycle_period_s
            ))
        }
        if !self.safe_stop_deadline_s.is_finite() || self.safe_stop_deadline_s < 0.0 {
            return Err(format!(
                "safe_stop_deadline_s must be non-negative, found {}", self.safe_stop_deadline_s
            ))
        }

        self.bus.validate().map_err(|e| e.to_string())
    }

    /// Number of cycles per second.
    pub fn cycle_frequency_hz(&self) -> f64 {
        1.0 / self.cycle_period_s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let params: CtrlExecParams = toml::from_str(
            include_str!("../../params/ctrl_exec.toml")
        ).unwrap();

        assert!(params.validate().is_ok());
        assert!((params.cycle_frequency_hz() - 10.0).abs() < 1e-9);
        assert_eq!(params.max_consec_bus_errors, 5);

        let mut bad = params;
        bad.cycle_period_s = 0.0;
        assert!(bad.validate().is_err());
    }
}
