//! Parameters structure for LocoCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{LocoCtrlError, NUM_WHEELS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Locomotion control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- GEOMETRY ----

    /// Distance between the left and right wheel contact points.
    ///
    /// Units: meters
    pub track_width_m: f64,

    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// The radius of the rover's wheels.
    ///
    /// Units: meters
    pub wheel_radius_m: f64,

    // ---- WIRING ----

    /// Wheel feeding each motor channel.
    ///
    /// Channel `i` is driven with the speed of wheel `wheel_map[i]`, where wheels are numbered
    /// front-left, front-right, rear-left, rear-right.
    pub wheel_map: [usize; NUM_WHEELS],

    // ---- CAPABILITIES ----

    /// Highest wheel speed magnitude which may be commanded. Any demand above this stops the
    /// rover instead.
    ///
    /// Units: revolutions/minute
    pub max_abs_rpm: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the geometry and capabilities. The wheel map is checked when it is built.
    pub fn validate(&self) -> Result<(), LocoCtrlError> {
        for (name, value) in [
            ("track_width_m", self.track_width_m),
            ("wheel_base_m", self.wheel_base_m),
            ("wheel_radius_m", self.wheel_radius_m),
            ("max_abs_rpm", self.max_abs_rpm)
        ].iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(LocoCtrlError::InvalidParam(format!(
                    "{} must be positive and finite, found {}", name, value
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loco_ctrl::{LocoCtrl, WheelMap};
    use util::module::State;

    #[test]
    fn test_params_file() {
        let params: Params = toml::from_str(
            include_str!("../../../params/loco_ctrl.toml")
        ).unwrap();

        assert!(params.validate().is_ok());
        assert_eq!(params.wheel_map, WheelMap::default().as_array());
        assert!(LocoCtrl::init(params.clone()).is_ok());

        let mut bad = params;
        bad.max_abs_rpm = 0.0;
        assert!(matches!(bad.validate(), Err(LocoCtrlError::InvalidParam(_))));
    }
}
