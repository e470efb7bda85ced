//! Implementations for the LocoCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{
    rads_to_rpm,
    ChassisDemand, LocoCtrlError, MecanumKinematics, Params, WheelMap,
    NUM_WHEELS
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Locomotion control module state
#[derive(Debug, Clone)]
pub struct LocoCtrl {
    params: Params,

    kinematics: MecanumKinematics,

    wheel_map: WheelMap,

    report: StatusReport
}

/// Wheel speed demands in motor channel order.
///
/// Units: revolutions/minute
pub type OutputData = [i32; NUM_WHEELS];

/// Status report for LocoCtrl processing.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct StatusReport {
    /// Wheel rates in wheel order
    ///
    /// Units: radians/second
    pub wheel_rates_rads: [f64; NUM_WHEELS],

    /// Unrounded wheel speeds in channel order
    ///
    /// Units: revolutions/minute
    pub channel_rpm: [f64; NUM_WHEELS]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for LocoCtrl {
    type InitData = Params;
    type InitError = LocoCtrlError;

    type InputData = ChassisDemand;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = LocoCtrlError;

    /// Initialise the LocoCtrl module from its parameters.
    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        let kinematics = MecanumKinematics::new(&params)?;
        let wheel_map = WheelMap::new(params.wheel_map)?;

        Ok(Self {
            params,
            kinematics,
            wheel_map,
            report: StatusReport::default()
        })
    }

    /// Convert a chassis demand into wheel speed demands.
    ///
    /// A demand which would need any wheel to turn faster than the RPM limit is an error, the
    /// caller is expected to stop the rover rather than clip the demand and change the direction
    /// of travel.
    fn proc(&mut self, demand: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        if !demand.is_finite() {
            return Err(LocoCtrlError::NonFiniteDemand(*demand))
        }

        self.report.wheel_rates_rads = self.kinematics.inverse(demand);

        let channel_rates = self.wheel_map.apply(&self.report.wheel_rates_rads);
        let mut output = [0i32; NUM_WHEELS];

        for (i, rate) in channel_rates.iter().enumerate() {
            let rpm = rads_to_rpm(*rate);
            self.report.channel_rpm[i] = rpm;

            if rpm.abs() > self.params.max_abs_rpm {
                return Err(LocoCtrlError::OverSpeed(i, rpm, self.params.max_abs_rpm))
            }

            output[i] = rpm.round() as i32;
        }

        trace!("LocoCtrl output: {:?} RPM", output);

        Ok((output, self.report))
    }
}

impl LocoCtrl {
    pub fn kinematics(&self) -> &MecanumKinematics {
        &self.kinematics
    }

    pub fn wheel_map(&self) -> &WheelMap {
        &self.wheel_map
    }
}
