//! # Data Store
//!
//! Per-cycle data and the bookkeeping of the control loop.

use comms_if::bus::records::WheelVelocityCommand;
use log::{info, warn};

use crate::{
    loc::LocFrame,
    loco_ctrl::{self, ChassisDemand},
    pos_ctrl,
    traj_ctrl::{self, Setpoint}
};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the loop has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    /// Too many consecutive cycles failed to talk to the bus
    BusFault,

    /// The localisation estimates or a record on the bus could not be used
    InvalidReading,

    /// The controllers produced a demand which cannot be sent to the wheels
    InvalidOutput
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Data store for the control loop.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Safe mode variables
    /// Determines if the loop is in safe mode.
    pub safe: bool,

    /// Gives the reason for the loop being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // Localisation
    pub loc_frame: Option<LocFrame>,

    // TrajCtrl
    pub setpoint: Option<Setpoint>,
    pub traj_ctrl_status_rpt: Option<traj_ctrl::StatusReport>,

    // PosCtrl
    pub chassis_demand: Option<ChassisDemand>,
    pub pos_ctrl_status_rpt: Option<pos_ctrl::StatusReport>,

    // LocoCtrl
    pub loco_ctrl_status_rpt: Option<loco_ctrl::StatusReport>,

    /// The command sent to the wheels this cycle
    pub wheel_command: Option<WheelVelocityCommand>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive cycles with a bus error
    pub num_consec_bus_errors: u64
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Puts the loop into safe mode with the given cause.
    ///
    /// Only the first cause of a safe mode episode is logged and kept.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Entering safe mode, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);
        }
    }

    /// Leave safe mode.
    ///
    /// Returns true if the loop was in safe mode.
    pub fn make_unsafe(&mut self) -> bool {
        if !self.safe {
            return false
        }

        info!("Leaving safe mode, root cause was {:?}", self.safe_cause);
        self.safe = false;
        self.safe_cause = None;

        true
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the per-cycle data and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_second = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_second == 0;

        self.loc_frame = None;
        self.setpoint = None;
        self.traj_ctrl_status_rpt = None;
        self.chassis_demand = None;
        self.pos_ctrl_status_rpt = None;
        self.loco_ctrl_status_rpt = None;
        self.wheel_command = None;
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}
