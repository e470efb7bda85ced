//! # Control loop
//!
//! Owns every module of the controller and runs one control cycle per call to
//! [`ControlLoop::tick`]:
//!
//! 1. Apply any new controller gains published on the bus
//! 2. Read the localisation frame and the motion target
//! 3. Select the setpoint (TrajCtrl), compute the chassis demand (PosCtrl) and convert it into
//!    wheel speeds (LocoCtrl)
//! 4. Set and publish the timestamped wheel command
//!
//! Any fault in a cycle is answered by publishing the all-zero stop command for that cycle. The
//! loop never stops by itself, only [`ControlLoop::request_stop`] and [`ControlLoop::safe_stop`]
//! end it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::bus::{
    self,
    Bus,
    BusError,
    records::{MotionTarget, RoverParameters, WheelVelocityCommand}
};
use log::{debug, info, warn};
use std::{thread, time::{Duration, Instant}};

// Internal
use crate::{
    data_store::{DataStore, SafeModeCause},
    loc::{LocError, LocMgr, LocParams},
    loco_ctrl::{self, LocoCtrl, LocoCtrlError, NUM_WHEELS},
    params::CtrlExecParams,
    pos_ctrl::{self, PosCtrl, PosCtrlError},
    traj_ctrl::{self, PoseTarget, TrajCtrl, TrajCtrlError}
};
use util::module::State;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Pause between attempts to send the final stop command.
const SAFE_STOP_RETRY_INTERVAL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of every module in the loop.
#[derive(Debug, Clone)]
pub struct LoopParams {
    pub exec: CtrlExecParams,
    pub loc: LocParams,
    pub loco: loco_ctrl::Params,
    pub pos: pos_ctrl::Params,
    pub traj: traj_ctrl::Params
}

pub struct ControlLoop {
    params: CtrlExecParams,

    state: CtrlLoopState,

    loc_mgr: LocMgr,
    traj_ctrl: TrajCtrl,
    pos_ctrl: PosCtrl,
    loco_ctrl: LocoCtrl,

    ds: DataStore
}

/// Outcome of a single cycle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickReport {
    /// State of the loop at the end of the cycle
    pub state: CtrlLoopState,

    /// The command sent this cycle
    pub command: WheelVelocityCommand,

    /// True if the command was both set and published
    pub published: bool,

    /// The fault which occured this cycle, if any
    pub fault: Option<SafeModeCause>,

    /// True if the loop is in safe mode at the end of the cycle
    pub safe: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CtrlLoopState {
    /// Waiting for the first valid localisation frame
    Bootstrapping,

    /// Controlling the rover
    Running,

    /// A stop has been requested, no more cycles will run
    Stopping,

    /// The final stop command has been sent, or its deadline passed
    Terminated
}

#[derive(Debug, thiserror::Error)]
pub enum CtrlLoopError {
    #[error("Invalid executable parameter: {0}")]
    InvalidParam(String),

    #[error("Localisation error: {0}")]
    LocError(#[from] LocError),

    #[error("TrajCtrl error: {0}")]
    TrajCtrlError(#[from] TrajCtrlError),

    #[error("PosCtrl error: {0}")]
    PosCtrlError(#[from] PosCtrlError),

    #[error("LocoCtrl error: {0}")]
    LocoCtrlError(#[from] LocoCtrlError),

    #[error("Bus error: {0}")]
    BusError(#[from] BusError),

    #[error("The control loop is {0:?} and cannot run a cycle")]
    NotRunning(CtrlLoopState),

    #[error("The final stop command could not be sent: {0}")]
    StopNotSent(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlLoopError {
    /// The safe mode cause of an error raised during a cycle.
    pub fn safe_mode_cause(&self) -> SafeModeCause {
        match self {
            CtrlLoopError::LocError(e) if e.is_transient() => SafeModeCause::BusFault,
            CtrlLoopError::BusError(e) if e.is_transient() => SafeModeCause::BusFault,
            CtrlLoopError::LocError(_)
            | CtrlLoopError::BusError(_)
            | CtrlLoopError::TrajCtrlError(_) => SafeModeCause::InvalidReading,
            _ => SafeModeCause::InvalidOutput
        }
    }
}

impl ControlLoop {
    /// Initialise every module of the loop.
    ///
    /// Any invalid parameter is an error, the loop cannot be built without a complete and valid
    /// configuration.
    pub fn init(params: LoopParams) -> Result<Self, CtrlLoopError> {
        params.exec.validate().map_err(CtrlLoopError::InvalidParam)?;

        let loc_mgr = LocMgr::new(params.loc)?;
        info!("LocMgr init complete");

        let traj_ctrl = TrajCtrl::init(params.traj)?;
        info!("TrajCtrl init complete");

        let pos_ctrl = PosCtrl::init(params.pos)?;
        info!("PosCtrl init complete");

        let loco_ctrl = LocoCtrl::init(params.loco)?;
        info!("LocoCtrl init complete");

        Ok(Self {
            params: params.exec,
            state: CtrlLoopState::Bootstrapping,
            loc_mgr,
            traj_ctrl,
            pos_ctrl,
            loco_ctrl,
            ds: DataStore::default()
        })
    }

    /// Load the current gains from the bus and subscribe to changes.
    ///
    /// Missing or invalid gains on the bus are not an error, the configured gains stay in use.
    pub fn connect<B: Bus>(&mut self, bus: &mut B) -> Result<(), CtrlLoopError> {
        match bus.get_record::<RoverParameters>(bus::KEY_PARAMETERS) {
            Ok(Some(p)) => {
                self.apply_parameters(&p).ok();
            },
            Ok(None) => info!("No rover parameters on the bus, using the configured gains"),
            Err(e) if e.is_transient() => return Err(e.into()),
            Err(e) => warn!("Ignoring the rover parameters on the bus: {}", e)
        }

        bus.subscribe(bus::KEY_PARAMETERS)?;

        Ok(())
    }

    /// Run one control cycle at `now_us` microseconds since rover startup.
    ///
    /// Faults within the cycle are not returned as errors, they are handled by sending the stop
    /// command and reported in the [`TickReport`]. An error is only returned if the loop has been
    /// stopped.
    pub fn tick<B: Bus>(
        &mut self,
        bus: &mut B,
        now_us: u64
    ) -> Result<TickReport, CtrlLoopError> {
        match self.state {
            CtrlLoopState::Bootstrapping | CtrlLoopState::Running => (),
            s => return Err(CtrlLoopError::NotRunning(s))
        }

        self.ds.cycle_start(self.params.cycle_frequency_hz());

        let result = self.poll_parameters(bus)
            .and_then(|_| self.compute(bus, now_us));

        let (command, mut fault) = match result {
            Ok(velocity) => (WheelVelocityCommand { timestamp: now_us, velocity }, None),
            Err(e) => {
                self.log_fault(&e);
                (WheelVelocityCommand::stop(now_us), Some(e.safe_mode_cause()))
            }
        };

        // ---- PUBLISH ----

        let published = match bus.set_and_publish(bus::KEY_WHEEL_VELOCITY_COMMAND, &command) {
            Ok(()) => true,
            Err(e) => {
                let e = CtrlLoopError::from(e);
                if fault.is_none() {
                    self.log_fault(&e);
                    fault = Some(e.safe_mode_cause());
                }
                false
            }
        };
        self.ds.wheel_command = Some(command);

        // ---- SAFE MODE ----

        match fault {
            Some(SafeModeCause::BusFault) => {
                self.ds.num_consec_bus_errors += 1;
                if self.ds.num_consec_bus_errors > self.params.max_consec_bus_errors {
                    self.ds.make_safe(SafeModeCause::BusFault);
                }
            },
            Some(cause) => {
                self.ds.num_consec_bus_errors = 0;
                self.ds.make_safe(cause);
            },
            None => {
                self.ds.num_consec_bus_errors = 0;

                // Integrals and derivatives from before the fault are meaningless now
                if self.ds.make_unsafe() {
                    self.pos_ctrl.reset();
                }
            }
        }

        Ok(TickReport {
            state: self.state,
            command,
            published,
            fault,
            safe: self.ds.safe
        })
    }

    /// Finish a cycle which took `cycle_dur`, returning how long to wait before the next one.
    pub fn end_cycle(&mut self, cycle_dur: Duration) -> Duration {
        let period = Duration::from_secs_f64(self.params.cycle_period_s);

        let wait = match period.checked_sub(cycle_dur) {
            Some(d) => {
                self.ds.num_consec_cycle_overruns = 0;
                d
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period.as_secs_f64()
                );
                self.ds.num_consec_cycle_overruns += 1;
                Duration::from_secs(0)
            }
        };

        self.ds.cycle_end();

        wait
    }

    /// Replace the gains of the position controllers.
    ///
    /// Invalid gains are rejected with a warning and the current gains kept.
    pub fn apply_parameters(&mut self, params: &RoverParameters) -> Result<(), CtrlLoopError> {
        match self.pos_ctrl.apply_parameters(params) {
            Ok(()) => {
                info!("New controller gains applied");
                Ok(())
            },
            Err(e) => {
                warn!("Rejected new controller gains: {}", e);
                Err(e.into())
            }
        }
    }

    /// Hold the given pose, abandoning any motion in progress.
    pub fn hold_at(&mut self, target: PoseTarget) {
        info!("Holding at {:?}", target);
        self.traj_ctrl.hold_at(target);
    }

    /// Stop running cycles. The final stop command is sent by [`ControlLoop::safe_stop`].
    pub fn request_stop(&mut self) {
        if let CtrlLoopState::Bootstrapping | CtrlLoopState::Running = self.state {
            info!("Stop requested");
            self.state = CtrlLoopState::Stopping;
        }
    }

    /// Send the final all-zero command and terminate the loop.
    ///
    /// The command is set and published exactly once, each of the two writes being retried until
    /// it succeeds or `deadline` has passed. The loop is terminated whatever the outcome.
    pub fn safe_stop<B: Bus>(
        &mut self,
        bus: &mut B,
        now_us: u64,
        deadline: Duration
    ) -> Result<(), CtrlLoopError> {
        if self.state == CtrlLoopState::Terminated {
            return Err(CtrlLoopError::NotRunning(self.state))
        }
        self.state = CtrlLoopState::Stopping;

        let start = Instant::now();
        let payload = bus::encode(&WheelVelocityCommand::stop(now_us))?;

        let mut set_done = false;
        let mut publish_done = false;
        let mut last_error = None;

        loop {
            if !set_done {
                match bus.set(bus::KEY_WHEEL_VELOCITY_COMMAND, &payload) {
                    Ok(()) => set_done = true,
                    Err(e) => last_error = Some(e)
                }
            }
            if set_done && !publish_done {
                match bus.publish(bus::KEY_WHEEL_VELOCITY_COMMAND, &payload) {
                    Ok(()) => publish_done = true,
                    Err(e) => last_error = Some(e)
                }
            }

            if set_done && publish_done {
                break
            }

            match deadline.checked_sub(start.elapsed()) {
                Some(remaining) if remaining > Duration::from_secs(0) => {
                    thread::sleep(remaining.min(SAFE_STOP_RETRY_INTERVAL))
                },
                _ => break
            }
        }

        self.state = CtrlLoopState::Terminated;

        match (set_done && publish_done, last_error) {
            (true, _) => {
                info!("Final stop command sent");
                Ok(())
            },
            (false, e) => Err(CtrlLoopError::StopNotSent(
                e.map(|e| e.to_string()).unwrap_or_else(|| "deadline passed".into())
            ))
        }
    }

    pub fn state(&self) -> CtrlLoopState {
        self.state
    }

    pub fn data_store(&self) -> &DataStore {
        &self.ds
    }

    /// The controller gains in use.
    pub fn gains(&self) -> &RoverParameters {
        self.pos_ctrl.gains()
    }

    /// Apply the gains published since the last cycle.
    fn poll_parameters<B: Bus>(&mut self, bus: &mut B) -> Result<(), CtrlLoopError> {
        for (key, payload) in bus.poll_subscribed()? {
            if key != bus::KEY_PARAMETERS {
                continue
            }

            match bus::decode::<RoverParameters>(&payload) {
                Ok(p) => {
                    self.apply_parameters(&p).ok();
                },
                Err(e) => warn!("Ignoring undecodable rover parameters: {}", e)
            }
        }

        Ok(())
    }

    /// Compute the wheel command for this cycle.
    fn compute<B: Bus>(
        &mut self,
        bus: &mut B,
        now_us: u64
    ) -> Result<[i32; NUM_WHEELS], CtrlLoopError> {
        // ---- LOCALISATION ----

        let frame = self.loc_mgr.read(bus)?;
        self.ds.loc_frame = Some(frame);

        if self.state == CtrlLoopState::Bootstrapping {
            info!("First localisation frame received, control loop running");
            self.state = CtrlLoopState::Running;
        }

        // ---- TRAJECTORY CONTROL ----

        let target: Option<MotionTarget> = bus.get_record(bus::KEY_MOTION_TARGET)?;

        let (setpoint, traj_rpt) = self.traj_ctrl.proc(&traj_ctrl::InputData {
            now_us,
            pose: frame.pose,
            target
        })?;
        self.ds.setpoint = Some(setpoint);
        self.ds.traj_ctrl_status_rpt = Some(traj_rpt);

        // ---- POSITION CONTROL ----

        let (demand, pos_rpt) = self.pos_ctrl.proc(&pos_ctrl::InputData { frame, setpoint })?;
        self.ds.chassis_demand = Some(demand);
        self.ds.pos_ctrl_status_rpt = Some(pos_rpt);

        // ---- LOCOMOTION CONTROL ----

        let (velocity, loco_rpt) = self.loco_ctrl.proc(&demand)?;
        self.ds.loco_ctrl_status_rpt = Some(loco_rpt);

        if self.ds.is_1_hz_cycle {
            debug!(
                "Pose {:?}, setpoint {:?}, demand {:?}, wheels {:?} RPM",
                frame.pose, setpoint, demand, velocity
            );
        }

        Ok(velocity)
    }

    /// Log a fault, only warning if it isn't part of an ongoing safe mode episode.
    fn log_fault(&self, e: &CtrlLoopError) {
        if self.ds.safe {
            debug!("Cycle fault: {}", e);
        }
        else {
            warn!("Cycle fault, sending stop command: {}", e);
        }
    }
}
