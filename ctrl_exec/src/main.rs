//! Main control executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules and connect to the bus
//!     - Main loop, once per cycle:
//!         - Localisation: read the pose and velocity estimates
//!         - Trajectory control: choose the setpoint
//!         - Position control: compute the chassis demand
//!         - Locomotion control: convert the demand into wheel speeds
//!         - Publish the wheel command
//!     - On Ctrl-C or SIGTERM send a final stop command and exit
//!
//! # Modules
//!
//! All cyclic modules (e.g. `loco_ctrl`) shall provide a public struct implementing the
//! `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{TimeZone, Utc};
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use comms_if::{bus::{self, Bus}, net::zmq};
use log::{info, warn};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

// Internal
use ctrl_lib::{
    bus_client::BusClient,
    ctrl_loop::{ControlLoop, LoopParams},
    params::CtrlExecParams
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::RoverClock
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "ctrl_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mecanum Rover Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: CtrlExecParams = util::params::load("ctrl_exec.toml")
        .wrap_err("Could not load exec params")?;
    let loop_params = LoopParams {
        loc: util::params::load("loc.toml")
            .wrap_err("Could not load localisation params")?,
        loco: util::params::load("loco_ctrl.toml")
            .wrap_err("Could not load LocoCtrl params")?,
        pos: util::params::load("pos_ctrl.toml")
            .wrap_err("Could not load PosCtrl params")?,
        traj: util::params::load("traj_ctrl.toml")
            .wrap_err("Could not load TrajCtrl params")?,
        exec: exec_params.clone()
    };

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ctrl_loop = ControlLoop::init(loop_params)
        .wrap_err("Failed to initialise the control loop")?;

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let mut bus_client = BusClient::new(&zmq_ctx, &exec_params.bus)
        .wrap_err("Failed to initialise the BusClient")?;
    info!("BusClient initialised");

    let startup_payload = bus_client.get(bus::KEY_STARTUP_TIMESTAMP)
        .wrap_err("Could not read the rover startup timestamp")?
        .ok_or_else(|| eyre!("The rover startup timestamp is not set on the bus"))?;
    let clock = RoverClock::new(
        bus::parse_startup_timestamp(&startup_payload)
            .wrap_err("Invalid rover startup timestamp")?
    );

    let epoch_us = clock.startup_epoch_us();
    match Utc.timestamp_opt(
        epoch_us.div_euclid(1_000_000),
        (epoch_us.rem_euclid(1_000_000) * 1000) as u32
    ).single() {
        Some(t) => info!("Rover started at {}", t),
        None => warn!("Rover startup timestamp {} us is not a valid date", epoch_us)
    }

    ctrl_loop.connect(&mut bus_client)
        .wrap_err("Could not subscribe to the rover parameters")?;

    info!("Network initialisation complete");

    // ---- SHUTDOWN SIGNAL ----

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        stop_tx.send(()).ok();
    }).wrap_err("Could not set the shutdown signal handler")?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        ctrl_loop.tick(&mut bus_client, clock.now_us())
            .wrap_err("The control loop stopped unexpectedly")?;

        // ---- CYCLE MANAGEMENT ----

        let wait = ctrl_loop.end_cycle(Instant::now() - cycle_start_instant);

        // The shutdown signal ends the wait early
        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => (),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break
        }
    }

    // ---- SHUTDOWN ----

    ctrl_loop.request_stop();

    if let Err(e) = ctrl_loop.safe_stop(
        &mut bus_client,
        clock.now_us(),
        Duration::from_secs_f64(exec_params.safe_stop_deadline_s)
    ) {
        warn!("{}", e);
    }

    info!("End of execution");

    Ok(())
}
