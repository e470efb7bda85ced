//! # Control library.
//!
//! This library allows the control executable, its tests and benchmarks to access the modules of
//! the mecanum rover motion controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Bus client - connects to the bus server over ZMQ
pub mod bus_client;

/// Control primitives - PID, angle and feedforward controllers and the per-axis cascade
pub mod ctrl;

/// Control loop - runs every module once per cycle and publishes the wheel commands
pub mod ctrl_loop;

/// Data store - per-cycle data and safe mode bookkeeping
pub mod data_store;

/// Localisation module - reads the rover's pose and velocity estimates from the bus
pub mod loc;

/// Locomotion control module - converts chassis velocity demands into wheel speed demands
pub mod loco_ctrl;

/// Executable parameters
pub mod params;

/// Position control module - drives the rover towards the current setpoint
pub mod pos_ctrl;

/// Trajectory control module - chooses the setpoint the rover follows
pub mod traj_ctrl;
