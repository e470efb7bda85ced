//! Implementations for the PosCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::bus::records::{AxisGains, RoverParameters};
use log::{debug, trace};
use nalgebra::{Rotation2, Vector2};

// Internal
use super::{validate_rover_parameters, Params, PosCtrlError};
use crate::{
    ctrl::{AngleController, AxisOutput, FeedForward, Pid, PositionVelocitySystem},
    loc::{Axis, AxisEstimator, LocFrame},
    loco_ctrl::ChassisDemand,
    traj_ctrl::{AxisSetpoint, Setpoint}
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

type LinearSystem = PositionVelocitySystem<Pid, AxisEstimator>;
type AngularSystem = PositionVelocitySystem<AngleController, AxisEstimator>;

/// Position control module state
#[derive(Debug, Clone)]
pub struct PosCtrl {
    params: Params,

    x: LinearSystem,
    y: LinearSystem,
    heading: AngularSystem,

    /// True while the rover is settled at a held pose
    settled: bool,

    report: StatusReport
}

/// Input data to position control.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InputData {
    pub frame: LocFrame,
    pub setpoint: Setpoint
}

/// Status report for PosCtrl processing.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StatusReport {
    /// Distance from the position setpoint
    ///
    /// Units: meters
    pub position_error_m: f64,

    /// Shortest angle to the heading setpoint
    ///
    /// Units: radians
    pub heading_error_rad: f64,

    /// The rover is within tolerance of a held pose and isn't driven
    pub settled: bool,

    /// Demand in the world frame before rotation into the chassis frame
    pub world_demand: ChassisDemand,

    pub x: AxisOutput,
    pub y: AxisOutput,
    pub heading: AxisOutput
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for PosCtrl {
    type InitData = Params;
    type InitError = PosCtrlError;

    type InputData = InputData;
    type OutputData = ChassisDemand;
    type StatusReport = StatusReport;
    type ProcError = PosCtrlError;

    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        params.validate()?;

        let x = linear_system(Axis::X, &params.gains.x, "x")?;
        let y = linear_system(Axis::Y, &params.gains.y, "y")?;

        let theta = &params.gains.theta;
        let heading = PositionVelocitySystem::new(
            AxisEstimator::position(Axis::Heading),
            AxisEstimator::velocity(Axis::Heading),
            FeedForward::new(theta.feedforward),
            AngleController::new(
                Pid::new(theta.position.clone()).map_err(|e| PosCtrlError::CtrlError("theta", e))?
            ),
            Pid::new(theta.velocity.clone()).map_err(|e| PosCtrlError::CtrlError("theta", e))?
        );

        Ok(Self {
            params,
            x,
            y,
            heading,
            settled: false,
            report: StatusReport::default()
        })
    }

    /// Calculate the chassis demand which drives the rover towards the setpoint.
    fn proc(&mut self, input: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let frame = &input.frame;
        let sp = &input.setpoint;

        self.report.position_error_m = (
            Vector2::new(sp.x.position, sp.y.position) - frame.pose.position_m
        ).norm();
        self.report.heading_error_rad = AngleController::error(
            sp.heading.position, frame.pose.heading_rad
        );

        // ---- SETTLE DEADBAND ----

        let tol = &self.params.tolerances;
        if !sp.profile_active
            && self.report.position_error_m <= tol.position_m
            && self.report.heading_error_rad.abs() <= tol.heading_rad
        {
            if !self.settled {
                debug!("Settled at {:?}", frame.pose);
                self.reset();
                self.settled = true;
            }
            self.report.settled = true;
            return Ok((ChassisDemand::default(), self.report))
        }
        self.settled = false;

        // ---- CONTROLLERS ----

        let x_ms = update_axis(&mut self.x, frame, &sp.x, "x")?;
        let y_ms = update_axis(&mut self.y, frame, &sp.y, "y")?;
        let yaw_rads = update_axis(&mut self.heading, frame, &sp.heading, "theta")?;

        self.report.x = self.x.last_output().unwrap_or_default();
        self.report.y = self.y.last_output().unwrap_or_default();
        self.report.heading = self.heading.last_output().unwrap_or_default();
        self.report.world_demand = ChassisDemand { x_ms, y_ms, yaw_rads };

        // ---- WORLD TO CHASSIS ----

        let chassis = Rotation2::new(-frame.pose.heading_rad) * Vector2::new(x_ms, y_ms);
        let demand = ChassisDemand {
            x_ms: chassis[0],
            y_ms: chassis[1],
            yaw_rads
        };

        if !demand.is_finite() {
            return Err(PosCtrlError::NonFiniteOutput(demand))
        }

        trace!("PosCtrl demand: {:?}", demand);

        Ok((demand, self.report))
    }
}

impl PosCtrl {
    /// Replace the gains of every axis.
    ///
    /// All gains are checked first, if any is invalid none are applied.
    pub fn apply_parameters(&mut self, gains: &RoverParameters) -> Result<(), PosCtrlError> {
        validate_rover_parameters(gains)?;

        self.x.set_gains(&gains.x).map_err(|e| PosCtrlError::CtrlError("x", e))?;
        self.y.set_gains(&gains.y).map_err(|e| PosCtrlError::CtrlError("y", e))?;
        self.heading.set_gains(&gains.theta).map_err(|e| PosCtrlError::CtrlError("theta", e))?;

        self.params.gains = gains.clone();

        Ok(())
    }

    /// The gains currently in use.
    pub fn gains(&self) -> &RoverParameters {
        &self.params.gains
    }

    /// Clear the state of every controller.
    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.heading.reset();
    }
}

fn linear_system(
    axis: Axis,
    gains: &AxisGains,
    name: &'static str
) -> Result<LinearSystem, PosCtrlError> {
    let pid = |g| Pid::new(g).map_err(|e| PosCtrlError::CtrlError(name, e));

    Ok(PositionVelocitySystem::new(
        AxisEstimator::position(axis),
        AxisEstimator::velocity(axis),
        FeedForward::new(gains.feedforward),
        pid(gains.position.clone())?,
        pid(gains.velocity.clone())?
    ))
}

fn update_axis<P>(
    system: &mut PositionVelocitySystem<P, AxisEstimator>,
    frame: &LocFrame,
    sp: &AxisSetpoint,
    name: &'static str
) -> Result<f64, PosCtrlError>
where
    P: crate::ctrl::FeedbackController
{
    system.update(frame, sp.position, sp.velocity, sp.acceleration)
        .map_err(|e| PosCtrlError::CtrlError(name, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::{Pose, Velocity};
    use crate::traj_ctrl::PoseTarget;

    const FRAC_PI_2: f64 = std::f64::consts::FRAC_PI_2;

    fn params() -> Params {
        toml::from_str(include_str!("../../../params/pos_ctrl.toml")).unwrap()
    }

    fn frame(t_us: u64, x: f64, y: f64, heading: f64) -> LocFrame {
        LocFrame {
            pose: Pose {
                timestamp_us: t_us,
                position_m: Vector2::new(x, y),
                heading_rad: heading
            },
            velocity: Velocity {
                timestamp_us: t_us,
                linear_ms: Vector2::zeros(),
                yaw_rate_rads: 0.0
            }
        }
    }

    fn hold(x: f64, y: f64, heading: f64) -> Setpoint {
        Setpoint::hold(&PoseTarget { x_m: x, y_m: y, heading_rad: heading })
    }

    #[test]
    fn test_drives_towards_setpoint() {
        let mut pc = PosCtrl::init(params()).unwrap();

        let (demand, report) = pc.proc(&InputData {
            frame: frame(100_000, 0.0, 0.0, 0.0),
            setpoint: hold(0.5, 0.0, 0.0)
        }).unwrap();

        assert!(!report.settled);
        assert!((report.position_error_m - 0.5).abs() < 1e-12);
        assert!(demand.x_ms > 0.0);
        assert!(demand.y_ms.abs() < 1e-12);
        assert!(demand.yaw_rads.abs() < 1e-12);
    }

    #[test]
    fn test_world_to_chassis() {
        let mut pc = PosCtrl::init(params()).unwrap();

        // Facing world +Y, a setpoint along world +X is to the rover's right
        let (demand, report) = pc.proc(&InputData {
            frame: frame(100_000, 0.0, 0.0, FRAC_PI_2),
            setpoint: hold(0.5, 0.0, FRAC_PI_2)
        }).unwrap();

        assert!(report.world_demand.x_ms > 0.0);
        assert!(demand.x_ms.abs() < 1e-9);
        assert!((demand.y_ms + report.world_demand.x_ms).abs() < 1e-9);
    }

    #[test]
    fn test_heading_takes_short_way() {
        let mut pc = PosCtrl::init(params()).unwrap();

        let (demand, report) = pc.proc(&InputData {
            frame: frame(100_000, 0.0, 0.0, std::f64::consts::TAU - 0.5),
            setpoint: hold(0.0, 0.0, 0.5)
        }).unwrap();

        assert!((report.heading_error_rad - 1.0).abs() < 1e-9);
        assert!(demand.yaw_rads > 0.0);
    }

    #[test]
    fn test_settle_deadband() {
        let mut pc = PosCtrl::init(params()).unwrap();

        let (demand, report) = pc.proc(&InputData {
            frame: frame(100_000, 0.4995, 0.0, 0.001),
            setpoint: hold(0.5, 0.0, 0.0)
        }).unwrap();
        assert!(report.settled);
        assert_eq!(demand, ChassisDemand::default());

        // A profile keeps the controllers running even when on target
        let mut sp = hold(0.5, 0.0, 0.0);
        sp.profile_active = true;
        sp.x.velocity = 0.2;
        let (demand, report) = pc.proc(&InputData {
            frame: frame(200_000, 0.5, 0.0, 0.0),
            setpoint: sp
        }).unwrap();
        assert!(!report.settled);
        assert!(demand.x_ms > 0.0);
    }

    #[test]
    fn test_apply_parameters() {
        let mut pc = PosCtrl::init(params()).unwrap();

        let mut gains = pc.gains().clone();
        gains.x.position.k_p = 1.0;
        pc.apply_parameters(&gains).unwrap();
        assert_eq!(pc.gains().x.position.k_p, 1.0);

        // One bad axis rejects the whole set
        let mut bad = gains.clone();
        bad.y.position.k_p = 5.0;
        bad.theta.velocity.low_pass_gain = -1.0;
        assert!(pc.apply_parameters(&bad).is_err());
        assert_eq!(pc.gains().y.position.k_p, gains.y.position.k_p);
    }

    #[test]
    fn test_params_validation() {
        let p = params();
        assert!(p.validate().is_ok());

        let mut bad = p.clone();
        bad.tolerances.position_m = -0.1;
        assert!(PosCtrl::init(bad).is_err());

        let mut bad = p;
        bad.gains.x.feedforward.k_a = std::f64::NAN;
        assert!(matches!(PosCtrl::init(bad), Err(PosCtrlError::CtrlError("x", _))));
    }
}
