//! Implementations for the TrajCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::bus::records::MotionTarget;
use log::{debug, info, warn};

// Internal
use super::{AxisSetpoint, Params, PoseTarget, Setpoint, TrajCtrlError, TrajProfile};
use crate::loc::Pose;
use util::{
    maths::get_ang_dist,
    module::State,
    time::micros_to_seconds
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module state
#[derive(Debug, Clone)]
pub struct TrajCtrl {
    params: Params,

    activity: Activity,

    /// Id of the last motion target seen, whether or not it was accepted
    last_target_id: Option<u64>,

    /// Time of the first cycle, targets issued before this are ignored
    start_us: Option<u64>,

    initial_motion_pending: bool,

    report: StatusReport
}

/// Input data to trajectory control.
#[derive(Debug, Clone, PartialEq)]
pub struct InputData {
    /// Current time in microseconds since rover startup
    pub now_us: u64,

    /// Latest pose of the rover
    pub pose: Pose,

    /// The motion target currently on the bus, if any
    pub target: Option<MotionTarget>
}

/// Status report for TrajCtrl processing.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub mode: TrajCtrlMode,

    /// A new motion started this cycle
    pub motion_started: bool,

    /// The motion finished this cycle
    pub motion_finished: bool,

    /// A new motion target was rejected this cycle
    pub target_rejected: bool,

    /// Time since the start of the current motion
    ///
    /// Units: seconds
    pub elapsed_s: f64
}

/// A motion being performed.
#[derive(Debug, Clone)]
struct Motion {
    start_us: u64,
    target: PoseTarget,
    x: TrajProfile,
    y: TrajProfile,
    heading: TrajProfile
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrajCtrlMode {
    /// No pose has been seen yet
    Off,

    /// Holding a fixed pose
    Hold,

    /// Following a profile
    Profile
}

#[derive(Debug, Clone)]
enum Activity {
    Idle,
    Holding(PoseTarget),
    Moving(Box<Motion>)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrajCtrlMode {
    fn default() -> Self {
        TrajCtrlMode::Off
    }
}

impl State for TrajCtrl {
    type InitData = Params;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = Setpoint;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        params.validate()?;

        Ok(Self {
            initial_motion_pending: params.initial_motion.is_some(),
            params,
            activity: Activity::Idle,
            last_target_id: None,
            start_us: None,
            report: StatusReport::default()
        })
    }

    /// Select the setpoint for this cycle.
    fn proc(&mut self, input: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let current = PoseTarget {
            x_m: input.pose.position_m[0],
            y_m: input.pose.position_m[1],
            heading_rad: input.pose.heading_rad
        };
        let start_us = *self.start_us.get_or_insert(input.now_us);

        // ---- NEW MOTIONS ----

        if self.initial_motion_pending {
            self.initial_motion_pending = false;

            if let Some(m) = self.params.initial_motion.clone() {
                let target = PoseTarget {
                    x_m: m.x_m,
                    y_m: m.y_m,
                    heading_rad: m.heading_rad
                };
                self.begin_motion(input.now_us, &current, &target, m.duration_s)?;
                info!("Starting initial motion to {:?} over {} s", target, m.duration_s);
                self.report.motion_started = true;
            }
        }

        if let Some(ref target) = input.target {
            if self.last_target_id != Some(target.timestamp) {
                self.last_target_id = Some(target.timestamp);
                self.accept_target(input.now_us, start_us, &current, target);
            }
        }

        // ---- SETPOINT ----

        if let Activity::Idle = self.activity {
            info!("Holding position at {:?}", current);
            self.activity = Activity::Holding(current);
        }

        let (setpoint, finished) = match self.activity {
            Activity::Moving(ref motion) => {
                let elapsed_s = micros_to_seconds(input.now_us.saturating_sub(motion.start_us));
                self.report.elapsed_s = elapsed_s;

                if motion.x.is_finished(elapsed_s) {
                    (Setpoint::hold(&motion.target), Some(motion.target))
                }
                else {
                    (Setpoint {
                        x: AxisSetpoint::from(motion.x.sample_at(elapsed_s)),
                        y: AxisSetpoint::from(motion.y.sample_at(elapsed_s)),
                        heading: AxisSetpoint::from(motion.heading.sample_at(elapsed_s)),
                        profile_active: true
                    }, None)
                }
            },
            Activity::Holding(ref target) => (Setpoint::hold(target), None),
            Activity::Idle => (Setpoint::hold(&current), None)
        };

        if let Some(target) = finished {
            info!("Motion complete, holding at {:?}", target);
            self.activity = Activity::Holding(target);
            self.report.motion_finished = true;
        }

        self.report.mode = self.mode();

        Ok((setpoint, self.report))
    }
}

impl TrajCtrl {
    /// Start a motion from `from` to `to` lasting `duration_s`, replacing any motion in
    /// progress.
    ///
    /// The heading moves the shortest way round to the target heading.
    pub fn begin_motion(
        &mut self,
        now_us: u64,
        from: &PoseTarget,
        to: &PoseTarget,
        duration_s: f64
    ) -> Result<(), TrajCtrlError> {
        if !from.is_finite() || !to.is_finite() {
            return Err(TrajCtrlError::InvalidTarget(format!(
                "cannot move from {:?} to {:?}", from, to
            )))
        }
        self.params.check_duration(duration_s)?;

        let heading_end = from.heading_rad + get_ang_dist(from.heading_rad, to.heading_rad);
        let interval_s = self.params.sample_interval_s;

        let motion = Motion {
            start_us: now_us,
            target: PoseTarget {
                heading_rad: heading_end,
                ..*to
            },
            x: TrajProfile::quintic(from.x_m, to.x_m, duration_s, interval_s)?,
            y: TrajProfile::quintic(from.y_m, to.y_m, duration_s, interval_s)?,
            heading: TrajProfile::quintic(
                from.heading_rad, heading_end, duration_s, interval_s
            )?
        };

        self.activity = Activity::Moving(Box::new(motion));

        Ok(())
    }

    /// Hold the given pose, abandoning any motion in progress.
    pub fn hold_at(&mut self, target: PoseTarget) {
        self.activity = Activity::Holding(target);
    }

    pub fn mode(&self) -> TrajCtrlMode {
        match self.activity {
            Activity::Idle => TrajCtrlMode::Off,
            Activity::Holding(_) => TrajCtrlMode::Hold,
            Activity::Moving(_) => TrajCtrlMode::Profile
        }
    }

    /// Start a motion for a target read from the bus. Invalid targets are logged and dropped.
    fn accept_target(
        &mut self,
        now_us: u64,
        start_us: u64,
        current: &PoseTarget,
        target: &MotionTarget
    ) {
        if target.timestamp < start_us {
            debug!(
                "Ignoring motion target {} issued before trajectory control started",
                target.timestamp
            );
            return
        }

        let to = PoseTarget {
            x_m: target.x_m,
            y_m: target.y_m,
            heading_rad: target.heading_rad
        };

        match self.begin_motion(now_us, current, &to, target.duration_s) {
            Ok(()) => {
                info!(
                    "Starting motion {} to {:?} over {} s",
                    target.timestamp, to, target.duration_s
                );
                self.report.motion_started = true;
            },
            Err(e) => {
                warn!("Rejected motion target {}: {}", target.timestamp, e);
                self.report.target_rejected = true;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_ctrl::{InitialMotion, ProfileError};
    use nalgebra::Vector2;

    fn traj_ctrl() -> TrajCtrl {
        TrajCtrl::init(Params {
            sample_interval_s: 0.1,
            max_duration_s: 60.0,
            initial_motion: None
        }).unwrap()
    }

    fn input(now_us: u64, x: f64, heading: f64, target: Option<MotionTarget>) -> InputData {
        InputData {
            now_us,
            pose: Pose {
                timestamp_us: now_us,
                position_m: Vector2::new(x, 0.0),
                heading_rad: heading
            },
            target
        }
    }

    fn target(id: u64, x: f64, heading: f64, duration_s: f64) -> MotionTarget {
        MotionTarget {
            timestamp: id,
            x_m: x,
            y_m: 0.0,
            heading_rad: heading,
            duration_s
        }
    }

    #[test]
    fn test_holds_first_pose() {
        let mut tc = traj_ctrl();
        assert_eq!(tc.mode(), TrajCtrlMode::Off);

        let (sp, report) = tc.proc(&input(1_000_000, 0.3, 0.2, None)).unwrap();
        assert_eq!(report.mode, TrajCtrlMode::Hold);
        assert!(!sp.profile_active);
        assert_eq!(sp.x, AxisSetpoint::hold(0.3));
        assert_eq!(sp.heading, AxisSetpoint::hold(0.2));

        // The rover drifting doesn't move the setpoint
        let (sp, _) = tc.proc(&input(1_100_000, 0.5, 0.0, None)).unwrap();
        assert_eq!(sp.x.position, 0.3);
    }

    #[test]
    fn test_motion() {
        let mut tc = traj_ctrl();
        tc.proc(&input(1_000_000, 0.0, 0.0, None)).unwrap();

        let t = target(1_500_000, 1.0, 0.0, 2.0);
        let (sp, report) = tc.proc(&input(2_000_000, 0.0, 0.0, Some(t.clone()))).unwrap();
        assert!(report.motion_started);
        assert!(sp.profile_active);
        assert_eq!(sp.x.position, 0.0);

        // Half way through the profile
        let (sp, report) = tc.proc(&input(3_000_000, 0.4, 0.0, Some(t.clone()))).unwrap();
        assert!(!report.motion_started);
        assert_eq!(report.mode, TrajCtrlMode::Profile);
        assert!((report.elapsed_s - 1.0).abs() < 1e-9);
        assert!((sp.x.position - 0.5).abs() < 1e-9);
        assert!(sp.x.velocity > 0.0);
        assert_eq!(sp.y.position, 0.0);

        // Finished, holding at the target
        let (sp, report) = tc.proc(&input(4_000_000, 0.9, 0.0, Some(t.clone()))).unwrap();
        assert!(report.motion_finished);
        assert_eq!(report.mode, TrajCtrlMode::Hold);
        assert!(!sp.profile_active);
        assert_eq!(sp.x, AxisSetpoint::hold(1.0));

        let (sp, report) = tc.proc(&input(5_000_000, 1.0, 0.0, Some(t))).unwrap();
        assert!(!report.motion_finished);
        assert_eq!(sp.x.position, 1.0);
    }

    #[test]
    fn test_stale_and_invalid_targets() {
        let mut tc = traj_ctrl();

        // Left on the bus from before startup
        let old = target(500_000, 1.0, 0.0, 2.0);
        let (_, report) = tc.proc(&input(1_000_000, 0.0, 0.0, Some(old))).unwrap();
        assert!(!report.motion_started);
        assert_eq!(report.mode, TrajCtrlMode::Hold);

        // Zero duration is rejected once
        let bad = target(1_200_000, 1.0, 0.0, 0.0);
        let (sp, report) = tc.proc(&input(1_300_000, 0.0, 0.0, Some(bad.clone()))).unwrap();
        assert!(report.target_rejected);
        assert_eq!(sp.x.position, 0.0);
        let (_, report) = tc.proc(&input(1_400_000, 0.0, 0.0, Some(bad))).unwrap();
        assert!(!report.target_rejected);

        let bad = target(1_500_000, std::f64::NAN, 0.0, 1.0);
        let (_, report) = tc.proc(&input(1_600_000, 0.0, 0.0, Some(bad))).unwrap();
        assert!(report.target_rejected);
        assert_eq!(tc.mode(), TrajCtrlMode::Hold);
    }

    #[test]
    fn test_overlong_target() {
        let mut tc = traj_ctrl();
        tc.proc(&input(1_000_000, 0.2, 0.0, None)).unwrap();

        for (i, &duration_s) in [60.5, 1.0e6, 1.0e9, std::f64::INFINITY].iter().enumerate() {
            let t = target(1_100_000 + i as u64, 1.0, 0.0, duration_s);
            let (sp, report) = tc.proc(&input(1_200_000 + i as u64, 0.2, 0.0, Some(t))).unwrap();

            assert!(report.target_rejected);
            assert!(!report.motion_started);
            assert_eq!(report.mode, TrajCtrlMode::Hold);
            assert!(!sp.profile_active);
            assert_eq!(sp.x, AxisSetpoint::hold(0.2));
        }

        // The longest allowed motion is still accepted
        let t = target(2_000_000, 1.0, 0.0, 60.0);
        let (sp, report) = tc.proc(&input(2_100_000, 0.2, 0.0, Some(t))).unwrap();
        assert!(report.motion_started);
        assert!(sp.profile_active);
    }

    #[test]
    fn test_heading_shortest_path() {
        let mut tc = traj_ctrl();
        tc.proc(&input(0, 0.0, 3.0, None)).unwrap();

        let t = target(10, 0.0, -3.0, 1.0);
        tc.proc(&input(100, 0.0, 3.0, Some(t.clone()))).unwrap();

        // Crosses pi rather than turning back through zero
        let (sp, _) = tc.proc(&input(600_100, 0.0, 3.0, Some(t.clone()))).unwrap();
        assert!(sp.heading.position > 3.0);
        assert!(sp.heading.velocity > 0.0);

        let (sp, _) = tc.proc(&input(1_000_100, 0.0, 3.0, Some(t))).unwrap();
        let expected = 3.0 + (std::f64::consts::TAU - 6.0);
        assert!((sp.heading.position - expected).abs() < 1e-9);
    }

    #[test]
    fn test_initial_motion() {
        let mut tc = TrajCtrl::init(Params {
            sample_interval_s: 0.1,
            max_duration_s: 60.0,
            initial_motion: Some(InitialMotion {
                x_m: 0.5,
                y_m: 0.0,
                heading_rad: 0.0,
                duration_s: 1.0
            })
        }).unwrap();

        let (sp, report) = tc.proc(&input(0, 0.0, 0.0, None)).unwrap();
        assert!(report.motion_started);
        assert!(sp.profile_active);

        let (sp, _) = tc.proc(&input(2_000_000, 0.5, 0.0, None)).unwrap();
        assert_eq!(sp.x, AxisSetpoint::hold(0.5));

        // Bad initial motions are caught at init
        for &duration_s in [-1.0, 90.0].iter() {
            assert!(TrajCtrl::init(Params {
                sample_interval_s: 0.1,
                max_duration_s: 60.0,
                initial_motion: Some(InitialMotion {
                    x_m: 0.5,
                    y_m: 0.0,
                    heading_rad: 0.0,
                    duration_s
                })
            }).is_err());
        }
    }

    #[test]
    fn test_params_file() {
        let params: Params = toml::from_str(
            include_str!("../../../params/traj_ctrl.toml")
        ).unwrap();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_duration_s, 120.0);

        let params = |sample_interval_s, max_duration_s| Params {
            sample_interval_s,
            max_duration_s,
            initial_motion: None
        };
        assert!(params(0.0, 10.0).validate().is_err());
        assert!(params(0.1, 0.0).validate().is_err());
        assert!(params(0.1, std::f64::NAN).validate().is_err());

        // The longest motion must fit in one profile
        assert!(matches!(
            params(0.001, 1.0e5).validate(),
            Err(TrajCtrlError::ProfileError(ProfileError::TooManySamples(_, _)))
        ));
    }
}
