//! Drive control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::robot::RobotCmd;
use log::{debug, info};
use nalgebra::Vector3;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

// Internal
use super::*;
use crate::geom::RobotPose;
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct DriveCtrl {
    params: DriveParams,

    /// The leg being executed
    state: Option<DriveState>,

    input_pose: Option<RobotPose>,
    output_cmd: Option<RobotCmd>,
    report: StatusReport,
}

/// State of a single leg. A new state is created for every leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriveState {
    /// The position the leg ends at
    pub target: Vector3<f64>,

    /// The planned turn at the start of the leg
    pub angle_rad: f64,

    /// Current phase of the leg
    pub phase: DrivePhase,

    /// Last turn sent to the robot
    last_turn_rad: f64,

    /// Bearing error in the previous cycle while turning
    last_err_rad: Option<f64>,

    /// Heading in the previous cycle while turning
    last_heading_rad: f64,

    /// Rotation made since the last turn was sent
    turned_rad: f64,

    /// Last heading bias sent to the robot while advancing
    last_bias_rad: f64,
}

/// The status report containing monitoring quantities for the current leg.
#[derive(Default, Copy, Clone, Debug)]
pub struct StatusReport {
    /// Planar distance to the target
    pub dist_to_target: f64,

    /// Bearing error to the target, in (-pi, pi]
    pub bearing_err_rad: f64,

    /// Phase of the leg after processing, `None` if no leg is loaded
    pub phase: Option<DrivePhase>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    /// A leg is already executing. This occurs when attempting to start a new leg before the
    /// current one is done.
    #[error("Attempted to begin a leg while one is in progress")]
    LegInProgress,

    /// A mode was executed without a leg loaded.
    #[error("No leg has been loaded")]
    NoLeg,

    /// A mode was executed without the pose being known.
    #[error("No pose has been set")]
    NoPose,
}

/// The phases of a leg. Each phase is handled by a `mode_xyz` function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum DrivePhase {
    Start,
    Turning,
    Advancing,
    Done,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    pub fn new(params: DriveParams) -> Self {
        Self {
            params,
            state: None,
            input_pose: None,
            output_cmd: None,
            report: StatusReport::default(),
        }
    }

    /// Process drive control.
    ///
    /// If there is no leg loaded, or the pose is unknown, no action is taken.
    pub fn proc(
        &mut self,
        pose: Option<&RobotPose>,
    ) -> Result<(Option<RobotCmd>, StatusReport), DriveCtrlError> {
        // Setup cycle data
        self.input_pose = pose.copied();
        self.output_cmd = None;
        self.report = StatusReport::default();

        let phase = match (&self.state, &self.input_pose) {
            (Some(s), Some(_)) => s.phase,
            (Some(s), None) => {
                self.report.phase = Some(s.phase);
                return Ok((None, self.report));
            }
            (None, _) => return Ok((None, self.report)),
        };

        match phase {
            DrivePhase::Start => self.mode_start(),
            DrivePhase::Turning => self.mode_turning(),
            DrivePhase::Advancing => self.mode_advancing(),
            DrivePhase::Done => Ok(()),
        }?;

        self.report.phase = self.state.map(|s| s.phase);

        Ok((self.output_cmd.take(), self.report))
    }

    /// Begin executing a new leg.
    ///
    /// The turn is issued on the next call to `proc`. Loading a leg while another is still in
    /// progress is an error, the current leg must first finish or be aborted.
    pub fn begin_leg(&mut self, target: Vector3<f64>, angle_rad: f64) -> Result<(), DriveCtrlError> {
        if !self.is_idle() {
            return Err(DriveCtrlError::LegInProgress);
        }

        info!(
            "Beginning leg to ({:.1}, {:.1}) with a {:.1} deg turn",
            target.x,
            target.y,
            angle_rad.to_degrees()
        );

        self.state = Some(DriveState::new(target, angle_rad));

        Ok(())
    }

    /// Drop the current leg, if any. Returns true if a leg was in progress.
    pub fn abort(&mut self) -> bool {
        let was_running = !self.is_idle();
        self.state = None;
        was_running
    }

    /// True if no leg is loaded or the loaded leg is done.
    pub fn is_idle(&self) -> bool {
        match self.state {
            Some(s) => s.phase == DrivePhase::Done,
            None => true,
        }
    }

    pub fn state(&self) -> Option<&DriveState> {
        self.state.as_ref()
    }

    /// Mode start.
    ///
    /// Issue the planned turn for the leg.
    fn mode_start(&mut self) -> Result<(), DriveCtrlError> {
        let pose = self.input_pose.ok_or(DriveCtrlError::NoPose)?;
        let state = self.state.as_mut().ok_or(DriveCtrlError::NoLeg)?;

        self.output_cmd = Some(RobotCmd::Turn(state.angle_rad.to_degrees()));
        state.last_turn_rad = state.angle_rad;
        state.last_heading_rad = pose.heading_rad;
        state.turned_rad = 0.0;
        state.phase = DrivePhase::Turning;

        Ok(())
    }

    /// Mode turning.
    ///
    /// Wait for the robot to face the target, then start advancing. The turn is re-issued with
    /// the measured error only if the robot overshoots or the error grows past the last turn.
    ///
    /// A planned turn may go the long way round to keep the grabber clear of nearby birdies. While
    /// more than half a turn of the last command remains, a re-issued turn keeps its direction.
    fn mode_turning(&mut self) -> Result<(), DriveCtrlError> {
        let pose = self.input_pose.ok_or(DriveCtrlError::NoPose)?;
        let state = self.state.as_mut().ok_or(DriveCtrlError::NoLeg)?;
        let params = &self.params;

        let dist = pose.distance_to(&state.target);
        let err = wrap_pi(pose.bearing_to(&state.target));
        self.report.dist_to_target = dist;
        self.report.bearing_err_rad = err;

        state.turned_rad += wrap_pi(pose.heading_rad - state.last_heading_rad);
        state.last_heading_rad = pose.heading_rad;
        let remaining = state.last_turn_rad - state.turned_rad;

        // Already on the target, no need to face it
        if dist < params.dist_tol {
            self.output_cmd = Some(RobotCmd::Stop);
            state.phase = DrivePhase::Done;
            info!("Leg complete without advancing");
            return Ok(());
        }

        if err.abs() < params.angle_tol_rad {
            self.output_cmd = Some(RobotCmd::Forward(None));
            state.phase = DrivePhase::Advancing;
            state.last_bias_rad = 0.0;
            debug!("Facing target ({:.2} deg), advancing", err.to_degrees());
            return Ok(());
        }

        let overshoot = match state.last_err_rad {
            Some(prev) => prev.abs() < FRAC_PI_2 && prev.signum() != err.signum(),
            None => false,
        };
        state.last_err_rad = Some(err);

        let grown = err.abs() > state.last_turn_rad.abs() + params.turn_reissue_rad;

        if overshoot || grown {
            let turn = reissue_turn(err, remaining);
            debug!(
                "Re-issuing turn of {:.2} deg (overshoot: {}, grown: {})",
                turn.to_degrees(),
                overshoot,
                grown
            );
            self.output_cmd = Some(RobotCmd::Turn(turn.to_degrees()));
            state.last_turn_rad = turn;
            state.turned_rad = 0.0;
        }

        Ok(())
    }

    /// Mode advancing.
    ///
    /// Drive onto the target, biasing the heading when the bearing error drifts past the
    /// tolerance or flips to the other side of the leg's turn direction.
    fn mode_advancing(&mut self) -> Result<(), DriveCtrlError> {
        let pose = self.input_pose.ok_or(DriveCtrlError::NoPose)?;
        let state = self.state.as_mut().ok_or(DriveCtrlError::NoLeg)?;
        let params = &self.params;

        let dist = pose.distance_to(&state.target);
        let err = wrap_pi(pose.bearing_to(&state.target));
        self.report.dist_to_target = dist;
        self.report.bearing_err_rad = err;

        if dist < params.dist_tol {
            self.output_cmd = Some(RobotCmd::Stop);
            state.phase = DrivePhase::Done;
            info!("Leg complete ({:.1} from target)", dist);
            return Ok(());
        }

        // A leg planned without a turn has no side to flip from
        let flipped = state.angle_rad != 0.0
            && err.signum() != state.angle_rad.signum()
            && err.abs() > params.deadband_rad;
        let off_course = err.abs() > params.angle_tol_rad || flipped;

        if !off_course {
            state.last_bias_rad = 0.0;
        } else if (err - state.last_bias_rad).abs() > params.deadband_rad {
            debug!("Correcting heading by {:.2} deg", err.to_degrees());
            self.output_cmd = Some(RobotCmd::Forward(Some(err.to_degrees())));
            state.last_bias_rad = err;
        }

        Ok(())
    }
}

impl DriveState {
    pub fn new(target: Vector3<f64>, angle_rad: f64) -> Self {
        Self {
            target,
            angle_rad,
            phase: DrivePhase::Start,
            last_turn_rad: 0.0,
            last_err_rad: None,
            last_heading_rad: 0.0,
            turned_rad: 0.0,
            last_bias_rad: 0.0,
        }
    }
}

/// The turn to re-issue for the measured bearing error.
///
/// Normally the short way round, but while more than half a turn of the last command remains the
/// robot keeps turning in the commanded direction.
fn reissue_turn(err: f64, remaining: f64) -> f64 {
    if remaining.abs() > PI && err != 0.0 && err.signum() != remaining.signum() {
        err + TAU.copysign(remaining)
    } else {
        err
    }
}

impl fmt::Display for DrivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrivePhase::Start => write!(f, "START"),
            DrivePhase::Turning => write!(f, "TURNING"),
            DrivePhase::Advancing => write!(f, "ADVANCING"),
            DrivePhase::Done => write!(f, "DONE"),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::sim::{SimBody, SimParams};
    use proptest::prelude::*;

    pub(crate) fn params() -> DriveParams {
        DriveParams {
            angle_tol_rad: 3f64.to_radians(),
            dist_tol: 8.0,
            turn_reissue_rad: 10f64.to_radians(),
            deadband_rad: 1f64.to_radians(),
        }
    }

    fn pose(x: f64, y: f64, heading_deg: f64) -> RobotPose {
        RobotPose::new(Vector3::new(x, y, 0.0), heading_deg.to_radians())
    }

    fn turn_deg(cmd: &Option<RobotCmd>) -> f64 {
        match cmd {
            Some(RobotCmd::Turn(d)) => *d,
            c => panic!("Expected a turn, got {:?}", c),
        }
    }

    #[test]
    fn test_no_leg_no_action() {
        let mut ctrl = DriveCtrl::new(params());
        let (cmd, report) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert_eq!(cmd, None);
        assert_eq!(report.phase, None);
        assert!(ctrl.is_idle());
    }

    #[test]
    fn test_no_pose_no_action() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(100.0, 0.0, 0.0), 0.0).unwrap();
        let (cmd, report) = ctrl.proc(None).unwrap();
        assert_eq!(cmd, None);
        assert_eq!(report.phase, Some(DrivePhase::Start));
    }

    #[test]
    fn test_leg_sequence() {
        let mut ctrl = DriveCtrl::new(params());
        let target = Vector3::new(100.0, 100.0, 0.0);
        ctrl.begin_leg(target, 45f64.to_radians()).unwrap();
        assert!(matches!(
            ctrl.begin_leg(target, 0.0),
            Err(DriveCtrlError::LegInProgress)
        ));

        // Start issues the planned turn
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert!((turn_deg(&cmd) - 45.0).abs() < 1e-9);

        // Part way round, nothing new is sent
        let (cmd, report) = ctrl.proc(Some(&pose(0.0, 0.0, 20.0))).unwrap();
        assert_eq!(cmd, None);
        assert_eq!(report.phase, Some(DrivePhase::Turning));

        // Facing the target, advance
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 44.0))).unwrap();
        assert_eq!(cmd, Some(RobotCmd::Forward(None)));

        // On course, nothing new is sent
        let (cmd, report) = ctrl.proc(Some(&pose(50.0, 50.0, 45.0))).unwrap();
        assert_eq!(cmd, None);
        assert_eq!(report.phase, Some(DrivePhase::Advancing));

        // Arrived
        let (cmd, report) = ctrl.proc(Some(&pose(97.0, 97.0, 45.0))).unwrap();
        assert_eq!(cmd, Some(RobotCmd::Stop));
        assert_eq!(report.phase, Some(DrivePhase::Done));
        assert!(ctrl.is_idle());

        // Done is terminal
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert_eq!(cmd, None);

        // A new leg may now be loaded
        ctrl.begin_leg(Vector3::new(0.0, 0.0, 0.0), 0.0).unwrap();
        assert_eq!(ctrl.state().map(|s| s.phase), Some(DrivePhase::Start));
    }

    #[test]
    fn test_turn_overshoot_reissued() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(0.0, 100.0, 0.0), 90f64.to_radians())
            .unwrap();
        ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();

        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 80.0))).unwrap();
        assert_eq!(cmd, None);

        // Turned 10 deg too far
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 100.0))).unwrap();
        assert!((turn_deg(&cmd) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_turn_not_flooded() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(0.0, 100.0, 0.0), 90f64.to_radians())
            .unwrap();
        ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();

        // Noisy heading estimates while turning don't produce new commands
        for h in [10.0, 9.0, 25.0, 24.0, 40.0, 55.0, 70.0].iter() {
            let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, *h))).unwrap();
            assert_eq!(cmd, None);
        }
    }

    #[test]
    fn test_turn_grown_reissued() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(0.0, 100.0, 0.0), 30f64.to_radians())
            .unwrap();
        ctrl.proc(Some(&pose(0.0, 60.0, 0.0))).unwrap();

        // Target is really 90 deg away, well beyond the planned 30 deg turn
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert!((turn_deg(&cmd) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_turn_held_short_not_reissued() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(0.0, 100.0, 0.0), 85f64.to_radians())
            .unwrap();
        ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();

        // Robot finished its turn 5 deg short, the unchanged error is not worth a new command
        for _ in 0..20 {
            let (cmd, report) = ctrl.proc(Some(&pose(0.0, 0.0, 85.0))).unwrap();
            assert_eq!(cmd, None);
            assert_eq!(report.phase, Some(DrivePhase::Turning));
        }
    }

    #[test]
    fn test_reissue_turn_direction() {
        let deg = |d: f64| d.to_radians();

        // Short remaining turns take the short way
        assert!((reissue_turn(deg(10.0), deg(-20.0)) - deg(10.0)).abs() < 1e-12);
        assert!((reissue_turn(deg(-170.0), deg(30.0)) - deg(-170.0)).abs() < 1e-12);

        // Long remaining turns keep their direction
        assert!((reissue_turn(deg(70.0), deg(-250.0)) - deg(-290.0)).abs() < 1e-12);
        assert!((reissue_turn(deg(-135.0), deg(200.0)) - deg(225.0)).abs() < 1e-12);
        assert!((reissue_turn(deg(-100.0), deg(-200.0)) - deg(-100.0)).abs() < 1e-12);
    }

    /// Drive a leg planned around a blocking birdie, returning the lowest and highest headings
    /// seen in degrees.
    fn drive_around_blocker(sim: SimParams) -> (f64, f64) {
        use crate::collect::selector::{self, select_target};

        let robot = selector::test::robot();
        let r = robot.strike_radius();
        let at = |deg: f64, dist: f64| {
            let a = deg.to_radians();
            Vector3::new(dist * a.cos(), dist * a.sin(), 0.0)
        };

        // The blocker at 30 deg forces the right turn the long way round
        let birdies = [at(30.0, r - 1.0), at(70.0, 2.0 * r)];
        let start = pose(0.0, 0.0, 0.0);
        let target = select_target(&start, &birdies, &robot, None);
        assert_eq!(target.birdie, Some(1));
        assert!((target.angle_rad.to_degrees() + 290.0).abs() < 1e-6);

        let mut body = SimBody::new(start, sim);
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(target.position, target.angle_rad).unwrap();

        let (mut min, mut max) = (0f64, 0f64);
        let mut cycles = 0;
        while !ctrl.is_idle() {
            let (cmd, _) = ctrl.proc(Some(&body.pose)).unwrap();
            if let Some(c) = cmd {
                body.apply(&c);
            }
            body.step();

            let h = body.pose.heading_rad.to_degrees();
            min = min.min(h);
            max = max.max(h);

            cycles += 1;
            assert!(cycles < 5000, "Leg did not complete");
        }

        assert!(body.pose.distance_to(&target.position) < params().dist_tol);

        (min, max)
    }

    #[test]
    fn test_long_way_leg_clears_blocker() {
        // Blocker at +30 deg (-330 deg the long way), the grabber reaches 25 deg either side
        let slow = SimParams {
            turn_rate_rads: 5f64.to_radians(),
            ..SimParams::default()
        };

        for sim in [SimParams::default(), slow].iter() {
            let (min, max) = drive_around_blocker(*sim);
            assert!(max < 5.0, "heading reached {} deg", max);
            assert!(min > -305.0, "heading reached {} deg", min);
        }
    }

    #[test]
    fn test_straight_leg_bias_symmetric() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(200.0, 0.0, 0.0), 0.0).unwrap();
        ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert_eq!(cmd, Some(RobotCmd::Forward(None)));

        // Errors inside the tolerance on either side leave the robot alone
        let (cmd, _) = ctrl.proc(Some(&pose(50.0, 0.0, 2.0))).unwrap();
        assert_eq!(cmd, None);
        let (cmd, _) = ctrl.proc(Some(&pose(60.0, 0.0, -2.0))).unwrap();
        assert_eq!(cmd, None);

        // Outside the tolerance it is corrected
        let (cmd, _) = ctrl.proc(Some(&pose(70.0, 0.0, 5.0))).unwrap();
        match cmd {
            Some(RobotCmd::Forward(Some(b))) => assert!((b + 5.0).abs() < 1e-9),
            c => panic!("Expected a biased forward, got {:?}", c),
        }
    }

    #[test]
    fn test_advancing_bias() {
        let mut ctrl = DriveCtrl::new(params());
        ctrl.begin_leg(Vector3::new(200.0, 0.0, 0.0), 10f64.to_radians())
            .unwrap();
        ctrl.proc(Some(&pose(0.0, 0.0, -10.0))).unwrap();
        let (cmd, _) = ctrl.proc(Some(&pose(0.0, 0.0, 0.0))).unwrap();
        assert_eq!(cmd, Some(RobotCmd::Forward(None)));

        // Drifted 5 deg to the left, so the error is -5 deg
        let (cmd, _) = ctrl.proc(Some(&pose(50.0, 0.0, 5.0))).unwrap();
        match cmd {
            Some(RobotCmd::Forward(Some(b))) => assert!((b + 5.0).abs() < 1e-9),
            c => panic!("Expected a biased forward, got {:?}", c),
        }

        // Same error again is within the deadband
        let (cmd, _) = ctrl.proc(Some(&pose(60.0, 0.0, 5.2))).unwrap();
        assert_eq!(cmd, None);

        // A small error on the other side of the leg's turn direction is still corrected
        let (cmd, _) = ctrl.proc(Some(&pose(70.0, 0.0, 2.0))).unwrap();
        match cmd {
            Some(RobotCmd::Forward(Some(b))) => assert!((b + 2.0).abs() < 1e-9),
            c => panic!("Expected a biased forward, got {:?}", c),
        }
    }

    #[test]
    fn test_abort() {
        let mut ctrl = DriveCtrl::new(params());
        assert!(!ctrl.abort());
        ctrl.begin_leg(Vector3::new(200.0, 0.0, 0.0), 0.0).unwrap();
        assert!(ctrl.abort());
        assert!(ctrl.is_idle());
    }

    proptest! {
        #[test]
        fn prop_advancing_distance_non_increasing(
            tx in -400.0..400.0f64,
            ty in -400.0..400.0f64,
            heading in -3.1..3.1f64,
        ) {
            let target = Vector3::new(tx, ty, 0.0);
            prop_assume!(target.norm() > 20.0);

            let mut body = SimBody::new(
                RobotPose::new(Vector3::new(0.0, 0.0, 0.0), heading),
                SimParams::default(),
            );
            let mut ctrl = DriveCtrl::new(params());
            ctrl.begin_leg(target, wrap_pi(body.pose.bearing_to(&target))).unwrap();

            let mut last_dist = f64::INFINITY;
            let mut cycles = 0;
            while !ctrl.is_idle() {
                let (cmd, report) = ctrl.proc(Some(&body.pose)).unwrap();

                if report.phase == Some(DrivePhase::Advancing) {
                    prop_assert!(report.dist_to_target <= last_dist + 1e-9);
                    last_dist = report.dist_to_target;
                }

                if let Some(c) = cmd {
                    body.apply(&c);
                }
                body.step();

                cycles += 1;
                prop_assert!(cycles < 2000, "Leg did not complete");
            }

            prop_assert!(body.pose.distance_to(&target) < params().dist_tol);
        }
    }
}
