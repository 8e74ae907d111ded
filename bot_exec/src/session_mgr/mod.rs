//! # SessionMgr module
//!
//! This module implements the [`SessionMgr`] state machine, which sequences a training session.
//! The session moves through the following stages:
//!
//! - `StartupCourt` - Load the court calibration, or have the operator lock the court marker.
//! - `StartupRobot` - Wait for the robot to be seen and reset its grabber.
//! - `StartupVoice` - Start the voice worker.
//! - `Standby` - Idle, waiting on voice events.
//! - `ExplainSetup`/`ExplainAct` - Drive around a court boundary to show it to the player.
//! - `StartRound` - Pick the serve side for the round.
//! - `HitInstruct`/`HitAwaitPlayer`/`HitReact`/`HitAwaitStatic` - One hit: arm the detector,
//!   wait for the birdie to land, score it, wait for the scene to settle.
//! - `RoundEnd` - The round's hits are done.
//! - `CollectEvacuate`/`CollectPlan`/`CollectAct` - Clear the capture area, snapshot the birdies
//!   and drive the collection route, repeating until no birdies are left.
//! - `End` - Stop the robot and finish.
//!
//! Every cycle the markers are detected and drive control is processed before the stage is
//! stepped, after which at most one voice event is handled.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod collect;
mod events;
mod explain;
mod hit;
mod params;
mod startup;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::robot::RobotCmd;
use log::{debug, error, info, warn};
use nalgebra::Vector3;
use std::{
    collections::VecDeque,
    fmt,
    mem,
    path::PathBuf,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub use self::params::{EvacuateParams, HitParams, SessionMgrParams};

use crate::{
    collect::RouteLeg,
    court::{Bounds, Court, CourtError},
    drive_ctrl::{DriveCtrl, DriveCtrlError},
    geom::RobotPose,
    robot_client::{Actuator, ActuatorError},
    track::BirdieTrack,
    vision::Vision,
    voice::{ReplySignal, VoiceLink, VoiceSource},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time to wait for the voice worker to finish at shutdown.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The operator running the session, who confirms the startup gates.
pub trait Operator {
    /// Show the prompt and block until the operator answers. Returns false if the operator
    /// declined.
    fn confirm(&mut self, prompt: &str) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Session Manager
///
/// Owns the session state (pose, court, score) and the collaborators the session acts through.
pub struct SessionMgr {
    params: SessionMgrParams,

    options: SessionOptions,

    stage: Stage,

    /// Set once the end of session commands have been sent
    finished: bool,

    vision: Box<dyn Vision>,

    actuator: Box<dyn Actuator>,

    operator: Box<dyn Operator>,

    /// The voice source, until it is handed to the worker
    voice_source: Option<Box<dyn VoiceSource>>,

    voice_link: Option<VoiceLink>,

    voice_worker: Option<JoinHandle<()>>,

    drive: DriveCtrl,

    court: Option<Court>,

    /// Last known pose of the robot, may be stale if the robot isn't visible
    pose: Option<RobotPose>,

    robot_visible: bool,

    court_marker_visible: bool,

    /// Number of completed rounds
    round: u32,

    hits_this_round: u32,

    score: f64,

    /// The birdie of the current hit
    track: Option<BirdieTrack>,
}

/// Startup options for the session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Ignore any saved court calibration
    pub recalibrate: bool,

    /// Where the court calibration is saved, `None` to not persist it
    pub calibration_path: Option<PathBuf>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The stages of the session.
#[derive(Debug)]
pub enum Stage {
    StartupCourt { record_checked: bool },
    StartupRobot,
    StartupVoice,
    Standby,
    ExplainSetup {
        bounds: Bounds,
        signal: ReplySignal,
    },
    ExplainAct {
        points: VecDeque<Vector3<f64>>,
        signal: ReplySignal,
    },
    StartRound,
    HitInstruct,
    HitAwaitPlayer,
    /// Score the hit which landed at the given impact point
    HitReact(Vector3<f64>),
    HitAwaitStatic,
    RoundEnd,
    CollectEvacuate { leg_started: bool },
    CollectPlan(PlanStep),
    CollectAct(VecDeque<RouteLeg>),
    End,
}

/// Steps of collection planning.
#[derive(Debug)]
pub enum PlanStep {
    /// Waiting for the scene to settle with the robot out of view
    Settling { since: Instant },

    /// Waiting for the robot to come back, with the snapshot of birdies to collect
    Returning {
        since: Instant,
        birdies: Vec<Vector3<f64>>,
    },
}

/// Result of stepping the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not actuate the robot: {0}")]
    ActuatorError(#[from] ActuatorError),

    #[error("Error in DriveCtrl: {0}")]
    DriveCtrlError(#[from] DriveCtrlError),

    #[error("Court error: {0}")]
    CourtError(#[from] CourtError),

    #[error("The court has not been calibrated")]
    NoCourt,

    #[error("Could not start the voice worker: {0}")]
    VoiceWorkerSpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    pub fn new(
        params: SessionMgrParams,
        options: SessionOptions,
        vision: Box<dyn Vision>,
        actuator: Box<dyn Actuator>,
        operator: Box<dyn Operator>,
        voice_source: Option<Box<dyn VoiceSource>>,
    ) -> Self {
        Self {
            drive: DriveCtrl::new(params.drive.clone()),
            params,
            options,
            stage: Stage::StartupCourt {
                record_checked: false,
            },
            finished: false,
            vision,
            actuator,
            operator,
            voice_source,
            voice_link: None,
            voice_worker: None,
            court: None,
            pose: None,
            robot_visible: false,
            court_marker_visible: false,
            round: 0,
            hits_this_round: 0,
            score: 0.0,
            track: None,
        }
    }

    /// Step the session by one cycle.
    ///
    /// Errors are only returned if the session cannot safely continue, in which case it should
    /// be shut down.
    pub fn step(&mut self) -> Result<StepStatus, SessionError> {
        let mut status = StepStatus::Running;

        // Nothing which depends on perception runs if the detection failed, except ending
        let detected = self.proc_markers();
        if detected {
            self.proc_drive()?;
        }
        if detected || matches!(self.stage, Stage::End) {
            status = self.proc_stage()?;
        }

        self.proc_event();

        Ok(status)
    }

    /// Stop the voice worker, waiting a short time for it to finish.
    pub fn shutdown(mut self) {
        // Dropping our end of the link, and any signal held by the stage, lets a waiting worker
        // exit
        self.voice_link = None;
        self.stage = Stage::End;

        if let Some(handle) = self.voice_worker.take() {
            let deadline = Instant::now() + WORKER_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }

            if !handle.is_finished() {
                warn!("Voice worker is still waiting on the player, leaving it behind");
            } else if handle.join().is_err() {
                warn!("Voice worker panicked");
            }
        }

        info!("SessionMgr shut down");
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Number of completed rounds.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn court(&self) -> Option<&Court> {
        self.court.as_ref()
    }

    /// Detect the markers, updating the pose and, before it is locked, the court.
    ///
    /// Returns false if no detection was made this cycle.
    fn proc_markers(&mut self) -> bool {
        let frame = match self.vision.detect_markers() {
            Ok(f) => f,
            Err(e) => {
                warn!("Marker detection failed, skipping cycle: {}", e);
                return false;
            }
        };

        self.robot_visible = frame.robot_visible();
        self.court_marker_visible = frame.court_visible();

        if let Some(ref robot) = frame.robot {
            self.pose = Some(RobotPose::from(robot));
        }

        if let Some(ref corners) = frame.court_corners {
            match self.court {
                Some(ref c) if c.is_locked() => (),
                Some(ref mut c) => {
                    if let Err(e) = c.update_from_markers(corners, &self.params.court) {
                        warn!("Could not update the court preview: {}", e);
                    }
                }
                None => match Court::from_markers(corners, &self.params.court) {
                    Ok(c) => self.court = Some(c),
                    Err(e) => warn!("Could not build the court preview: {}", e),
                },
            }
        }

        true
    }

    /// Process drive control, sending any command it outputs.
    fn proc_drive(&mut self) -> Result<(), SessionError> {
        // A stale pose must not be driven on
        let pose = if self.robot_visible {
            self.pose.as_ref()
        } else {
            None
        };

        let (cmd, report) = self.drive.proc(pose)?;

        if let Some(phase) = report.phase {
            debug!(
                "DriveCtrl {}: {:.1} to target, bearing error {:.2} deg",
                phase,
                report.dist_to_target,
                report.bearing_err_rad.to_degrees()
            );
        }

        if let Some(cmd) = cmd {
            self.send(&cmd)?;
        }

        Ok(())
    }

    /// Run the action of the current stage.
    fn proc_stage(&mut self) -> Result<StepStatus, SessionError> {
        // Take the stage out so that it can be consumed by its action
        let stage = mem::replace(&mut self.stage, Stage::End);

        let next = match stage {
            Stage::StartupCourt { record_checked } => self.startup_court(record_checked)?,
            Stage::StartupRobot => self.startup_robot()?,
            Stage::StartupVoice => self.startup_voice()?,
            Stage::Standby => Stage::Standby,
            Stage::ExplainSetup { bounds, signal } => self.explain_setup(bounds, signal)?,
            Stage::ExplainAct { points, signal } => self.explain_act(points, signal)?,
            Stage::StartRound => self.start_round(),
            Stage::HitInstruct => self.hit_instruct()?,
            Stage::HitAwaitPlayer => self.hit_await_player()?,
            Stage::HitReact(impact) => self.hit_react(impact)?,
            Stage::HitAwaitStatic => self.hit_await_static()?,
            Stage::RoundEnd => self.round_end(),
            Stage::CollectEvacuate { leg_started } => self.collect_evacuate(leg_started)?,
            Stage::CollectPlan(step) => self.collect_plan(step)?,
            Stage::CollectAct(legs) => self.collect_act(legs)?,
            Stage::End => {
                self.end()?;
                self.stage = Stage::End;
                return Ok(StepStatus::Finished);
            }
        };

        self.set_stage(next);

        Ok(StepStatus::Running)
    }

    /// Set the stage, logging if it changed.
    fn set_stage(&mut self, stage: Stage) {
        if mem::discriminant(&stage) != mem::discriminant(&self.stage) {
            info!("SessionMgr stage change to: {}", stage);
        }

        self.stage = stage;
    }

    /// Stop any leg and send the end of session command.
    fn end(&mut self) -> Result<(), SessionError> {
        if self.finished {
            return Ok(());
        }

        if self.drive.abort() {
            self.send(&RobotCmd::Stop)?;
        }
        self.send(&RobotCmd::End)?;

        info!(
            "Session over with {} points after {} rounds",
            self.score, self.round
        );

        self.finished = true;

        Ok(())
    }

    /// Send a command to the robot.
    fn send(&mut self, cmd: &RobotCmd) -> Result<(), SessionError> {
        self.actuator.send(cmd).map_err(|e| {
            error!("Could not send {} to the robot: {}", cmd, e);
            SessionError::ActuatorError(e)
        })
    }

    /// Get the court, which stages after startup rely on.
    fn court_or_err(&self) -> Result<&Court, SessionError> {
        self.court.as_ref().ok_or(SessionError::NoCourt)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StartupCourt { .. } => "STARTUP_COURT",
            Stage::StartupRobot => "STARTUP_ROBOT",
            Stage::StartupVoice => "STARTUP_VOICE",
            Stage::Standby => "STANDBY",
            Stage::ExplainSetup { .. } => "EXPLAIN_SETUP",
            Stage::ExplainAct { .. } => "EXPLAIN_ACT",
            Stage::StartRound => "START_ROUND",
            Stage::HitInstruct => "HIT_INSTRUCT",
            Stage::HitAwaitPlayer => "HIT_AWAITPLAYER",
            Stage::HitReact(_) => "HIT_REACT",
            Stage::HitAwaitStatic => "HIT_AWAITSTATIC",
            Stage::RoundEnd => "ROUND_END",
            Stage::CollectEvacuate { .. } => "COLLECT_EVACUATE",
            Stage::CollectPlan(_) => "COLLECT_PLAN",
            Stage::CollectAct(_) => "COLLECT_ACT",
            Stage::End => "END",
        };

        write!(f, "{}", name)
    }
}
