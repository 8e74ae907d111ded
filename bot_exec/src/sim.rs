//! # Simulation
//!
//! Simulated stand-ins for the robot, the overhead camera, the operator and the player. A
//! [`SimWorld`] holds the shared state, [`SimRobot`] and [`SimVision`] act on it through the same
//! interfaces as the real clients, so the session manager can be run end to end without hardware.
//!
//! The world advances one physics step each time the markers are detected, matching the once per
//! cycle detection of the session manager.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use comms_if::eqpt::{
    robot::RobotCmd,
    vision::{BirdieObs, MarkerFrame, RobotMarker},
};
use log::{debug, info, trace};
use nalgebra::Vector3;
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::{Arc, Mutex},
};

use crate::{
    geom::{has_collected, vec3, RobotParams, RobotPose},
    robot_client::{Actuator, ActuatorError},
    session_mgr::Operator,
    vision::{Vision, VisionError},
    voice::{Intent, VoiceSource},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Physical parameters of the simulated robot.
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Rate the robot turns at
    pub turn_rate_rads: f64,

    /// Forward speed in world units per second
    pub speed: f64,

    /// Simulation step length in seconds
    pub dt: f64,
}

/// Kinematic model of the robot, executing one command at a time.
#[derive(Debug, Clone)]
pub struct SimBody {
    pub pose: RobotPose,

    params: SimParams,

    /// Turn still to be made in place
    pending_turn_rad: f64,

    /// Heading correction still to be made while advancing
    pending_bias_rad: f64,

    moving: bool,
}

/// A birdie in flight, sampled once per detection.
#[derive(Debug, Clone)]
struct SimHit {
    samples: VecDeque<[f64; 3]>,
    landed: bool,
}

/// Shared state of the simulated world.
pub struct SimWorld {
    pub body: SimBody,

    pub robot: RobotParams,

    /// False while the robot has spun itself out of the capture area
    pub robot_visible: bool,

    pub court_corners: [[f64; 3]; 4],

    /// True until the operator has locked the court and removed the marker
    pub court_marker_visible: bool,

    /// Birdies resting on the court
    pub birdies: Vec<Vector3<f64>>,

    /// Birdie trajectories for the upcoming hits, one per armed hit
    pub hits: VecDeque<Vec<[f64; 3]>>,

    current_hit: Option<SimHit>,

    pub scene_settled: bool,

    /// Number of upcoming marker detections which will time out
    pub vision_dropouts: u32,

    /// If true every command sent to the robot fails
    pub link_down: bool,

    /// Every command the robot has received
    pub commands: Vec<RobotCmd>,
}

pub struct SimRobot {
    world: Rc<RefCell<SimWorld>>,
}

pub struct SimVision {
    world: Rc<RefCell<SimWorld>>,
}

/// Operator who confirms every prompt.
#[derive(Debug, Default)]
pub struct AutoOperator {
    pub prompts: Vec<String>,
}

/// A player reading from a script. Once the script runs out the player ends the session.
pub struct ScriptedVoice {
    intents: VecDeque<Option<Intent>>,
    said: Arc<Mutex<Vec<String>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            turn_rate_rads: 90f64.to_radians(),
            speed: 60.0,
            dt: 0.1,
        }
    }
}

impl SimBody {
    pub fn new(pose: RobotPose, params: SimParams) -> Self {
        Self {
            pose,
            params,
            pending_turn_rad: 0.0,
            pending_bias_rad: 0.0,
            moving: false,
        }
    }

    /// Start executing a command.
    pub fn apply(&mut self, cmd: &RobotCmd) {
        match cmd {
            RobotCmd::Turn(deg) => {
                self.pending_turn_rad = deg.to_radians();
                self.pending_bias_rad = 0.0;
                self.moving = false;
            }
            RobotCmd::Forward(bias) => {
                self.pending_bias_rad = bias.map(f64::to_radians).unwrap_or(0.0);
                self.moving = true;
            }
            RobotCmd::Stop | RobotCmd::End => {
                self.pending_turn_rad = 0.0;
                self.pending_bias_rad = 0.0;
                self.moving = false;
            }
            _ => (),
        }
    }

    /// Advance the body by one step.
    pub fn step(&mut self) {
        let max_turn = self.params.turn_rate_rads * self.params.dt;

        let turn = self.pending_turn_rad.clamp(-max_turn, max_turn);
        self.pose.heading_rad += turn;
        self.pending_turn_rad -= turn;

        if self.moving {
            let bias = self.pending_bias_rad.clamp(-max_turn, max_turn);
            self.pose.heading_rad += bias;
            self.pending_bias_rad -= bias;

            let dist = self.params.speed * self.params.dt;
            self.pose.position += Vector3::new(
                self.pose.heading_rad.cos() * dist,
                self.pose.heading_rad.sin() * dist,
                0.0,
            );
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving || self.pending_turn_rad != 0.0
    }
}

impl SimWorld {
    pub fn new(court_corners: [[f64; 3]; 4], pose: RobotPose, robot: RobotParams) -> Self {
        Self {
            body: SimBody::new(pose, SimParams::default()),
            robot,
            robot_visible: true,
            court_corners,
            court_marker_visible: true,
            birdies: Vec::new(),
            hits: VecDeque::new(),
            current_hit: None,
            scene_settled: true,
            vision_dropouts: 0,
            link_down: false,
            commands: Vec::new(),
        }
    }

    /// The world the executable runs with `--sim`, matching the default parameters.
    pub fn demo(robot: RobotParams) -> Self {
        let corners = [
            [220.0, 120.0, 2000.0],
            [220.0, 140.0, 2000.0],
            [200.0, 140.0, 2000.0],
            [200.0, 120.0, 2000.0],
        ];
        let mut world = Self::new(
            corners,
            RobotPose::new(Vector3::new(700.0, 320.0, 0.0), std::f64::consts::PI),
            robot,
        );

        for land in [[300.0, 300.0], [450.0, 250.0], [260.0, 480.0], [700.0, 200.0]].iter() {
            world.hits.push_back(Self::falling_hit(*land, 2000.0));
        }

        world
    }

    /// A birdie trajectory dropping from above onto the court plane at `land`.
    pub fn falling_hit(land: [f64; 2], court_depth: f64) -> Vec<[f64; 3]> {
        vec![
            [land[0] - 40.0, land[1], court_depth - 900.0],
            [land[0] - 20.0, land[1], court_depth - 450.0],
            [land[0], land[1], court_depth],
        ]
    }

    /// Advance the world one step.
    pub fn step(&mut self) {
        self.body.step();

        if self.robot_visible {
            let pose = self.body.pose;
            let robot = self.robot;
            let before = self.birdies.len();
            self.birdies.retain(|b| !has_collected(&pose, b, &robot));

            if self.birdies.len() < before {
                debug!(
                    "Sim robot collected {} birdie(s), {} left",
                    before - self.birdies.len(),
                    self.birdies.len()
                );
            }
        }
    }

    /// Next sample of the birdie in flight. The last sample repeats once the birdie has landed.
    fn next_hit_sample(&mut self) -> Option<[f64; 3]> {
        let hit = self.current_hit.as_mut()?;

        let sample = if hit.samples.len() > 1 {
            hit.samples.pop_front()
        } else {
            hit.samples.front().copied()
        }?;

        if hit.samples.len() == 1 && !hit.landed {
            hit.landed = true;
            if let Some(rest) = hit.samples.front() {
                self.birdies.push(vec3(*rest));
            }
        }

        Some(sample)
    }

    fn markers(&self) -> MarkerFrame {
        MarkerFrame {
            timestamp: Utc::now(),
            robot: if self.robot_visible {
                Some(RobotMarker {
                    position: [
                        self.body.pose.position.x,
                        self.body.pose.position.y,
                        self.body.pose.position.z,
                    ],
                    heading_rad: self.body.pose.heading_rad,
                })
            } else {
                None
            },
            court_corners: if self.court_marker_visible {
                Some(self.court_corners)
            } else {
                None
            },
        }
    }
}

impl SimRobot {
    pub fn new(world: Rc<RefCell<SimWorld>>) -> Self {
        Self { world }
    }
}

impl Actuator for SimRobot {
    fn send(&mut self, cmd: &RobotCmd) -> Result<(), ActuatorError> {
        let mut world = self.world.borrow_mut();

        if world.link_down {
            return Err(ActuatorError::LinkDown);
        }

        trace!("Sim robot received: {}", cmd);
        world.commands.push(cmd.clone());

        match cmd {
            // Spinning out clears the capture area, spinning back returns to where it was
            RobotCmd::Wheel(ticks) => world.robot_visible = *ticks <= 0,
            c => world.body.apply(c),
        }

        Ok(())
    }
}

impl SimVision {
    pub fn new(world: Rc<RefCell<SimWorld>>) -> Self {
        Self { world }
    }
}

impl Vision for SimVision {
    fn detect_markers(&mut self) -> Result<MarkerFrame, VisionError> {
        let mut world = self.world.borrow_mut();

        if world.vision_dropouts > 0 {
            world.vision_dropouts -= 1;
            return Err(VisionError::Timeout);
        }

        world.step();
        Ok(world.markers())
    }

    fn lock_court(&mut self) -> Result<[[f64; 3]; 4], VisionError> {
        let mut world = self.world.borrow_mut();

        // The operator takes the marker away once the court is locked
        world.court_marker_visible = false;
        Ok(world.court_corners)
    }

    fn capture_hit_background(&mut self) -> Result<(), VisionError> {
        let mut world = self.world.borrow_mut();

        world.current_hit = world.hits.pop_front().map(|samples| SimHit {
            samples: samples.into_iter().collect(),
            landed: false,
        });

        if world.current_hit.is_none() {
            info!("Sim has no more hits queued");
        }

        Ok(())
    }

    fn detect_hit_birdie(&mut self) -> Result<Option<BirdieObs>, VisionError> {
        Ok(self
            .world
            .borrow_mut()
            .next_hit_sample()
            .map(|position| BirdieObs {
                position,
                orientation_rad: 0.0,
            }))
    }

    fn detect_collection_birdies(&mut self) -> Result<Vec<BirdieObs>, VisionError> {
        Ok(self
            .world
            .borrow()
            .birdies
            .iter()
            .map(|b| BirdieObs {
                position: [b.x, b.y, b.z],
                orientation_rad: 0.0,
            })
            .collect())
    }

    fn scene_settled(&mut self) -> Result<bool, VisionError> {
        Ok(self.world.borrow().scene_settled)
    }
}

impl Operator for AutoOperator {
    fn confirm(&mut self, prompt: &str) -> bool {
        info!("Sim operator confirming: {}", prompt);
        self.prompts.push(String::from(prompt));
        true
    }
}

impl ScriptedVoice {
    /// Create the voice along with a handle to everything it says.
    pub fn new(intents: Vec<Option<Intent>>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let said = Arc::new(Mutex::new(Vec::new()));

        (
            Self {
                intents: intents.into_iter().collect(),
                said: said.clone(),
            },
            said,
        )
    }
}

impl VoiceSource for ScriptedVoice {
    fn say(&mut self, text: &str) {
        info!("Sim voice: {}", text);
        if let Ok(mut said) = self.said.lock() {
            said.push(String::from(text));
        }
    }

    fn listen(&mut self) -> Option<Intent> {
        self.intents.pop_front().unwrap_or(Some(Intent::End))
    }
}
