//! Main BirdieBot executable entry point.
//!
//! # Architecture
//!
//! The executable runs the training session at a fixed cycle rate:
//!
//!     - Initialise the session, logging and parameters
//!     - Connect to the vision server and the robot, or build the simulated world
//!     - Main loop:
//!         - Step the session manager (markers, drive control, stage, voice events)
//!         - Sleep for the rest of the cycle
//!     - Shut down the voice worker and the session

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod console;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use bot_lib::{
    robot_client::{Actuator, RobotClient},
    session_mgr::{Operator, SessionMgr, SessionMgrParams, SessionOptions, StepStatus},
    vision::Vision,
    vision_client::VisionClient,
    voice::VoiceSource,
};
use comms_if::net::NetParams;
use console::{ConsoleOperator, ConsoleVoice};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "bot_exec", about = "BirdieBot badminton training partner")]
struct Opts {
    /// Ignore the saved court calibration and lock the court again
    #[structopt(long)]
    recalibrate: bool,

    /// Run against the simulated robot and camera
    #[structopt(long)]
    sim: bool,

    /// Log everything, down to individual drive control cycles
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("bot_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opts.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("BirdieBot Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: SessionMgrParams =
        util::params::load("session_mgr.toml").wrap_err("Could not load session params")?;

    let options = SessionOptions {
        recalibrate: opts.recalibrate,
        calibration_path: Some(
            host::get_sw_root()
                .wrap_err("Could not find the software root")?
                .join(&params.court.calibration_path),
        ),
    };

    info!("Parameters loaded");

    // ---- INITIALISE COLLABORATORS ----

    let (vision, actuator) = if opts.sim {
        sim_collaborators(&params)?
    } else {
        net_collaborators()?
    };

    let operator: Box<dyn Operator> =
        Box::new(ConsoleOperator::new().wrap_err("Failed to open the console")?);
    let voice: Option<Box<dyn VoiceSource>> = Some(Box::new(ConsoleVoice::default()));

    let mut session_mgr = SessionMgr::new(params, options, vision, actuator, operator, voice);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let result = loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        match session_mgr.step() {
            Ok(StepStatus::Running) => (),
            Ok(StepStatus::Finished) => break Ok(()),
            Err(e) => break Err(e),
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }
    };

    // ---- SHUTDOWN ----

    session_mgr.shutdown();
    session.exit();

    result.wrap_err("The session was aborted")
}

/// Connect to the vision server and the robot.
fn net_collaborators() -> Result<(Box<dyn Vision>, Box<dyn Actuator>), Report> {
    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let vision = VisionClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the VisionClient")?;
    info!("VisionClient initialised");

    let robot = RobotClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the RobotClient")?;
    info!("RobotClient initialised");

    Ok((Box::new(vision), Box::new(robot)))
}

/// Build the simulated world.
#[cfg(feature = "sim")]
fn sim_collaborators(
    params: &SessionMgrParams,
) -> Result<(Box<dyn Vision>, Box<dyn Actuator>), Report> {
    use bot_lib::sim::{SimRobot, SimVision, SimWorld};
    use std::{cell::RefCell, rc::Rc};

    info!("Running against the simulated world");

    let world = Rc::new(RefCell::new(SimWorld::demo(params.robot)));

    Ok((
        Box::new(SimVision::new(world.clone())),
        Box::new(SimRobot::new(world)),
    ))
}

#[cfg(not(feature = "sim"))]
fn sim_collaborators(
    _params: &SessionMgrParams,
) -> Result<(Box<dyn Vision>, Box<dyn Actuator>), Report> {
    Err(color_eyre::eyre::eyre!(
        "Simulation requested but bot_exec was built without the `sim` feature"
    ))
}
