//! # BirdieBot library.
//!
//! This library holds the planning, control and session sequencing modules of the badminton
//! training partner robot, so that they can be shared between the executable, the benchmarks and
//! the tests.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - robot pose and planar helpers
pub mod geom;

/// Court model - reference points, containment and boundary tours
pub mod court;

/// Birdie tracking - impact and rest detection for a single birdie
pub mod track;

/// Collection planning - target selection and route assembly
pub mod collect;

/// Drive control - executes one turn-then-advance leg at a time
pub mod drive_ctrl;

/// Session manager - the top level training session state machine
pub mod session_mgr;

/// Vision interface - the detections the session manager consumes
pub mod vision;

/// Vision client - requests detections from the vision server
pub mod vision_client;

/// Robot client - pushes command lines to the robot
pub mod robot_client;

/// Voice interaction - event plumbing and the voice worker
pub mod voice;

/// Simulated robot and vision collaborators
#[cfg(any(test, feature = "sim"))]
pub mod sim;
