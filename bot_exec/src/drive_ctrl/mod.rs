//! # Drive control module
//!
//! Drive control executes one leg at a time: a turn in place to face the target followed by a
//! straight advance onto it. The robot only reports where it is through the overhead camera, so
//! each cycle the bearing and distance to the target are recomputed from the latest pose.
//!
//! While turning, the turn command is only re-issued if the robot overshoots or the error grows,
//! so that noisy heading estimates don't flood the robot with commands. While advancing, heading
//! drift is corrected with a heading bias on the forward command rather than stopping to turn
//! again.
//!
//! A leg that never converges stays in the advancing phase. Timeouts are the responsibility of
//! the caller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::DriveParams;
pub use state::*;
