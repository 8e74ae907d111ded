//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the command vocabularies
//! exchanged with the robot, vision and voice collaborators, and the network wrapper used to
//! carry them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (robot and vision)
pub mod eqpt;

/// Network module
pub mod net;

/// Events raised by the voice interaction worker
pub mod voice;
