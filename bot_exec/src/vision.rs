//! # Vision interface
//!
//! The detections the session manager consumes from the overhead camera. The real implementation
//! is the [`crate::vision_client::VisionClient`], the simulated one lives in `sim`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::{BirdieObs, MarkerFrame};

use crate::vision_client::VisionClientError;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of detections from the overhead camera.
pub trait Vision {
    /// Detect the robot and court markers in the latest frame.
    fn detect_markers(&mut self) -> Result<MarkerFrame, VisionError>;

    /// Lock the court marker corners once the operator has aligned the marker.
    fn lock_court(&mut self) -> Result<[[f64; 3]; 4], VisionError>;

    /// Capture the background used to detect the next hit.
    fn capture_hit_background(&mut self) -> Result<(), VisionError>;

    /// Detect the birdie of the current hit, if it is in view.
    fn detect_hit_birdie(&mut self) -> Result<Option<BirdieObs>, VisionError>;

    /// Detect every birdie resting on the court.
    fn detect_collection_birdies(&mut self) -> Result<Vec<BirdieObs>, VisionError>;

    /// True if nothing in the scene is moving.
    fn scene_settled(&mut self) -> Result<bool, VisionError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("No response from the vision server within the timeout")]
    Timeout,

    #[error("Vision server error: {0}")]
    ServerError(String),

    #[error("Vision client error: {0}")]
    ClientError(#[from] VisionClientError),
}
