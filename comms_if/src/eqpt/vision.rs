//! # Vision Equipment Communications Module
//!
//! Requests and replies exchanged with the overhead depth camera's vision server. All positions
//! are given in the camera frame as `[x, y, z]`, where `z` is the depth from the camera.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position and heading of the robot's marker.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RobotMarker {
    /// Marker centre position
    pub position: [f64; 3],

    /// Heading of the robot in radians, counter-clockwise positive
    pub heading_rad: f64,
}

/// The result of a single marker detection pass.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MarkerFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The robot marker, if it was visible in this frame
    pub robot: Option<RobotMarker>,

    /// The four court calibration marker corners (A, B, C, D), if the marker was visible.
    pub court_corners: Option<[[f64; 3]; 4]>,
}

/// A single observation of a birdie blob.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BirdieObs {
    /// Centroid of the blob
    pub position: [f64; 3],

    /// Orientation of the blob's major axis in radians
    pub orientation_rad: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Commands that can be sent to the vision server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum VisionCmd {
    /// Run marker detection on the latest frame
    DetectMarkers,

    /// Ask the operator to confirm the court marker and return its locked corners
    LockCourt,

    /// Capture the background frame used for hit detection
    CaptureHitBackground,

    /// Detect the birdie in flight or on the ground against the hit background
    DetectHitBirdie,

    /// Detect all birdies currently resting on the court
    DetectCollectionBirdies,

    /// Query whether the scene has stopped changing
    SceneSettled,
}

/// Replies that can be sent by the vision server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum VisionRep {
    /// Result of a marker detection
    Markers(MarkerFrame),

    /// The locked court marker corners (A, B, C, D)
    CourtLocked([[f64; 3]; 4]),

    /// The command was executed
    Ack,

    /// The birdie detected against the hit background, if any
    HitBirdie(Option<BirdieObs>),

    /// All birdies detected on the court
    CollectionBirdies(Vec<BirdieObs>),

    /// Whether the scene has settled
    SceneSettled(bool),

    /// An error occured in the server
    Error(String),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl MarkerFrame {
    /// True if the robot marker was visible
    pub fn robot_visible(&self) -> bool {
        self.robot.is_some()
    }

    /// True if the court calibration marker was visible
    pub fn court_visible(&self) -> bool {
        self.court_corners.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_visibility_flags() {
        let mut frame = MarkerFrame {
            timestamp: Utc::now(),
            robot: None,
            court_corners: Some([[0.0; 3]; 4]),
        };
        assert!(!frame.robot_visible());
        assert!(frame.court_visible());

        frame.robot = Some(RobotMarker {
            position: [1.0, 2.0, 3.0],
            heading_rad: 0.5,
        });
        frame.court_corners = None;
        assert!(frame.robot_visible());
        assert!(!frame.court_visible());
    }

    #[test]
    fn test_rep_json() {
        let rep = VisionRep::HitBirdie(Some(BirdieObs {
            position: [1.0, 2.0, 3.0],
            orientation_rad: 0.25,
        }));
        let s = serde_json::to_string(&rep).unwrap();
        assert_eq!(serde_json::from_str::<VisionRep>(&s).unwrap(), rep);
    }
}
