//! # Geometry primitives
//!
//! Positions are `nalgebra::Vector3<f64>` in the overhead camera frame. Only the x-y plane is used
//! for planning, `z` is the depth from the camera. Angles are counter-clockwise positive.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::RobotMarker;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The pose of the robot, as seen by the overhead camera.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotPose {
    /// Position of the robot centre
    pub position: Vector3<f64>,

    /// Heading of the robot in radians. This is not normalised.
    pub heading_rad: f64,
}

/// Physical parameters of the robot.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RobotParams {
    /// Distance from the robot centre to the grabber tip
    pub grabber_offset: f64,

    /// Angular reach of the grabber either side of the heading
    pub grabber_half_angle_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotPose {
    pub fn new(position: Vector3<f64>, heading_rad: f64) -> Self {
        Self {
            position,
            heading_rad,
        }
    }

    /// Position of the grabber tip, `offset` ahead of the centre along the heading.
    pub fn grabber_tip(&self, offset: f64) -> Vector3<f64> {
        self.ahead(offset)
    }

    /// The point `dist` straight ahead of the robot, at the same depth.
    pub fn ahead(&self, dist: f64) -> Vector3<f64> {
        Vector3::new(
            self.position.x + dist * self.heading_rad.cos(),
            self.position.y + dist * self.heading_rad.sin(),
            self.position.z,
        )
    }

    /// Raw bearing to the target, i.e. the direction of the target minus the current heading.
    ///
    /// The result is not range-reduced.
    pub fn bearing_to(&self, target: &Vector3<f64>) -> f64 {
        let d = target - self.position;
        d.y.atan2(d.x) - self.heading_rad
    }

    /// Planar distance from the robot centre to the target.
    pub fn distance_to(&self, target: &Vector3<f64>) -> f64 {
        planar_distance(&self.position, target)
    }
}

impl From<&RobotMarker> for RobotPose {
    fn from(marker: &RobotMarker) -> Self {
        Self::new(vec3(marker.position), marker.heading_rad)
    }
}

impl RobotParams {
    /// Radius within which a birdie could be struck by the grabber while turning in place.
    pub fn strike_radius(&self) -> f64 {
        self.grabber_offset
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Distance between two points in the x-y plane.
pub fn planar_distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Convert a wire position into a vector.
pub fn vec3(p: [f64; 3]) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

/// A birdie is collected once it is closer to the robot centre than the grabber tip.
pub fn has_collected(pose: &RobotPose, birdie: &Vector3<f64>, params: &RobotParams) -> bool {
    let tip = pose.grabber_tip(params.grabber_offset);
    pose.distance_to(birdie) < planar_distance(&pose.position, &tip)
}
