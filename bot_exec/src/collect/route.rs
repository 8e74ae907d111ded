//! # Route assembler
//!
//! Chains target selections into the ordered legs of a collection sweep, simulating the robot
//! arriving at each target in turn.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use nalgebra::Vector3;
use serde::Serialize;

use super::selector::{select_target, ClampRect};
use crate::geom::{RobotParams, RobotPose};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One turn-then-advance unit of motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteLeg {
    /// Where the leg ends
    pub target: Vector3<f64>,

    /// Turn to make before advancing
    pub angle_rad: f64,

    /// True if this leg is a straight ahead move rather than a birdie pick up
    pub fallback: bool,
}

/// A planned collection route.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Route {
    pub legs: Vec<RouteLeg>,

    /// True if planning stopped at the leg limit with birdies remaining
    pub truncated: bool,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Plan the route collecting all the given birdies, starting from `start`.
///
/// After each selection the simulated robot sits on the target, with the turn added to its
/// heading. Birdie legs remove that birdie from the remaining set, fallback legs remove nothing.
/// Planning stops once no birdies remain, or after `max_legs` legs.
pub fn plan_route(
    start: &RobotPose,
    birdies: &[Vector3<f64>],
    robot: &RobotParams,
    clamp_rect: Option<&ClampRect>,
    max_legs: usize,
) -> Route {
    let mut pose = *start;
    let mut remaining: Vec<Vector3<f64>> = birdies.to_vec();
    let mut route = Route::default();

    while !remaining.is_empty() {
        if route.legs.len() >= max_legs {
            warn!(
                "Route truncated at {} legs with {} birdies remaining",
                max_legs,
                remaining.len()
            );
            route.truncated = true;
            break;
        }

        let target = select_target(&pose, &remaining, robot, clamp_rect);

        if let Some(i) = target.birdie {
            remaining.remove(i);
        }

        route.legs.push(RouteLeg {
            target: target.position,
            angle_rad: target.angle_rad,
            fallback: target.birdie.is_none(),
        });

        pose = RobotPose::new(target.position, pose.heading_rad + target.angle_rad);
    }

    debug!(
        "Planned route of {} legs for {} birdies",
        route.legs.len(),
        birdies.len()
    );

    route
}
