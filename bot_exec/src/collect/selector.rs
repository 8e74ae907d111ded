//! # Collection target selector
//!
//! Given the robot pose and the birdies still on the court, choose the next target and the
//! in-place turn needed to face it.
//!
//! A birdie within the strike radius of the robot centre is at risk: turning towards it, or past
//! it, would sweep the grabber through it. The at-risk birdie with the smallest left angle blocks
//! all left turns beyond it, and the one with the smallest right angle blocks right turns. A turn
//! is feasible only if it stops short of the block by at least the grabber half-angle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::Vector3;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::f64::consts::TAU;
use util::maths::{clamp, rem_euclid};

use crate::geom::{RobotParams, RobotPose};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The next position to drive to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollectionTarget {
    /// The target position
    pub position: Vector3<f64>,

    /// Signed angle to turn in place before advancing, counter-clockwise positive
    pub angle_rad: f64,

    /// Index of the targeted birdie, `None` for the straight ahead fallback
    pub birdie: Option<usize>,
}

/// A rectangle in the x-y plane targets are clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampRect {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

/// A birdie as seen from the robot.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    distance: f64,
    bearing: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ClampRect {
    /// Clamp the x and y of the point into the rectangle, leaving z untouched.
    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            clamp(&p.x, &self.min[0], &self.max[0]),
            clamp(&p.y, &self.min[1], &self.max[1]),
            p.z,
        )
    }
}

impl Candidate {
    /// Ordering key: distance, then absolute bearing, then index.
    fn key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>, usize) {
        (
            OrderedFloat(self.distance),
            OrderedFloat(self.bearing.abs()),
            self.index,
        )
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Select the next collection target.
///
/// - With no birdie at risk the closest birdie is targeted directly using its raw bearing.
/// - Otherwise birdies are scanned closest first, keeping the first with a feasible turn. A later
///   birdie only replaces it if its turn is strictly smaller.
/// - If every birdie is at risk, or no turn is feasible, the target is a point two strike radii
///   straight ahead with no turn.
///
/// The chosen position is clamped into `clamp_rect` if given, the choice itself is unaffected.
pub fn select_target(
    pose: &RobotPose,
    birdies: &[Vector3<f64>],
    robot: &RobotParams,
    clamp_rect: Option<&ClampRect>,
) -> CollectionTarget {
    let target = select_unclamped(pose, birdies, robot);

    match clamp_rect {
        Some(r) => CollectionTarget {
            position: r.apply(&target.position),
            ..target
        },
        None => target,
    }
}

fn select_unclamped(
    pose: &RobotPose,
    birdies: &[Vector3<f64>],
    robot: &RobotParams,
) -> CollectionTarget {
    let strike_radius = robot.strike_radius();
    let half_angle = robot.grabber_half_angle_rad;

    let candidates: Vec<Candidate> = birdies
        .iter()
        .enumerate()
        .map(|(index, b)| Candidate {
            index,
            distance: pose.distance_to(b),
            bearing: pose.bearing_to(b),
        })
        .collect();

    let at_risk: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.distance <= strike_radius)
        .collect();

    // Nothing can be struck, go straight for the closest birdie
    if at_risk.is_empty() {
        return match candidates.iter().min_by_key(|c| c.key()) {
            Some(c) => CollectionTarget {
                position: birdies[c.index],
                angle_rad: c.bearing,
                birdie: Some(c.index),
            },
            None => fallback(pose, strike_radius),
        };
    }

    if at_risk.len() == candidates.len() {
        trace!("All {} birdies at risk, moving ahead", candidates.len());
        return fallback(pose, strike_radius);
    }

    // Left angles are in [0, 2pi), right angles in (-2pi, 0]
    let left_block = at_risk
        .iter()
        .map(|c| left_angle(c.bearing))
        .fold(f64::INFINITY, f64::min);
    let right_block = at_risk
        .iter()
        .map(|c| right_angle(c.bearing))
        .fold(f64::NEG_INFINITY, f64::max);

    let mut sorted = candidates.clone();
    sorted.sort_by_key(|c| c.key());

    let mut best: Option<(usize, f64)> = None;
    for c in sorted.iter() {
        let angle = match feasible_turn(c.bearing, left_block, right_block, half_angle) {
            Some(a) => a,
            None => continue,
        };

        match best {
            Some((_, best_angle)) if angle.abs() >= best_angle.abs() => (),
            _ => best = Some((c.index, angle)),
        }
    }

    match best {
        Some((index, angle_rad)) => CollectionTarget {
            position: birdies[index],
            angle_rad,
            birdie: Some(index),
        },
        None => {
            trace!(
                "No feasible turn (left block {:.3}, right block {:.3}), moving ahead",
                left_block,
                right_block
            );
            fallback(pose, strike_radius)
        }
    }
}

/// The smaller feasible turn towards a birdie at the given bearing, if either direction is clear.
fn feasible_turn(bearing: f64, left_block: f64, right_block: f64, half_angle: f64) -> Option<f64> {
    let left = left_angle(bearing);
    let right = right_angle(bearing);

    let left_ok = left < left_block - half_angle;
    let right_ok = right > right_block + half_angle;

    match (left_ok, right_ok) {
        (true, true) if right.abs() < left.abs() => Some(right),
        (true, _) => Some(left),
        (false, true) => Some(right),
        (false, false) => None,
    }
}

/// The bearing as a left turn, in `[0, 2pi)`.
fn left_angle(bearing: f64) -> f64 {
    rem_euclid(bearing, TAU)
}

/// The bearing as a right turn, in `(-2pi, 0]`. Dead ahead is `0` on both sides.
fn right_angle(bearing: f64) -> f64 {
    -rem_euclid(-bearing, TAU)
}

fn fallback(pose: &RobotPose, strike_radius: f64) -> CollectionTarget {
    CollectionTarget {
        position: pose.ahead(2.0 * strike_radius),
        angle_rad: 0.0,
        birdie: None,
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    const R: f64 = 60.0;

    pub(crate) fn robot() -> RobotParams {
        RobotParams {
            grabber_offset: R,
            grabber_half_angle_rad: 25f64.to_radians(),
        }
    }

    fn origin() -> RobotPose {
        RobotPose::new(Vector3::new(0.0, 0.0, 0.0), 0.0)
    }

    /// A birdie at the given bearing in degrees and distance from the origin.
    fn at(deg: f64, dist: f64) -> Vector3<f64> {
        let a = deg.to_radians();
        Vector3::new(dist * a.cos(), dist * a.sin(), 0.0)
    }

    fn assert_deg(rad: f64, deg: f64) {
        assert!(
            (rad.to_degrees() - deg).abs() < 1e-6,
            "expected {} deg, got {} deg",
            deg,
            rad.to_degrees()
        );
    }

    fn assert_fallback(t: &CollectionTarget, pose: &RobotPose) {
        assert_eq!(t.birdie, None);
        assert_eq!(t.angle_rad, 0.0);
        assert!((t.position - pose.ahead(2.0 * R)).norm() < 1e-9);
    }

    #[test]
    fn test_single() {
        let t = select_target(&origin(), &[at(45.0, 3.0 * R)], &robot(), None);
        assert_eq!(t.birdie, Some(0));
        assert_deg(t.angle_rad, 45.0);
    }

    #[test]
    fn test_closest_first() {
        let birdies = [at(10.0, 5.0 * R), at(-120.0, 2.0 * R), at(90.0, 3.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_eq!(t.birdie, Some(1));
        // Raw bearing is used when nothing is at risk
        assert_deg(t.angle_rad, -120.0);
    }

    #[test]
    fn test_tie_broken_by_bearing() {
        let birdies = [Vector3::new(0.0, -2.0 * R, 0.0), Vector3::new(2.0 * R, 0.0, 0.0)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_eq!(t.birdie, Some(1));
    }

    #[test]
    fn test_blocked_left_turns_right() {
        // Blocker at 30 deg on the strike radius, target at 70 deg further away must be reached
        // by turning right the long way round.
        let birdies = [at(30.0, R - 1.0), at(70.0, 2.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_eq!(t.birdie, Some(1));
        assert_deg(t.angle_rad, 70.0 - 360.0);
    }

    #[test]
    fn test_blocked_right_turns_left() {
        let birdies = [at(-30.0, R - 1.0), at(225.0, 2.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_eq!(t.birdie, Some(1));
        assert_deg(t.angle_rad, 225.0);
    }

    #[test]
    fn test_grabber_margin_blocks() {
        // The target at 45 deg is short of the 55 deg blocker, but not by the grabber half-angle
        let birdies = [at(55.0, R - 1.0), at(-50.0, R - 10.0), at(45.0, 2.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_fallback(&t, &origin());
    }

    #[test]
    fn test_both_directions_blocked() {
        let birdies = [at(30.0, R - 1.0), at(-30.0, R - 1.0)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_fallback(&t, &origin());
    }

    #[test]
    fn test_boundary_is_at_risk() {
        // Exactly on the strike radius counts as at risk, so both birdies here are at risk
        let birdies = [Vector3::new(R, 0.0, 0.0), Vector3::new(-R, 0.0, 0.0)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_fallback(&t, &origin());
    }

    #[test]
    fn test_dead_ahead_blocks_both_sides() {
        // A birdie dead ahead blocks left and right turns alike
        let birdies = [at(0.0, R - 1.0), at(90.0, 2.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_fallback(&t, &origin());

        let birdies = [at(0.0, R - 1.0), at(-90.0, 2.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_fallback(&t, &origin());

        assert_eq!(left_angle(0.0), 0.0);
        assert_eq!(right_angle(0.0), 0.0);
        assert!((right_angle(-FRAC_PI_2) + FRAC_PI_2).abs() < 1e-12);
        assert!((right_angle(FRAC_PI_2) + 3.0 * FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_follows_heading() {
        let pose = RobotPose::new(Vector3::new(10.0, 20.0, 5.0), std::f64::consts::FRAC_PI_2);
        let t = select_target(&pose, &[Vector3::new(10.0, 30.0, 5.0)], &robot(), None);
        assert_fallback(&t, &pose);
        assert!((t.position - Vector3::new(10.0, 20.0 + 2.0 * R, 5.0)).norm() < 1e-9);
    }

    #[test]
    fn test_smaller_turn_replaces() {
        // Blocker behind the robot, the closer birdie needs a large turn, the farther one does not
        let birdies = [at(180.0, R - 1.0), at(120.0, 2.0 * R), at(5.0, 3.0 * R)];
        let t = select_target(&origin(), &birdies, &robot(), None);
        assert_eq!(t.birdie, Some(2));
        assert_deg(t.angle_rad, 5.0);
    }

    #[test]
    fn test_clamp() {
        let rect = ClampRect {
            min: [-50.0, -50.0],
            max: [50.0, 50.0],
        };
        let b = [Vector3::new(100.0, 0.0, 3.0)];
        let t = select_target(&origin(), &b, &robot(), Some(&rect));
        assert_eq!(t.birdie, Some(0));
        assert_eq!(t.position, Vector3::new(50.0, 0.0, 3.0));
        assert_eq!(t.angle_rad, 0.0);
    }

    #[test]
    fn test_empty() {
        let t = select_target(&origin(), &[], &robot(), None);
        assert_fallback(&t, &origin());
    }

    fn birdie_strategy() -> impl Strategy<Value = Vec<Vector3<f64>>> {
        prop::collection::vec(
            (-300.0..300.0f64, -300.0..300.0f64).prop_map(|(x, y)| Vector3::new(x, y, 0.0)),
            1..12,
        )
    }

    proptest! {
        #[test]
        fn prop_single_outside_radius_uses_raw_bearing(
            deg in -179.0..179.0f64,
            dist in (R + 1.0)..1000.0f64,
            heading in -3.0..3.0f64,
        ) {
            let pose = RobotPose::new(Vector3::new(5.0, -5.0, 0.0), heading);
            let b = pose.position + at(deg, dist);
            let t = select_target(&pose, &[b], &robot(), None);
            prop_assert_eq!(t.birdie, Some(0));
            prop_assert_eq!(t.angle_rad, pose.bearing_to(&b));
        }

        #[test]
        fn prop_all_at_risk_falls_back(
            pts in prop::collection::vec((-180.0..180.0f64, 0.0..(R - 1e-6)), 1..8),
            heading in -3.0..3.0f64,
        ) {
            let pose = RobotPose::new(Vector3::new(0.0, 0.0, 0.0), heading);
            let birdies: Vec<_> = pts.iter().map(|(d, r)| at(*d, *r)).collect();
            let t = select_target(&pose, &birdies, &robot(), None);
            prop_assert_eq!(t.birdie, None);
            prop_assert_eq!(t.angle_rad, 0.0);
            prop_assert!((t.position - pose.ahead(2.0 * R)).norm() < 1e-9);
        }

        #[test]
        fn prop_deterministic(birdies in birdie_strategy(), heading in -6.0..6.0f64) {
            let pose = RobotPose::new(Vector3::new(0.0, 0.0, 0.0), heading);
            let a = select_target(&pose, &birdies, &robot(), None);
            let b = select_target(&pose, &birdies, &robot(), None);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_feasibility_monotonic_in_half_angle(
            bearing in -10.0..10.0f64,
            left_block in 0.0..TAU,
            right_block in -TAU..0.0f64,
            small in 0.0..1.0f64,
            extra in 0.0..1.0f64,
        ) {
            let wide = feasible_turn(bearing, left_block, right_block, small + extra);
            let narrow = feasible_turn(bearing, left_block, right_block, small);
            if wide.is_some() {
                prop_assert!(narrow.is_some());
            }
        }

        #[test]
        fn prop_target_is_birdie_or_fallback(birdies in birdie_strategy(), heading in -3.0..3.0f64) {
            let pose = RobotPose::new(Vector3::new(0.0, 0.0, 0.0), heading);
            let t = select_target(&pose, &birdies, &robot(), None);
            match t.birdie {
                Some(i) => prop_assert_eq!(t.position, birdies[i]),
                None => prop_assert_eq!(t.angle_rad, 0.0),
            }
        }
    }
}
