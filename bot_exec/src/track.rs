//! # Birdie tracking
//!
//! A single birdie is tracked through a hit round: its position history is recorded, the first
//! sample at court level is taken as the impact point and the track is flagged static once the
//! birdie stops moving.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::BirdieObs;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geom::vec3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Tracking thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackParams {
    /// Maximum depth difference from the court plane for the birdie to be on the ground
    pub ground_tolerance: f64,

    /// Maximum displacement between samples for the birdie to be considered still
    pub static_epsilon: f64,

    /// Number of consecutive still displacements before the track is static
    pub static_count: usize,
}

/// A tracked birdie.
#[derive(Debug, Clone, Serialize)]
pub struct BirdieTrack {
    /// Latest position
    pub position: Vector3<f64>,

    /// Latest orientation from the blob shape
    pub orientation_rad: f64,

    /// True once the birdie has reached the ground
    pub hit_ground: bool,

    /// Where the birdie first reached the ground
    pub impact: Option<Vector3<f64>>,

    history: Vec<Vector3<f64>>,

    is_static: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BirdieTrack {
    /// Start a track from its first observation.
    pub fn new(obs: &BirdieObs, court_depth: f64, params: &TrackParams) -> Self {
        let mut track = Self {
            position: vec3(obs.position),
            orientation_rad: obs.orientation_rad,
            hit_ground: false,
            impact: None,
            history: Vec::new(),
            is_static: false,
        };
        track.update(obs, court_depth, params);
        track
    }

    /// Add a new observation to the track.
    pub fn update(&mut self, obs: &BirdieObs, court_depth: f64, params: &TrackParams) {
        self.position = vec3(obs.position);
        self.orientation_rad = obs.orientation_rad;
        self.history.push(self.position);

        if !self.hit_ground && (self.position.z - court_depth).abs() <= params.ground_tolerance {
            self.hit_ground = true;
            self.impact = Some(self.position);
        }

        self.is_static = self.history.len() > params.static_count
            && self
                .history
                .windows(2)
                .rev()
                .take(params.static_count)
                .all(|w| (w[1] - w[0]).norm() <= params.static_epsilon);
    }

    pub fn history(&self) -> &[Vector3<f64>] {
        &self.history
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> TrackParams {
        TrackParams {
            ground_tolerance: 10.0,
            static_epsilon: 1.0,
            static_count: 2,
        }
    }

    fn obs(x: f64, y: f64, z: f64) -> BirdieObs {
        BirdieObs {
            position: [x, y, z],
            orientation_rad: 0.0,
        }
    }

    #[test]
    fn test_impact_set_once() {
        let p = params();
        let mut t = BirdieTrack::new(&obs(0.0, 0.0, 1500.0), 2000.0, &p);
        assert!(!t.hit_ground);

        t.update(&obs(10.0, 0.0, 1995.0), 2000.0, &p);
        assert!(t.hit_ground);
        assert_eq!(t.impact, Some(Vector3::new(10.0, 0.0, 1995.0)));

        // Bouncing and rolling does not move the impact point
        t.update(&obs(20.0, 0.0, 1900.0), 2000.0, &p);
        t.update(&obs(25.0, 0.0, 2000.0), 2000.0, &p);
        assert_eq!(t.impact, Some(Vector3::new(10.0, 0.0, 1995.0)));
        assert_eq!(t.history().len(), 4);
    }

    #[test]
    fn test_static() {
        let p = params();
        let mut t = BirdieTrack::new(&obs(0.0, 0.0, 2000.0), 2000.0, &p);
        t.update(&obs(0.5, 0.0, 2000.0), 2000.0, &p);
        assert!(!t.is_static());

        t.update(&obs(0.5, 0.5, 2000.0), 2000.0, &p);
        assert!(t.is_static());

        t.update(&obs(5.0, 0.5, 2000.0), 2000.0, &p);
        assert!(!t.is_static());
    }
}
