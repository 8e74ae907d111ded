//! Hit round stages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::robot::RobotCmd;
use log::{info, warn};
use nalgebra::Vector3;
use serde::Serialize;
use util::{
    maths::{clamp, lin_map},
    session,
};

use super::{HitParams, SessionError, SessionMgr, Stage};
use crate::{court::ServeSide, track::BirdieTrack};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Archived record of a scored hit.
#[derive(Debug, Serialize)]
struct HitRecord {
    round: u32,
    hit: u32,
    serve: bool,
    impact: Vector3<f64>,
    robot_position: Vector3<f64>,
    distance: f64,
    inside: bool,
    points: f64,
    score: f64,
    trajectory: Vec<Vector3<f64>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    pub(super) fn start_round(&mut self) -> Stage {
        self.hits_this_round = 0;

        info!(
            "Starting round {}, serve into the {:?} service court",
            self.round + 1,
            ServeSide::for_round(self.round)
        );

        Stage::HitInstruct
    }

    /// Arm the hit detector and signal the player.
    pub(super) fn hit_instruct(&mut self) -> Result<Stage, SessionError> {
        if let Err(e) = self.vision.capture_hit_background() {
            warn!("Could not capture the hit background, retrying: {}", e);
            return Ok(Stage::HitInstruct);
        }

        self.track = None;
        self.send(&RobotCmd::Beep)?;

        Ok(Stage::HitAwaitPlayer)
    }

    /// Track the hit birdie until it reaches the ground.
    pub(super) fn hit_await_player(&mut self) -> Result<Stage, SessionError> {
        self.update_track()?;

        match self.track.as_ref().and_then(|t| t.impact) {
            Some(impact) => {
                info!(
                    "Birdie landed at ({:.1}, {:.1})",
                    impact.x, impact.y
                );
                Ok(Stage::HitReact(impact))
            }
            None => Ok(Stage::HitAwaitPlayer),
        }
    }

    /// Score the hit.
    ///
    /// The first hit of a round is a serve and must land in the round's service court, later
    /// hits must land in the full court. Hits that land outside score nothing and the robot
    /// signals the failure.
    pub(super) fn hit_react(&mut self, impact: Vector3<f64>) -> Result<Stage, SessionError> {
        // Scoring is relative to the robot so the pose is required
        let pose = match self.pose {
            Some(p) => p,
            None => return Ok(Stage::HitReact(impact)),
        };

        let serve = self.hits_this_round == 0;
        let inside = {
            let court = self.court_or_err()?;
            if serve {
                court.in_service_court(ServeSide::for_round(self.round), &impact)
            } else {
                court.is_inside(&impact)
            }
        };

        let distance = pose.distance_to(&impact);
        let points = if inside {
            hit_points(distance, &self.params.hit)
        } else {
            self.send(&RobotCmd::Fail)?;
            0.0
        };

        self.score += points;
        self.hits_this_round += 1;

        info!(
            "Hit {} {} at {:.1} from the robot, {:.2} points, score {:.2}",
            self.hits_this_round,
            if inside { "in" } else { "out" },
            distance,
            points,
            self.score
        );

        session::save_with_timestamp(
            "hits/hit.json",
            HitRecord {
                round: self.round,
                hit: self.hits_this_round,
                serve,
                impact,
                robot_position: pose.position,
                distance,
                inside,
                points,
                score: self.score,
                trajectory: self
                    .track
                    .as_ref()
                    .map(|t| t.history().to_vec())
                    .unwrap_or_default(),
            },
        );

        Ok(Stage::HitAwaitStatic)
    }

    /// Wait for the birdie to come to rest and the scene to settle.
    pub(super) fn hit_await_static(&mut self) -> Result<Stage, SessionError> {
        self.update_track()?;

        let settled = match self.vision.scene_settled() {
            Ok(s) => s,
            Err(e) => {
                warn!("Could not check the scene is settled: {}", e);
                false
            }
        };
        let track_static = self.track.as_ref().map_or(true, |t| t.is_static());

        if !(settled && track_static) {
            return Ok(Stage::HitAwaitStatic);
        }

        if self.hits_this_round >= self.params.hit.hits_per_round {
            Ok(Stage::RoundEnd)
        } else {
            Ok(Stage::HitInstruct)
        }
    }

    pub(super) fn round_end(&mut self) -> Stage {
        self.round += 1;

        info!(
            "Round {} over, score {:.2}",
            self.round, self.score
        );

        Stage::CollectEvacuate { leg_started: false }
    }

    /// Feed the latest hit birdie detection into the track.
    fn update_track(&mut self) -> Result<(), SessionError> {
        let obs = match self.vision.detect_hit_birdie() {
            Ok(Some(o)) => o,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Hit birdie detection failed: {}", e);
                return Ok(());
            }
        };

        let depth = self.court_or_err()?.depth();

        match self.track {
            Some(ref mut t) => t.update(&obs, depth, &self.params.track),
            None => self.track = Some(BirdieTrack::new(&obs, depth, &self.params.track)),
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Points for a hit landing in the court at the given distance from the robot.
///
/// Full points up to `score_near`, falling linearly to nothing at `score_far`.
fn hit_points(distance: f64, params: &HitParams) -> f64 {
    lin_map(
        (params.score_near, params.score_far),
        (params.score_max, 0.0),
        clamp(&distance, &params.score_near, &params.score_far),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> HitParams {
        HitParams {
            hits_per_round: 3,
            score_max: 2.0,
            score_near: 100.0,
            score_far: 400.0,
        }
    }

    #[test]
    fn test_hit_points() {
        let p = params();

        assert_eq!(hit_points(0.0, &p), 2.0);
        assert_eq!(hit_points(100.0, &p), 2.0);
        assert!((hit_points(250.0, &p) - 1.0).abs() < 1e-12);
        assert_eq!(hit_points(400.0, &p), 0.0);
        assert_eq!(hit_points(1000.0, &p), 0.0);
    }
}
