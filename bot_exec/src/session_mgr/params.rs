//! # SessionMgr Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    collect::CollectParams, court::CourtParams, drive_ctrl::DriveParams, geom::RobotParams,
    track::TrackParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SessionMgrParams {
    pub robot: RobotParams,

    pub court: CourtParams,

    pub collect: CollectParams,

    pub drive: DriveParams,

    pub hit: HitParams,

    pub track: TrackParams,

    pub evacuate: EvacuateParams,
}

/// Hit round parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HitParams {
    /// Number of hits in each round
    pub hits_per_round: u32,

    /// Points for a hit landing at or closer than `score_near` to the robot
    pub score_max: f64,

    /// Distance at and below which a hit scores the full points
    pub score_near: f64,

    /// Distance at and beyond which a hit scores nothing
    pub score_far: f64,
}

/// Parameters of the manoeuvre clearing the robot out of the capture area before collection.
#[derive(Debug, Clone, Deserialize)]
pub struct EvacuateParams {
    /// Wheel ticks spun to leave the capture area, the same number is spun back to return
    pub ticks: i32,

    /// Time to wait after leaving before taking the birdie snapshot
    pub settle_time_s: f64,

    /// Time to wait for the robot to return before planning
    pub return_time_s: f64,
}
