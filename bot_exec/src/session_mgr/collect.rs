//! Collection stages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::robot::RobotCmd;
use log::{info, warn};
use nalgebra::Vector3;
use serde::Serialize;
use std::{collections::VecDeque, time::Instant};
use util::{maths::wrap_pi, session};

use super::{PlanStep, SessionError, SessionMgr, Stage};
use crate::{
    collect::{plan_route, Route, RouteLeg},
    geom::{vec3, RobotPose},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Archived record of a planned route.
#[derive(Debug, Serialize)]
struct RouteRecord {
    round: u32,
    start: RobotPose,
    birdies: Vec<Vector3<f64>>,
    route: Route,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    /// Drive to the staging point, then spin out of the capture area.
    pub(super) fn collect_evacuate(&mut self, leg_started: bool) -> Result<Stage, SessionError> {
        if !leg_started {
            let pose = match self.pose {
                Some(p) => p,
                None => return Ok(Stage::CollectEvacuate { leg_started }),
            };

            let staging = vec3(self.params.collect.staging_point);
            if pose.distance_to(&staging) >= self.params.drive.dist_tol {
                self.drive
                    .begin_leg(staging, wrap_pi(pose.bearing_to(&staging)))?;
            }

            return Ok(Stage::CollectEvacuate { leg_started: true });
        }

        if !self.drive.is_idle() {
            return Ok(Stage::CollectEvacuate { leg_started });
        }

        self.send(&RobotCmd::Wheel(self.params.evacuate.ticks))?;

        Ok(Stage::CollectPlan(PlanStep::Settling {
            since: Instant::now(),
        }))
    }

    /// Snapshot the birdies while the robot is out of view, bring it back and plan the route.
    pub(super) fn collect_plan(&mut self, step: PlanStep) -> Result<Stage, SessionError> {
        match step {
            PlanStep::Settling { since } => {
                if since.elapsed().as_secs_f64() < self.params.evacuate.settle_time_s {
                    return Ok(Stage::CollectPlan(step));
                }

                match self.vision.scene_settled() {
                    Ok(true) => (),
                    Ok(false) => return Ok(Stage::CollectPlan(step)),
                    Err(e) => {
                        warn!("Could not check the scene is settled: {}", e);
                        return Ok(Stage::CollectPlan(step));
                    }
                }

                let birdies: Vec<Vector3<f64>> = match self.vision.detect_collection_birdies() {
                    Ok(b) => b.iter().map(|o| vec3(o.position)).collect(),
                    Err(e) => {
                        warn!("Could not detect the birdies to collect: {}", e);
                        return Ok(Stage::CollectPlan(step));
                    }
                };
                info!("{} birdies to collect", birdies.len());

                self.send(&RobotCmd::Wheel(-self.params.evacuate.ticks))?;

                Ok(Stage::CollectPlan(PlanStep::Returning {
                    since: Instant::now(),
                    birdies,
                }))
            }
            PlanStep::Returning { since, birdies } => {
                if since.elapsed().as_secs_f64() < self.params.evacuate.return_time_s {
                    return Ok(Stage::CollectPlan(PlanStep::Returning { since, birdies }));
                }

                if birdies.is_empty() {
                    info!("No birdies left to collect");
                    return Ok(Stage::StartRound);
                }

                // Plan from where the robot actually came back to
                let pose = match self.pose {
                    Some(p) if self.robot_visible => p,
                    _ => return Ok(Stage::CollectPlan(PlanStep::Returning { since, birdies })),
                };

                let route = plan_route(
                    &pose,
                    &birdies,
                    &self.params.robot,
                    Some(&self.params.collect.clamp_rect()),
                    self.params.collect.max_route_legs,
                );

                info!(
                    "Planned a {} leg route to collect {} birdies",
                    route.legs.len(),
                    birdies.len()
                );

                let legs: VecDeque<RouteLeg> = route.legs.iter().copied().collect();

                session::save_with_timestamp(
                    "routes/route.json",
                    RouteRecord {
                        round: self.round,
                        start: pose,
                        birdies,
                        route,
                    },
                );

                Ok(Stage::CollectAct(legs))
            }
        }
    }

    /// Drive each leg of the route in turn.
    pub(super) fn collect_act(
        &mut self,
        mut legs: VecDeque<RouteLeg>,
    ) -> Result<Stage, SessionError> {
        if !self.drive.is_idle() {
            return Ok(Stage::CollectAct(legs));
        }

        match legs.pop_front() {
            Some(leg) => {
                self.drive.begin_leg(leg.target, leg.angle_rad)?;
                Ok(Stage::CollectAct(legs))
            }
            None => {
                info!("Route complete");
                Ok(Stage::CollectEvacuate { leg_started: false })
            }
        }
    }
}
