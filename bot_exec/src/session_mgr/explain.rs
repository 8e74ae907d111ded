//! Boundary demonstration stages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use nalgebra::Vector3;
use std::collections::VecDeque;
use util::maths::wrap_pi;

use super::{SessionError, SessionMgr, Stage};
use crate::{court::Bounds, voice::ReplySignal};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    /// Load the points of the boundary tour.
    pub(super) fn explain_setup(
        &mut self,
        bounds: Bounds,
        signal: ReplySignal,
    ) -> Result<Stage, SessionError> {
        let points: VecDeque<Vector3<f64>> = self.court_or_err()?.tour(bounds).into();

        info!("Showing the {} with {} points", bounds, points.len());

        Ok(Stage::ExplainAct { points, signal })
    }

    /// Drive to each point of the tour in turn, releasing the voice worker once done.
    pub(super) fn explain_act(
        &mut self,
        mut points: VecDeque<Vector3<f64>>,
        signal: ReplySignal,
    ) -> Result<Stage, SessionError> {
        let pose = match self.pose {
            Some(p) if self.drive.is_idle() => p,
            _ => return Ok(Stage::ExplainAct { points, signal }),
        };

        match points.pop_front() {
            Some(point) => {
                self.drive
                    .begin_leg(point, wrap_pi(pose.bearing_to(&point)))?;
                Ok(Stage::ExplainAct { points, signal })
            }
            None => {
                info!("Boundary shown");
                signal.release();
                Ok(Stage::Standby)
            }
        }
    }
}
