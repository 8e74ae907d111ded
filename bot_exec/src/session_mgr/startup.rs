//! Startup stages of the session

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::robot::RobotCmd;
use log::{info, trace, warn};

use super::{SessionError, SessionMgr, Stage};
use crate::{
    court::{CalibrationRecord, Court},
    voice::{spawn_worker, voice_link},
};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    /// Calibrate the court, from the saved record if there is one or from the live marker.
    pub(super) fn startup_court(&mut self, record_checked: bool) -> Result<Stage, SessionError> {
        if !record_checked && !self.options.recalibrate {
            if let Some(court) = self.load_calibration() {
                self.court = Some(court);
                return Ok(Stage::StartupRobot);
            }
        }

        // The marker must be in view before the operator can lock it
        if self.court.is_none() || !self.court_marker_visible {
            trace!("Waiting for the court marker");
            return Ok(Stage::StartupCourt {
                record_checked: true,
            });
        }

        if !self
            .operator
            .confirm("Align the court marker with the left end of the net, then confirm to lock")
        {
            info!("Operator declined the court lock");
            return Ok(Stage::End);
        }

        let corners = match self.vision.lock_court() {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not lock the court, retrying: {}", e);
                return Ok(Stage::StartupCourt {
                    record_checked: true,
                });
            }
        };

        let mut court = match Court::from_markers(&corners, &self.params.court) {
            Ok(c) => c,
            Err(e) => {
                warn!("Locked court marker is unusable, retrying: {}", e);
                return Ok(Stage::StartupCourt {
                    record_checked: true,
                });
            }
        };
        court.lock();
        info!("Court locked at depth {:.1}", court.depth());

        if let Some(ref path) = self.options.calibration_path {
            court.record().save(path)?;
            info!("Court calibration saved to {:?}", path);
        }

        self.court = Some(court);

        Ok(Stage::StartupRobot)
    }

    /// Wait for the robot to be seen, then reset its grabber.
    pub(super) fn startup_robot(&mut self) -> Result<Stage, SessionError> {
        if self.court_marker_visible {
            trace!("Waiting for the court marker to be removed");
            return Ok(Stage::StartupRobot);
        }

        if !self.robot_visible {
            trace!("Waiting for the robot marker");
            return Ok(Stage::StartupRobot);
        }

        if !self
            .operator
            .confirm("Robot found, confirm to reset the grabber")
        {
            info!("Operator declined the robot reset");
            return Ok(Stage::End);
        }

        self.send(&RobotCmd::ResetGrabberAngle)?;

        Ok(Stage::StartupVoice)
    }

    /// Start the voice worker. Without a voice source the rounds start straight away.
    pub(super) fn startup_voice(&mut self) -> Result<Stage, SessionError> {
        match self.voice_source.take() {
            Some(source) => {
                let (link, worker) = voice_link();
                let handle =
                    spawn_worker(source, worker).map_err(SessionError::VoiceWorkerSpawnError)?;

                self.voice_link = Some(link);
                self.voice_worker = Some(handle);

                info!("Voice worker started");
                Ok(Stage::Standby)
            }
            None => {
                warn!("No voice source, starting the rounds without voice control");
                Ok(Stage::StartRound)
            }
        }
    }

    /// Load the saved court calibration, if there is one.
    fn load_calibration(&self) -> Option<Court> {
        let path = self.options.calibration_path.as_ref()?;

        let record = match CalibrationRecord::load(path) {
            Ok(Some(r)) => r,
            Ok(None) => {
                info!("No court calibration at {:?}, calibrating", path);
                return None;
            }
            Err(e) => {
                warn!("Could not load the court calibration, recalibrating: {}", e);
                return None;
            }
        };

        match Court::from_record(&record, &self.params.court) {
            Ok(c) => {
                info!("Court calibration loaded from {:?}", path);
                Some(c)
            }
            Err(e) => {
                warn!("Saved court calibration is unusable, recalibrating: {}", e);
                None
            }
        }
    }
}
