//! Voice event handling

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::voice::VoiceEvent;
use log::{info, warn};

use super::{SessionMgr, Stage};
use crate::court::Bounds;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionMgr {
    /// Handle at most one pending voice event.
    pub(super) fn proc_event(&mut self) {
        let (signal, event) = match self.voice_link.as_ref().and_then(|l| l.try_next()) {
            Some(e) => e,
            None => return,
        };

        info!("Voice event: {}", event);

        let bounds = match event {
            VoiceEvent::GetScore => {
                if let Some(ref link) = self.voice_link {
                    link.send_score(self.score);
                }
                signal.release();
                return;
            }
            VoiceEvent::HitStart => {
                if matches!(self.stage, Stage::Standby) {
                    self.set_stage(Stage::StartRound);
                } else {
                    warn!("Ignoring {} in the {} stage", event, self.stage);
                }
                signal.release();
                return;
            }
            VoiceEvent::End => {
                signal.release();
                self.set_stage(Stage::End);
                return;
            }
            VoiceEvent::InstructLeftBounds => Bounds::Left,
            VoiceEvent::InstructRightBounds => Bounds::Right,
            VoiceEvent::InstructFullBounds => Bounds::Full,
        };

        // The signal is held until the boundary has been shown
        if matches!(self.stage, Stage::Standby) {
            self.set_stage(Stage::ExplainSetup { bounds, signal });
        } else {
            warn!("Ignoring {} in the {} stage", event, self.stage);
            signal.release();
        }
    }
}
