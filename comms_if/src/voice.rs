//! # Voice Interface
//!
//! Events raised by the voice interaction worker and consumed by the session manager.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Events the voice worker can raise.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceEvent {
    /// The player asked for their current score
    GetScore,

    /// Demonstrate the left service court
    InstructLeftBounds,

    /// Demonstrate the right service court
    InstructRightBounds,

    /// Demonstrate the full court
    InstructFullBounds,

    /// Start the hitting rounds
    HitStart,

    /// End the session
    End,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl fmt::Display for VoiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoiceEvent::GetScore => "GET_SCORE",
            VoiceEvent::InstructLeftBounds => "INSTRUCT_LEFT_BOUNDS",
            VoiceEvent::InstructRightBounds => "INSTRUCT_RIGHT_BOUNDS",
            VoiceEvent::InstructFullBounds => "INSTRUCT_FULL_BOUNDS",
            VoiceEvent::HitStart => "HIT_START",
            VoiceEvent::End => "END",
        };
        write!(f, "{}", s)
    }
}
