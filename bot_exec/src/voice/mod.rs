//! # Voice interaction
//!
//! The voice worker runs on its own thread and talks to the player through a [`VoiceSource`]. It
//! raises [`comms_if::voice::VoiceEvent`]s towards the session manager, each paired with a
//! [`ReplySignal`] the session manager releases once it has handled the event. Scores travel back
//! to the worker through a one-slot channel.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod link;
mod worker;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use link::{voice_link, ReplySignal, VoiceLink, VoiceLinkClosed, WorkerLink};
pub use worker::{run_worker, spawn_worker};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Speech input and output for the voice worker.
///
/// Implementations absorb their own failures (silence, timeouts, service errors), which surface
/// as `None` from [`VoiceSource::listen`].
pub trait VoiceSource: Send {
    /// Say something to the player.
    fn say(&mut self, text: &str);

    /// Listen for the player's next instruction.
    fn listen(&mut self) -> Option<Intent>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What the player wants, as classified from their speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Carry on with the session
    Continue,

    /// Stop the session
    End,

    /// Report the current score
    Score,

    /// The request couldn't be classified
    Unsure,
}
