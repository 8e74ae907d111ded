//! Channel plumbing between the voice worker and the session manager

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::voice::VoiceEvent;
use log::warn;
use std::{
    fmt,
    sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Rendezvous signal paired with every voice event. The worker blocks until it is released.
pub struct ReplySignal(SyncSender<()>);

/// Session manager end of the link.
pub struct VoiceLink {
    events: Receiver<(ReplySignal, VoiceEvent)>,
    score_tx: SyncSender<f64>,
}

/// Worker end of the link.
pub struct WorkerLink {
    events: Sender<(ReplySignal, VoiceEvent)>,
    score_rx: Receiver<f64>,
}

/// The other end of the link has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("The voice link has been closed")]
pub struct VoiceLinkClosed;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create both ends of a voice link.
pub fn voice_link() -> (VoiceLink, WorkerLink) {
    let (events_tx, events_rx) = mpsc::channel();
    let (score_tx, score_rx) = mpsc::sync_channel(1);

    (
        VoiceLink {
            events: events_rx,
            score_tx,
        },
        WorkerLink {
            events: events_tx,
            score_rx,
        },
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReplySignal {
    /// Release the waiting worker. Releasing after the worker has gone is not an error.
    pub fn release(self) {
        // The signal channel has one slot and is only ever sent to once, so this never blocks
        self.0.send(()).ok();
    }
}

impl fmt::Debug for ReplySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplySignal")
    }
}

impl VoiceLink {
    /// Take the next pending event, if any, without blocking.
    pub fn try_next(&self) -> Option<(ReplySignal, VoiceEvent)> {
        match self.events.try_recv() {
            Ok(e) => Some(e),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Put a score into the reply slot.
    ///
    /// If the slot still holds an unread score that score is kept.
    pub fn send_score(&self, score: f64) {
        match self.score_tx.try_send(score) {
            Ok(()) => (),
            Err(TrySendError::Full(_)) => {
                warn!("Score slot still holds an unread score, {} not sent", score)
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Voice worker has gone, score {} not sent", score)
            }
        }
    }
}

impl WorkerLink {
    /// Raise an event and block until the session manager releases it.
    pub fn send_and_wait(&self, event: VoiceEvent) -> Result<(), VoiceLinkClosed> {
        let (tx, rx) = mpsc::sync_channel(1);

        self.events
            .send((ReplySignal(tx), event))
            .map_err(|_| VoiceLinkClosed)?;

        rx.recv().map_err(|_| VoiceLinkClosed)
    }

    /// Ask for the current score.
    pub fn request_score(&self) -> Result<f64, VoiceLinkClosed> {
        self.send_and_wait(VoiceEvent::GetScore)?;
        self.score_rx.recv().map_err(|_| VoiceLinkClosed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_event_rendezvous() {
        let (link, worker) = voice_link();

        let handle = thread::spawn(move || worker.send_and_wait(VoiceEvent::HitStart));

        // Poll until the event arrives
        let (signal, event) = loop {
            if let Some(e) = link.try_next() {
                break e;
            }
            thread::yield_now();
        };
        assert_eq!(event, VoiceEvent::HitStart);

        signal.release();
        assert_eq!(handle.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_score_request() {
        let (link, worker) = voice_link();

        let handle = thread::spawn(move || worker.request_score());

        let (signal, event) = loop {
            if let Some(e) = link.try_next() {
                break e;
            }
            thread::yield_now();
        };
        assert_eq!(event, VoiceEvent::GetScore);

        link.send_score(5.5);
        signal.release();
        assert_eq!(handle.join().unwrap(), Ok(5.5));
    }

    #[test]
    fn test_score_slot_keeps_unread() {
        let (link, worker) = voice_link();

        link.send_score(1.0);
        link.send_score(2.0);

        assert_eq!(worker.score_rx.try_recv(), Ok(1.0));
        assert!(worker.score_rx.try_recv().is_err());
    }

    #[test]
    fn test_hangup() {
        let (link, worker) = voice_link();
        drop(link);

        assert_eq!(worker.send_and_wait(VoiceEvent::End), Err(VoiceLinkClosed));
        assert_eq!(worker.request_score(), Err(VoiceLinkClosed));
    }

    #[test]
    fn test_dropped_signal_unblocks() {
        let (link, worker) = voice_link();

        let handle = thread::spawn(move || worker.send_and_wait(VoiceEvent::InstructFullBounds));

        let (signal, _) = loop {
            if let Some(e) = link.try_next() {
                break e;
            }
            thread::yield_now();
        };
        drop(signal);

        assert_eq!(handle.join().unwrap(), Err(VoiceLinkClosed));
    }
}
