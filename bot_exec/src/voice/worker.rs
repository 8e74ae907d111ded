//! The voice worker script

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::voice::VoiceEvent;
use log::{debug, info};
use std::thread::{self, JoinHandle};

use super::{Intent, VoiceLinkClosed, VoiceSource, WorkerLink};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const GREETING: &str = "Hi, I'm BirdieBot, your badminton training partner.";

const RULES: &str = "Serve into the service court I show you, then keep hitting. A birdie that \
    lands close to me scores up to two points, one that lands outside the court scores nothing.";

const BOUNDS_SCRIPT: [(VoiceEvent, &str); 3] = [
    (
        VoiceEvent::InstructLeftBounds,
        "This is the left service court.",
    ),
    (
        VoiceEvent::InstructRightBounds,
        "This is the right service court.",
    ),
    (VoiceEvent::InstructFullBounds, "And this is the full court."),
];

const HIT_START: &str = "Let's start. Serve when you hear the beep.";

const ACKNOWLEDGE: &str = "Great, keep going.";

const ASK_AGAIN: &str = "Sorry, I didn't catch that. Say continue, score, or stop.";

const GOODBYE: &str = "Thanks for playing, see you next time!";

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Spawn the voice worker on its own thread.
pub fn spawn_worker(
    source: Box<dyn VoiceSource>,
    link: WorkerLink,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(String::from("voice_worker"))
        .spawn(move || run_worker(source, link))
}

/// Run the voice worker script until the player ends the session or the session hangs up.
pub fn run_worker(mut source: Box<dyn VoiceSource>, link: WorkerLink) {
    match run_script(source.as_mut(), &link) {
        Ok(()) => info!("Voice worker finished"),
        Err(VoiceLinkClosed) => debug!("Session hung up, voice worker exiting"),
    }
}

fn run_script(source: &mut dyn VoiceSource, link: &WorkerLink) -> Result<(), VoiceLinkClosed> {
    source.say(GREETING);
    source.say(RULES);

    for (event, line) in BOUNDS_SCRIPT.iter() {
        source.say(line);
        link.send_and_wait(*event)?;
    }

    source.say(HIT_START);
    link.send_and_wait(VoiceEvent::HitStart)?;

    loop {
        match source.listen() {
            Some(Intent::Continue) => source.say(ACKNOWLEDGE),
            Some(Intent::Score) => {
                let score = link.request_score()?;
                source.say(&format!("You have {} points.", score));
            }
            Some(Intent::End) => {
                source.say(GOODBYE);
                return link.send_and_wait(VoiceEvent::End);
            }
            Some(Intent::Unsure) | None => source.say(ASK_AGAIN),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{sim::ScriptedVoice, voice::voice_link};

    #[test]
    fn test_script() {
        let (link, worker) = voice_link();
        let (voice, said) = ScriptedVoice::new(vec![
            Some(Intent::Continue),
            None,
            Some(Intent::Score),
            Some(Intent::End),
        ]);

        let handle = spawn_worker(Box::new(voice), worker).unwrap();

        let mut events = Vec::new();
        while events.last() != Some(&VoiceEvent::End) {
            if let Some((signal, event)) = link.try_next() {
                if event == VoiceEvent::GetScore {
                    link.send_score(4.0);
                }
                events.push(event);
                signal.release();
            }
            thread::yield_now();
        }
        handle.join().unwrap();

        assert_eq!(
            events,
            vec![
                VoiceEvent::InstructLeftBounds,
                VoiceEvent::InstructRightBounds,
                VoiceEvent::InstructFullBounds,
                VoiceEvent::HitStart,
                VoiceEvent::GetScore,
                VoiceEvent::End,
            ]
        );

        let said = said.lock().unwrap();
        assert_eq!(said.first().map(String::as_str), Some(GREETING));
        assert!(said.iter().any(|s| s == ACKNOWLEDGE));
        assert!(said.iter().any(|s| s == ASK_AGAIN));
        assert!(said.iter().any(|s| s == "You have 4 points."));
        assert_eq!(said.last().map(String::as_str), Some(GOODBYE));
    }

    #[test]
    fn test_exits_on_hangup() {
        let (link, worker) = voice_link();
        let (voice, said) = ScriptedVoice::new(vec![]);

        drop(link);
        run_worker(Box::new(voice), worker);

        // Only got as far as the first instruction
        assert_eq!(said.lock().unwrap().len(), 3);
    }
}
