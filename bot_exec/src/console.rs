//! # Console stand-ins
//!
//! The operator gates and the player's voice are read from the terminal when no speech service is
//! available.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bot_lib::{
    session_mgr::Operator,
    voice::{Intent, VoiceSource},
};
use log::warn;
use rustyline::{error::ReadlineError, DefaultEditor};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const OPERATOR_PROMPT: &str = "operator [y/n] $ ";

const PLAYER_PROMPT: &str = "player $ ";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Operator answering prompts on the terminal.
pub struct ConsoleOperator {
    rl: DefaultEditor,
}

/// Player typing instead of speaking.
#[derive(Default)]
pub struct ConsoleVoice;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleOperator {
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(Self {
            rl: DefaultEditor::new()?,
        })
    }
}

impl Operator for ConsoleOperator {
    fn confirm(&mut self, prompt: &str) -> bool {
        println!("{}", prompt);

        match self.rl.readline(OPERATOR_PROMPT) {
            Ok(line) => !line.trim().eq_ignore_ascii_case("n"),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => false,
            Err(e) => {
                warn!("Could not read the operator's answer: {}", e);
                false
            }
        }
    }
}

impl VoiceSource for ConsoleVoice {
    fn say(&mut self, text: &str) {
        println!("BirdieBot: {}", text);
    }

    fn listen(&mut self) -> Option<Intent> {
        // The editor is not shared with the worker thread, so one is made for each line
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                warn!("Could not open the console: {}", e);
                return None;
            }
        };

        match rl.readline(PLAYER_PROMPT) {
            Ok(line) => Some(classify(&line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Some(Intent::End),
            Err(e) => {
                warn!("Could not read from the console: {}", e);
                None
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Keyword classification of what the player typed.
fn classify(line: &str) -> Intent {
    let line = line.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| line.contains(w));

    if has(&["stop", "end", "quit", "finish"]) {
        Intent::End
    } else if has(&["score", "points"]) {
        Intent::Score
    } else if has(&["continue", "yes", "ok", "go", "next"]) {
        Intent::Continue
    } else {
        Intent::Unsure
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("What's my SCORE?"), Intent::Score);
        assert_eq!(classify("let's stop here"), Intent::End);
        assert_eq!(classify("ok"), Intent::Continue);
        assert_eq!(classify("banana"), Intent::Unsure);
    }
}
