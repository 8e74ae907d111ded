//! # Robot Equipment Commands
//!
//! The robot accepts a line-oriented command vocabulary, one command per line. Angles are given in
//! degrees, counter-clockwise (left) positive.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Commands that can be sent to the robot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RobotCmd {
    /// Turn in place by the given signed angle in degrees.
    Turn(f64),

    /// Drive forward, optionally correcting heading by the given angle in degrees while moving.
    Forward(Option<f64>),

    /// Stop all wheel motion.
    Stop,

    /// Spin the wheels by a raw number of encoder ticks.
    Wheel(i32),

    /// Return the grabber to its reference angle.
    ResetGrabberAngle,

    /// Sound the ready tone.
    Beep,

    /// Sound the failure tone.
    Fail,

    /// Terminal command, closes the grabber and plays the end tones.
    End,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RobotCmdParseError {
    #[error("Empty command line")]
    Empty,

    #[error("Unknown command keyword \"{0}\"")]
    UnknownKeyword(String),

    #[error("Command {0} expects an argument")]
    MissingArgument(&'static str),

    #[error("Command {0} got an invalid argument \"{1}\"")]
    InvalidArgument(&'static str, String),

    #[error("Command {0} got unexpected trailing text \"{1}\"")]
    TrailingText(&'static str, String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotCmd {
    /// Render the command as the line sent on the wire, without a trailing newline.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// The keyword used for this command on the wire.
    pub fn keyword(&self) -> &'static str {
        match self {
            RobotCmd::Turn(_) => "TURN",
            RobotCmd::Forward(_) => "FORWARD",
            RobotCmd::Stop => "STOP",
            RobotCmd::Wheel(_) => "WHEEL",
            RobotCmd::ResetGrabberAngle => "RESET_GRABBER_ANGLE",
            RobotCmd::Beep => "BEEP",
            RobotCmd::Fail => "FAIL",
            RobotCmd::End => "END",
        }
    }
}

impl fmt::Display for RobotCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotCmd::Turn(deg) => write!(f, "TURN {:.2}", deg),
            RobotCmd::Forward(Some(deg)) => write!(f, "FORWARD {:.2}", deg),
            RobotCmd::Wheel(ticks) => write!(f, "WHEEL {}", ticks),
            c => write!(f, "{}", c.keyword()),
        }
    }
}

impl FromStr for RobotCmd {
    type Err = RobotCmdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();

        let keyword = tokens.next().ok_or(RobotCmdParseError::Empty)?;
        let arg = tokens.next();

        let cmd = match keyword {
            "TURN" => RobotCmd::Turn(parse_arg("TURN", arg)?),
            "FORWARD" => match arg {
                Some(_) => RobotCmd::Forward(Some(parse_arg("FORWARD", arg)?)),
                None => RobotCmd::Forward(None),
            },
            "WHEEL" => RobotCmd::Wheel(parse_arg("WHEEL", arg)?),
            "STOP" => RobotCmd::Stop,
            "RESET_GRABBER_ANGLE" => RobotCmd::ResetGrabberAngle,
            "BEEP" => RobotCmd::Beep,
            "FAIL" => RobotCmd::Fail,
            "END" => RobotCmd::End,
            k => return Err(RobotCmdParseError::UnknownKeyword(k.into())),
        };

        // Only TURN, FORWARD and WHEEL take an argument
        let extra = match cmd {
            RobotCmd::Turn(_) | RobotCmd::Forward(_) | RobotCmd::Wheel(_) => tokens.next(),
            _ => arg,
        };
        if let Some(t) = extra {
            return Err(RobotCmdParseError::TrailingText(cmd.keyword(), t.into()));
        }

        Ok(cmd)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn parse_arg<T: FromStr>(keyword: &'static str, arg: Option<&str>) -> Result<T, RobotCmdParseError> {
    let arg = arg.ok_or(RobotCmdParseError::MissingArgument(keyword))?;
    arg.parse()
        .map_err(|_| RobotCmdParseError::InvalidArgument(keyword, arg.into()))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_line() {
        assert_eq!(RobotCmd::Turn(45.0).to_line(), "TURN 45.00");
        assert_eq!(RobotCmd::Turn(-12.3456).to_line(), "TURN -12.35");
        assert_eq!(RobotCmd::Forward(None).to_line(), "FORWARD");
        assert_eq!(RobotCmd::Forward(Some(-3.2)).to_line(), "FORWARD -3.20");
        assert_eq!(RobotCmd::Stop.to_line(), "STOP");
        assert_eq!(RobotCmd::Wheel(-500).to_line(), "WHEEL -500");
        assert_eq!(RobotCmd::ResetGrabberAngle.to_line(), "RESET_GRABBER_ANGLE");
        assert_eq!(RobotCmd::End.to_line(), "END");
    }

    #[test]
    fn test_parse() {
        assert_eq!("TURN 45.00".parse(), Ok(RobotCmd::Turn(45.0)));
        assert_eq!("  FORWARD  ".parse(), Ok(RobotCmd::Forward(None)));
        assert_eq!("FORWARD 2.5".parse(), Ok(RobotCmd::Forward(Some(2.5))));
        assert_eq!("WHEEL 500".parse(), Ok(RobotCmd::Wheel(500)));
        assert_eq!("BEEP".parse(), Ok(RobotCmd::Beep));
        assert_eq!("FAIL".parse(), Ok(RobotCmd::Fail));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<RobotCmd>(), Err(RobotCmdParseError::Empty));
        assert_eq!(
            "JUMP".parse::<RobotCmd>(),
            Err(RobotCmdParseError::UnknownKeyword("JUMP".into()))
        );
        assert_eq!(
            "TURN".parse::<RobotCmd>(),
            Err(RobotCmdParseError::MissingArgument("TURN"))
        );
        assert_eq!(
            "WHEEL 1.5".parse::<RobotCmd>(),
            Err(RobotCmdParseError::InvalidArgument("WHEEL", "1.5".into()))
        );
        assert_eq!(
            "STOP now".parse::<RobotCmd>(),
            Err(RobotCmdParseError::TrailingText("STOP", "now".into()))
        );
    }
}
