//! # Robot Client
//!
//! This module provides the link to the robot's command bridge. Commands are fire-and-forget
//! lines pushed over a reliable, ordered socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::robot::RobotCmd,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::{info, trace};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can carry out robot commands.
pub trait Actuator {
    /// Send a command, returning once it has been handed to the link.
    fn send(&mut self, cmd: &RobotCmd) -> Result<(), ActuatorError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct RobotClient {
    cmd_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised while actuating the robot. None of these are retried, as the physical state of
/// the robot can't be assumed after a lost command.
#[derive(thiserror::Error, Debug)]
pub enum ActuatorError {
    #[error("The robot link is down")]
    LinkDown,

    #[error("Robot client error: {0}")]
    ClientError(#[from] RobotClientError),
}

#[derive(thiserror::Error, Debug)]
pub enum RobotClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the robot")]
    NotConnected,

    #[error("Could not send the command to the robot: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotClient {
    /// Create a new instance of the robot client.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, RobotClientError> {
        let cmd_socket_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1000,
            send_timeout: 100,
            ..Default::default()
        };

        let cmd_socket = MonitoredSocket::new(
            ctx,
            zmq::PUSH,
            cmd_socket_options,
            &params.robot_endpoint,
        )
        .map_err(RobotClientError::SocketError)?;

        info!("RobotClient connected to {}", params.robot_endpoint);

        Ok(Self { cmd_socket })
    }
}

impl Actuator for RobotClient {
    fn send(&mut self, cmd: &RobotCmd) -> Result<(), ActuatorError> {
        if !self.cmd_socket.connected() {
            return Err(RobotClientError::NotConnected.into());
        }

        let line = cmd.to_line();
        trace!("Sending robot command: {}", line);

        self.cmd_socket
            .send(&line, 0)
            .map_err(RobotClientError::SendError)?;

        Ok(())
    }
}
