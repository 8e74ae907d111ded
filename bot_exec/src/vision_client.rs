//! # Vision Client
//!
//! The vision client makes bounded requests to the vision server, which runs the marker and birdie
//! detection on the overhead depth camera. Each request waits at most the configured receive
//! timeout for its reply.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::vision::{BirdieObs, MarkerFrame, VisionCmd, VisionRep},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::{debug, info};

use crate::vision::{Vision, VisionError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The vision client
pub struct VisionClient {
    /// Request-response socket for vision commands and responses
    reqrep: MonitoredSocket,

    /// Receive timeout for ordinary requests
    timeout_ms: i32,

    /// Receive timeout for the operator-gated court lock
    court_lock_timeout_ms: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send the request to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not set the receive timeout: {0}")]
    TimeoutSetError(MonitoredSocketError),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server responed with a message which was not valid UTF-8")]
    NonUtf8Response,

    #[error("Unexpected response {1:?} to {0:?}")]
    UnexpectedResponse(VisionCmd, VisionRep),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionClient {
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, VisionClientError> {
        // Create socket options for the reqrep socket. Relaxed and correlated so that a request
        // which timed out doesn't block the next one.
        let reqrep_opts = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.vision_timeout_ms,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let reqrep = MonitoredSocket::new(ctx, zmq::REQ, reqrep_opts, &params.vision_endpoint)
            .map_err(VisionClientError::SocketError)?;

        info!("VisionClient connected to {}", reqrep.endpoint());

        Ok(Self {
            reqrep,
            timeout_ms: params.vision_timeout_ms,
            court_lock_timeout_ms: params.court_lock_timeout_ms,
        })
    }

    /// Send a request and wait for its reply.
    fn request(&mut self, cmd: VisionCmd) -> Result<VisionRep, VisionError> {
        // If not connected return an error
        if !self.reqrep.connected() {
            return Err(VisionClientError::NotConnected.into());
        }

        let request_str =
            serde_json::to_string(&cmd).map_err(VisionClientError::SerializationError)?;

        self.reqrep
            .send(&request_str, 0)
            .map_err(VisionClientError::SendError)?;

        // Read message from the server
        let response_str = match self.reqrep.recv_string(0) {
            // Valid response
            Ok(Ok(s)) => s,
            // Invalid response
            Ok(Err(_)) => return Err(VisionClientError::NonUtf8Response.into()),
            // No response within the timeout
            Err(zmq::Error::EAGAIN) => return Err(VisionError::Timeout),
            // Recv error
            Err(e) => return Err(VisionClientError::RecvError(e).into()),
        };

        let response: VisionRep =
            serde_json::from_str(&response_str).map_err(VisionClientError::DeserializeError)?;

        match response {
            VisionRep::Error(e) => Err(VisionError::ServerError(e)),
            r => Ok(r),
        }
    }
}

impl Vision for VisionClient {
    fn detect_markers(&mut self) -> Result<MarkerFrame, VisionError> {
        match self.request(VisionCmd::DetectMarkers)? {
            VisionRep::Markers(f) => Ok(f),
            r => Err(unexpected(VisionCmd::DetectMarkers, r)),
        }
    }

    fn lock_court(&mut self) -> Result<[[f64; 3]; 4], VisionError> {
        // The operator confirms on the server side, so allow much longer for the reply
        self.reqrep
            .set_recv_timeout(self.court_lock_timeout_ms)
            .map_err(VisionClientError::TimeoutSetError)?;
        debug!("Waiting up to {} ms for the court lock", self.court_lock_timeout_ms);

        let rep = self.request(VisionCmd::LockCourt);

        self.reqrep
            .set_recv_timeout(self.timeout_ms)
            .map_err(VisionClientError::TimeoutSetError)?;

        match rep? {
            VisionRep::CourtLocked(c) => Ok(c),
            r => Err(unexpected(VisionCmd::LockCourt, r)),
        }
    }

    fn capture_hit_background(&mut self) -> Result<(), VisionError> {
        match self.request(VisionCmd::CaptureHitBackground)? {
            VisionRep::Ack => Ok(()),
            r => Err(unexpected(VisionCmd::CaptureHitBackground, r)),
        }
    }

    fn detect_hit_birdie(&mut self) -> Result<Option<BirdieObs>, VisionError> {
        match self.request(VisionCmd::DetectHitBirdie)? {
            VisionRep::HitBirdie(b) => Ok(b),
            r => Err(unexpected(VisionCmd::DetectHitBirdie, r)),
        }
    }

    fn detect_collection_birdies(&mut self) -> Result<Vec<BirdieObs>, VisionError> {
        match self.request(VisionCmd::DetectCollectionBirdies)? {
            VisionRep::CollectionBirdies(b) => Ok(b),
            r => Err(unexpected(VisionCmd::DetectCollectionBirdies, r)),
        }
    }

    fn scene_settled(&mut self) -> Result<bool, VisionError> {
        match self.request(VisionCmd::SceneSettled)? {
            VisionRep::SceneSettled(s) => Ok(s),
            r => Err(unexpected(VisionCmd::SceneSettled, r)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn unexpected(cmd: VisionCmd, rep: VisionRep) -> VisionError {
    VisionClientError::UnexpectedResponse(cmd, rep).into()
}
