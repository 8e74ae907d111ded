//! # Network Module
//!
//! Thin wrapper over ZMQ client sockets. Each [`MonitoredSocket`] runs a small monitor thread
//! which follows the socket's connection events, so that clients can refuse to send over a link
//! which is known to be down rather than queueing commands for a robot that isn't there.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use serde::Deserialize;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout on the monitor socket, bounds how long a dropped socket waits for its monitor
/// thread to exit.
const MONITOR_POLL_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Counter giving each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint of the robot's command bridge (PUSH)
    pub robot_endpoint: String,

    /// Endpoint of the vision server (REQ)
    pub vision_endpoint: String,

    /// Receive timeout for ordinary vision requests
    pub vision_timeout_ms: i32,

    /// Receive timeout for the operator-gated court lock request
    pub court_lock_timeout_ms: i32,
}

/// A client socket whose connection state is followed by a monitor thread.
pub struct MonitoredSocket {
    socket: Socket,

    endpoint: String,

    monitor: Option<thread::JoinHandle<()>>,

    stop_monitor: Arc<AtomicBool>,

    state: Arc<AtomicU8>,
}

/// Options applied to a monitored socket before it connects. Times are in milliseconds.
///
/// See the [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation for the
/// meaning of each option.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Block in [`MonitoredSocket::new`] until the first connection is made or fails
    pub block_on_first_connect: bool,

    /// `ZMQ_REQ_CORRELATE`, REQ sockets only
    pub req_correlate: bool,

    /// `ZMQ_REQ_RELAXED`, REQ sockets only
    pub req_relaxed: bool,

    /// `ZMQ_LINGER`
    pub linger: i32,

    /// `ZMQ_CONNECT_TIMEOUT`
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`, -1 waits forever
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`
    pub heartbeat_ttl: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Connection state of a monitored socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection has been made yet
    Connecting,

    Connected,

    /// The connection was made and then lost, zmq is trying to reconnect
    Disconnected,
}

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect to {0}: {1:?}")]
    CouldNotConnect(String, Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of the given type and connect it to `endpoint`.
    ///
    /// If `options.block_on_first_connect` is set this blocks until the connection is made, and
    /// fails if zmq gives up before then (which happens after `connect_timeout`).
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Monitor must be attached before connecting so the first events aren't missed
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );
        socket
            .monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx
            .socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor
            .connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(monitor_endpoint.clone(), Some(e)))?;

        options.apply(&socket)?;

        socket
            .connect(endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(endpoint.into(), Some(e)))?;

        let state = Arc::new(AtomicU8::new(LinkState::Connecting as u8));

        if options.block_on_first_connect {
            loop {
                match read_event(&monitor).map_err(MonitoredSocketError::EventReadError)? {
                    SocketEvent::CONNECTED => break,
                    SocketEvent::CONNECT_DELAYED => continue,
                    _ => return Err(MonitoredSocketError::CouldNotConnect(endpoint.into(), None)),
                }
            }

            state.store(LinkState::Connected as u8, Ordering::Relaxed);
        }

        // Poll from here on so the thread can see the stop flag
        monitor
            .set_rcvtimeo(MONITOR_POLL_TIMEOUT_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("rcvtimeo", e))?;

        let stop_monitor = Arc::new(AtomicBool::new(false));
        let monitor = {
            let stop = stop_monitor.clone();
            let state = state.clone();
            let endpoint = String::from(endpoint);
            thread::spawn(move || follow_events(monitor, endpoint, stop, state))
        };

        Ok(Self {
            socket,
            endpoint: endpoint.into(),
            monitor: Some(monitor),
            stop_monitor,
            state,
        })
    }

    pub fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// True if the socket is currently connected to its peer.
    pub fn connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Change the receive timeout, -1 to wait forever.
    pub fn set_recv_timeout(&self, timeout_ms: i32) -> Result<(), MonitoredSocketError> {
        self.socket
            .set_rcvtimeo(timeout_ms)
            .map_err(|e| MonitoredSocketError::SocketOptionError("rcvtimeo", e))
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.stop_monitor.store(true, Ordering::Relaxed);

        if let Some(jh) = self.monitor.take() {
            jh.join().ok();
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl SocketOptions {
    fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        let opt = |name: &'static str, r: zmq::Result<()>| {
            r.map_err(|e| MonitoredSocketError::SocketOptionError(name, e))
        };

        opt("connect_timeout", socket.set_connect_timeout(self.connect_timeout))?;
        opt("heartbeat_ivl", socket.set_heartbeat_ivl(self.heartbeat_ivl))?;
        opt("heartbeat_timeout", socket.set_heartbeat_timeout(self.heartbeat_timeout))?;
        opt("heartbeat_ttl", socket.set_heartbeat_ttl(self.heartbeat_ttl))?;
        opt("linger", socket.set_linger(self.linger))?;
        opt("rcvtimeo", socket.set_rcvtimeo(self.recv_timeout))?;
        opt("sndtimeo", socket.set_sndtimeo(self.send_timeout))?;

        if let Ok(SocketType::REQ) = socket.get_socket_type() {
            opt("req_correlate", socket.set_req_correlate(self.req_correlate))?;
            opt("req_relaxed", socket.set_req_relaxed(self.req_relaxed))?;
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // zmq's own defaults, apart from blocking on the first connect
        Self {
            block_on_first_connect: true,
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            recv_timeout: -1,
            req_correlate: false,
            req_relaxed: false,
            send_timeout: 0,
        }
    }
}

impl LinkState {
    fn from_u8(v: u8) -> Self {
        match v {
            x if x == LinkState::Connected as u8 => LinkState::Connected,
            x if x == LinkState::Disconnected as u8 => LinkState::Disconnected,
            _ => LinkState::Connecting,
        }
    }

    /// The state after the given socket event, if the event changes it.
    fn after(event: SocketEvent) -> Option<Self> {
        match event {
            SocketEvent::CONNECTED => Some(LinkState::Connected),
            SocketEvent::DISCONNECTED => Some(LinkState::Disconnected),
            _ => None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one event from a monitor socket.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    if msg.len() < 2 {
        return Err(zmq::Error::EINVAL);
    }
    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // Second frame is the peer address
    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(event))
}

fn follow_events(monitor: Socket, endpoint: String, stop: Arc<AtomicBool>, state: Arc<AtomicU8>) {
    while !stop.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!("Stopped monitoring {}: {}", endpoint, e);
                break;
            }
        };

        if let Some(s) = LinkState::after(event) {
            debug!("Link to {} is now {:?}", endpoint, s);
            state.store(s as u8, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_net_params_deserialise() {
        let p: NetParams = serde_json::from_str(
            r#"{"robot_endpoint": "tcp://localhost:5000",
                "vision_endpoint": "tcp://localhost:5001",
                "vision_timeout_ms": 200,
                "court_lock_timeout_ms": 60000}"#,
        )
        .unwrap();

        assert_eq!(p.robot_endpoint, "tcp://localhost:5000");
        assert_eq!(p.court_lock_timeout_ms, 60000);
    }

    #[test]
    fn test_link_state() {
        for s in [
            LinkState::Connecting,
            LinkState::Connected,
            LinkState::Disconnected,
        ]
        .iter()
        {
            assert_eq!(LinkState::from_u8(*s as u8), *s);
        }

        assert_eq!(
            LinkState::after(SocketEvent::DISCONNECTED),
            Some(LinkState::Disconnected)
        );
        assert_eq!(LinkState::after(SocketEvent::CONNECT_RETRIED), None);
    }
}
