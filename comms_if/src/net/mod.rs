//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, which carries the ACS state snapshots and
//! commands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::Deserialize;
use std::{
    sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}},
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period in milliseconds at which the monitor thread checks for shutdown.
const MONITOR_POLL_PERIOD_MS: i64 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors that are registered. Used to provide unique IDs for each monitor endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Endpoints of the ACS network interface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcsEndpoints {
    /// Endpoint on which the ACS publishes JSON state snapshots.
    pub state_endpoint: String,

    /// Endpoint on which the ACS pulls JSON commands.
    pub cmd_endpoint: String,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: i32,
}

/// A zmq socket which is monitored providing additional information.
///
/// A background thread is run in order to monitor activity on the socket and update visible
/// information to the user. Currently this is only whether or not the socket is actually connected.
pub struct MonitoredSocket {
    socket: Socket,

    join_handle: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>,
}

/// Represents options which can be set on a monitored socket.
///
/// Most options here correspond to those found in the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
pub struct SocketOptions {
    /// Indicates if the socket should bind itself to the endpoint. Servers should have this value
    /// set as `true`, clients should have it set as `false`.
    pub bind: bool,

    /// If true the `MonitoredSocket::new()` function will block until the socket is connected, or
    /// until the connect_timeout elapses.
    pub block_on_first_connect: bool,

    /// Topic prefix to subscribe to, only applied to `SUB` sockets.
    pub subscribe: Option<Vec<u8>>,

    /// `ZMQ_CONFLATE`: keep only the last message in the queue
    pub conflate: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,

    /// `ZMQ_CONNECT_TIMEOUT`: Set `connect()` timeout
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a new monitored socket.
    ///
    /// ## Arguments
    /// - `ctx`: the zmq context which will be used to create the socket
    /// - `socket_type`: the type of zmq socket to create
    /// - `socket_options`: a [`SocketOptions`] struct specifying how to configure the socket
    /// - `endpoint`: a zmq endpoint string, such as `"tcp://localhost:4000"`
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Create monitor endpoint
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );

        // Enable, create, and connect monitor
        socket.monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        socket_options.set(&socket)?;

        match socket_options.bind {
            false => socket.connect(endpoint),
            true => socket.bind(endpoint),
        }.map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        // Wait for the monitor to signal connection, bounded by the connect timeout
        if socket_options.block_on_first_connect && !socket_options.bind {
            let timeout_ms = match socket_options.connect_timeout {
                t if t > 0 => t as i64,
                _ => -1,
            };

            loop {
                if monitor.poll(zmq::POLLIN, timeout_ms)
                    .map_err(MonitoredSocketError::EventReadError)? == 0
                {
                    return Err(MonitoredSocketError::CouldNotConnect(None));
                }

                let event = read_event(&monitor)
                    .map_err(MonitoredSocketError::EventReadError)?;

                match event {
                    SocketEvent::CONNECTED => break,
                    SocketEvent::CONNECT_DELAYED | SocketEvent::CONNECT_RETRIED => continue,
                    _ => return Err(MonitoredSocketError::CouldNotConnect(None)),
                }
            }

            connected.store(true, Ordering::Relaxed);
            debug!("Socket connected to {}", endpoint);
        }

        let shutdown_clone = shutdown.clone();
        let connected_clone = connected.clone();

        let join_handle = thread::spawn(move || monitor_socket(
            monitor,
            monitor_endpoint,
            shutdown_clone,
            connected_clone,
        ));

        Ok(Self {
            socket,
            join_handle: Some(join_handle),
            shutdown,
            connected,
        })
    }

    /// Return if the socket is connected or not.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
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

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout)
        );

        if let Ok(SocketType::SUB) = socket.get_socket_type() {
            // Conflate must be set before the subscription
            set_sockopts!(socket, (set_conflate, self.conflate));

            if let Some(ref topic) = self.subscribe {
                set_sockopts!(socket, (set_subscribe, topic));
            }
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/4-2:zmq-setsockopt
        Self {
            bind: false,
            block_on_first_connect: true,
            subscribe: None,
            conflate: false,
            connect_timeout: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            send_timeout: -1,
        }
    }
}

impl Default for AcsEndpoints {
    fn default() -> Self {
        Self {
            state_endpoint: "tcp://localhost:5020".into(),
            cmd_endpoint: "tcp://localhost:5021".into(),
            connect_timeout_ms: 2000,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read an event from a socket.
fn read_event(socket: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = socket.recv_msg(0)?;

    let event = match msg.len() {
        n if n >= 2 => u16::from_ne_bytes([msg[0], msg[1]]),
        _ => return Err(zmq::Error::EINVAL),
    };

    // The address, we'll ignore it
    if socket.get_rcvmore()? {
        let _ = socket.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(event))
}

fn monitor_socket(
    monitor: Socket,
    monitor_endpoint: String,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match monitor.poll(zmq::POLLIN, MONITOR_POLL_PERIOD_MS) {
            Ok(0) => continue,
            Ok(_) => (),
            Err(e) => {
                debug!("Monitor {} stopped: {}", monitor_endpoint, e);
                break;
            }
        }

        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(e) => {
                debug!("Error reading event from monitor {}: {}", monitor_endpoint, e);
                break;
            }
        };

        match event {
            SocketEvent::CONNECTED => connected.store(true, Ordering::Relaxed),
            SocketEvent::DISCONNECTED => connected.store(false, Ordering::Relaxed),
            _ => (),
        }
    }
}
