//! # ACS Client
//!
//! The orchestrator sees the automatic control system through two narrow traits:
//! - [`StateProvider`] returns the latest telescope state snapshot,
//! - [`CommandQueue`] accepts one-shot commands.
//!
//! [`AcsLink`] implements both over ZMQ. The ACS publishes JSON [`TelState`] snapshots which a
//! background thread keeps in a shared cache, and pulls JSON [`AcsCmd`]s from a push socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use std::{
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    thread::{self, JoinHandle},
    time::Instant,
};
use util::{maths::wrap_period, time::seconds_to_duration};

use comms_if::{
    eqpt::acs::{AcsCmd, TelState},
    net::{zmq, AcsEndpoints, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::angle::S_PER_DAY;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Read access to the shared telescope state.
pub trait StateProvider {
    /// Get the most recent state snapshot.
    fn snapshot(&self) -> Result<TelState, AcsError>;
}

/// Write access to the ACS command queue.
pub trait CommandQueue {
    /// Queue a command. There is no acknowledgement other than the resulting state changes.
    fn send(&self, cmd: AcsCmd) -> Result<(), AcsError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network link to the ACS.
pub struct AcsLink {
    cmd_socket: Mutex<MonitoredSocket>,

    bg_jh: Option<JoinHandle<()>>,

    bg_run: Arc<AtomicBool>,

    state: Arc<Mutex<Option<TelState>>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AcsError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the ACS")]
    NotConnected,

    #[error("No telescope state has been received from the ACS")]
    NoData,

    #[error("The ACS heartbeat did not advance within {0} s")]
    NoHeartbeat(f64),

    #[error("Could not send the command to the ACS: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),

    #[error("The state cache lock is poisoned")]
    LockPoisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AcsLink {
    /// Connect to the ACS.
    pub fn new(ctx: &zmq::Context, endpoints: &AcsEndpoints) -> Result<Self, AcsError> {
        let state_socket_options = SocketOptions {
            block_on_first_connect: true,
            subscribe: Some(Vec::new()),
            conflate: true,
            connect_timeout: endpoints.connect_timeout_ms,
            linger: 0,
            recv_timeout: 100,
            ..Default::default()
        };
        let cmd_socket_options = SocketOptions {
            block_on_first_connect: true,
            connect_timeout: endpoints.connect_timeout_ms,
            linger: 1000,
            send_timeout: 100,
            ..Default::default()
        };

        let state_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            state_socket_options,
            &endpoints.state_endpoint
        ).map_err(AcsError::SocketError)?;
        let cmd_socket = MonitoredSocket::new(
            ctx,
            zmq::PUSH,
            cmd_socket_options,
            &endpoints.cmd_endpoint
        ).map_err(AcsError::SocketError)?;

        info!(
            "Connected to the ACS (state: {}, commands: {})",
            endpoints.state_endpoint, endpoints.cmd_endpoint
        );

        let bg_run = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(None));

        let bg_run_clone = bg_run.clone();
        let state_clone = state.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(state_socket, bg_run_clone, state_clone)
        }));

        Ok(Self {
            cmd_socket: Mutex::new(cmd_socket),
            bg_jh,
            bg_run,
            state,
        })
    }
}

impl StateProvider for AcsLink {
    fn snapshot(&self) -> Result<TelState, AcsError> {
        let state = self.state.lock()
            .map_err(|_| AcsError::LockPoisoned)?;

        state.clone().ok_or(AcsError::NoData)
    }
}

impl CommandQueue for AcsLink {
    fn send(&self, cmd: AcsCmd) -> Result<(), AcsError> {
        let socket = self.cmd_socket.lock()
            .map_err(|_| AcsError::LockPoisoned)?;

        if !socket.connected() {
            return Err(AcsError::NotConnected)
        }

        let cmd_str = serde_json::to_string(&cmd)
            .map_err(AcsError::SerializationError)?;

        debug!("ACS <- {}", cmd_str);

        socket.send(&cmd_str, 0)
            .map_err(AcsError::SendError)
    }
}

impl Drop for AcsLink {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that the ACS is alive.
///
/// The mean solar time of the snapshot is the heartbeat, it must advance by more than
/// `min_advance_s` within `timeout_s`. Missing data for the whole timeout is also an error.
pub fn check_heartbeat<S: StateProvider + ?Sized>(
    provider: &S,
    timeout_s: f64,
    min_advance_s: f64,
    poll_interval_s: f64,
) -> Result<(), AcsError> {
    let start = Instant::now();
    let timeout = seconds_to_duration(timeout_s);
    let poll = seconds_to_duration(poll_interval_s);

    let mut first_time_s = None;

    while start.elapsed() < timeout {
        match provider.snapshot() {
            Ok(state) => match first_time_s {
                None => first_time_s = Some(state.m_time_s),
                Some(t0) => {
                    // The heartbeat wraps at midnight, a step back is not an advance
                    let advance_s = wrap_period(state.m_time_s - t0, S_PER_DAY);
                    if advance_s > min_advance_s && advance_s < 0.5 * S_PER_DAY {
                        debug!("ACS heartbeat ok after {:.2} s", start.elapsed().as_secs_f64());
                        return Ok(())
                    }
                }
            },
            Err(AcsError::NoData) => (),
            Err(e) => return Err(e),
        }

        thread::sleep(poll);
    }

    match first_time_s {
        Some(_) => Err(AcsError::NoHeartbeat(timeout_s)),
        None => Err(AcsError::NoData),
    }
}

/// Background thread, keeps the latest state published by the ACS.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    state: Arc<Mutex<Option<TelState>>>,
) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from the ACS");
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving state from the ACS: {:?}", e);
                break
            }
        };

        let new_state: TelState = match serde_json::from_str(&msg) {
            Ok(s) => s,
            Err(e) => {
                warn!("Error deserializing state from the ACS: {:?}", e);
                continue
            }
        };

        match state.lock() {
            Ok(mut s) => *s = Some(new_state),
            Err(_) => {
                error!("ACS state cache poisoned, stopping the receiver");
                break
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    /// Provider returning a scripted heartbeat.
    struct Scripted {
        times: Vec<Option<f64>>,
        idx: Cell<usize>,
    }

    impl StateProvider for Scripted {
        fn snapshot(&self) -> Result<TelState, AcsError> {
            let i = self.idx.get();
            self.idx.set(i + 1);

            match self.times.get(i).copied().unwrap_or(*self.times.last().unwrap()) {
                Some(t) => Ok(TelState {
                    m_time_s: t,
                    ..Default::default()
                }),
                None => Err(AcsError::NoData),
            }
        }
    }

    #[test]
    fn test_heartbeat_advancing() {
        let p = Scripted {
            times: vec![None, Some(100.0), Some(100.01), Some(100.05)],
            idx: Cell::new(0),
        };

        assert!(check_heartbeat(&p, 0.5, 0.02, 0.001).is_ok());
    }

    #[test]
    fn test_heartbeat_midnight() {
        let p = Scripted {
            times: vec![Some(S_PER_DAY - 0.01), Some(0.05)],
            idx: Cell::new(0),
        };

        assert!(check_heartbeat(&p, 0.5, 0.02, 0.001).is_ok());
    }

    #[test]
    fn test_heartbeat_backwards() {
        let p = Scripted {
            times: vec![Some(100.0), Some(99.5)],
            idx: Cell::new(0),
        };

        assert!(matches!(check_heartbeat(&p, 0.1, 0.02, 0.01), Err(AcsError::NoHeartbeat(_))));
    }

    #[test]
    fn test_heartbeat_frozen() {
        let p = Scripted {
            times: vec![Some(100.0)],
            idx: Cell::new(0),
        };

        assert!(matches!(check_heartbeat(&p, 0.1, 0.02, 0.01), Err(AcsError::NoHeartbeat(_))));

        let p = Scripted {
            times: vec![None],
            idx: Cell::new(0),
        };

        assert!(matches!(check_heartbeat(&p, 0.1, 0.02, 0.01), Err(AcsError::NoData)));
    }
}
