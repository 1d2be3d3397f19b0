//! # Command Orchestrator
//!
//! Every telescope operation follows the same life cycle, tracked by a [`PendingOp`]:
//!
//! ```text
//! Idle -> Validating -> Dispatched -> Waiting -> Succeeded
//!                          ^             |
//!                          +-- Retrying -+-----> Failed
//! ```
//!
//! Arguments are validated before anything is sent to the ACS. Each dispatched command is followed
//! by one or more bounded waits on the telescope state, which is re-read on every poll.
//!
//! The operations themselves are split by axis:
//! - [`p2`]: rotator moves and modes
//! - [`focus`]: focus moves
//! - [`coords`]: input coordinates
//! - [`mount`]: stop, goto, azimuth reverse and the pointing correction system
//! - [`correction`]: small position corrections

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod p2;
pub mod focus;
pub mod coords;
pub mod mount;
pub mod correction;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace, warn};
use std::{fmt, time::Instant};
use util::time::seconds_to_duration;

use comms_if::eqpt::acs::{AcsCmd, TelState};

use crate::{
    acs_client::{AcsError, CommandQueue, StateProvider},
    angle::ParseError,
    astrom::{AstromError, Astrometry, Epoch, MJD_ZERO_JD},
    params::TelExecParams,
    sphere::Observatory,
    wait::{WaitOutcome, Waiter},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Options of the operator which apply to every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpOptions {
    /// Stop a moving P2 or focus motor instead of refusing the command
    pub force: bool,

    /// Epoch of the equatorial coordinates
    pub epoch: Epoch,

    /// Proper motion in right ascension, milliarcseconds per year
    pub pm_ra_mas_yr: f64,

    /// Proper motion in declination, milliarcseconds per year
    pub pm_dec_mas_yr: f64,
}

/// Bookkeeping of the operation in progress.
#[derive(Debug, Clone)]
pub struct PendingOp {
    pub name: &'static str,

    /// Target as given by the operator
    pub target: String,

    /// Number of the current attempt, starting at 1
    pub attempt: usize,

    pub phase: OpPhase,

    /// Deadline of the wait in progress
    pub deadline: Option<Instant>,
}

/// Runs telescope operations against the ACS.
pub struct Orchestrator<'a> {
    state: &'a dyn StateProvider,

    queue: &'a dyn CommandQueue,

    astrom: &'a dyn Astrometry,

    waiter: Waiter,

    params: TelExecParams,

    observatory: Observatory,

    options: OpOptions,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpPhase {
    Idle,
    Validating,
    Dispatched,
    Waiting,
    Succeeded,
    Retrying,
    Failed,
}

/// Coordinate frame of a coordinate, goto or correction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Right ascension and declination
    Equatorial,

    /// Azimuth and zenith distance
    Horizontal,
}

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("Bad argument: {0}")]
    Parse(String),

    #[error("Out of range: {0}")]
    Range(String),

    #[error("Target angle {target_deg:.3}° is in the prohibited zone between {low_deg}° and {high_deg}°")]
    ProhibitedZone {
        target_deg: f64,
        low_deg: f64,
        high_deg: f64,
    },

    #[error("The {0} is already moving")]
    Busy(&'static str),

    #[error("Timed out after {timeout_s} s waiting for {what}")]
    Timeout {
        what: &'static str,
        timeout_s: f64,
    },

    #[error("ACS error: {0}")]
    Connectivity(#[from] AcsError),

    #[error("Astrometry error: {0}")]
    Astrometric(#[from] AstromError),

    #[error("The telescope is not in automatic mode")]
    NotAutomatic,

    #[error("Zenith distance {0:.3}° is too close to the zenith for an azimuth correction")]
    NearZenith(f64),

    #[error("A shift of {0:.3} mm is too small to move")]
    NotWorthMoving(f64),

    #[error("Could not reach {target} after {attempts} attempts, stopped at {reached}")]
    RetriesExhausted {
        target: String,
        reached: String,
        attempts: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl From<ParseError> for OpError {
    fn from(e: ParseError) -> Self {
        OpError::Parse(e.to_string())
    }
}

impl fmt::Display for OpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PendingOp {
    pub fn new(name: &'static str, target: &str) -> Self {
        Self {
            name,
            target: target.into(),
            attempt: 1,
            phase: OpPhase::Idle,
            deadline: None,
        }
    }

    /// Move to a new phase.
    pub fn enter(&mut self, phase: OpPhase) {
        trace!("{}: {} -> {}", self.name, self.phase, phase);

        if phase != OpPhase::Waiting {
            self.deadline = None;
        }
        if phase == OpPhase::Retrying {
            self.attempt += 1;
        }

        self.phase = phase;
    }

    /// Enter the waiting phase with the given timeout.
    pub fn wait(&mut self, timeout_s: f64) {
        self.enter(OpPhase::Waiting);
        self.deadline = Some(Instant::now() + seconds_to_duration(timeout_s));
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        state: &'a dyn StateProvider,
        queue: &'a dyn CommandQueue,
        astrom: &'a dyn Astrometry,
        params: TelExecParams,
        options: OpOptions,
    ) -> Self {
        Self {
            state,
            queue,
            astrom,
            waiter: Waiter::new(params.timing.poll_interval_s),
            observatory: Observatory::from_params(&params.observatory),
            params,
            options,
        }
    }

    pub fn observatory(&self) -> &Observatory {
        &self.observatory
    }

    /// Read the current telescope state.
    pub fn snapshot(&self) -> Result<TelState, OpError> {
        Ok(self.state.snapshot()?)
    }

    /// Run an operation body, logging its outcome and setting the final phase.
    fn run_op<F>(&mut self, name: &'static str, target: &str, body: F) -> Result<(), OpError>
    where
        F: FnOnce(&mut Self, &mut PendingOp) -> Result<(), OpError>
    {
        let mut op = PendingOp::new(name, target);
        info!("{} {}", name, target);

        op.enter(OpPhase::Validating);
        let result = body(self, &mut op);

        match result {
            Ok(()) => {
                op.enter(OpPhase::Succeeded);
                debug!("{} succeeded after {} attempt(s)", name, op.attempt);
            },
            Err(ref e) => {
                op.enter(OpPhase::Failed);
                warn!("{} failed: {}", name, e);
            }
        }

        result
    }

    /// Send a command to the ACS.
    fn dispatch(&self, op: &mut PendingOp, cmd: AcsCmd) -> Result<(), OpError> {
        debug!("{}: sending {:?}", op.name, cmd);
        op.enter(OpPhase::Dispatched);
        self.queue.send(cmd)?;
        Ok(())
    }

    /// Wait until `cond` holds on the telescope state or `timeout_s` elapses.
    fn wait_state<F>(
        &mut self,
        op: &mut PendingOp,
        timeout_s: f64,
        mut cond: F,
    ) -> Result<WaitOutcome, OpError>
    where
        F: FnMut(&TelState) -> bool
    {
        op.wait(timeout_s);

        let state = self.state;
        self.waiter.try_wait_until(
            || state.snapshot().map(|s| cond(&s)).map_err(OpError::from),
            timeout_s
        )
    }

    /// As [`Orchestrator::wait_state`] but a timeout is an error.
    fn require_state<F>(
        &mut self,
        op: &mut PendingOp,
        what: &'static str,
        timeout_s: f64,
        cond: F,
    ) -> Result<(), OpError>
    where
        F: FnMut(&TelState) -> bool
    {
        match self.wait_state(op, timeout_s, cond)? {
            WaitOutcome::Met => Ok(()),
            WaitOutcome::TimedOut => Err(OpError::Timeout { what, timeout_s }),
        }
    }

    /// Fail unless the telescope is in automatic mode.
    fn require_automatic(&self, state: &TelState) -> Result<(), OpError> {
        match state.is_automatic() {
            true => Ok(()),
            false => Err(OpError::NotAutomatic),
        }
    }

    fn system_timeout_s(&self) -> f64 {
        self.params.timing.system_timeout_s
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Modified Julian date of a state snapshot.
pub fn snapshot_mjd(state: &TelState) -> f64 {
    state.jdate - MJD_ZERO_JD
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
