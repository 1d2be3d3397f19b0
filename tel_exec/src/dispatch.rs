//! # Operation Dispatch
//!
//! Runs the operations requested on the command line in a fixed order:
//!
//! 1. Information report
//! 2. Stop
//! 3. Equatorial or horizontal input coordinates (blocking)
//! 4. P2 move, then P2 mode
//! 5. Focus move
//! 6. Azimuth reverse
//! 7. Pointing correction system off, or on whenever any command was requested (blocking)
//! 8. Goto RA/Dec or goto A/Z (blocking), otherwise an A/Z or RA/Dec correction
//!
//! A failed operation makes the run fail. Failures of blocking operations end the run, the
//! others let the following operations go ahead.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info};

use crate::{
    orchestrator::{Frame, OpError, Orchestrator},
    report::{log_report, InfoLevel},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Exit status when every operation succeeded
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status when any operation failed
pub const EXIT_FAILURE: i32 = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Operations requested for this run.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub stop: bool,

    pub eq_coords: Option<String>,

    pub hor_coords: Option<String>,

    pub p2_move: Option<String>,

    pub p2_mode: Option<String>,

    /// Focus target, ignored unless positive
    pub focus_mm: Option<f64>,

    pub az_reverse: bool,

    pub pcs_off: bool,

    pub goto_radec: bool,

    pub goto_azimz: bool,

    pub az_corr: Option<String>,

    pub rad_corr: Option<String>,

    pub info: Option<InfoLevel>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What a failure means for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnFailure {
    Continue,
    Abort,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Plan {
    /// True if any command would be sent to the telescope.
    pub fn has_commands(&self) -> bool {
        self.stop
            || self.eq_coords.is_some()
            || self.hor_coords.is_some()
            || self.p2_move.is_some()
            || self.p2_mode.is_some()
            || self.focus_mm.map_or(false, |f| f > 0.0)
            || self.az_reverse
            || self.pcs_off
            || self.goto_radec
            || self.goto_azimz
            || self.az_corr.is_some()
            || self.rad_corr.is_some()
    }

    /// True if the telescope state has to be read.
    pub fn needs_connection(&self) -> bool {
        self.has_commands() || self.info.is_some()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute `plan`, returning the exit status of the run.
pub fn execute(orc: &mut Orchestrator, plan: &Plan) -> i32 {
    let mut status = EXIT_SUCCESS;

    if let Some(level) = plan.info {
        let report = orc.snapshot().map(|s| log_report(&s, orc.observatory(), level));
        check(report, OnFailure::Continue, &mut status);
    }

    if !run_operations(orc, plan, &mut status) {
        info!("Run ended after a blocking failure");
    }

    status
}

/// Run the telescope operations of `plan`, returns false if a blocking operation failed.
fn run_operations(orc: &mut Orchestrator, plan: &Plan, status: &mut i32) -> bool {
    use OnFailure::*;

    if plan.stop {
        check(orc.stop_telescope(), Continue, status);
    }

    if let Some(ref c) = plan.eq_coords {
        if !check(orc.set_coords(c, Frame::Equatorial), Abort, status) {
            return false
        }
    }
    else if let Some(ref c) = plan.hor_coords {
        if !check(orc.set_coords(c, Frame::Horizontal), Abort, status) {
            return false
        }
    }

    if let Some(ref a) = plan.p2_move {
        check(orc.move_p2(a), Continue, status);
    }

    if let Some(ref m) = plan.p2_mode {
        check(orc.set_p2_mode(m), Continue, status);
    }

    match plan.focus_mm {
        Some(f) if f > 0.0 => {
            check(orc.move_focus(f), Continue, status);
        },
        _ => (),
    }

    if plan.az_reverse {
        check(orc.toggle_az_reverse(), Continue, status);
    }

    let pcs = match (plan.pcs_off, plan.has_commands()) {
        (true, _) => Some(false),
        (false, true) => Some(true),
        (false, false) => None,
    };
    if let Some(on) = pcs {
        if !check(orc.set_pcs(on), Abort, status) {
            return false
        }
    }

    if plan.goto_radec {
        check(orc.goto_position(Frame::Equatorial), Abort, status)
    }
    else if plan.goto_azimz {
        check(orc.goto_position(Frame::Horizontal), Abort, status)
    }
    else if let Some(ref c) = plan.az_corr {
        check(orc.run_correction(c, Frame::Horizontal), Continue, status)
    }
    else if let Some(ref c) = plan.rad_corr {
        check(orc.run_correction(c, Frame::Equatorial), Continue, status)
    }
    else {
        true
    }
}

/// Record the outcome of an operation, returns true if the run may go on.
fn check(result: Result<(), OpError>, on_failure: OnFailure, status: &mut i32) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!("{}", e);
            *status = EXIT_FAILURE;
            on_failure == OnFailure::Continue
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
