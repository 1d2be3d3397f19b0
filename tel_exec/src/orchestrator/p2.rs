//! # P2 Rotator Operations

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use util::maths::wrap_period;

use comms_if::eqpt::acs::{AcsCmd, P2State};

use super::{OpError, OpPhase, Orchestrator, PendingOp};
use crate::{
    angle::{format_angle, is_delimiter, parse_angle, AS_PER_DEG},
    params::P2Params,
    wait::{with_retries, RetryOutcome, WaitOutcome},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Suffix marking a relative move
const REL_SUFFIX: &str = "rel";

/// Largest absolute value of a move argument
const MAX_ANGLE_DEG: f64 = 360.0;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Orchestrator<'a> {
    /// Move the P2 rotator.
    ///
    /// `arg` is an angle in degrees, absolute unless followed by `rel`. The move never crosses the
    /// prohibited zone, and is repeated until P2 is within the angle threshold of the target.
    pub fn move_p2(&mut self, arg: &str) -> Result<(), OpError> {
        self.run_op("P2 move", arg, |orc, op| {
            let (angle_deg, relative) = parse_p2_arg(arg)?;

            let state = orc.snapshot()?;
            let p = orc.params.p2;

            let current_deg = state.val_p2_as / AS_PER_DEG;
            let target_deg = match relative {
                true => wrap_period(current_deg + angle_deg, 360.0),
                false => wrap_period(angle_deg, 360.0),
            };

            if target_deg > p.low_end_sw_deg && target_deg < p.high_end_sw_deg {
                return Err(OpError::ProhibitedZone {
                    target_deg,
                    low_deg: p.low_end_sw_deg,
                    high_deg: p.high_end_sw_deg,
                })
            }

            // A moving rotator is only preempted on request
            if !matches!(state.p2_state, P2State::Off | P2State::On) {
                if !orc.options.force {
                    return Err(OpError::Busy("P2"))
                }

                warn!("P2 is already moving, forcing a stop");
                orc.dispatch(op, AcsCmd::MoveP2 { vel_as_s: 0.0 })?;
                let timeout_s = orc.system_timeout_s();
                orc.require_state(op, "P2 to stop", timeout_s, |s| s.p2_state == P2State::Off)?;
            }

            if orc.p2_residual_deg(target_deg)?.abs() < p.angle_thres_deg {
                info!("Zero move (< {}°), P2 is already at the target", p.angle_thres_deg);
                return Ok(())
            }

            let saved_mode = state.p2_mode;
            orc.dispatch(op, AcsCmd::SetP2Mode(P2State::Off))?;

            let outcome = with_retries(
                orc,
                p.max_attempts,
                |orc, i| {
                    if i > 0 {
                        op.enter(OpPhase::Retrying);
                        info!("Try {}", i + 1);
                    }
                    orc.p2_attempt(op, target_deg)
                },
                |orc| orc.p2_residual_deg(target_deg).map(|r| r.abs() < p.angle_thres_deg),
            )?;

            match outcome {
                RetryOutcome::Done(_) => {
                    let state = orc.snapshot()?;
                    info!("P2 is at {}", format_angle(state.val_p2_as, false, 1));
                    orc.dispatch(op, AcsCmd::SetP2Mode(saved_mode))
                },
                RetryOutcome::Exhausted(attempts) => {
                    let state = orc.snapshot()?;
                    Err(OpError::RetriesExhausted {
                        target: format!("{:.3}°", target_deg),
                        reached: format!("{:.3}°", state.val_p2_as / AS_PER_DEG),
                        attempts,
                    })
                }
            }
        })
    }

    /// Set the P2 mode, `"stop"` or `"track"`.
    pub fn set_p2_mode(&mut self, arg: &str) -> Result<(), OpError> {
        self.run_op("P2 mode", arg, |orc, op| {
            let mode = parse_p2_mode(arg)?;

            orc.dispatch(op, AcsCmd::SetP2Mode(mode))?;

            let timeout_s = orc.system_timeout_s();
            orc.require_state(op, "the P2 mode", timeout_s, |s| s.p2_state == mode)
        })
    }

    /// One move of P2 towards the target.
    fn p2_attempt(&mut self, op: &mut PendingOp, target_deg: f64) -> Result<(), OpError> {
        let shift_deg = self.p2_residual_deg(target_deg)?;
        let p = self.params.p2;
        let timing = self.params.timing;

        let (vel_as_s, duration_s) = p2_move_profile(&p, shift_deg);
        self.dispatch(op, AcsCmd::MoveP2To { vel_as_s, duration_s })?;

        let start = self.wait_state(op, timing.system_timeout_s, |s| {
            s.vel_p2_as_s.abs() > p.moving_speed_as_s && s.p2_state != P2State::Off
        })?;
        if start == WaitOutcome::TimedOut {
            warn!("P2 didn't start");
            return Ok(())
        }

        let end = self.wait_state(op, duration_s + timing.motion_margin_s, |s| {
            s.vel_p2_as_s.abs() < p.moving_speed_as_s && s.p2_state == P2State::Off
        })?;
        if end == WaitOutcome::TimedOut && self.snapshot()?.p2_state != P2State::Off {
            warn!("Timeout reached, stopping P2");
            self.dispatch(op, AcsCmd::MoveP2 { vel_as_s: 0.0 })?;
        }

        Ok(())
    }

    /// Signed shift from the current P2 angle to the target, in degrees.
    fn p2_residual_deg(&self, target_deg: f64) -> Result<f64, OpError> {
        let state = self.snapshot()?;

        Ok(p2_shift_deg(&self.params.p2, state.val_p2_as / AS_PER_DEG, target_deg))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a move argument into its angle in degrees and whether the move is relative.
///
/// The `rel` suffix is matched once at the end, ignoring case, and may be separated from the
/// angle by whitespace.
pub fn parse_p2_arg(arg: &str) -> Result<(f64, bool), OpError> {
    let trimmed = arg.trim();

    let split = trimmed.len().checked_sub(REL_SUFFIX.len())
        .filter(|&i| trimmed.is_char_boundary(i))
        .map(|i| trimmed.split_at(i));

    let (angle_str, relative) = match split {
        Some((head, tail)) if tail.eq_ignore_ascii_case(REL_SUFFIX) => (head.trim_end(), true),
        _ => (trimmed, false),
    };

    if angle_str.is_empty() {
        return Err(OpError::Parse(format!(
            "expected angle[rel] with the angle between -360 and 360 degrees, found \"{}\"", arg
        )))
    }

    let (angle_deg, rest) = parse_angle(angle_str)?;
    if !rest.chars().all(is_delimiter) {
        return Err(OpError::Parse(format!("unexpected \"{}\" after the angle", rest.trim())))
    }

    if angle_deg.abs() > MAX_ANGLE_DEG {
        return Err(OpError::Range(format!(
            "P2 angle {}° should be between -360 and 360 degrees", angle_deg
        )))
    }

    Ok((angle_deg, relative))
}

pub fn parse_p2_mode(arg: &str) -> Result<P2State, OpError> {
    match arg.trim() {
        s if s.eq_ignore_ascii_case("stop") => Ok(P2State::Off),
        s if s.eq_ignore_ascii_case("track") => Ok(P2State::On),
        _ => Err(OpError::Parse(format!(
            "P2 mode should be \"stop\" or \"track\", found \"{}\"", arg
        ))),
    }
}

/// Signed shift between two P2 angles along the path which avoids the prohibited zone.
///
/// The allowed range runs from the upper edge of the zone through 0° up to its lower edge, angles
/// are unrolled onto that range before taking the difference.
pub fn p2_shift_deg(p: &P2Params, from_deg: f64, to_deg: f64) -> f64 {
    let unroll = |a: f64| {
        let a = wrap_period(a, 360.0);
        if a <= p.low_end_sw_deg { a + 360.0 } else { a }
    };

    unroll(to_deg) - unroll(from_deg)
}

/// Velocity and duration of a P2 move by `shift_deg`.
///
/// Moves use the nominal speed unless they would be shorter than the minimum move time, in which
/// case the speed is lowered (down to the minimum speed). Fast long moves are shortened to account
/// for the deceleration of the rotator.
pub fn p2_move_profile(p: &P2Params, shift_deg: f64) -> (f64, f64) {
    let shift_as = shift_deg.abs() * AS_PER_DEG;

    let mut vel_as_s = p.nominal_speed_as_s;
    let mut duration_s = shift_as / vel_as_s;

    if duration_s < p.min_move_time_s {
        vel_as_s = (shift_as / p.min_move_time_s).max(p.min_speed_as_s);
        duration_s = shift_as / vel_as_s;
    }

    if vel_as_s > p.fast_speed_as_s && duration_s > p.fast_time_corr_s + p.min_move_time_s {
        duration_s -= p.fast_time_corr_s;
    }

    (vel_as_s.copysign(shift_deg), duration_s)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
