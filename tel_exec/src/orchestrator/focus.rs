//! # Focus Operations

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use comms_if::eqpt::acs::{AcsCmd, FocState};

use super::{OpError, OpPhase, Orchestrator, PendingOp};
use crate::{
    params::FocusParams,
    wait::{with_retries, RetryOutcome, WaitOutcome},
};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Orchestrator<'a> {
    /// Move the focus to an absolute position in millimetres.
    pub fn move_focus(&mut self, target_mm: f64) -> Result<(), OpError> {
        self.run_op("Focus move", &format!("{} mm", target_mm), |orc, op| {
            let p = orc.params.focus;

            if !(target_mm >= p.min_mm && target_mm <= p.max_mm) {
                return Err(OpError::Range(format!(
                    "focus should be between {} mm and {} mm", p.min_mm, p.max_mm
                )))
            }

            let state = orc.snapshot()?;

            if state.foc_state != FocState::Off {
                if !orc.options.force {
                    return Err(OpError::Busy("focus"))
                }

                warn!("Focus is already moving, forcing a stop");
                orc.dispatch(op, AcsCmd::MoveFocus { speed: FocState::Off, duration_s: 0.0 })?;
                let timeout_s = orc.system_timeout_s();
                orc.require_state(op, "the focus to stop", timeout_s, |s| s.foc_state == FocState::Off)?;
            }

            if orc.focus_residual_mm(target_mm)?.abs() <= p.thres_mm {
                info!("Zero move (< {} mm), focus is already at the target", p.thres_mm);
                return Ok(())
            }

            let outcome = with_retries(
                orc,
                p.max_attempts,
                |orc, i| {
                    if i > 0 {
                        op.enter(OpPhase::Retrying);
                        info!("Try {}", i + 1);
                    }
                    orc.focus_attempt(op, target_mm)
                },
                |orc| orc.focus_residual_mm(target_mm).map(|r| r.abs() <= p.thres_mm),
            )?;

            let reached_mm = orc.snapshot()?.val_focus_mm;
            match outcome {
                RetryOutcome::Done(_) => {
                    info!("Focus is at {:.2} mm", reached_mm);
                    Ok(())
                },
                RetryOutcome::Exhausted(attempts) => Err(OpError::RetriesExhausted {
                    target: format!("{:.2} mm", target_mm),
                    reached: format!("{:.2} mm", reached_mm),
                    attempts,
                }),
            }
        })
    }

    /// One move of the focus towards the target.
    fn focus_attempt(&mut self, op: &mut PendingOp, target_mm: f64) -> Result<(), OpError> {
        let p = self.params.focus;
        let timing = self.params.timing;

        let shift_mm = self.focus_residual_mm(target_mm)?;
        let (speed, duration_s) = focus_move_profile(&p, shift_mm)?;

        self.dispatch(op, AcsCmd::MoveFocus { speed, duration_s })?;

        let moving = |vel: f64| vel.abs() > p.moving_speed_mm_s;

        let start = self.wait_state(op, timing.system_timeout_s, |s| {
            s.foc_state != FocState::Off || moving(s.vel_focus_mm_s)
        })?;
        if start == WaitOutcome::TimedOut {
            warn!("Focus didn't start");
        }

        self.wait_state(op, duration_s + timing.motion_margin_s, |s| {
            s.foc_state == FocState::Off && !moving(s.vel_focus_mm_s)
        })?;

        let settled = self.wait_state(op, timing.system_timeout_s, |s| {
            s.foc_state == FocState::Off && !moving(s.vel_focus_mm_s)
        })?;
        if settled == WaitOutcome::TimedOut && self.snapshot()?.foc_state != FocState::Off {
            warn!("Timeout reached, stopping the focus");
            self.dispatch(op, AcsCmd::MoveFocus { speed: FocState::Off, duration_s: 0.0 })?;
        }

        Ok(())
    }

    fn focus_residual_mm(&self, target_mm: f64) -> Result<f64, OpError> {
        Ok(target_mm - self.snapshot()?.val_focus_mm)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Motor speed and duration of a focus move by `shift_mm`.
pub fn focus_move_profile(p: &FocusParams, shift_mm: f64) -> Result<(FocState, f64), OpError> {
    let positive = shift_mm > 0.0;
    let magn_mm = shift_mm.abs();

    let (speed, vel_mm_s) = if magn_mm > p.fast_shift_mm {
        (if positive { FocState::HighPlus } else { FocState::HighMinus }, p.fast_speed_mm_s)
    }
    else if magn_mm > p.thres_mm {
        (if positive { FocState::LowPlus } else { FocState::LowMinus }, p.slow_speed_mm_s)
    }
    else {
        return Err(OpError::NotWorthMoving(shift_mm))
    };

    Ok((speed, magn_mm / vel_mm_s))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        acs_client::{CommandQueue, StateProvider},
        astrom::NativeAstrometry,
        orchestrator::OpOptions,
        params::TelExecParams,
        sim::{SimAcs, SimFaults},
    };

    fn is_focus_stop(cmd: &AcsCmd) -> bool {
        matches!(cmd, AcsCmd::MoveFocus { speed: FocState::Off, .. })
    }

    #[test]
    fn test_move_profile() {
        let p = FocusParams::default();

        let (speed, dt) = focus_move_profile(&p, 6.3).unwrap();
        assert_eq!(speed, FocState::HighPlus);
        assert!((dt - 10.0).abs() < 1e-9);

        let (speed, dt) = focus_move_profile(&p, -0.26).unwrap();
        assert_eq!(speed, FocState::LowMinus);
        assert!((dt - 2.0).abs() < 1e-9);

        assert!(matches!(focus_move_profile(&p, 0.02), Err(OpError::NotWorthMoving(_))));
        assert!(matches!(focus_move_profile(&p, -p.thres_mm), Err(OpError::NotWorthMoving(_))));
    }

    #[test]
    fn test_move_focus() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 100.0).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        orc.move_focus(110.0).unwrap();
        assert!((sim.snapshot().unwrap().val_focus_mm - 110.0).abs() < 0.03);

        orc.move_focus(109.5).unwrap();
        assert!((sim.snapshot().unwrap().val_focus_mm - 109.5).abs() < 0.03);
    }

    #[test]
    fn test_rejections() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 100.0).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        assert!(matches!(orc.move_focus(0.5), Err(OpError::Range(_))));
        assert!(matches!(orc.move_focus(200.0), Err(OpError::Range(_))));
        assert!(matches!(orc.move_focus(f64::NAN), Err(OpError::Range(_))));

        // Below the threshold is a success without a command
        orc.move_focus(100.01).unwrap();
        assert!(sim.commands().unwrap().is_empty());

        sim.send(AcsCmd::MoveFocus { speed: FocState::LowPlus, duration_s: 60.0 }).unwrap();
        assert!(matches!(orc.move_focus(50.0), Err(OpError::Busy(_))));
    }

    #[test]
    fn test_gap_at_threshold() {
        let mut params = TelExecParams::fast();
        params.focus.thres_mm = 0.25;
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 100.0).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        // A gap of exactly the threshold counts as in place
        orc.move_focus(100.25).unwrap();
        orc.move_focus(99.75).unwrap();
        assert!(sim.commands().unwrap().is_empty());
    }

    #[test]
    fn test_jammed_focus() {
        let params = TelExecParams::fast();
        let max_attempts = params.focus.max_attempts;
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 100.0).unwrap();
        sim.set_faults(SimFaults { focus_jammed: true, ..Default::default() }).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        match orc.move_focus(110.0) {
            Err(OpError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, max_attempts),
            r => panic!("Unexpected result {:?}", r),
        }

        // One move per attempt, the motor never ran so there was nothing to stop
        let cmds = sim.commands().unwrap();
        assert_eq!(cmds.len(), max_attempts);
        assert!(!cmds.iter().any(is_focus_stop));
        assert_eq!(sim.snapshot().unwrap().val_focus_mm, 100.0);
    }

    #[test]
    fn test_overrunning_focus() {
        let params = TelExecParams::fast();
        let max_attempts = params.focus.max_attempts;
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 100.0).unwrap();
        sim.set_faults(SimFaults { focus_overrun: true, ..Default::default() }).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        match orc.move_focus(110.0) {
            Err(OpError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, max_attempts),
            r => panic!("Unexpected result {:?}", r),
        }

        // Every attempt ran past its duration and was stopped
        let cmds = sim.commands().unwrap();
        assert_eq!(cmds.iter().filter(|c| is_focus_stop(c)).count(), max_attempts);
        assert_eq!(sim.snapshot().unwrap().foc_state, FocState::Off);
    }
}
