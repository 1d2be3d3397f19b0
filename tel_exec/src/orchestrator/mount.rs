//! # Mount Operations

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use comms_if::eqpt::acs::{AcsCmd, PcsState, SysMode, SysTarget};

use super::{Frame, OpError, Orchestrator, PendingOp};
use crate::wait::WaitOutcome;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Orchestrator<'a> {
    /// Stop the telescope.
    pub fn stop_telescope(&mut self) -> Result<(), OpError> {
        self.run_op("Stop telescope", "", |orc, op| orc.stop_inner(op))
    }

    /// Point the telescope at the last input coordinates and wait for tracking.
    ///
    /// For equatorial coordinates a short move is used when the mount is already close to the
    /// input position, otherwise a full slew.
    pub fn goto_position(&mut self, frame: Frame) -> Result<(), OpError> {
        let name = match frame {
            Frame::Equatorial => "Go to RA/Dec",
            Frame::Horizontal => "Go to A/Z",
        };

        self.run_op(name, "", |orc, op| {
            let state = orc.snapshot()?;
            orc.require_automatic(&state)?;

            if state.sys_mode != SysMode::Stop {
                orc.stop_inner(op)?;
            }

            let state = orc.snapshot()?;
            let g = orc.params.goto;

            match frame {
                Frame::Equatorial => {
                    let near = (state.val_azim_as - state.inp_azim_as).abs() < g.move_window_azim_as
                        && (state.val_zdist_as - state.inp_zdist_as).abs() < g.move_window_zdist_as;

                    match near {
                        true => orc.dispatch(op, AcsCmd::MoveToObject)?,
                        false => orc.dispatch(op, AcsCmd::GoToObject)?,
                    }
                    orc.dispatch(op, AcsCmd::SetSysTarget(SysTarget::Object))?;
                },
                Frame::Horizontal => {
                    orc.dispatch(op, AcsCmd::GoToAzimZ)?;
                    orc.dispatch(op, AcsCmd::SetSysTarget(SysTarget::Position))?;
                },
            }

            orc.dispatch(op, AcsCmd::StartTelescope)?;
            orc.waiter.pause(g.start_settle_s);

            let timeout_s = orc.system_timeout_s();
            let started = orc.wait_state(op, timeout_s, |s| {
                !matches!(s.sys_mode, SysMode::Stop | SysMode::Wait)
            })?;
            if started == WaitOutcome::TimedOut {
                warn!("The telescope didn't start, stopping");
                orc.dispatch(op, AcsCmd::StopTelescope)?;
                return Err(OpError::Timeout { what: "the telescope to start", timeout_s })
            }

            info!("Pointing, waiting for tracking");

            let tracking = orc.wait_state(op, g.tracking_timeout_s, |s| s.sys_mode == SysMode::TrkOk)?;
            if tracking == WaitOutcome::TimedOut {
                warn!("Tracking not acquired, stopping");
                orc.dispatch(op, AcsCmd::StopTelescope)?;
                return Err(OpError::Timeout { what: "tracking", timeout_s: g.tracking_timeout_s })
            }

            Ok(())
        })
    }

    /// Toggle the azimuth reverse mode.
    pub fn toggle_az_reverse(&mut self) -> Result<(), OpError> {
        self.run_op("Azimuth reverse", "", |orc, op| {
            let new_mode = orc.snapshot()?.az_reverse.toggled();
            info!("Turning azimuth reverse {:?}", new_mode);

            orc.dispatch(op, AcsCmd::SetAzReverse(new_mode))?;

            let timeout_s = orc.system_timeout_s();
            orc.require_state(op, "the azimuth reverse mode", timeout_s, |s| s.az_reverse == new_mode)
        })
    }

    /// Switch the pointing correction system on or off.
    pub fn set_pcs(&mut self, on: bool) -> Result<(), OpError> {
        let target = match on {
            true => PcsState::On,
            false => PcsState::Off,
        };

        self.run_op("Pointing correction", if on { "on" } else { "off" }, |orc, op| {
            if orc.snapshot()?.pos_corr == target {
                return Ok(())
            }

            orc.dispatch(op, AcsCmd::SwitchPosCorr(target))?;

            let timeout_s = orc.system_timeout_s();
            orc.require_state(op, "the pointing correction state", timeout_s, |s| s.pos_corr == target)
        })
    }

    fn stop_inner(&mut self, op: &mut PendingOp) -> Result<(), OpError> {
        let state = self.snapshot()?;
        self.require_automatic(&state)?;

        if state.sys_mode == SysMode::Stop {
            info!("Already stopped");
            return Ok(())
        }

        self.dispatch(op, AcsCmd::StopTelescope)?;

        let timeout_s = self.system_timeout_s();
        self.require_state(op, "the telescope to stop", timeout_s, |s| s.sys_mode == SysMode::Stop)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::acs::{AzReverse, TelMode};
    use crate::{
        acs_client::{CommandQueue, StateProvider},
        astrom::NativeAstrometry,
        orchestrator::OpOptions,
        params::TelExecParams,
        sim::{SimAcs, SimFaults},
    };

    #[test]
    fn test_stop() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        // Already stopped
        orc.stop_telescope().unwrap();
        assert!(sim.commands().unwrap().is_empty());

        sim.with_state(|s| s.sys_mode = SysMode::TrkOk).unwrap();
        orc.stop_telescope().unwrap();
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::Stop);
        assert_eq!(sim.commands().unwrap(), vec![AcsCmd::StopTelescope]);

        sim.with_state(|s| s.tel_mode = TelMode::Manual).unwrap();
        assert!(matches!(orc.stop_telescope(), Err(OpError::NotAutomatic)));
    }

    #[test]
    fn test_goto_horizontal() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        orc.set_coords("45.0 40", Frame::Horizontal).unwrap();
        orc.goto_position(Frame::Horizontal).unwrap();

        let state = sim.snapshot().unwrap();
        assert_eq!(state.sys_mode, SysMode::TrkOk);
        assert_eq!(state.sys_target, SysTarget::Position);
        assert!((state.val_azim_as - 45.0 * 3600.0).abs() < 1e-6);
        assert!((state.val_zdist_as - 40.0 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_goto_equatorial_move_or_slew() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        // Put the input object 10 arcminutes from the mount
        let state = sim.snapshot().unwrap();
        let (alpha_s, delta_as) = orc.observatory().horizontal_to_equatorial(
            state.val_azim_as + 600.0, state.val_zdist_as, state.s_time_s
        );
        sim.send(AcsCmd::SetRaDec { alpha_s, delta_as }).unwrap();
        sim.clear_commands().unwrap();

        orc.goto_position(Frame::Equatorial).unwrap();
        let cmds = sim.commands().unwrap();
        assert_eq!(cmds[0], AcsCmd::MoveToObject);
        assert_eq!(cmds[1], AcsCmd::SetSysTarget(SysTarget::Object));
        assert_eq!(cmds[2], AcsCmd::StartTelescope);

        // Far away objects need a full slew, and the tracking telescope is stopped first
        let state = sim.snapshot().unwrap();
        let (alpha_s, delta_as) = orc.observatory().horizontal_to_equatorial(
            state.val_azim_as + 36_000.0, state.val_zdist_as, state.s_time_s
        );
        sim.send(AcsCmd::SetRaDec { alpha_s, delta_as }).unwrap();
        sim.clear_commands().unwrap();

        orc.goto_position(Frame::Equatorial).unwrap();
        let cmds = sim.commands().unwrap();
        assert_eq!(cmds[0], AcsCmd::StopTelescope);
        assert_eq!(cmds[1], AcsCmd::GoToObject);
    }

    #[test]
    fn test_goto_never_tracks() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.set_faults(SimFaults { never_tracks: true, ..Default::default() }).unwrap();
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        match orc.goto_position(Frame::Horizontal) {
            Err(OpError::Timeout { what, .. }) => assert_eq!(what, "tracking"),
            r => panic!("Unexpected result {:?}", r),
        }

        assert_eq!(sim.commands().unwrap().last(), Some(&AcsCmd::StopTelescope));
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::Stop);
    }

    #[test]
    fn test_goto_manual() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.tel_mode = TelMode::Manual).unwrap();
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        assert!(matches!(orc.goto_position(Frame::Horizontal), Err(OpError::NotAutomatic)));
        assert!(sim.commands().unwrap().is_empty());
    }

    #[test]
    fn test_az_reverse_and_pcs() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        orc.toggle_az_reverse().unwrap();
        assert_eq!(sim.snapshot().unwrap().az_reverse, AzReverse::On);
        orc.toggle_az_reverse().unwrap();
        assert_eq!(sim.snapshot().unwrap().az_reverse, AzReverse::Off);

        sim.clear_commands().unwrap();
        orc.set_pcs(false).unwrap();
        assert!(sim.commands().unwrap().is_empty());

        orc.set_pcs(true).unwrap();
        assert_eq!(sim.snapshot().unwrap().pos_corr, PcsState::On);
        assert_eq!(sim.commands().unwrap(), vec![AcsCmd::SwitchPosCorr(PcsState::On)]);
    }
}
