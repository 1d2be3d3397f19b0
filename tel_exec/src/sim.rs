//! # Emulated ACS
//!
//! [`SimAcs`] stands in for the automatic control system. It implements both [`StateProvider`] and
//! [`CommandQueue`] and reacts to commands the way the real system does, at the speeds given in the
//! parameters.
//!
//! The emulation is lazy: nothing runs in the background, the state is advanced by the wall clock
//! time elapsed since the last access whenever it is read or a command is received.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{Timelike, Utc};
use log::{debug, trace};
use std::{sync::{Mutex, MutexGuard}, time::Instant};
use util::maths::wrap_period;

use comms_if::eqpt::acs::{
    AcsCmd, FocState, P2State, SysMode, SysTarget, TelMode, TelState,
};

use crate::{
    acs_client::{AcsError, CommandQueue, StateProvider},
    angle::{AS_PER_CIRCLE, S_PER_DAY},
    params::{FocusParams, SimParams, TelExecParams},
    sphere::Observatory,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Ratio of sidereal to mean solar time
const SIDEREAL_RATE: f64 = 1.002_737_909_35;

/// Julian date of the Unix epoch
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// In-process emulated ACS.
pub struct SimAcs {
    inner: Mutex<SimInner>,
}

/// Faults which can be injected into the emulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimFaults {
    /// The mean time no longer advances
    pub frozen_heartbeat: bool,

    /// P2 ignores motion commands
    pub p2_jammed: bool,

    /// The focus motor ignores motion commands
    pub focus_jammed: bool,

    /// The focus motor keeps running past the commanded duration until stopped
    pub focus_overrun: bool,

    /// Input coordinates are never updated
    pub coords_ignored: bool,

    /// A started telescope never reaches tracking
    pub never_tracks: bool,
}

struct SimInner {
    state: TelState,

    observatory: Observatory,

    focus: FocusParams,

    sim: SimParams,

    faults: SimFaults,

    last_update: Instant,

    p2_motion: Option<Motion>,

    focus_motion: Option<Motion>,

    /// Kind of slew requested by the last go/move command
    slew_request: Option<SlewKind>,

    slew: Option<Slew>,

    correction: Option<Correction>,

    /// The last coordinates entered were equatorial
    input_equatorial: bool,

    commands: Vec<AcsCmd>,
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    vel: f64,

    remaining_s: f64,
}

#[derive(Debug, Clone, Copy)]
struct Slew {
    kind: SlewKind,

    elapsed_s: f64,

    from_az_as: f64,
    from_zd_as: f64,

    duration_s: f64,
}

#[derive(Debug, Clone, Copy)]
struct Correction {
    remaining_s: f64,

    return_mode: SysMode,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlewKind {
    Object,
    AzimZ,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimAcs {
    /// Create a new emulated ACS, powered on in automatic mode with the telescope stopped.
    pub fn new(params: &TelExecParams) -> Self {
        let now = Utc::now();
        let jdate = UNIX_EPOCH_JD
            + (now.timestamp() as f64 + now.timestamp_subsec_nanos() as f64 * 1e-9) / S_PER_DAY;

        let observatory = Observatory::from_params(&params.observatory);
        let longitude_s = params.observatory.longitude_as / 15.0;

        let ut_s = now.num_seconds_from_midnight() as f64;

        let mut state = TelState {
            jdate,
            m_time_s: wrap_period(ut_s + longitude_s, S_PER_DAY),
            s_time_s: local_sidereal_time_s(jdate, longitude_s),
            hardware_on: true,
            tel_mode: TelMode::Automatic,
            sys_mode: SysMode::Stop,
            val_azim_as: 0.0,
            val_zdist_as: 30.0 * 3600.0,
            val_p2_as: 180.0 * 3600.0,
            val_focus_mm: 100.0,
            ..Default::default()
        };
        state.inp_azim_as = state.val_azim_as;
        state.inp_zdist_as = state.val_zdist_as;

        let mut inner = SimInner {
            state,
            observatory,
            focus: params.focus,
            sim: params.sim,
            faults: SimFaults::default(),
            last_update: Instant::now(),
            p2_motion: None,
            focus_motion: None,
            slew_request: None,
            slew: None,
            correction: None,
            input_equatorial: false,
            commands: Vec::new(),
        };
        inner.update_coordinates();

        debug!("Emulated ACS started");

        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Modify the emulated state, for instance to set up a scenario.
    pub fn with_state<F: FnOnce(&mut TelState)>(&self, f: F) -> Result<(), AcsError> {
        let mut inner = self.lock()?;
        inner.advance();
        f(&mut inner.state);
        inner.update_coordinates();
        Ok(())
    }

    pub fn set_faults(&self, faults: SimFaults) -> Result<(), AcsError> {
        self.lock()?.faults = faults;
        Ok(())
    }

    /// All commands received so far.
    pub fn commands(&self) -> Result<Vec<AcsCmd>, AcsError> {
        Ok(self.lock()?.commands.clone())
    }

    pub fn clear_commands(&self) -> Result<(), AcsError> {
        self.lock()?.commands.clear();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<SimInner>, AcsError> {
        self.inner.lock().map_err(|_| AcsError::LockPoisoned)
    }
}

impl StateProvider for SimAcs {
    fn snapshot(&self) -> Result<TelState, AcsError> {
        let mut inner = self.lock()?;
        inner.advance();
        Ok(inner.state.clone())
    }
}

impl CommandQueue for SimAcs {
    fn send(&self, cmd: AcsCmd) -> Result<(), AcsError> {
        let mut inner = self.lock()?;
        inner.advance();

        trace!("Emulated ACS <- {:?}", cmd);
        inner.commands.push(cmd.clone());
        inner.execute(cmd);

        Ok(())
    }
}

impl SimInner {
    /// Advance the emulation to the current time.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        if !self.faults.frozen_heartbeat {
            self.state.m_time_s = wrap_period(self.state.m_time_s + dt, S_PER_DAY);
            self.state.s_time_s = wrap_period(self.state.s_time_s + dt * SIDEREAL_RATE, S_PER_DAY);
            self.state.jdate += dt / S_PER_DAY;
        }

        self.advance_p2(dt);
        self.advance_focus(dt);
        self.advance_slew(dt);
        self.advance_correction(dt);
        self.update_coordinates();
    }

    fn advance_p2(&mut self, dt: f64) {
        let motion = match self.p2_motion {
            Some(ref mut m) => m,
            None => return,
        };

        let step_s = dt.min(motion.remaining_s);
        motion.remaining_s -= step_s;

        self.state.val_p2_as = wrap_period(
            self.state.val_p2_as + motion.vel * step_s,
            AS_PER_CIRCLE
        );

        if motion.remaining_s <= 0.0 {
            self.stop_p2();
        }
    }

    fn advance_focus(&mut self, dt: f64) {
        let overrun = self.faults.focus_overrun;
        let motion = match self.focus_motion {
            Some(ref mut m) => m,
            None => return,
        };

        let step_s = match overrun {
            true => dt,
            false => dt.min(motion.remaining_s),
        };
        if !overrun {
            motion.remaining_s -= step_s;
        }

        let pos_mm = self.state.val_focus_mm + motion.vel * step_s;
        self.state.val_focus_mm = util::maths::clamp(&pos_mm, &self.focus.min_mm, &self.focus.max_mm);

        if motion.remaining_s <= 0.0 {
            self.stop_focus();
        }
    }

    fn advance_slew(&mut self, dt: f64) {
        let slew = match self.slew {
            Some(ref mut s) => s,
            None => return,
        };

        slew.elapsed_s += dt;

        let start_delay_s = self.sim.start_delay_s;
        if slew.elapsed_s < start_delay_s {
            self.state.sys_mode = SysMode::Wait;
            return
        }

        if self.faults.never_tracks {
            self.state.sys_mode = SysMode::TrkSeek;
            return
        }

        let (to_az_as, to_zd_as) = (self.state.inp_azim_as, self.state.inp_zdist_as);
        let frac = match slew.duration_s {
            d if d > 0.0 => ((slew.elapsed_s - start_delay_s) / d).min(1.0),
            _ => 1.0,
        };

        self.state.val_azim_as = slew.from_az_as + (to_az_as - slew.from_az_as) * frac;
        self.state.val_zdist_as = slew.from_zd_as + (to_zd_as - slew.from_zd_as) * frac;

        self.state.sys_mode = match (frac < 1.0, slew.kind) {
            (true, SlewKind::Object) => SysMode::PointAd,
            (true, SlewKind::AzimZ) => SysMode::PointAz,
            (false, _) => SysMode::TrkOk,
        };

        if frac >= 1.0 {
            self.slew = None;
        }
    }

    fn advance_correction(&mut self, dt: f64) {
        let corr = match self.correction {
            Some(ref mut c) => c,
            None => return,
        };

        corr.remaining_s -= dt;

        if corr.remaining_s <= 0.0 {
            self.state.sys_mode = corr.return_mode;
            self.correction = None;
        }
    }

    /// Recompute the derived coordinates from the encoders and inputs.
    fn update_coordinates(&mut self) {
        let s = &mut self.state;

        let (alpha_s, delta_as) = self.observatory.horizontal_to_equatorial(
            s.val_azim_as, s.val_zdist_as, s.s_time_s
        );
        s.cur_alpha_s = alpha_s;
        s.cur_delta_as = delta_as;
        s.tel_alpha_s = alpha_s;
        s.tel_delta_as = delta_as;
        s.cur_azim_as = s.val_azim_as;
        s.cur_zdist_as = s.val_zdist_as;

        if self.input_equatorial {
            let (az_as, zd_as) = self.observatory.equatorial_to_horizontal(
                s.inp_alpha_s, s.inp_delta_as, s.s_time_s
            );
            s.inp_azim_as = az_as;
            s.inp_zdist_as = zd_as;
        }

        s.vel_p2_as_s = self.p2_motion.map(|m| m.vel).unwrap_or(0.0);
        s.vel_focus_mm_s = self.focus_motion.map(|m| m.vel).unwrap_or(0.0);
    }

    fn stop_p2(&mut self) {
        self.p2_motion = None;
        self.state.vel_p2_as_s = 0.0;
        self.state.p2_state = self.state.p2_mode;
    }

    fn stop_focus(&mut self) {
        self.focus_motion = None;
        self.state.vel_focus_mm_s = 0.0;
        self.state.foc_state = FocState::Off;
    }

    fn execute(&mut self, cmd: AcsCmd) {
        match cmd {
            AcsCmd::MoveP2To { vel_as_s, duration_s } => self.move_p2(vel_as_s, duration_s),
            AcsCmd::MoveP2 { vel_as_s } => self.move_p2(vel_as_s, f64::INFINITY),
            AcsCmd::SetP2Mode(mode) => {
                self.state.p2_mode = mode;
                if self.p2_motion.is_none() {
                    self.state.p2_state = mode;
                }
            },
            AcsCmd::MoveFocus { speed, duration_s } => self.move_focus(speed, duration_s),
            AcsCmd::SetRaDec { alpha_s, delta_as } => {
                if !self.faults.coords_ignored {
                    self.state.inp_alpha_s = alpha_s;
                    self.state.inp_delta_as = delta_as;
                    self.input_equatorial = true;
                }
            },
            AcsCmd::SetAzimZ { azim_as, zdist_as } => {
                if !self.faults.coords_ignored {
                    self.state.inp_azim_as = azim_as;
                    self.state.inp_zdist_as = zdist_as;
                    self.input_equatorial = false;
                }
            },
            AcsCmd::SetAzReverse(r) => self.state.az_reverse = r,
            AcsCmd::StopTelescope => {
                self.slew = None;
                self.correction = None;
                self.state.sys_mode = SysMode::Stop;
            },
            AcsCmd::StartTelescope => self.start(),
            AcsCmd::MoveToObject | AcsCmd::GoToObject => self.slew_request = Some(SlewKind::Object),
            AcsCmd::GoToAzimZ => self.slew_request = Some(SlewKind::AzimZ),
            AcsCmd::SetSysTarget(target) => self.state.sys_target = target,
            AcsCmd::SwitchPosCorr(pcs) => self.state.pos_corr = pcs,
            AcsCmd::DoAzCorr { d_azim_as, d_zdist_as } => {
                if self.start_correction() {
                    self.state.val_azim_as += d_azim_as;
                    self.state.val_zdist_as += d_zdist_as;
                }
            },
            AcsCmd::DoAdCorr { d_alpha_as, d_delta_as } => {
                if self.start_correction() {
                    self.state.inp_alpha_s = wrap_period(
                        self.state.inp_alpha_s + d_alpha_as / 15.0,
                        S_PER_DAY
                    );
                    self.state.inp_delta_as += d_delta_as;
                }
            },
        }
    }

    fn move_p2(&mut self, vel_as_s: f64, duration_s: f64) {
        if self.faults.p2_jammed {
            return
        }

        if vel_as_s == 0.0 || duration_s <= 0.0 {
            self.stop_p2();
            return
        }

        self.p2_motion = Some(Motion {
            vel: vel_as_s,
            remaining_s: duration_s,
        });
        self.state.vel_p2_as_s = vel_as_s;
        self.state.p2_state = match vel_as_s > 0.0 {
            true => P2State::Plus,
            false => P2State::Minus,
        };
    }

    fn move_focus(&mut self, speed: FocState, duration_s: f64) {
        if self.faults.focus_jammed {
            return
        }

        let speed_mm_s = match speed {
            FocState::Off => {
                self.stop_focus();
                return
            },
            FocState::HighPlus | FocState::HighMinus => self.focus.fast_speed_mm_s,
            FocState::LowPlus | FocState::LowMinus => self.focus.slow_speed_mm_s,
        };

        if duration_s <= 0.0 {
            self.stop_focus();
            return
        }

        let vel = speed.direction() * speed_mm_s;

        self.focus_motion = Some(Motion {
            vel,
            remaining_s: duration_s,
        });
        self.state.vel_focus_mm_s = vel;
        self.state.foc_state = speed;
    }

    fn start(&mut self) {
        if !self.state.is_automatic() {
            return
        }

        let kind = match self.slew_request.take() {
            Some(k) => k,
            None => match self.state.sys_target {
                SysTarget::Position => SlewKind::AzimZ,
                _ => SlewKind::Object,
            },
        };

        let distance_as = (self.state.inp_azim_as - self.state.val_azim_as).abs()
            .max((self.state.inp_zdist_as - self.state.val_zdist_as).abs());

        self.slew = Some(Slew {
            kind,
            elapsed_s: 0.0,
            from_az_as: self.state.val_azim_as,
            from_zd_as: self.state.val_zdist_as,
            duration_s: distance_as / self.sim.slew_speed_as_s,
        });
        self.correction = None;
        self.state.sys_mode = SysMode::Wait;
    }

    /// Begin a correction if the telescope is tracking, returns whether the correction started.
    fn start_correction(&mut self) -> bool {
        if !self.state.is_automatic() || self.state.sys_mode != SysMode::TrkOk {
            return false
        }

        self.correction = Some(Correction {
            remaining_s: self.sim.correction_time_s,
            return_mode: self.state.sys_mode,
        });
        self.state.sys_mode = SysMode::TrkCorr;

        true
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Local mean sidereal time for a Julian date.
fn local_sidereal_time_s(jdate: f64, longitude_s: f64) -> f64 {
    let d = jdate - 2_451_545.0;
    let gmst_h = 18.697_374_558 + 24.065_709_824_419_08 * d;

    wrap_period(gmst_h * 3600.0 + longitude_s, S_PER_DAY)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::{thread, time::Duration};

    fn sleep_s(s: f64) {
        thread::sleep(Duration::from_secs_f64(s));
    }

    #[test]
    fn test_heartbeat() {
        let sim = SimAcs::new(&TelExecParams::fast());

        let t0 = sim.snapshot().unwrap().m_time_s;
        sleep_s(0.05);
        let t1 = sim.snapshot().unwrap().m_time_s;
        assert!(wrap_period(t1 - t0, S_PER_DAY) >= 0.04);

        sim.set_faults(SimFaults { frozen_heartbeat: true, ..Default::default() }).unwrap();
        let t0 = sim.snapshot().unwrap().m_time_s;
        sleep_s(0.05);
        assert_eq!(sim.snapshot().unwrap().m_time_s, t0);
    }

    #[test]
    fn test_p2_motion() {
        let sim = SimAcs::new(&TelExecParams::fast());
        sim.with_state(|s| s.val_p2_as = 10.0 * 3600.0).unwrap();

        sim.send(AcsCmd::MoveP2To { vel_as_s: 36_000.0, duration_s: 0.1 }).unwrap();
        let s = sim.snapshot().unwrap();
        assert_eq!(s.p2_state, P2State::Plus);
        assert_eq!(s.vel_p2_as_s, 36_000.0);

        sleep_s(0.2);
        let s = sim.snapshot().unwrap();
        assert_eq!(s.p2_state, P2State::Off);
        assert_eq!(s.vel_p2_as_s, 0.0);
        assert!((s.val_p2_as - 39_600.0).abs() < 1e-6, "{}", s.val_p2_as);

        assert_eq!(sim.commands().unwrap().len(), 1);
    }

    #[test]
    fn test_focus_motion() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.with_state(|s| s.val_focus_mm = 50.0).unwrap();

        sim.send(AcsCmd::MoveFocus { speed: FocState::HighMinus, duration_s: 0.1 }).unwrap();
        assert_eq!(sim.snapshot().unwrap().foc_state, FocState::HighMinus);

        sleep_s(0.2);
        let s = sim.snapshot().unwrap();
        assert_eq!(s.foc_state, FocState::Off);
        let expected_mm = 50.0 - 0.1 * params.focus.fast_speed_mm_s;
        assert!((s.val_focus_mm - expected_mm).abs() < 1e-6);
    }

    #[test]
    fn test_goto_and_correction() {
        let sim = SimAcs::new(&TelExecParams::fast());

        sim.send(AcsCmd::SetAzimZ { azim_as: 36_000.0, zdist_as: 72_000.0 }).unwrap();
        sim.send(AcsCmd::GoToAzimZ).unwrap();
        sim.send(AcsCmd::StartTelescope).unwrap();
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::Wait);

        sleep_s(0.1);
        let s = sim.snapshot().unwrap();
        assert_eq!(s.sys_mode, SysMode::TrkOk);
        assert!((s.val_azim_as - 36_000.0).abs() < 1e-6);
        assert!((s.val_zdist_as - 72_000.0).abs() < 1e-6);

        sim.send(AcsCmd::DoAzCorr { d_azim_as: 10.0, d_zdist_as: -5.0 }).unwrap();
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::TrkCorr);
        sleep_s(0.15);
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::TrkOk);

        sim.send(AcsCmd::StopTelescope).unwrap();
        assert_eq!(sim.snapshot().unwrap().sys_mode, SysMode::Stop);
    }

    #[test]
    fn test_equatorial_input() {
        let sim = SimAcs::new(&TelExecParams::fast());
        let obs = Observatory::default();

        sim.send(AcsCmd::SetRaDec { alpha_s: 36_000.0, delta_as: 162_000.0 }).unwrap();
        let s = sim.snapshot().unwrap();

        assert_eq!(s.inp_alpha_s, 36_000.0);
        let (az_as, zd_as) = obs.equatorial_to_horizontal(36_000.0, 162_000.0, s.s_time_s);
        assert!((s.inp_azim_as - az_as).abs() < 1.0);
        assert!((s.inp_zdist_as - zd_as).abs() < 1.0);
    }
}
