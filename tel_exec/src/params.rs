//! # Telescope Executable Parameters
//!
//! The defaults reproduce the BTA 6 m telescope at the Special Astrophysical Observatory, so the
//! executable can run without a parameter file.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::AcsEndpoints;
use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelExecParams {
    pub observatory: ObservatoryParams,

    pub p2: P2Params,

    pub focus: FocusParams,

    pub coords: CoordsParams,

    pub goto: GotoParams,

    pub correction: CorrectionParams,

    pub timing: TimingParams,

    /// Network endpoints of the ACS
    pub acs: AcsEndpoints,

    /// Behaviour of the emulated ACS
    pub sim: SimParams,
}

/// Geographic location of the telescope.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ObservatoryParams {
    /// Units: arcseconds, east positive
    pub longitude_as: f64,

    /// Units: arcseconds
    pub latitude_as: f64,
}

/// P2 rotator motion parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct P2Params {
    /// Lower edge of the prohibited zone (end-switches), exclusive.
    pub low_end_sw_deg: f64,

    /// Upper edge of the prohibited zone (end-switches), exclusive.
    pub high_end_sw_deg: f64,

    /// Speed used for long moves
    pub nominal_speed_as_s: f64,

    /// Slowest speed the rotator can be commanded at
    pub min_speed_as_s: f64,

    /// Shortest duration of a single move command
    pub min_move_time_s: f64,

    /// Above this speed the move duration is shortened by `fast_time_corr_s` to account for the
    /// rotator's deceleration.
    pub fast_speed_as_s: f64,

    pub fast_time_corr_s: f64,

    /// Moves smaller than this are not attempted, and a position this close to the target counts
    /// as reached.
    pub angle_thres_deg: f64,

    /// Speed above which the rotator is considered to be moving
    pub moving_speed_as_s: f64,

    pub max_attempts: usize,
}

/// Focus motion parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FocusParams {
    pub min_mm: f64,

    pub max_mm: f64,

    pub thres_mm: f64,

    /// Shifts larger than this use the fast speed
    pub fast_shift_mm: f64,

    pub fast_speed_mm_s: f64,

    pub slow_speed_mm_s: f64,

    /// Speed above which the focus is considered to be moving
    pub moving_speed_mm_s: f64,

    pub max_attempts: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CoordsParams {
    /// Tolerance when comparing the input coordinates against the requested ones.
    ///
    /// Units: seconds of time for right ascension, arcseconds otherwise
    pub input_thres: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GotoParams {
    /// If the mount is within this window of the input position a short move is used instead of
    /// a full slew.
    pub move_window_azim_as: f64,
    pub move_window_zdist_as: f64,

    /// Pause between the start command and the first check of the system mode
    pub start_settle_s: f64,

    /// Maximum time allowed to acquire tracking
    pub tracking_timeout_s: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CorrectionParams {
    /// Largest correction accepted on either axis
    pub max_angle_as: f64,

    /// Azimuth corrections are refused closer than this to the zenith
    pub zenith_guard_deg: f64,

    pub start_timeout_s: f64,

    pub end_timeout_s: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimingParams {
    /// Timeout for the ACS to react to a command
    pub system_timeout_s: f64,

    /// Period at which the telescope state is polled during a wait
    pub poll_interval_s: f64,

    /// Added to the commanded duration of a motion when waiting for it to end
    pub motion_margin_s: f64,

    /// Time allowed for the heartbeat to advance at startup
    pub heartbeat_timeout_s: f64,

    /// Minimum advance of the mean time counted as a heartbeat
    pub heartbeat_min_advance_s: f64,
}

/// Emulated ACS timings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Slew speed on each mount axis
    pub slew_speed_as_s: f64,

    /// Time spent in the waiting mode after a start command
    pub start_delay_s: f64,

    /// Duration of a small correction
    pub correction_time_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TelExecParams {
    fn default() -> Self {
        Self {
            observatory: ObservatoryParams::default(),
            p2: P2Params::default(),
            focus: FocusParams::default(),
            coords: CoordsParams::default(),
            goto: GotoParams::default(),
            correction: CorrectionParams::default(),
            timing: TimingParams::default(),
            acs: AcsEndpoints::default(),
            sim: SimParams::default(),
        }
    }
}

impl Default for ObservatoryParams {
    fn default() -> Self {
        Self {
            longitude_as: 149_189.175,
            latitude_as: 157_152.7,
        }
    }
}

impl Default for P2Params {
    fn default() -> Self {
        Self {
            low_end_sw_deg: 21.0,
            high_end_sw_deg: 90.0,
            nominal_speed_as_s: 2700.0,
            min_speed_as_s: 1.0,
            min_move_time_s: 4.5,
            fast_speed_as_s: 2700.0,
            fast_time_corr_s: 1.5,
            angle_thres_deg: 0.01,
            moving_speed_as_s: 1.0,
            max_attempts: 5,
        }
    }
}

impl Default for FocusParams {
    fn default() -> Self {
        Self {
            min_mm: 1.0,
            max_mm: 199.0,
            thres_mm: 0.03,
            fast_shift_mm: 1.0,
            fast_speed_mm_s: 0.63,
            slow_speed_mm_s: 0.13,
            moving_speed_mm_s: 0.01,
            max_attempts: 3,
        }
    }
}

impl Default for CoordsParams {
    fn default() -> Self {
        Self {
            input_thres: 1.0,
        }
    }
}

impl Default for GotoParams {
    fn default() -> Self {
        Self {
            move_window_azim_as: 1800.0,
            move_window_zdist_as: 3600.0,
            start_settle_s: 0.5,
            tracking_timeout_s: 900.0,
        }
    }
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            max_angle_as: 300.0,
            zenith_guard_deg: 0.5,
            start_timeout_s: 10.0,
            end_timeout_s: 150.0,
        }
    }
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            system_timeout_s: 3.0,
            poll_interval_s: 0.1,
            motion_margin_s: 1.0,
            heartbeat_timeout_s: 5.0,
            heartbeat_min_advance_s: 0.02,
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            slew_speed_as_s: 7200.0,
            start_delay_s: 1.0,
            correction_time_s: 2.0,
        }
    }
}

#[cfg(test)]
impl TelExecParams {
    /// Parameters with short timeouts for use against the emulated ACS.
    pub(crate) fn fast() -> Self {
        let mut params = Self::default();

        params.p2.min_move_time_s = 0.2;
        params.p2.fast_time_corr_s = 0.05;
        params.p2.nominal_speed_as_s = 216_000.0;
        params.p2.fast_speed_as_s = 216_000.0;

        params.focus.fast_speed_mm_s = 50.0;
        params.focus.slow_speed_mm_s = 5.0;

        params.goto.start_settle_s = 0.02;
        params.goto.tracking_timeout_s = 1.0;

        params.correction.start_timeout_s = 0.5;
        params.correction.end_timeout_s = 1.0;

        params.timing.system_timeout_s = 0.5;
        params.timing.poll_interval_s = 0.01;
        params.timing.motion_margin_s = 0.2;
        params.timing.heartbeat_timeout_s = 0.5;

        params.sim.slew_speed_as_s = 10_000_000.0;
        params.sim.start_delay_s = 0.05;
        params.sim.correction_time_s = 0.1;

        params
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file() {
        let params: TelExecParams = util::params::from_toml_str(
            r#"
            [p2]
            low_end_sw_deg = 30.0

            [acs]
            state_endpoint = "tcp://bta:6000"
            cmd_endpoint = "tcp://bta:6001"
            connect_timeout_ms = 500
            "#
        ).unwrap();

        assert_eq!(params.p2.low_end_sw_deg, 30.0);
        assert_eq!(params.p2.high_end_sw_deg, 90.0);
        assert_eq!(params.acs.state_endpoint, "tcp://bta:6000");
        assert_eq!(params.focus.max_attempts, 3);
    }

    #[test]
    fn test_shipped_file() {
        let params: TelExecParams = util::params::from_toml_str(
            include_str!("../../params/tel_exec.toml")
        ).unwrap();
        let default = TelExecParams::default();

        assert_eq!(params.observatory.latitude_as, default.observatory.latitude_as);
        assert_eq!(params.p2.max_attempts, default.p2.max_attempts);
        assert_eq!(params.goto.tracking_timeout_s, default.goto.tracking_timeout_s);
        assert_eq!(params.acs.cmd_endpoint, default.acs.cmd_endpoint);
    }
}
