//! # Automatic Control System Interface
//!
//! The ACS publishes a [`TelState`] snapshot at a fixed rate and accepts [`AcsCmd`]s. Snapshots
//! are read-only for clients, the only way to change the telescope's state is to send a command
//! and observe the next snapshots.
//!
//! Units follow the field suffixes: `_s` is seconds of time, `_as` is arcseconds, `_mm` is
//! millimetres. Right ascensions are stored in seconds of time, declinations in arcseconds.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Azimuth end-switch bit: the azimuth axis is at A < 0.
pub const SW_MINUS_A: u16 = 0x0001;

/// Azimuth end-switch bit: the azimuth axis is at A = +240.
pub const SW_PLUS240_A: u16 = 0x0002;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the telescope state as published by the ACS.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TelState {
    // ---- TIME ----

    /// Mean solar time, advances continuously while the ACS is alive.
    pub m_time_s: f64,

    /// Local mean sidereal time.
    pub s_time_s: f64,

    /// Julian date of the snapshot.
    pub jdate: f64,

    // ---- MODES ----

    /// True if the telescope hardware is powered.
    pub hardware_on: bool,

    pub tel_mode: TelMode,

    pub tel_focus: TelFocus,

    pub sys_mode: SysMode,

    pub sys_target: SysTarget,

    /// Observed state of the P2 rotator motor.
    pub p2_state: P2State,

    /// Requested P2 rotator mode.
    pub p2_mode: P2State,

    pub foc_state: FocState,

    pub az_reverse: AzReverse,

    pub pos_corr: PcsState,

    /// Azimuth end-switch bits, see [`SW_MINUS_A`] and [`SW_PLUS240_A`].
    pub az_end_sw: u16,

    pub zd_end_sw: u16,

    pub p2_end_sw: u16,

    /// Motor lock flags
    pub lock_flags: u16,

    // ---- EQUATORIAL COORDINATES ----

    /// Current pointing position
    pub cur_alpha_s: f64,
    pub cur_delta_as: f64,

    /// Last source position
    pub src_alpha_s: f64,
    pub src_delta_as: f64,

    /// Last input position
    pub inp_alpha_s: f64,
    pub inp_delta_as: f64,

    /// Real telescope position derived from the encoders
    pub tel_alpha_s: f64,
    pub tel_delta_as: f64,

    // ---- HORIZONTAL COORDINATES ----

    /// Last input position
    pub inp_azim_as: f64,
    pub inp_zdist_as: f64,

    /// Current target position
    pub cur_azim_as: f64,
    pub cur_zdist_as: f64,

    // ---- ENCODERS ----

    pub val_azim_as: f64,
    pub val_zdist_as: f64,
    pub val_p2_as: f64,
    pub val_focus_mm: f64,
    pub val_dome_as: f64,

    pub vel_azim_as_s: f64,
    pub vel_zdist_as_s: f64,
    pub vel_p2_as_s: f64,
    pub vel_focus_mm_s: f64,
    pub vel_dome_as_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Telescope control mode. Commands are only executed in automatic mode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelMode {
    Manual,
    Automatic,
}

/// Focal station in use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelFocus {
    Prime,
    Nasmyth1,
    Nasmyth2,
}

/// Mode of the ACS pointing/tracking state machine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysMode {
    Stop,
    Wait,
    PointAz,
    PointAd,
    TrkStop,
    TrkStart,
    TrkMove,
    TrkSeek,
    TrkOk,
    TrkCorr,
    Test,
}

/// Current or last target of the telescope.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysTarget {
    Object,
    Position,
    Nest,
    Zenith,
    Horizon,
}

/// State or mode of the P2 rotator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2State {
    /// Stopped
    Off,

    /// Tracking
    On,

    /// Moving in the positive direction
    Plus,

    /// Moving in the negative direction
    Minus,
}

/// Focus motor state, also used to demand a focus motion.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocState {
    Off,
    LowPlus,
    LowMinus,
    HighPlus,
    HighMinus,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzReverse {
    Off,
    On,
}

/// Pointing correction system state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcsState {
    Off,
    On,
}

/// Commands accepted by the ACS.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AcsCmd {
    /// Move P2 at the given velocity for the given duration, then stop.
    MoveP2To { vel_as_s: f64, duration_s: f64 },

    /// Move P2 at the given velocity until told otherwise, zero stops the motor.
    MoveP2 { vel_as_s: f64 },

    SetP2Mode(P2State),

    /// Run the focus motor at the given speed for the given duration. `Off` stops the motor.
    MoveFocus { speed: FocState, duration_s: f64 },

    /// Set the input equatorial coordinates (apparent place).
    SetRaDec { alpha_s: f64, delta_as: f64 },

    /// Set the input horizontal coordinates.
    SetAzimZ { azim_as: f64, zdist_as: f64 },

    SetAzReverse(AzReverse),

    StopTelescope,

    StartTelescope,

    /// Small move to the last input object
    MoveToObject,

    /// Full slew to the last input object
    GoToObject,

    /// Full slew to the last input horizontal position
    GoToAzimZ,

    SetSysTarget(SysTarget),

    SwitchPosCorr(PcsState),

    /// Horizontal correction in arcseconds of mount angle.
    DoAzCorr { d_azim_as: f64, d_zdist_as: f64 },

    /// Equatorial correction in arcseconds.
    DoAdCorr { d_alpha_as: f64, d_delta_as: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelState {
    /// True if the ACS accepts commands.
    pub fn is_automatic(&self) -> bool {
        self.tel_mode == TelMode::Automatic
    }

    /// Human readable summary of the telescope mode, as an operator console would show it.
    pub fn mode_summary(&self) -> &'static str {
        if !self.hardware_on {
            "Off"
        }
        else if !self.is_automatic() {
            "Manual"
        }
        else {
            self.sys_mode.description()
        }
    }
}

impl SysMode {
    pub fn description(&self) -> &'static str {
        match self {
            SysMode::Stop => "Stopped",
            SysMode::Wait => "Waiting",
            SysMode::PointAz | SysMode::PointAd => "Pointing",
            SysMode::TrkStop | SysMode::TrkStart | SysMode::TrkMove | SysMode::TrkSeek => "Seeking",
            SysMode::TrkOk => "Tracking",
            SysMode::TrkCorr => "Correction",
            SysMode::Test => "Testing",
        }
    }
}

impl FocState {
    /// Velocity sign of this motor state, `0.0` when stopped.
    pub fn direction(&self) -> f64 {
        match self {
            FocState::Off => 0.0,
            FocState::LowPlus | FocState::HighPlus => 1.0,
            FocState::LowMinus | FocState::HighMinus => -1.0,
        }
    }
}

impl AzReverse {
    pub fn toggled(&self) -> Self {
        match self {
            AzReverse::Off => AzReverse::On,
            AzReverse::On => AzReverse::Off,
        }
    }
}

impl Default for TelMode {
    fn default() -> Self {
        TelMode::Manual
    }
}

impl Default for TelFocus {
    fn default() -> Self {
        TelFocus::Prime
    }
}

impl Default for SysMode {
    fn default() -> Self {
        SysMode::Stop
    }
}

impl Default for SysTarget {
    fn default() -> Self {
        SysTarget::Object
    }
}

impl Default for P2State {
    fn default() -> Self {
        P2State::Off
    }
}

impl Default for FocState {
    fn default() -> Self {
        FocState::Off
    }
}

impl Default for AzReverse {
    fn default() -> Self {
        AzReverse::Off
    }
}

impl Default for PcsState {
    fn default() -> Self {
        PcsState::Off
    }
}

impl fmt::Display for TelFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelFocus::Prime => write!(f, "Prime"),
            TelFocus::Nasmyth1 => write!(f, "Nasmyth1"),
            TelFocus::Nasmyth2 => write!(f, "Nasmyth2"),
        }
    }
}

impl fmt::Display for SysTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysTarget::Object => write!(f, "Object"),
            SysTarget::Position => write!(f, "A/Z-Pos."),
            SysTarget::Nest => write!(f, "Nest"),
            SysTarget::Zenith => write!(f, "Zenith"),
            SysTarget::Horizon => write!(f, "Horizon"),
        }
    }
}

impl fmt::Display for P2State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            P2State::Off => write!(f, "Stop"),
            P2State::On => write!(f, "Track"),
            P2State::Plus => write!(f, "Move+"),
            P2State::Minus => write!(f, "Move-"),
        }
    }
}

impl fmt::Display for FocState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocState::HighPlus | FocState::HighMinus => write!(f, "fast move"),
            FocState::LowPlus | FocState::LowMinus => write!(f, "slow move"),
            FocState::Off => write!(f, "stopped"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
