//! # Telescope State Report
//!
//! Formats a [`TelState`] snapshot as `Name="value"` lines. The report is split into levels which
//! the operator selects by name, any of:
//!
//! - `time`: mean and sidereal time, Julian date
//! - `acs` (or `system`): modes, switches and locks
//! - `coords` (or `coordinates`): current, source and input positions, parallactic angles and focus
//! - `extcrds` (or `morecrds`): encoder values, differences and velocities, implies `coords`
//!
//! `all` (or `1`) selects every level.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;

use comms_if::eqpt::acs::{
    AzReverse, PcsState, SysTarget, TelState, SW_MINUS_A, SW_PLUS240_A,
};

use crate::{
    angle::{format_angle, format_time, AS2R},
    sphere::Observatory,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Names accepted for each level.
const LEVEL_NAMES: [(&str, InfoLevel); 8] = [
    ("coordinates", InfoLevel::COORDS),
    ("coords", InfoLevel::COORDS),
    ("extcrds", InfoLevel::EXTENDED),
    ("morecrds", InfoLevel::EXTENDED),
    ("time", InfoLevel::TIME),
    ("acs", InfoLevel::ACS),
    ("system", InfoLevel::ACS),
    ("all", InfoLevel::ALL),
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Set of report levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfoLevel {
    pub coords: bool,
    pub extended: bool,
    pub time: bool,
    pub acs: bool,
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub name: &'static str,
    pub value: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InfoLevel {
    pub const NONE: Self = Self { coords: false, extended: false, time: false, acs: false };
    pub const COORDS: Self = Self { coords: true, ..Self::NONE };
    pub const EXTENDED: Self = Self { coords: true, extended: true, ..Self::NONE };
    pub const TIME: Self = Self { time: true, ..Self::NONE };
    pub const ACS: Self = Self { acs: true, ..Self::NONE };
    pub const ALL: Self = Self { coords: true, extended: true, time: true, acs: true };

    /// Select the levels named anywhere in `text`, case-insensitively.
    pub fn parse(text: &str) -> Self {
        let text = text.to_lowercase();

        if text.trim() == "1" {
            return Self::ALL
        }

        LEVEL_NAMES.iter()
            .filter(|(name, _)| text.contains(name))
            .fold(Self::NONE, |acc, (_, lvl)| acc.union(*lvl))
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            coords: self.coords || other.coords,
            extended: self.extended || other.extended,
            time: self.time || other.time,
            acs: self.acs || other.acs,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// List of the accepted level names.
    pub fn names() -> String {
        let names: Vec<&str> = LEVEL_NAMES.iter().map(|(n, _)| *n).collect();
        names.join(", ")
    }
}

impl ReportLine {
    fn new(name: &'static str, value: String) -> Self {
        Self { name, value }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the report of `state` for the selected `level`.
pub fn build_report(state: &TelState, obs: &Observatory, level: InfoLevel) -> Vec<ReportLine> {
    let mut lines = Vec::new();

    if level.time {
        lines.push(ReportLine::new("M_time", format_time(state.m_time_s)));
        lines.push(ReportLine::new("S_time", format_time(state.s_time_s)));
        lines.push(ReportLine::new("JDate", format!("{:.6}", state.jdate)));
    }

    if level.acs {
        lines.extend(acs_lines(state));
    }

    if level.coords {
        lines.extend(coord_lines(state, obs));
    }

    if level.extended {
        lines.extend(extended_lines(state));
    }

    lines
}

/// Log the report of `state`, one line per value.
pub fn log_report(state: &TelState, obs: &Observatory, level: InfoLevel) {
    for line in build_report(state, obs, level) {
        info!("{}=\"{}\"", line.name, line.value);
    }
}

fn acs_lines(state: &TelState) -> Vec<ReportLine> {
    let p2_mode = match state.hardware_on {
        true => state.p2_state.to_string(),
        false => String::from("Off"),
    };

    let az_end_sw = match state.az_end_sw {
        0 => String::from("Off"),
        sw => {
            let mut s = Vec::new();
            if sw & SW_MINUS_A != 0 {
                s.push("A<0");
            }
            if sw & SW_PLUS240_A != 0 {
                s.push("A=+240");
            }
            s.join(" ")
        }
    };

    vec![
        ReportLine::new("Tel_Mode", state.mode_summary().into()),
        ReportLine::new("Tel_Focus", state.tel_focus.to_string()),
        ReportLine::new("Tel_Target", state.sys_target.to_string()),
        ReportLine::new("P2_Mode", p2_mode),
        ReportLine::new("PCS", on_off(state.pos_corr == PcsState::On)),
        ReportLine::new("Az_Reverse", on_off(state.az_reverse == AzReverse::On)),
        ReportLine::new("Az_EndSw", az_end_sw),
        ReportLine::new("Zen_EndSw", flags(state.zd_end_sw)),
        ReportLine::new("P2_EndSw", flags(state.p2_end_sw)),
        ReportLine::new("Lock_Flags", flags(state.lock_flags)),
        ReportLine::new("Foc_State", state.foc_state.to_string()),
    ]
}

fn coord_lines(state: &TelState, obs: &Observatory) -> Vec<ReportLine> {
    let mut lines = Vec::new();

    if state.sys_target == SysTarget::Object {
        lines.push(ReportLine::new("CurAlpha", format_time(state.cur_alpha_s)));
        lines.push(ReportLine::new("CurDelta", signed(state.cur_delta_as)));
        lines.push(ReportLine::new("SrcAlpha", format_time(state.src_alpha_s)));
        lines.push(ReportLine::new("SrcDelta", signed(state.src_delta_as)));
        lines.push(ReportLine::new("InpAlpha", format_time(state.inp_alpha_s)));
        lines.push(ReportLine::new("InpDelta", signed(state.inp_delta_as)));
        lines.push(ReportLine::new("TelAlpha", format_time(state.tel_alpha_s)));
        lines.push(ReportLine::new("TelDelta", signed(state.tel_delta_as)));
    }

    let pa = |alpha_s: f64, delta_as: f64| {
        unsigned(obs.parallactic_angle(alpha_s, delta_as, state.s_time_s) / AS2R)
    };

    lines.push(ReportLine::new("CurAzim", signed(state.cur_azim_as)));
    lines.push(ReportLine::new("CurZenD", unsigned(state.cur_zdist_as)));
    lines.push(ReportLine::new("InpAzim", signed(state.inp_azim_as)));
    lines.push(ReportLine::new("InpZenD", unsigned(state.inp_zdist_as)));
    lines.push(ReportLine::new("SrcPA", pa(state.src_alpha_s, state.src_delta_as)));
    lines.push(ReportLine::new("InpPA", pa(state.inp_alpha_s, state.inp_delta_as)));
    lines.push(ReportLine::new("TelPA", pa(state.tel_alpha_s, state.tel_delta_as)));
    lines.push(ReportLine::new("ValFoc", format!("{:.2}", state.val_focus_mm)));

    lines
}

fn extended_lines(state: &TelState) -> Vec<ReportLine> {
    vec![
        ReportLine::new("ValAzim", signed(state.val_azim_as)),
        ReportLine::new("ValZenD", unsigned(state.val_zdist_as)),
        ReportLine::new("ValP2", unsigned(state.val_p2_as)),
        ReportLine::new("ValDome", signed(state.val_dome_as)),
        ReportLine::new("DiffAzim", signed(state.cur_azim_as - state.val_azim_as)),
        ReportLine::new("DiffZenD", signed(state.cur_zdist_as - state.val_zdist_as)),
        ReportLine::new("DiffDome", signed(state.val_azim_as - state.val_dome_as)),
        ReportLine::new("VelAzim", signed(state.vel_azim_as_s)),
        ReportLine::new("VelZenD", signed(state.vel_zdist_as_s)),
        ReportLine::new("VelP2", signed(state.vel_p2_as_s)),
        ReportLine::new("VelDome", signed(state.vel_dome_as_s)),
        ReportLine::new("VelFoc", format!("{:.3}", state.vel_focus_mm_s)),
    ]
}

fn signed(value_as: f64) -> String {
    format_angle(value_as, true, 1)
}

fn unsigned(value_as: f64) -> String {
    format_angle(value_as, false, 1)
}

fn on_off(on: bool) -> String {
    match on {
        true => String::from("On"),
        false => String::from("Off"),
    }
}

fn flags(bits: u16) -> String {
    match bits {
        0 => String::from("Off"),
        b => format!("0x{:04X}", b),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn value<'a>(lines: &'a [ReportLine], name: &str) -> Option<&'a str> {
        lines.iter().find(|l| l.name == name).map(|l| l.value.as_str())
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(InfoLevel::parse("all"), InfoLevel::ALL);
        assert_eq!(InfoLevel::parse("1"), InfoLevel::ALL);
        assert_eq!(InfoLevel::parse("Coords"), InfoLevel::COORDS);
        assert_eq!(InfoLevel::parse("time,acs"), InfoLevel::TIME.union(InfoLevel::ACS));
        assert_eq!(InfoLevel::parse("morecrds"), InfoLevel::EXTENDED);
        assert!(InfoLevel::parse("meteo").is_empty());
    }

    #[test]
    fn test_report() {
        let obs = Observatory::default();
        let state = TelState {
            hardware_on: true,
            s_time_s: 36_000.0,
            inp_alpha_s: 36_000.0,
            inp_delta_as: 0.0,
            inp_azim_as: -3600.5,
            val_focus_mm: 101.234,
            az_end_sw: SW_MINUS_A,
            ..Default::default()
        };

        let lines = build_report(&state, &obs, InfoLevel::ALL);

        assert_eq!(value(&lines, "S_time"), Some("10:00:00.00"));
        assert_eq!(value(&lines, "InpAlpha"), Some("10:00:00.00"));
        assert_eq!(value(&lines, "InpAzim"), Some("-01:00:00.5"));
        assert_eq!(value(&lines, "ValFoc"), Some("101.23"));
        assert_eq!(value(&lines, "Az_EndSw"), Some("A<0"));
        assert_eq!(value(&lines, "Lock_Flags"), Some("Off"));
        assert_eq!(value(&lines, "Tel_Mode"), Some("Manual"));

        // An object on the meridian south of the zenith has no parallactic angle
        assert_eq!(value(&lines, "InpPA"), Some("00:00:00.0"));

        // Equatorial coordinates are only shown when pointing at an object
        let state = TelState { sys_target: SysTarget::Position, ..state };
        let lines = build_report(&state, &obs, InfoLevel::COORDS);
        assert!(value(&lines, "InpAlpha").is_none());
        assert!(value(&lines, "InpAzim").is_some());
        assert!(value(&lines, "M_time").is_none());
    }
}
