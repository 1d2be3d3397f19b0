//! # Coordinate Operations
//!
//! Input coordinates are sent to the ACS without moving the telescope, a following goto or
//! correction uses them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

use comms_if::eqpt::acs::AcsCmd;

use super::{snapshot_mjd, Frame, OpError, Orchestrator};
use crate::{
    angle::{format_angle_short, format_time, is_delimiter, parse_angle, AS_PER_DEG, S_PER_DAY},
    astrom::apparent_place,
};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Orchestrator<'a> {
    /// Set the input coordinates.
    ///
    /// Equatorial coordinates are a right ascension in hours and a declination in degrees in either
    /// order, the declination being the one which starts with a sign. They are converted into the
    /// apparent place for the current moment. Horizontal coordinates are an azimuth then a zenith
    /// distance, both in degrees.
    pub fn set_coords(&mut self, text: &str, frame: Frame) -> Result<(), OpError> {
        let name = match frame {
            Frame::Equatorial => "Set RA/Dec",
            Frame::Horizontal => "Set A/Z",
        };

        self.run_op(name, text, |orc, op| {
            let (x, y) = match frame {
                Frame::Equatorial => parse_equatorial(text)?,
                Frame::Horizontal => parse_horizontal(text)?,
            };

            let state = orc.snapshot()?;
            let thres = orc.params.coords.input_thres;

            let (cmd, (req_x, req_y)) = match frame {
                Frame::Equatorial => {
                    let (alpha_s, delta_as) = apparent_place(
                        orc.astrom,
                        x,
                        y,
                        orc.options.epoch,
                        orc.options.pm_ra_mas_yr,
                        orc.options.pm_dec_mas_yr,
                        snapshot_mjd(&state),
                    )?;

                    info!(
                        "Apparent place: {} {}",
                        format_time(alpha_s),
                        format_angle_short(delta_as)
                    );
                    debug!(
                        "Previous input: {} {}",
                        format_time(state.inp_alpha_s),
                        format_angle_short(state.inp_delta_as)
                    );

                    (AcsCmd::SetRaDec { alpha_s, delta_as }, (alpha_s, delta_as))
                },
                Frame::Horizontal => {
                    let (azim_as, zdist_as) = (x * AS_PER_DEG, y * AS_PER_DEG);

                    debug!(
                        "Previous input: {} {}",
                        format_angle_short(state.inp_azim_as),
                        format_angle_short(state.inp_zdist_as)
                    );

                    (AcsCmd::SetAzimZ { azim_as, zdist_as }, (azim_as, zdist_as))
                },
            };

            orc.dispatch(op, cmd)?;

            let timeout_s = orc.system_timeout_s();
            orc.require_state(op, "the ACS to accept the coordinates", timeout_s, |s| {
                let (inp_x, inp_y) = match frame {
                    Frame::Equatorial => (s.inp_alpha_s, s.inp_delta_as),
                    Frame::Horizontal => (s.inp_azim_as, s.inp_zdist_as),
                };

                let dx = match frame {
                    Frame::Equatorial => {
                        let d = (inp_x - req_x).abs() % S_PER_DAY;
                        d.min(S_PER_DAY - d)
                    },
                    Frame::Horizontal => (inp_x - req_x).abs(),
                };

                dx < thres && (inp_y - req_y).abs() < thres
            })
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a right ascension and a declination given in either order.
///
/// Returns `(alpha_h, delta_deg)`.
pub fn parse_equatorial(text: &str) -> Result<(f64, f64), OpError> {
    let ra_first = match text.chars().find(|c| c.is_ascii_digit() || *c == '+' || *c == '-') {
        Some(c) => c.is_ascii_digit(),
        None => return Err(bad_equatorial(text)),
    };

    let (first, second) = parse_pair(text).map_err(|_| bad_equatorial(text))?;
    let (alpha_h, delta_deg) = match ra_first {
        true => (first, second),
        false => (second, first),
    };

    if !(0.0..=24.0).contains(&alpha_h) {
        return Err(OpError::Range(format!("right ascension {} h not in [0, 24]", alpha_h)))
    }
    if !(-90.0..=90.0).contains(&delta_deg) {
        return Err(OpError::Range(format!("declination {}° not in [-90, 90]", delta_deg)))
    }

    Ok((alpha_h, delta_deg))
}

/// Parse an azimuth followed by a zenith distance, both in degrees.
pub fn parse_horizontal(text: &str) -> Result<(f64, f64), OpError> {
    let (azim_deg, zdist_deg) = parse_pair(text).map_err(|_| OpError::Parse(format!(
        "wrong coordinates \"{}\", should be \"[+/-]dd mm ss.ss dd mm ss.ss\" (azimuth first)",
        text
    )))?;

    if !(-360.0..=360.0).contains(&azim_deg) {
        return Err(OpError::Range(format!("azimuth {}° not in [-360, 360]", azim_deg)))
    }
    if !(0.0..=90.0).contains(&zdist_deg) {
        return Err(OpError::Range(format!("zenith distance {}° not in [0, 90]", zdist_deg)))
    }

    Ok((azim_deg, zdist_deg))
}

/// Two angles and nothing else.
fn parse_pair(text: &str) -> Result<(f64, f64), OpError> {
    let (first, rest) = parse_angle(text)?;
    let (second, rest) = parse_angle(rest)?;

    if !rest.chars().all(is_delimiter) {
        return Err(OpError::Parse(format!("unexpected \"{}\" after the coordinates", rest.trim())))
    }

    Ok((first, second))
}

fn bad_equatorial(text: &str) -> OpError {
    OpError::Parse(format!(
        "wrong coordinates \"{}\", should be \"hh mm ss.ss +/-dd mm ss.ss\" (any order)", text
    ))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        acs_client::StateProvider,
        astrom::{Epoch, NativeAstrometry},
        orchestrator::OpOptions,
        params::TelExecParams,
        sim::{SimAcs, SimFaults},
    };

    #[test]
    fn test_parse_equatorial() {
        assert_eq!(parse_equatorial("10:00:00 +45:00:00").unwrap(), (10.0, 45.0));
        assert_eq!(parse_equatorial("-30:30:00 5:30").unwrap(), (5.5, -30.5));
        assert_eq!(parse_equatorial("12 30 00, -05 00 00").unwrap(), (12.5, -5.0));

        assert!(matches!(parse_equatorial("25:00:00 +10:00:00"), Err(OpError::Range(_))));
        assert!(matches!(parse_equatorial("10:00:00 +95"), Err(OpError::Range(_))));
        assert!(matches!(parse_equatorial("10:00:00"), Err(OpError::Parse(_))));
        assert!(matches!(parse_equatorial("10 +45 x"), Err(OpError::Parse(_))));
        assert!(matches!(parse_equatorial("north"), Err(OpError::Parse(_))));
    }

    #[test]
    fn test_parse_horizontal() {
        assert_eq!(parse_horizontal("-45.0 30").unwrap(), (-45.0, 30.0));
        assert_eq!(parse_horizontal("180:30:00 10:15").unwrap(), (180.5, 10.25));

        assert!(matches!(parse_horizontal("400.0 30"), Err(OpError::Range(_))));
        assert!(matches!(parse_horizontal("10 -5"), Err(OpError::Range(_))));
        assert!(matches!(parse_horizontal("10.0 95"), Err(OpError::Range(_))));
        assert!(matches!(parse_horizontal("10"), Err(OpError::Parse(_))));
    }

    #[test]
    fn test_set_equatorial() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        orc.set_coords("10:00:00 +45:00:00", Frame::Equatorial).unwrap();

        // The input is the apparent place of the J2000 position, within the precession since
        let state = sim.snapshot().unwrap();
        assert!((state.inp_alpha_s - 36_000.0).abs() < 150.0);
        assert!((state.inp_delta_as - 162_000.0).abs() < 1200.0);

        // Already matching coordinates are accepted again
        orc.set_coords("10:00:00 +45:00:00", Frame::Equatorial).unwrap();
        assert_eq!(sim.commands().unwrap().len(), 2);
    }

    #[test]
    fn test_set_equatorial_of_date() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);

        let astrom = NativeAstrometry;
        let options = OpOptions { epoch: Epoch::Now, ..Default::default() };
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, options);

        orc.set_coords("+45:00:00 10:00:00", Frame::Equatorial).unwrap();

        let state = sim.snapshot().unwrap();
        assert!((state.inp_alpha_s - 36_000.0).abs() < 0.01);
        assert!((state.inp_delta_as - 162_000.0).abs() < 0.1);
    }

    #[test]
    fn test_range_rejected_before_dispatch() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        assert!(matches!(
            orc.set_coords("25:00:00 +10:00:00", Frame::Equatorial),
            Err(OpError::Range(_))
        ));
        assert!(sim.commands().unwrap().is_empty());
    }

    #[test]
    fn test_set_horizontal() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        orc.set_coords("-45:30:00 20", Frame::Horizontal).unwrap();

        let state = sim.snapshot().unwrap();
        assert_eq!(state.inp_azim_as, -45.5 * 3600.0);
        assert_eq!(state.inp_zdist_as, 20.0 * 3600.0);
    }

    #[test]
    fn test_undelivered() {
        let params = TelExecParams::fast();
        let sim = SimAcs::new(&params);
        sim.set_faults(SimFaults { coords_ignored: true, ..Default::default() }).unwrap();

        let astrom = NativeAstrometry;
        let mut orc = Orchestrator::new(&sim, &sim, &astrom, params, OpOptions::default());

        assert!(matches!(
            orc.set_coords("-45:30:00 20", Frame::Horizontal),
            Err(OpError::Timeout { .. })
        ));
    }
}
