//! # Astrometric Boundary
//!
//! The orchestrator reaches precision astrometry only through the [`Astrometry`] trait, which takes
//! and returns plain numbers. [`NativeAstrometry`] is the default implementation.
//!
//! [`apparent_place`] chains the trait calls to turn an operator supplied catalogue position into
//! the apparent place sent to the ACS.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod native;

pub use native::NativeAstrometry;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use std::str::FromStr;
use thiserror::Error;
use util::maths::wrap_period;

use crate::angle::{AS2R, S2R, S_PER_DAY};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Julian date of MJD 0
pub const MJD_ZERO_JD: f64 = 2_400_000.5;

/// Equinox of the default catalogue frame
pub const J2000_EQUINOX: f64 = 2000.0;

/// Seconds in a Julian year
const JULIAN_YEAR_S: f64 = 31_557_600.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Narrow interface to a precision astrometry library.
///
/// Angles are in radians, dates are modified Julian dates and equinoxes are Julian epochs.
pub trait Astrometry {
    /// Gregorian calendar date to modified Julian date (at 0h).
    fn calendar_to_mjd(&self, year: i32, month: u32, day: u32) -> Result<f64, AstromError>;

    /// Reduce a place of date `epoch_mjd` onto the mean equinox `equinox`, removing aberration,
    /// nutation and precession between the two epochs.
    fn mean_to_apparent_correction(
        &self,
        ra_rad: f64,
        dec_rad: f64,
        epoch_mjd: f64,
        equinox: f64,
    ) -> (f64, f64);

    /// Mean place at `place.equinox` to apparent place at `epoch_mjd`: space motion, annual
    /// parallax, precession, nutation and annual aberration.
    fn apply_proper_motion_and_parallax(&self, place: &CatalogPlace, epoch_mjd: f64) -> (f64, f64);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A catalogue (mean) place with its space motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogPlace {
    pub ra_rad: f64,

    pub dec_rad: f64,

    /// Proper motion in right ascension as the rate of change of RA (not RA cos Dec).
    ///
    /// Units: radians/year
    pub pm_ra_rad_yr: f64,

    /// Units: radians/year
    pub pm_dec_rad_yr: f64,

    pub parallax_as: f64,

    /// Positive receding
    pub radial_velocity_km_s: f64,

    /// Julian epoch of the mean equinox and of the catalogue position
    pub equinox: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AstromError {
    #[error("Wrong year {0}")]
    BadYear(i32),

    #[error("Wrong month {0}")]
    BadMonth(u32),

    #[error("Wrong day {0}")]
    BadDay(u32),

    #[error("Epoch should be \"now\" or a Julian year, found \"{0}\"")]
    BadEpoch(String),
}

/// Epoch of the coordinates given by the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Epoch {
    /// Mean place for J2000.0, no precession step
    J2000,

    /// Place of date at the moment of the command
    Now,

    /// Place of date at a Julian year, which may be fractional
    JulianYear(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FromStr for Epoch {
    type Err = AstromError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.eq_ignore_ascii_case("now") || s == "1" {
            return Ok(Epoch::Now)
        }

        match s.parse::<f64>() {
            Ok(y) if y.is_finite() => Ok(Epoch::JulianYear(y)),
            _ => Err(AstromError::BadEpoch(s.into())),
        }
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Epoch::J2000
    }
}

impl Epoch {
    /// Modified Julian date of this epoch, `now_mjd` being the current date.
    ///
    /// A whole year maps onto the 1st of January. A fractional year is counted in Julian years from
    /// 1970.0 and split into a calendar date plus the fraction of the day.
    pub fn to_mjd<A: Astrometry + ?Sized>(
        &self,
        astrom: &A,
        now_mjd: f64,
    ) -> Result<f64, AstromError> {
        match *self {
            Epoch::J2000 => Ok(51_544.5),
            Epoch::Now => Ok(now_mjd),
            Epoch::JulianYear(year) if (year - year.trunc()).abs() < 0.001 => {
                astrom.calendar_to_mjd(year.trunc() as i32, 1, 1)
            }
            Epoch::JulianYear(year) => {
                let unix_s = ((year - 1970.0) * JULIAN_YEAR_S).trunc() as i64;
                let dt = NaiveDateTime::from_timestamp_opt(unix_s, 0)
                    .ok_or_else(|| AstromError::BadEpoch(year.to_string()))?;

                let day_frac = (dt.hour() as f64
                    + dt.minute() as f64 / 60.0
                    + dt.second() as f64 / 3600.0) / 24.0;

                Ok(astrom.calendar_to_mjd(dt.year(), dt.month(), dt.day())? + day_frac)
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the apparent place for `now_mjd` of an operator supplied position.
///
/// `alpha_h` and `delta_deg` are for `epoch`: a place of date is first reduced to the mean place
/// for J2000.0, which then gets its proper motion (`pm_*_mas_yr`, milliarcseconds per year) and is
/// carried to the apparent place of `now_mjd`.
///
/// Returns `(alpha_s, delta_as)` with the right ascension in `[0, 24h)`.
pub fn apparent_place<A: Astrometry + ?Sized>(
    astrom: &A,
    alpha_h: f64,
    delta_deg: f64,
    epoch: Epoch,
    pm_ra_mas_yr: f64,
    pm_dec_mas_yr: f64,
    now_mjd: f64,
) -> Result<(f64, f64), AstromError> {
    let ra_rad = (alpha_h * 15.0).to_radians();
    let dec_rad = delta_deg.to_radians();

    let (ra2000_rad, dec2000_rad) = match epoch {
        Epoch::J2000 => (ra_rad, dec_rad),
        _ => {
            let epoch_mjd = epoch.to_mjd(astrom, now_mjd)?;
            debug!("Reducing place of MJD {:.5} to J2000.0", epoch_mjd);
            astrom.mean_to_apparent_correction(ra_rad, dec_rad, epoch_mjd, J2000_EQUINOX)
        }
    };

    let place = CatalogPlace {
        ra_rad: ra2000_rad,
        dec_rad: dec2000_rad,
        pm_ra_rad_yr: pm_ra_mas_yr / 1000.0 * AS2R,
        pm_dec_rad_yr: pm_dec_mas_yr / 1000.0 * AS2R,
        parallax_as: 0.0,
        radial_velocity_km_s: 0.0,
        equinox: J2000_EQUINOX,
    };

    let (app_ra_rad, app_dec_rad) = astrom.apply_proper_motion_and_parallax(&place, now_mjd);

    Ok((wrap_period(app_ra_rad / S2R, S_PER_DAY), app_dec_rad / AS2R))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_epoch_parse() {
        assert_eq!("now".parse::<Epoch>(), Ok(Epoch::Now));
        assert_eq!("NOW".parse::<Epoch>(), Ok(Epoch::Now));
        assert_eq!("1".parse::<Epoch>(), Ok(Epoch::Now));
        assert_eq!("2015.5".parse::<Epoch>(), Ok(Epoch::JulianYear(2015.5)));
        assert!(matches!("tomorrow".parse::<Epoch>(), Err(AstromError::BadEpoch(_))));
        assert!(matches!("".parse::<Epoch>(), Err(AstromError::BadEpoch(_))));
    }

    #[test]
    fn test_epoch_to_mjd() {
        let astrom = NativeAstrometry::default();

        assert_eq!(Epoch::J2000.to_mjd(&astrom, 60_000.0), Ok(51_544.5));
        assert_eq!(Epoch::Now.to_mjd(&astrom, 60_000.25), Ok(60_000.25));
        assert_eq!(Epoch::JulianYear(2000.0).to_mjd(&astrom, 0.0), Ok(51_544.0));
        assert_eq!(Epoch::JulianYear(2024.0004).to_mjd(&astrom, 0.0), Ok(60_310.0));

        // 1970.5 is half a Julian year after the Unix epoch: 1970-07-02 15:00
        let mjd = Epoch::JulianYear(1970.5).to_mjd(&astrom, 0.0).unwrap();
        assert!((mjd - (40_769.0 + 15.0 / 24.0)).abs() < 1e-9, "{}", mjd);

        assert_eq!(
            Epoch::JulianYear(-5000.0).to_mjd(&astrom, 0.0),
            Err(AstromError::BadYear(-5000))
        );
    }

    #[test]
    fn test_apparent_place_j2000() {
        let astrom = NativeAstrometry::default();
        let now_mjd = 61_000.0;

        let (alpha_s, delta_as) = apparent_place(
            &astrom, 10.0, 45.0, Epoch::J2000, 0.0, 0.0, now_mjd
        ).unwrap();

        // Some 27 years of precession, well under a degree
        assert!((alpha_s - 36_000.0).abs() * 15.0 < 3600.0);
        assert!((delta_as - 162_000.0).abs() < 3600.0);
        assert!((alpha_s - 36_000.0).abs() > 1.0);

        // Proper motion only in declination adds 27 years worth of it
        let (alpha_pm_s, delta_pm_as) = apparent_place(
            &astrom, 10.0, 45.0, Epoch::J2000, 0.0, 1000.0, now_mjd
        ).unwrap();
        let years = (now_mjd - 51_544.5) / 365.25;
        assert!((delta_pm_as - delta_as - years).abs() < 0.1);
        assert!((alpha_pm_s - alpha_s).abs() < 0.02);
    }

    #[test]
    fn test_apparent_place_of_date() {
        let astrom = NativeAstrometry::default();
        let now_mjd = 61_000.0;

        // Place of date for now is already apparent, so it comes back unchanged
        let (alpha_s, delta_as) = apparent_place(
            &astrom, 10.0, 45.0, Epoch::Now, 0.0, 0.0, now_mjd
        ).unwrap();

        assert!((alpha_s - 36_000.0).abs() < 0.001);
        assert!((delta_as - 162_000.0).abs() < 0.01);
    }
}
