//! # Native astrometry
//!
//! Pure Rust reductions at the accuracy a pointing command needs, a fraction of an arcsecond:
//! - IAU 1976 precession
//! - nutation from the dominant terms of the IAU 1980 series
//! - annual aberration and parallax from a low precision solar ephemeris
//! - rigorous space motion
//!
//! Rotation matrices follow the frame rotation convention, `v_new = R * v_old`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Matrix3, Vector3};
use util::maths::map_pi_to_2pi;

use super::{AstromError, Astrometry, CatalogPlace};
use crate::angle::AS2R;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// MJD of the J2000.0 epoch
const MJD_J2000: f64 = 51_544.5;

const DAYS_PER_JULIAN_YEAR: f64 = 365.25;

const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Constant of aberration
const ABERRATION_AS: f64 = 20.495_52;

/// Radial velocity in km/s to AU/year, times arcseconds to radians
const VF: f64 = 0.210_945_02 * AS2R;

/// Earliest year accepted by the calendar conversion
const MIN_YEAR: i32 = -4699;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAstrometry;

/// Earth's heliocentric state in the mean equatorial frame of date.
struct EarthState {
    /// Units: AU
    pos_au: Vector3<f64>,

    /// Units: speed of light
    vel_c: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Astrometry for NativeAstrometry {
    fn calendar_to_mjd(&self, year: i32, month: u32, day: u32) -> Result<f64, AstromError> {
        if year < MIN_YEAR {
            return Err(AstromError::BadYear(year))
        }
        if !(1..=12).contains(&month) {
            return Err(AstromError::BadMonth(month))
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(AstromError::BadDay(day))
        }

        let y = year as i64;
        let m = month as i64;
        let d = day as i64;

        let mjd = (1461 * (y - (12 - m) / 10 + 4712)) / 4
            + (306 * ((m + 9) % 12) + 5) / 10
            - (3 * ((y - (12 - m) / 10 + 4900) / 100)) / 4
            + d
            - 2_399_904;

        Ok(mjd as f64)
    }

    fn mean_to_apparent_correction(
        &self,
        ra_rad: f64,
        dec_rad: f64,
        epoch_mjd: f64,
        equinox: f64,
    ) -> (f64, f64) {
        let pn = nutation(epoch_mjd) * precession(equinox, julian_epoch(epoch_mjd));
        let earth = EarthState::at(epoch_mjd);

        // Back to the mean equinox, still carrying aberration
        let p = pn.transpose() * spherical_to_vector(ra_rad, dec_rad);
        let vel_c = precession(equinox, julian_epoch(epoch_mjd)).transpose() * earth.vel_c;

        // Remove aberration by fixed point iteration
        let mut mean = p;
        for _ in 0..3 {
            mean = (mean + (p - aberrate(&mean, &vel_c))).normalize();
        }

        vector_to_spherical(&mean)
    }

    fn apply_proper_motion_and_parallax(
        &self,
        place: &CatalogPlace,
        epoch_mjd: f64,
    ) -> (f64, f64) {
        let epoch = julian_epoch(epoch_mjd);
        let prec = precession(place.equinox, epoch);
        let pn = nutation(epoch_mjd) * prec;

        // Earth's state in the catalogue frame
        let earth = EarthState::at(epoch_mjd);
        let pos_au = prec.transpose() * earth.pos_au;
        let vel_c = prec.transpose() * earth.vel_c;

        let moved = space_motion(place, epoch - place.equinox);

        // Annual parallax
        let p = (moved - place.parallax_as * AS2R * pos_au).normalize();

        let p = aberrate(&p, &vel_c);

        vector_to_spherical(&(pn * p))
    }
}

impl EarthState {
    /// Earth's state from the low precision solar coordinates of the Astronomical Almanac.
    fn at(mjd: f64) -> Self {
        let n = mjd - MJD_J2000;

        let mean_lon = (280.460 + 0.985_647_4 * n).to_radians();
        let anomaly = (357.528 + 0.985_600_3 * n).to_radians();

        let sun_lon = mean_lon
            + (1.915 * anomaly.sin() + 0.020 * (2.0 * anomaly).sin()).to_radians();
        let sun_dist_au = 1.000_14 - 0.016_71 * anomaly.cos() - 0.000_14 * (2.0 * anomaly).cos();

        let (sin_l, cos_l) = sun_lon.sin_cos();

        // Ecliptic of date, the Earth is opposite the Sun and moves towards longitude L - 90
        let pos_ecl = Vector3::new(-sun_dist_au * cos_l, -sun_dist_au * sin_l, 0.0);
        let vel_ecl = Vector3::new(sin_l, -cos_l, 0.0) * (ABERRATION_AS * AS2R);

        let ecl_to_eq = rot_x(-mean_obliquity(mjd));

        Self {
            pos_au: ecl_to_eq * pos_ecl,
            vel_c: ecl_to_eq * vel_ecl,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn julian_epoch(mjd: f64) -> f64 {
    2000.0 + (mjd - MJD_J2000) / DAYS_PER_JULIAN_YEAR
}

fn spherical_to_vector(ra_rad: f64, dec_rad: f64) -> Vector3<f64> {
    let (sin_r, cos_r) = ra_rad.sin_cos();
    let (sin_d, cos_d) = dec_rad.sin_cos();

    Vector3::new(cos_r * cos_d, sin_r * cos_d, sin_d)
}

/// Returns `(ra_rad, dec_rad)` with the right ascension in `[0, 2π)`.
fn vector_to_spherical(v: &Vector3<f64>) -> (f64, f64) {
    let r = (v.x * v.x + v.y * v.y).sqrt();

    let ra_rad = if r == 0.0 {
        0.0
    } else {
        map_pi_to_2pi(v.y.atan2(v.x))
    };
    let dec_rad = if v.z == 0.0 { 0.0 } else { v.z.atan2(r) };

    (ra_rad, dec_rad)
}

fn rot_x(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c, s,
        0.0, -s, c,
    )
}

fn rot_y(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(
        c, 0.0, -s,
        0.0, 1.0, 0.0,
        s, 0.0, c,
    )
}

fn rot_z(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(
        c, s, 0.0,
        -s, c, 0.0,
        0.0, 0.0, 1.0,
    )
}

/// IAU 1976 precession matrix between two Julian epochs.
fn precession(from_epoch: f64, to_epoch: f64) -> Matrix3<f64> {
    let t0 = (from_epoch - 2000.0) / 100.0;
    let t = (to_epoch - from_epoch) / 100.0;
    let tas2r = t * AS2R;

    let w = 2306.2181 + (1.396_56 - 0.000_139 * t0) * t0;

    let zeta = (w + ((0.301_88 - 0.000_344 * t0) + 0.017_998 * t) * t) * tas2r;
    let z = (w + ((1.094_68 + 0.000_066 * t0) + 0.018_203 * t) * t) * tas2r;
    let theta = ((2004.3109 + (-0.853_30 - 0.000_217 * t0) * t0)
        + ((-0.426_65 - 0.000_217 * t0) - 0.041_833 * t) * t) * tas2r;

    rot_z(-z) * rot_y(theta) * rot_z(-zeta)
}

/// Mean obliquity of the ecliptic, IAU 1976.
fn mean_obliquity(mjd: f64) -> f64 {
    let t = (mjd - MJD_J2000) / DAYS_PER_JULIAN_CENTURY;

    (84_381.448 + (-46.8150 + (-0.000_59 + 0.001_813 * t) * t) * t) * AS2R
}

/// Nutation matrix, mean equator and equinox of date to true.
fn nutation(mjd: f64) -> Matrix3<f64> {
    let t = (mjd - MJD_J2000) / DAYS_PER_JULIAN_CENTURY;

    // Moon's ascending node, mean longitudes of the Sun and Moon
    let node = (125.044_52 - 1934.136_261 * t).to_radians();
    let sun = (280.4665 + 36_000.7698 * t).to_radians();
    let moon = (218.3165 + 481_267.8813 * t).to_radians();

    let dpsi_as = -17.20 * node.sin()
        - 1.32 * (2.0 * sun).sin()
        - 0.23 * (2.0 * moon).sin()
        + 0.21 * (2.0 * node).sin();
    let deps_as = 9.20 * node.cos()
        + 0.57 * (2.0 * sun).cos()
        + 0.10 * (2.0 * moon).cos()
        - 0.09 * (2.0 * node).cos();

    let eps0 = mean_obliquity(mjd);

    rot_x(-(eps0 + deps_as * AS2R)) * rot_z(-dpsi_as * AS2R) * rot_x(eps0)
}

/// Apply first order annual aberration for an observer moving at `vel_c`.
fn aberrate(p: &Vector3<f64>, vel_c: &Vector3<f64>) -> Vector3<f64> {
    (*p + *vel_c - p.dot(vel_c) * *p).normalize()
}

/// Position vector of a catalogue place after `years` of space motion.
///
/// The vector is in units where the catalogue distance is `1 / parallax`, so it can be combined
/// with the Earth's position scaled by the parallax.
fn space_motion(place: &CatalogPlace, years: f64) -> Vector3<f64> {
    let (sin_r, cos_r) = place.ra_rad.sin_cos();
    let (sin_d, cos_d) = place.dec_rad.sin_cos();

    let p = Vector3::new(cos_r * cos_d, sin_r * cos_d, sin_d);

    let w = VF * place.radial_velocity_km_s * place.parallax_as;

    let motion = Vector3::new(
        -place.pm_ra_rad_yr * p.y - place.pm_dec_rad_yr * cos_r * sin_d + w * p.x,
        place.pm_ra_rad_yr * p.x - place.pm_dec_rad_yr * sin_r * sin_d + w * p.y,
        place.pm_dec_rad_yr * cos_d + w * p.z,
    );

    p + years * motion
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_calendar_to_mjd() {
        let astrom = NativeAstrometry;

        assert_eq!(astrom.calendar_to_mjd(2000, 1, 1), Ok(51_544.0));
        assert_eq!(astrom.calendar_to_mjd(1858, 11, 17), Ok(0.0));
        assert_eq!(astrom.calendar_to_mjd(2024, 2, 29), Ok(60_369.0));
        assert_eq!(astrom.calendar_to_mjd(2000, 2, 29), Ok(51_603.0));

        assert_eq!(astrom.calendar_to_mjd(1900, 2, 29), Err(AstromError::BadDay(29)));
        assert_eq!(astrom.calendar_to_mjd(2023, 4, 31), Err(AstromError::BadDay(31)));
        assert_eq!(astrom.calendar_to_mjd(2023, 1, 0), Err(AstromError::BadDay(0)));
        assert_eq!(astrom.calendar_to_mjd(2023, 13, 1), Err(AstromError::BadMonth(13)));
        assert_eq!(astrom.calendar_to_mjd(2023, 0, 1), Err(AstromError::BadMonth(0)));
        assert_eq!(astrom.calendar_to_mjd(-4700, 1, 1), Err(AstromError::BadYear(-4700)));
        assert!(astrom.calendar_to_mjd(-4699, 1, 1).is_ok());
    }

    #[test]
    fn test_precession() {
        // Fifty years of precession of the J2000 equinox point, using the annual rates
        // m = 3.075 s and n = 20.04"
        let p = precession(2000.0, 2050.0) * spherical_to_vector(0.0, 0.0);
        let (ra_rad, dec_rad) = vector_to_spherical(&p);

        let ra_s = ra_rad.to_degrees() * 240.0;
        let dec_as = dec_rad / AS2R;

        assert!((ra_s - 153.7).abs() < 0.5, "{}", ra_s);
        assert!((dec_as - 1002.0).abs() < 2.0, "{}", dec_as);

        // Precession there and back is the identity
        let m = precession(2050.0, 2000.0) * precession(2000.0, 2050.0);
        assert!((m - Matrix3::identity()).amax() < 1e-9);
    }

    #[test]
    fn test_nutation_is_small() {
        let v = spherical_to_vector(1.0, 0.3);

        for &mjd in &[51_544.5, 55_000.0, 60_000.0, 61_000.0] {
            let shift_as = (nutation(mjd) * v - v).norm() / AS2R;
            assert!(shift_as < 25.0, "{} at {}", shift_as, mjd);
        }
    }

    #[test]
    fn test_aberration_bounded() {
        for &mjd in &[51_544.5, 51_600.0, 51_700.0, 61_000.0] {
            let earth = EarthState::at(mjd);
            let vel_as = earth.vel_c.norm() / AS2R;
            assert!((vel_as - ABERRATION_AS).abs() < 1e-6);
            assert!((earth.pos_au.norm() - 1.0).abs() < 0.02);

            let p = spherical_to_vector(2.0, -0.5);
            let shift_as = (aberrate(&p, &earth.vel_c) - p).norm() / AS2R;
            assert!(shift_as <= ABERRATION_AS + 0.01);
        }
    }

    #[test]
    fn test_place_round_trip() {
        let astrom = NativeAstrometry;
        let place = CatalogPlace {
            ra_rad: 4.0,
            dec_rad: -0.6,
            pm_ra_rad_yr: 0.0,
            pm_dec_rad_yr: 0.0,
            parallax_as: 0.0,
            radial_velocity_km_s: 0.0,
            equinox: 2000.0,
        };

        let (app_ra, app_dec) = astrom.apply_proper_motion_and_parallax(&place, 60_500.0);
        let (ra, dec) = astrom.mean_to_apparent_correction(app_ra, app_dec, 60_500.0, 2000.0);

        assert!((ra - place.ra_rad).abs() / AS2R < 1e-4);
        assert!((dec - place.dec_rad).abs() / AS2R < 1e-4);
    }

    #[test]
    fn test_parallax() {
        let astrom = NativeAstrometry;
        let mut place = CatalogPlace {
            ra_rad: 1.0,
            dec_rad: 0.2,
            pm_ra_rad_yr: 0.0,
            pm_dec_rad_yr: 0.0,
            parallax_as: 0.0,
            radial_velocity_km_s: 0.0,
            equinox: 2000.0,
        };

        let (ra0, dec0) = astrom.apply_proper_motion_and_parallax(&place, 60_000.0);
        place.parallax_as = 0.5;
        let (ra1, dec1) = astrom.apply_proper_motion_and_parallax(&place, 60_000.0);

        let shift_as = ((ra1 - ra0) * dec0.cos()).hypot(dec1 - dec0) / AS2R;
        assert!(shift_as > 0.0 && shift_as <= 0.51, "{}", shift_as);
    }
}
