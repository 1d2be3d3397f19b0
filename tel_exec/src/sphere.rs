//! # Spherical Transforms
//!
//! Conversions between the equatorial (right ascension, declination) and horizontal (azimuth,
//! zenith distance) frames for a fixed observatory.
//!
//! Azimuth follows the BTA convention: measured from the south through the west, in
//! `(-180°, 180°]`. Right ascension and sidereal time are in seconds of time, all other angles in
//! arcseconds.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::TAU;
use util::maths::{map_pi_to_2pi, wrap_period};

use crate::{
    angle::{AS2R, S2R, S_PER_DAY},
    params::ObservatoryParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Location of the telescope, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observatory {
    /// Units: arcseconds, east positive
    pub longitude_as: f64,

    /// Units: arcseconds
    pub latitude_as: f64,

    sin_lat: f64,

    cos_lat: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Observatory {
    pub fn new(longitude_as: f64, latitude_as: f64) -> Self {
        let (sin_lat, cos_lat) = (latitude_as * AS2R).sin_cos();

        Self {
            longitude_as,
            latitude_as,
            sin_lat,
            cos_lat,
        }
    }

    pub fn from_params(params: &ObservatoryParams) -> Self {
        Self::new(params.longitude_as, params.latitude_as)
    }

    pub fn sin_lat(&self) -> f64 {
        self.sin_lat
    }

    pub fn cos_lat(&self) -> f64 {
        self.cos_lat
    }

    /// Convert an equatorial position into `(azimuth_as, zenith_distance_as)` at the sidereal time
    /// `s_time_s`.
    pub fn equatorial_to_horizontal(
        &self,
        alpha_s: f64,
        delta_as: f64,
        s_time_s: f64,
    ) -> (f64, f64) {
        let (sin_t, cos_t) = (hour_angle_s(alpha_s, s_time_s) * S2R).sin_cos();
        let (sin_d, cos_d) = (delta_as * AS2R).sin_cos();

        let cos_z = self.cos_lat * cos_d * cos_t + self.sin_lat * sin_d;
        let zd_rad = cos_z.max(-1.0).min(1.0).acos();

        let y = cos_d * sin_t;
        let x = cos_d * self.sin_lat * cos_t - self.cos_lat * sin_d;
        let az_rad = y.atan2(x);

        (az_rad / AS2R, zd_rad / AS2R)
    }

    /// Convert a horizontal position into `(alpha_s, delta_as)` at the sidereal time `s_time_s`.
    ///
    /// The right ascension is wrapped into `[0, 24h)`.
    pub fn horizontal_to_equatorial(
        &self,
        az_as: f64,
        zd_as: f64,
        s_time_s: f64,
    ) -> (f64, f64) {
        let (sin_a, cos_a) = (az_as * AS2R).sin_cos();
        let (sin_z, cos_z) = (zd_as * AS2R).sin_cos();

        let y = sin_z * sin_a;
        let x = cos_a * self.sin_lat * sin_z + self.cos_lat * cos_z;
        let t_rad = map_pi_to_2pi(y.atan2(x));

        let sin_d = self.sin_lat * cos_z - self.cos_lat * cos_a * sin_z;
        let delta_rad = sin_d.max(-1.0).min(1.0).asin();

        let alpha_s = wrap_period(s_time_s - t_rad / S2R, S_PER_DAY);

        (alpha_s, delta_rad / AS2R)
    }

    /// Parallactic angle of an equatorial position in radians, in `[0, 2π)`.
    pub fn parallactic_angle(&self, alpha_s: f64, delta_as: f64, s_time_s: f64) -> f64 {
        let (sin_t, cos_t) = (hour_angle_s(alpha_s, s_time_s) * S2R).sin_cos();
        let (sin_d, cos_d) = (delta_as * AS2R).sin_cos();

        let sp = sin_t * self.cos_lat;
        let cp = self.sin_lat * cos_d - sin_d * self.cos_lat * cos_t;

        wrap_period(map_pi_to_2pi(sp.atan2(cp)), TAU)
    }
}

impl Default for Observatory {
    fn default() -> Self {
        Self::from_params(&ObservatoryParams::default())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Hour angle in `[0, 24h)` of an object at `alpha_s` at the sidereal time `s_time_s`.
pub fn hour_angle_s(alpha_s: f64, s_time_s: f64) -> f64 {
    wrap_period(s_time_s - alpha_s, S_PER_DAY)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const DEG_AS: f64 = 3600.0;
    const HOUR_S: f64 = 3600.0;

    #[test]
    fn test_bta_location() {
        let obs = Observatory::default();

        assert!((obs.sin_lat() - 0.6902957888).abs() < 1e-9);
        assert!((obs.cos_lat() - 0.7235272793).abs() < 1e-9);
    }

    #[test]
    fn test_fixtures() {
        let obs = Observatory::default();
        let s_time_s = 5.0 * HOUR_S;

        // Meridian transit at the latitude passes through the zenith
        let (_, zd_as) = obs.equatorial_to_horizontal(s_time_s, obs.latitude_as, s_time_s);
        assert!(zd_as.abs() < 0.01);

        // Meridian transit 30 degrees south of the zenith
        let (az_as, zd_as) = obs.equatorial_to_horizontal(
            s_time_s, obs.latitude_as - 30.0 * DEG_AS, s_time_s
        );
        assert!(az_as.abs() < 1e-6);
        assert!((zd_as - 30.0 * DEG_AS).abs() < 1e-6);

        // On the celestial equator six hours west of the meridian the object sets due west
        let (az_as, zd_as) = obs.equatorial_to_horizontal(
            s_time_s - 6.0 * HOUR_S, 0.0, s_time_s
        );
        assert!((az_as - 90.0 * DEG_AS).abs() < 1e-6);
        assert!((zd_as - 90.0 * DEG_AS).abs() < 1e-6);

        // Eastern objects have negative azimuth
        let (az_as, _) = obs.equatorial_to_horizontal(s_time_s + 2.0 * HOUR_S, 0.0, s_time_s);
        assert!(az_as < 0.0);
    }

    #[test]
    fn test_round_trip() {
        let obs = Observatory::default();
        let s_time_s = 12_345.6;

        for alpha_h in 0..24 {
            for &delta_deg in &[-30.0, -5.0, 0.0, 20.0, 60.0, 80.0] {
                let alpha_s = alpha_h as f64 * HOUR_S + 17.0;
                let delta_as = delta_deg * DEG_AS;

                let (az_as, zd_as) = obs.equatorial_to_horizontal(alpha_s, delta_as, s_time_s);

                // Skip the zenith region where the azimuth is undefined
                if zd_as < DEG_AS {
                    continue;
                }

                let (alpha2_s, delta2_as) = obs.horizontal_to_equatorial(az_as, zd_as, s_time_s);

                let mut d_alpha_s = (alpha2_s - alpha_s).abs();
                if d_alpha_s > S_PER_DAY / 2.0 {
                    d_alpha_s = S_PER_DAY - d_alpha_s;
                }

                assert!(d_alpha_s < 1e-5, "RA {} -> {}", alpha_s, alpha2_s);
                assert!((delta2_as - delta_as).abs() < 1e-5, "Dec {} -> {}", delta_as, delta2_as);
                assert!(alpha2_s >= 0.0 && alpha2_s < S_PER_DAY);
            }
        }
    }

    #[test]
    fn test_parallactic_angle() {
        let obs = Observatory::default();
        let s_time_s = 3.0 * HOUR_S;

        // Zero on the meridian south of the zenith
        let pa = obs.parallactic_angle(s_time_s, 10.0 * DEG_AS, s_time_s);
        assert!(pa.abs() < 1e-9 || (TAU - pa).abs() < 1e-9);

        // Positive west of the meridian, wrapped positive to the east
        let west = obs.parallactic_angle(s_time_s - 3.0 * HOUR_S, 10.0 * DEG_AS, s_time_s);
        let east = obs.parallactic_angle(s_time_s + 3.0 * HOUR_S, 10.0 * DEG_AS, s_time_s);
        assert!(west > 0.0 && west < std::f64::consts::PI);
        assert!(east > std::f64::consts::PI && east < TAU);
        assert!((west + east - TAU).abs() < 1e-9);
    }
}
