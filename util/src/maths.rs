//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the inclusive range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// Use [`wrap_period`] where the open upper bound matters.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap a value into `[0, period)`.
///
/// Unlike [`rem_euclid`] the result never equals `period`.
pub fn wrap_period<T>(value: T, period: T) -> T
where
    T: Float
{
    let r = rem_euclid(value, period);
    if r >= period.abs() { T::zero() } else { r }
}

/// Map a value in the range [-pi, pi] to [0, 2pi)
pub fn map_pi_to_2pi<T>(value: T) -> T 
where
    T: Float
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if value < T::zero() {
        wrap_period(tau_t + value, tau_t)
    }
    else {
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_period() {
        assert_eq!(wrap_period(370.0, 360.0), 10.0);
        assert_eq!(wrap_period(-10.0, 360.0), 350.0);
        assert_eq!(wrap_period(720.0, 360.0), 0.0);

        // Tiny negative values would round up to the period itself
        let r = wrap_period(-1e-20f64, 360.0);
        assert!(r >= 0.0 && r < 360.0);
    }

    #[test]
    fn test_map_pi_to_2pi() {
        const PI: f64 = std::f64::consts::PI;
        const TAU: f64 = std::f64::consts::TAU;

        assert_eq!(map_pi_to_2pi(1f64), 1f64);
        assert!((map_pi_to_2pi(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!(map_pi_to_2pi(-1e-300f64) < TAU);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5.0, &0.0, &1.0), 1.0);
        assert_eq!(clamp(&-5.0, &0.0, &1.0), 0.0);
        assert_eq!(clamp(&0.5, &0.0, &1.0), 0.5);
    }
}
