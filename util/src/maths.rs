//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value into the range `[min, max]`.
///
/// NaN values are passed through unchanged.
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
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range `[0, 2pi)`.
pub fn wrap_2pi<T>(angle: T) -> T
where
    T: Float
{
    let tau_t = tau::<T>();

    // Catch the round-off case of rem_euclid so the range stays half open
    let wrapped = rem_euclid(angle, tau_t);
    if wrapped >= tau_t { T::zero() } else { wrapped }
}

/// Normalise an angular difference into the range `(-pi, pi]`.
///
/// This is the signed shortest rotation which takes an angle to another, so
/// `norm_ang_delta(a - b)` is how far `b` must turn to reach `a`.
pub fn norm_ang_delta<T>(delta: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);

    let wrapped = wrap_2pi(delta);
    if wrapped > pi_t {
        wrapped - tau::<T>()
    }
    else {
        wrapped
    }
}

/// Get the signed shortest angular distance from `from` to `to`.
///
/// Both angles may lie outside of `[0, 2pi)`, they are wrapped first.
pub fn get_ang_dist<T>(from: T, to: T) -> T
where
    T: Float
{
    norm_ang_delta(wrap_2pi(to) - wrap_2pi(from))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn tau<T: Float>() -> T {
    T::from(std::f64::consts::TAU).unwrap_or_else(T::nan)
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_wrap_2pi() {
        assert_eq!(wrap_2pi(0f64), 0f64);
        assert!((wrap_2pi(-1f64) - (TAU - 1.0)).abs() < 1e-12);
        assert!((wrap_2pi(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!(wrap_2pi(-1e-20f64) < TAU);
        assert!(wrap_2pi(f64::NAN).is_nan());
    }

    #[test]
    fn test_norm_ang_delta() {
        assert!((norm_ang_delta(0.2f64) - 0.2).abs() < 1e-12);
        assert!((norm_ang_delta(TAU - 0.2) + 0.2).abs() < 1e-12);
        assert!((norm_ang_delta(-TAU + 0.2) - 0.2).abs() < 1e-12);

        // Exactly pi stays positive, the range is (-pi, pi]
        assert!((norm_ang_delta(PI) - PI).abs() < 1e-12);
        assert!((norm_ang_delta(-PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_get_ang_dist() {
        assert!((get_ang_dist(1f64, 2f64) - 1.0).abs() < 1e-12);
        assert!((get_ang_dist(2f64, 1f64) + 1.0).abs() < 1e-12);
        assert!(get_ang_dist(0f64, TAU).abs() < 1e-12);
        assert!((get_ang_dist(TAU - 0.1, 0.1) - 0.2).abs() < 1e-12);
        assert!((get_ang_dist(0.1, TAU - 0.1) + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&2.0, &-1.0, &1.0), 1.0);
        assert_eq!(clamp(&-2.0, &-1.0, &1.0), -1.0);
        assert_eq!(clamp(&0.5, &-1.0, &1.0), 0.5);
    }
}
