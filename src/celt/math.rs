//! Scalar math helpers shared by both numeric backends.
//!
//! The integer logarithms drive every fixed-point shift derivation in the
//! band code. The float helpers wrap `libm` so the crate stays `no_std`.

use libm::sqrtf;

use crate::celt::entcode::ec_ilog;
use crate::celt::types::FLOAT_EPSILON;

/// Integer base-2 logarithm, `floor(log2(x))`, for strictly positive input.
#[inline]
pub(crate) fn celt_ilog2(x: i32) -> i32 {
    debug_assert!(x > 0, "celt_ilog2 requires a positive argument");
    ec_ilog(x as u32) - 1
}

/// Base-2 logarithm that maps non-positive values to zero.
///
/// For positive `x` this is the index of the highest set bit, so exact
/// powers of two land on their exponent (`celt_zlog2(1 << k) == k`).
#[inline]
pub(crate) fn celt_zlog2(x: i32) -> i32 {
    if x <= 0 { 0 } else { celt_ilog2(x) }
}

#[inline]
pub(crate) fn celt_sqrt(x: f32) -> f32 {
    sqrtf(x)
}

#[inline]
pub(crate) fn celt_rcp(x: f32) -> f32 {
    1.0 / x
}

/// Reciprocal square root for energies, floored away from zero.
#[inline]
pub(crate) fn celt_rsqrt(x: f32) -> f32 {
    1.0 / sqrtf(x + FLOAT_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilog2_matches_highest_set_bit() {
        let cases = [(1, 0), (2, 1), (3, 1), (4, 2), (1023, 9), (1024, 10), (i32::MAX, 30)];
        for (input, expected) in cases {
            assert_eq!(celt_ilog2(input), expected, "celt_ilog2({input})");
        }
    }

    #[test]
    fn zlog2_is_zero_for_non_positive_input() {
        assert_eq!(celt_zlog2(0), 0);
        assert_eq!(celt_zlog2(-5), 0);
        assert_eq!(celt_zlog2(1), 0);
    }

    #[test]
    fn zlog2_agrees_with_float_log_at_powers_of_two() {
        for k in 0..31 {
            let x = 1i32 << k;
            assert_eq!(celt_zlog2(x), k);
            assert_eq!(celt_zlog2(x + (x >> 1)), k);
            if k > 0 {
                assert_eq!(celt_zlog2(x - 1), k - 1);
            }
            let float = libm::floorf(libm::log2f(x as f32)) as i32;
            assert_eq!(celt_zlog2(x), float);
        }
    }

    #[test]
    fn float_helpers_are_consistent() {
        assert!((celt_sqrt(16.0) - 4.0).abs() < 1e-6);
        assert!((celt_rcp(4.0) - 0.25).abs() < 1e-7);
        assert!((celt_rsqrt(0.25) - 2.0).abs() < 1e-5);
    }
}
