//! Fixed-point square root, reciprocal and normalised reciprocal square root.
//!
//! Each routine normalises its argument with [`celt_ilog2`] so the
//! polynomial approximations only ever see a narrow input range.

use crate::celt::fixed_ops::{add16, add32, mult16_16_q15, shl16, sub16, vshr32};
use crate::celt::math::celt_ilog2;

/// Reciprocal square root of a `Q16` value in `[0.25, 1)`, returned in `Q14`.
pub(crate) fn celt_rsqrt_norm(x: i32) -> i16 {
    let n = (x - 32_768) as i16;
    let r = add16(
        23_557,
        mult16_16_q15(n, add16(-13_490, mult16_16_q15(n, 6_713))),
    );
    let r2 = mult16_16_q15(r, r);
    let y = shl16(sub16(add16(mult16_16_q15(r2, n), r2), 16_384), 1);

    add16(
        r,
        mult16_16_q15(r, mult16_16_q15(y, sub16(mult16_16_q15(y, 12_288), 16_384))),
    )
}

/// Square root of a 32-bit value, `QX` in and `QX/2` out.
///
/// Saturates at 32767 for inputs of 2^30 and above.
pub(crate) fn celt_sqrt(x: i32) -> i32 {
    const COEFFS: [i16; 6] = [23_171, 11_574, -2_901, 1_592, -1_002, 336];

    if x <= 0 {
        return 0;
    }
    if x >= 1 << 30 {
        return 32_767;
    }

    let k = (celt_ilog2(x) >> 1) - 7;
    let n = (vshr32(x, 2 * k) - 32_768) as i16;
    let acc = COEFFS[1..]
        .iter()
        .rev()
        .fold(0i16, |acc, &c| add16(c, mult16_16_q15(n, acc)));
    vshr32(add32(i32::from(COEFFS[0]), i32::from(mult16_16_q15(n, acc))), 7 - k)
}

/// Reciprocal approximation, `celt_rcp(x) ~= 2^31 / x` for positive `x`.
pub(crate) fn celt_rcp(x: i32) -> i32 {
    debug_assert!(x > 0, "celt_rcp requires a positive argument");

    let i = celt_ilog2(x);
    let n = (vshr32(x, i - 15) - 32_768) as i16;
    let mut r = add16(30_840, mult16_16_q15(-15_420, n));

    let term = add16(mult16_16_q15(r, n), add16(r, -32_768i16));
    r = sub16(r, mult16_16_q15(r, term));
    let term = add16(mult16_16_q15(r, n), add16(r, -32_768i16));
    r = sub16(r, add16(1, mult16_16_q15(r, term)));

    vshr32(i32::from(r), i - 16)
}
