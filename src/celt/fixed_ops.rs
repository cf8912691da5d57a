//! Integer building blocks for the fixed-point backend.
//!
//! Naming follows the CELT macro family: `mult16_16_q15` multiplies two
//! 16-bit words and drops 15 fractional bits, `vshr32` shifts right for
//! positive amounts and left for negative ones, and so on.

use core::cmp::Ordering;

use super::types::{Word16, Word32};

#[inline]
pub(crate) fn add16(a: Word16, b: Word16) -> Word16 {
    a.wrapping_add(b)
}

#[inline]
pub(crate) fn sub16(a: Word16, b: Word16) -> Word16 {
    a.wrapping_sub(b)
}

#[inline]
pub(crate) fn neg16(a: Word16) -> Word16 {
    a.wrapping_neg()
}

#[inline]
pub(crate) fn add32(a: Word32, b: Word32) -> Word32 {
    a.wrapping_add(b)
}

#[inline]
pub(crate) fn abs32(a: Word32) -> Word32 {
    if a < 0 { a.wrapping_neg() } else { a }
}

#[inline]
pub(crate) fn extract16(a: Word32) -> Word16 {
    a as Word16
}

/// Clamps a 32-bit value into the 16-bit range.
#[inline]
pub(crate) fn sat16(a: Word32) -> Word16 {
    a.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as Word16
}

#[inline]
pub(crate) fn shl32(a: Word32, shift: u32) -> Word32 {
    a.wrapping_shl(shift)
}

#[inline]
pub(crate) fn shr32(a: Word32, shift: u32) -> Word32 {
    a >> shift
}

#[inline]
pub(crate) fn shl16(a: Word16, shift: u32) -> Word16 {
    i32::from(a).wrapping_shl(shift) as Word16
}

/// Shift right by `shift` bits, or left when `shift` is negative.
#[inline]
pub(crate) fn vshr32(a: Word32, shift: i32) -> Word32 {
    match shift.cmp(&0) {
        Ordering::Greater => shr32(a, shift.unsigned_abs().min(31)),
        Ordering::Less => shl32(a, shift.unsigned_abs()),
        Ordering::Equal => a,
    }
}

/// Rounding right shift.
#[inline]
pub(crate) fn pshr32(a: Word32, shift: u32) -> Word32 {
    if shift == 0 {
        return a;
    }
    let bias = 1i64 << (shift - 1);
    ((i64::from(a) + bias) >> shift) as Word32
}

#[inline]
pub(crate) fn mult16_16(a: Word16, b: Word16) -> Word32 {
    Word32::from(a) * Word32::from(b)
}

#[inline]
pub(crate) fn mult16_16_q14(a: Word16, b: Word16) -> Word32 {
    mult16_16(a, b) >> 14
}

#[inline]
pub(crate) fn mult16_16_q15(a: Word16, b: Word16) -> Word16 {
    (mult16_16(a, b) >> 15) as Word16
}

/// `Q15` product rounded to nearest.
#[inline]
pub(crate) fn mult16_16_p15(a: Word16, b: Word16) -> Word16 {
    ((mult16_16(a, b) + (1 << 14)) >> 15) as Word16
}

#[inline]
pub(crate) fn mult16_32_q14(a: Word16, b: Word32) -> Word32 {
    ((i64::from(a) * i64::from(b)) >> 14) as Word32
}

#[inline]
pub(crate) fn mult16_32_q16(a: Word16, b: Word32) -> Word32 {
    ((i64::from(a) * i64::from(b)) >> 16) as Word32
}

#[inline]
pub(crate) fn mult32_32_q31(a: Word32, b: Word32) -> Word32 {
    ((i64::from(a) * i64::from(b)) >> 31) as Word32
}

#[inline]
pub(crate) fn mac16_16(c: Word32, a: Word16, b: Word16) -> Word32 {
    add32(c, mult16_16(a, b))
}
