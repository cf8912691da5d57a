//! Numeric strategies for the band pipeline.
//!
//! Every stage is written once, generically over [`Numeric`]. The trait
//! supplies the representation of each kind of value and the handful of
//! arithmetic primitives whose rounding and overflow handling differ between
//! floating point and fixed point. Branch decisions never depend on the
//! backend: both see the same pulse counts and take the same paths.

use core::fmt::Debug;

use libm::floorf;

use crate::celt::fixed_ops::{
    abs32, add16, extract16, mac16_16, mult16_16, mult16_16_p15, mult16_16_q14, mult16_16_q15,
    mult16_32_q14, neg16, sat16, shl32, shr32, sub16, vshr32,
};
use crate::celt::math::{celt_ilog2, celt_sqrt, celt_zlog2};
use crate::celt::math_fixed;
use crate::celt::mode::ChannelBand;
use crate::celt::types::{
    EPSILON, FLOAT_ENERGY_FLOOR, FLOAT_EPSILON, NORM_TO_SIG_SHIFT, SIG_SHIFT, Word16, Word32,
};
use crate::celt::vq::{
    op_pvq_search, op_pvq_search_fixed, renormalise_vector, renormalise_vector_fixed,
};

/// Arithmetic used by the band pipeline.
pub trait Numeric {
    /// Transform-domain sample.
    type Sig: Copy + Default + PartialEq + Debug;
    /// Coefficient of a unit-energy band.
    type Norm: Copy + Default + PartialEq + Debug;
    /// Band amplitude stored in the energy bank.
    type Ener: Copy + PartialOrd + Debug;
    /// Pitch gain.
    type Gain: Copy + Default + PartialOrd + Debug;
    /// Wide accumulator for inner products.
    type Acc: Copy + Default + PartialOrd + Debug;
    /// Rotation, mixing and weighting coefficient.
    type Coef: Copy + Debug;
    /// Per band and channel divisor prepared by [`Numeric::normaliser`].
    type NormScale: Copy;
    /// Per band and channel multiplier prepared by [`Numeric::denormaliser`].
    type DenormScale: Copy;

    fn sig_from_f32(x: f32) -> Self::Sig;
    fn sig_to_f32(x: Self::Sig) -> f32;
    fn norm_from_f32(x: f32) -> Self::Norm;
    fn norm_to_f32(x: Self::Norm) -> f32;
    fn ener_from_f32(e: f32) -> Self::Ener;
    fn ener_to_f32(e: Self::Ener) -> f32;
    fn gain_to_f32(g: Self::Gain) -> f32;
    fn gain_from_q15(q: Word16) -> Self::Gain;
    fn gain_to_q15(g: Self::Gain) -> Word16;

    /// Square root of the band's energy, never below the energy floor.
    fn band_amplitude(band: ChannelBand<'_, Self::Sig>) -> Self::Ener;
    /// Prepares division by `bank * sqrt(channels)`.
    fn normaliser(bank: Self::Ener, channels: usize) -> Self::NormScale;
    fn normalise(sample: Self::Sig, scale: Self::NormScale) -> Self::Norm;
    /// Prepares multiplication by `bank * sqrt(channels)`.
    fn denormaliser(bank: Self::Ener, channels: usize) -> Self::DenormScale;
    fn denormalise(x: Self::Norm, scale: Self::DenormScale) -> Self::Sig;
    /// Lifts a normalised coefficient into the signal domain for re-analysis.
    fn norm_to_sig(x: Self::Norm) -> Self::Sig;

    fn mac(acc: Self::Acc, a: Self::Norm, b: Self::Norm) -> Self::Acc;
    /// `0.9 * sxy / sxx` for `0 <= sxy <= sxx`.
    fn pitch_gain(sxy: Self::Acc, sxx: Self::Acc) -> Self::Gain;
    fn apply_gain(g: Self::Gain, p: Self::Norm) -> Self::Norm;

    /// Cosine and signed sine of the spreading rotation.
    fn rotation_coefs(dir: i32) -> (Self::Coef, Self::Coef);
    fn rotate(
        c: Self::Coef,
        s: Self::Coef,
        x1: Self::Norm,
        x2: Self::Norm,
    ) -> (Self::Norm, Self::Norm);
    /// `sqrt(n)`, the scale of a band of `n` samples in the folding history.
    fn band_weight(n: usize) -> Self::Coef;
    fn weight(w: Self::Coef, x: Self::Norm) -> Self::Norm;

    /// Mixing coefficients derived from the two channel amplitudes.
    fn stereo_coefs(left: Self::Ener, right: Self::Ener, dir: i32) -> (Self::Coef, Self::Coef);
    fn stereo_rotate(
        a1: Self::Coef,
        a2: Self::Coef,
        l: Self::Norm,
        r: Self::Norm,
    ) -> (Self::Norm, Self::Norm);

    /// Target of the pulse search for `x` predicted by `p`.
    fn residual(x: Self::Norm, p: Self::Norm) -> Self::Norm;
    fn negate(x: Self::Norm) -> Self::Norm;
    /// Scales `x` to an L2 norm of `gain_q15 / 32768`.
    fn renormalise_vector(x: &mut [Self::Norm], gain_q15: Word16);
    /// Normalised correlation `xy^2 / yy` used to rank prediction lags.
    fn prediction_score(xy: Self::Acc, yy: Self::Acc) -> Self::Acc;
    /// Places exactly `k` signed pulses along `x`, overwriting `x`.
    fn pvq_search(x: &mut [Self::Norm], pulses: &mut [i32], k: usize);
    /// Sets `x = p + g * pulses` with `g` chosen for unit energy.
    fn mix_pitch_and_residual(pulses: &[i32], p: &[Self::Norm], x: &mut [Self::Norm]);
}

/// Single-precision floating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatBackend;

impl Numeric for FloatBackend {
    type Sig = f32;
    type Norm = f32;
    type Ener = f32;
    type Gain = f32;
    type Acc = f32;
    type Coef = f32;
    type NormScale = f32;
    type DenormScale = f32;

    fn sig_from_f32(x: f32) -> f32 {
        x
    }

    fn sig_to_f32(x: f32) -> f32 {
        x
    }

    fn norm_from_f32(x: f32) -> f32 {
        x
    }

    fn norm_to_f32(x: f32) -> f32 {
        x
    }

    fn ener_from_f32(e: f32) -> f32 {
        e
    }

    fn ener_to_f32(e: f32) -> f32 {
        e
    }

    fn gain_to_f32(g: f32) -> f32 {
        g
    }

    fn gain_from_q15(q: Word16) -> f32 {
        f32::from(q) * (1.0 / 32_768.0)
    }

    fn gain_to_q15(g: f32) -> Word16 {
        floorf(g * 32_768.0 + 0.5).clamp(-32_768.0, 32_767.0) as Word16
    }

    fn band_amplitude(band: ChannelBand<'_, f32>) -> f32 {
        celt_sqrt(band.iter().fold(FLOAT_ENERGY_FLOOR, |sum, x| sum + x * x))
    }

    fn normaliser(bank: f32, channels: usize) -> f32 {
        1.0 / (FLOAT_ENERGY_FLOOR + bank * celt_sqrt(channels as f32))
    }

    fn normalise(sample: f32, scale: f32) -> f32 {
        sample * scale
    }

    fn denormaliser(bank: f32, channels: usize) -> f32 {
        bank * celt_sqrt(channels as f32)
    }

    fn denormalise(x: f32, scale: f32) -> f32 {
        x * scale
    }

    fn norm_to_sig(x: f32) -> f32 {
        x
    }

    fn mac(acc: f32, a: f32, b: f32) -> f32 {
        acc + a * b
    }

    fn pitch_gain(sxy: f32, sxx: f32) -> f32 {
        0.9 * sxy / (sxx + FLOAT_EPSILON)
    }

    fn apply_gain(g: f32, p: f32) -> f32 {
        g * p
    }

    fn rotation_coefs(dir: i32) -> (f32, f32) {
        (0.955_34, dir.signum() as f32 * 0.295_52)
    }

    fn rotate(c: f32, s: f32, x1: f32, x2: f32) -> (f32, f32) {
        (c * x1 - s * x2, c * x2 + s * x1)
    }

    fn band_weight(n: usize) -> f32 {
        celt_sqrt(n as f32)
    }

    fn weight(w: f32, x: f32) -> f32 {
        w * x
    }

    fn stereo_coefs(left: f32, right: f32, dir: i32) -> (f32, f32) {
        let norm = FLOAT_EPSILON + celt_sqrt(FLOAT_EPSILON + left * left + right * right);
        (left / norm, dir.signum() as f32 * right / norm)
    }

    fn stereo_rotate(a1: f32, a2: f32, l: f32, r: f32) -> (f32, f32) {
        (a1 * l + a2 * r, a1 * r - a2 * l)
    }

    fn residual(x: f32, p: f32) -> f32 {
        x - p
    }

    fn negate(x: f32) -> f32 {
        -x
    }

    fn renormalise_vector(x: &mut [f32], gain_q15: Word16) {
        renormalise_vector(x, Self::gain_from_q15(gain_q15));
    }

    fn prediction_score(xy: f32, yy: f32) -> f32 {
        xy * xy / (yy + FLOAT_EPSILON)
    }

    fn pvq_search(x: &mut [f32], pulses: &mut [i32], k: usize) {
        op_pvq_search(x, pulses, k as i32);
    }

    fn mix_pitch_and_residual(pulses: &[i32], p: &[f32], x: &mut [f32]) {
        let (mut ryy, mut ryp, mut rpp) = (0.0f32, 0.0f32, 0.0f32);
        for (&y, &p) in pulses.iter().zip(p) {
            let y = y as f32;
            ryy += y * y;
            ryp += y * p;
            rpp += p * p;
        }
        let disc = (ryp * ryp + ryy - ryy * rpp).max(0.0);
        let g = (celt_sqrt(disc) - ryp) / ryy;
        for ((x, &y), &p) in x.iter_mut().zip(pulses).zip(p) {
            *x = p + g * y as f32;
        }
    }
}

/// `sqrt(C)` in `Q14` for one and two channels.
const SQRT_C_Q14: [Word16; 2] = [16_384, 23_170];
/// 0.9 in `Q15`.
const PITCH_SHRINK_Q15: i64 = 29_491;
/// cos(0.3) and sin(0.3) in `Q15`.
const ROTATION_COS_Q15: Word16 = 31_305;
const ROTATION_SIN_Q15: Word16 = 9_684;

/// Fixed-point arithmetic: `i32` signals scaled by 2^12, `Q14` coefficients,
/// `Q15` gains and 64-bit accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedBackend;

/// Divisor of a band split into an exponent and a `Q13`-normalised reciprocal.
#[derive(Debug, Clone, Copy)]
pub struct FixedNormScale {
    shift: i32,
    gain: Word16,
}

impl Numeric for FixedBackend {
    type Sig = Word32;
    type Norm = Word16;
    type Ener = Word32;
    type Gain = Word16;
    type Acc = i64;
    type Coef = Word16;
    type NormScale = FixedNormScale;
    type DenormScale = Word32;

    fn sig_from_f32(x: f32) -> Word32 {
        floorf(x * (1u32 << SIG_SHIFT) as f32 + 0.5) as Word32
    }

    fn sig_to_f32(x: Word32) -> f32 {
        x as f32 / (1u32 << SIG_SHIFT) as f32
    }

    fn norm_from_f32(x: f32) -> Word16 {
        floorf(x * 16_384.0 + 0.5) as Word16
    }

    fn norm_to_f32(x: Word16) -> f32 {
        f32::from(x) / 16_384.0
    }

    fn ener_from_f32(e: f32) -> Word32 {
        Self::sig_from_f32(e).max(EPSILON)
    }

    fn ener_to_f32(e: Word32) -> f32 {
        Self::sig_to_f32(e)
    }

    fn gain_to_f32(g: Word16) -> f32 {
        f32::from(g) / 32_768.0
    }

    fn gain_from_q15(q: Word16) -> Word16 {
        q
    }

    fn gain_to_q15(g: Word16) -> Word16 {
        g
    }

    fn band_amplitude(band: ChannelBand<'_, Word32>) -> Word32 {
        let maxval = band.iter().map(abs32).max().unwrap_or(0);
        if maxval <= 0 {
            return EPSILON;
        }
        // Keep every squared term below 2^22 so the sum fits in 32 bits.
        let shift = celt_ilog2(maxval) - 10;
        let sum = band.iter().fold(0, |sum, x| {
            let v = extract16(vshr32(x, shift));
            mac16_16(sum, v, v)
        });
        let root = i64::from(math_fixed::celt_sqrt(sum));
        let amplitude = if shift >= 0 {
            root << shift
        } else {
            root >> -shift
        };
        EPSILON + amplitude.min(i64::from(Word32::MAX - EPSILON)) as Word32
    }

    fn normaliser(bank: Word32, channels: usize) -> FixedNormScale {
        let shift = celt_zlog2(bank) - 13;
        let e = extract16(vshr32(bank, shift));
        let gain = extract16(math_fixed::celt_rcp(shr32(
            mult16_16(e, SQRT_C_Q14[channels - 1]),
            10,
        )));
        FixedNormScale { shift, gain }
    }

    fn normalise(sample: Word32, scale: FixedNormScale) -> Word16 {
        let v = sat16(vshr32(sample, scale.shift));
        sat16(mult16_16(v, scale.gain) >> 13)
    }

    fn denormaliser(bank: Word32, channels: usize) -> Word32 {
        mult16_32_q14(SQRT_C_Q14[channels - 1], bank)
    }

    fn denormalise(x: Word16, scale: Word32) -> Word32 {
        mult16_32_q14(x, scale)
    }

    fn norm_to_sig(x: Word16) -> Word32 {
        shl32(Word32::from(x), NORM_TO_SIG_SHIFT)
    }

    fn mac(acc: i64, a: Word16, b: Word16) -> i64 {
        acc + i64::from(mult16_16(a, b))
    }

    fn pitch_gain(sxy: i64, sxx: i64) -> Word16 {
        let g = sxy * PITCH_SHRINK_Q15 / sxx.max(1);
        g.min(i64::from(Word16::MAX)) as Word16
    }

    fn apply_gain(g: Word16, p: Word16) -> Word16 {
        mult16_16_q15(g, p)
    }

    fn rotation_coefs(dir: i32) -> (Word16, Word16) {
        let s = if dir < 0 {
            -ROTATION_SIN_Q15
        } else {
            ROTATION_SIN_Q15
        };
        (ROTATION_COS_Q15, s)
    }

    fn rotate(c: Word16, s: Word16, x1: Word16, x2: Word16) -> (Word16, Word16) {
        (
            sub16(mult16_16_p15(c, x1), mult16_16_p15(s, x2)),
            add16(mult16_16_p15(c, x2), mult16_16_p15(s, x1)),
        )
    }

    /// `sqrt(n)` in `Q10`; bands hold at most 512 samples.
    fn band_weight(n: usize) -> Word16 {
        math_fixed::celt_sqrt((n as Word32) << 20) as Word16
    }

    fn weight(w: Word16, x: Word16) -> Word16 {
        mult16_16_q14(w, x) as Word16
    }

    fn stereo_coefs(left: Word32, right: Word32, dir: i32) -> (Word16, Word16) {
        let shift = celt_zlog2(left.max(right)) - 13;
        let left = extract16(vshr32(left, shift));
        let right = extract16(vshr32(right, shift));
        let norm = EPSILON
            + math_fixed::celt_sqrt(EPSILON + mult16_16(left, left) + mult16_16(right, right));
        let a1 = extract16(shl32(Word32::from(left), 14) / norm);
        let a2 = extract16(shl32(Word32::from(right), 14) / norm);
        (a1, if dir < 0 { neg16(a2) } else { a2 })
    }

    fn stereo_rotate(a1: Word16, a2: Word16, l: Word16, r: Word16) -> (Word16, Word16) {
        (
            sat16(mult16_16_q14(a1, l) + mult16_16_q14(a2, r)),
            sat16(mult16_16_q14(a1, r) - mult16_16_q14(a2, l)),
        )
    }

    fn residual(x: Word16, p: Word16) -> Word16 {
        // Halved so the difference of two unit vectors stays in range.
        ((Word32::from(x) - Word32::from(p)) >> 1) as Word16
    }

    fn negate(x: Word16) -> Word16 {
        neg16(x)
    }

    fn renormalise_vector(x: &mut [Word16], gain_q15: Word16) {
        renormalise_vector_fixed(x, Word32::from(gain_q15) << 16);
    }

    fn prediction_score(xy: i64, yy: i64) -> i64 {
        let a = xy >> 8;
        a * a / (yy + 1)
    }

    fn pvq_search(x: &mut [Word16], pulses: &mut [i32], k: usize) {
        op_pvq_search_fixed(x, pulses, k as i32);
    }

    fn mix_pitch_and_residual(pulses: &[i32], p: &[Word16], x: &mut [Word16]) {
        let (mut ryy, mut ryp, mut rpp) = (0i64, 0i64, 0i64);
        for (&y, &p) in pulses.iter().zip(p) {
            let (y, p) = (i64::from(y), i64::from(p));
            ryy += y * y;
            ryp += y * p;
            rpp += p * p;
        }
        // Everything below is Q28 before the root and Q14 after it.
        let disc = (ryp * ryp + ryy * ((1i64 << 28) - rpp)).max(0);
        let g = ((disc as u64).isqrt() as i64 - ryp) / ryy;
        for ((x, &y), &p) in x.iter_mut().zip(pulses).zip(p) {
            let value = i64::from(p) + g * i64::from(y);
            *x = value.clamp(i64::from(Word16::MIN), i64::from(Word16::MAX)) as Word16;
        }
    }
}
