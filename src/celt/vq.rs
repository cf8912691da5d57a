//! Vector quantisation of normalised bands.
//!
//! A band is coded as a pitch reference `P` plus `K` algebraic pulses; the
//! reconstruction `P + g * y` is always rescaled to unit energy. When no
//! reference is available the band is predicted from the already coded part
//! of the spectrum instead, either by folding (no bits) or by searching the
//! best matching lag (intra prediction).

use alloc::vec;
use alloc::vec::Vec;

use libm::floorf;
use log::trace;

use crate::celt::backend::Numeric;
use crate::celt::cwrs::{decode_pulses, encode_pulses};
use crate::celt::entdec::EcDec;
use crate::celt::entenc::EcEnc;
use crate::celt::fixed_ops::{
    add16, add32, extract16, mac16_16, mult16_16, mult16_16_q15, mult16_32_q16, mult32_32_q31,
    pshr32, shr32,
};
use crate::celt::math::{celt_ilog2, celt_rcp, celt_rsqrt};
use crate::celt::math_fixed::{celt_rcp as celt_rcp_fixed, celt_rsqrt_norm};
use crate::celt::mode::MAX_INTRA_LAGS;
use crate::celt::types::{EPSILON, FLOAT_EPSILON, NORM_SCALING, Q15_ONE, Word16, Word32};

/// Prediction gain in `Q15` indexed by the number of residual pulses.
const PRED_GAIN_Q15: [Word16; 11] = [
    32_767, 24_576, 21_299, 19_661, 19_661, 19_661, 18_022, 18_022, 16_384, 16_384, 16_384,
];

/// Number of rotation passes for a band of `len` samples with `pulses` pulses.
#[must_use]
pub fn rotation_count(len: usize, pulses: usize) -> usize {
    debug_assert!(pulses > 0);
    (len + 4 * pulses) / (8 * pulses)
}

/// Applies `iterations` sweeps of a fixed 2D rotation to pairs `stride` apart.
///
/// Each sweep runs forward then backward over the band. Calling it again with
/// the opposite `dir` undoes it up to rounding.
pub fn exp_rotation<A: Numeric>(
    x: &mut [A::Norm],
    dir: i32,
    stride: usize,
    iterations: usize,
) {
    let len = x.len();
    if stride == 0 || len <= stride {
        return;
    }
    let (c, s) = A::rotation_coefs(dir);
    for _ in 0..iterations {
        for i in 0..len - stride {
            rotate_pair::<A>(x, i, stride, c, s);
        }
        for i in (0..len.saturating_sub(2 * stride)).rev() {
            rotate_pair::<A>(x, i, stride, c, s);
        }
    }
}

#[inline]
fn rotate_pair<A: Numeric>(x: &mut [A::Norm], i: usize, stride: usize, c: A::Coef, s: A::Coef) {
    let (a, b) = A::rotate(c, s, x[i], x[i + stride]);
    x[i] = a;
    x[i + stride] = b;
}

/// Greedy pyramid vector search in floating point.
///
/// Distributes `k` pulses over `x.len()` dimensions so that the pulse vector
/// maximises `Rxy / sqrt(Ryy)`. `x` is replaced by its magnitudes. Returns
/// the energy of the pulse vector.
pub(crate) fn op_pvq_search(x: &mut [f32], pulses: &mut [i32], k: i32) -> f32 {
    let n = x.len();
    assert!(n > 0, "vector dimension must be positive");
    assert!(k >= 0, "pulse count must be non-negative");
    assert!(pulses.len() >= n, "pulse buffer shorter than band size");

    let mut y = vec![0.0f32; n];
    let mut sign = vec![false; n];

    for (idx, sample) in x.iter_mut().enumerate() {
        let value = *sample;
        sign[idx] = value < 0.0;
        *sample = value.abs();
        pulses[idx] = 0;
    }

    let mut xy = 0.0f32;
    let mut yy = 0.0f32;
    let mut pulses_left = k;

    // Project onto the pyramid first when there are many pulses.
    if k > ((n as i32) >> 1) {
        let mut sum: f32 = x.iter().sum();
        if !(sum > FLOAT_EPSILON && sum < 64.0) {
            x[0] = 1.0;
            x[1..].fill(0.0);
            sum = 1.0;
        }

        let rcp = (k as f32 + 0.8) * celt_rcp(sum);
        for idx in 0..n {
            let pulse = floorf(rcp * x[idx]) as i32;
            pulses[idx] = pulse;
            let val = pulse as f32;
            yy += val * val;
            xy += x[idx] * val;
            y[idx] = 2.0 * val;
            pulses_left -= pulse;
        }
    }

    debug_assert!(pulses_left >= 0, "pulse allocation exceeded target count");
    pulses_left = pulses_left.max(0);

    if pulses_left > n as i32 + 3 {
        let tmp = pulses_left as f32;
        yy += tmp * tmp;
        yy += tmp * y[0];
        pulses[0] += pulses_left;
        pulses_left = 0;
    }

    for _ in 0..pulses_left {
        yy += 1.0;

        let mut best_id = 0usize;
        let mut best_den = yy + y[0];
        let mut best_num = (xy + x[0]) * (xy + x[0]);

        for idx in 1..n {
            let rxy = xy + x[idx];
            let ryy = yy + y[idx];
            let num = rxy * rxy;
            if best_den * num > ryy * best_num {
                best_den = ryy;
                best_num = num;
                best_id = idx;
            }
        }

        xy += x[best_id];
        yy += y[best_id];
        y[best_id] += 2.0;
        pulses[best_id] += 1;
    }

    for (pulse, &negative) in pulses.iter_mut().zip(&sign) {
        if negative {
            *pulse = -*pulse;
        }
    }

    yy
}

/// Fixed-point twin of [`op_pvq_search`] for `Q14` input.
pub(crate) fn op_pvq_search_fixed(x: &mut [Word16], pulses: &mut [i32], k: i32) -> Word16 {
    let n = x.len();
    assert!(n > 0, "vector dimension must be positive");
    assert!(k >= 0, "pulse count must be non-negative");
    assert!(pulses.len() >= n, "pulse buffer shorter than band size");

    let mut y = vec![0i16; n];
    let mut signx = vec![0i32; n];

    for j in 0..n {
        let value = x[j];
        signx[j] = i32::from(value < 0);
        x[j] = if value < 0 { value.wrapping_neg() } else { value };
        pulses[j] = 0;
    }

    let mut xy: i32 = 0;
    let mut yy: i16 = 0;
    let mut pulses_left = k;

    if k > ((n as i32) >> 1) {
        let mut sum: i32 = x.iter().map(|&v| i32::from(v)).sum();
        if sum <= k {
            x[0] = NORM_SCALING;
            x[1..].fill(0);
            sum = i32::from(NORM_SCALING);
        }

        let rcp = extract16(mult16_32_q16(k as i16, celt_rcp_fixed(sum)));
        for j in 0..n {
            let iy = i32::from(mult16_16_q15(x[j], rcp));
            pulses[j] = iy;
            let yj = iy as i16;
            yy = extract16(mac16_16(i32::from(yy), yj, yj));
            xy = mac16_16(xy, x[j], yj);
            y[j] = yj.wrapping_shl(1);
            pulses_left -= iy;
        }
    }

    debug_assert!(pulses_left >= 0, "pulse allocation exceeded target count");
    pulses_left = pulses_left.max(0);

    if pulses_left > n as i32 + 3 {
        let tmp = pulses_left as i16;
        yy = extract16(mac16_16(i32::from(yy), tmp, tmp));
        yy = extract16(mac16_16(i32::from(yy), tmp, y[0]));
        pulses[0] += pulses_left;
        pulses_left = 0;
    }

    for i in 0..pulses_left {
        // Keep the correlation in 16 bits as pulses accumulate.
        let rshift = 1 + celt_ilog2(k - pulses_left + i + 1);
        yy = add16(yy, 1);

        let mut best_id = 0usize;
        let rxy = extract16(shr32(add32(xy, i32::from(x[0])), rshift as u32));
        let mut best_den = add16(yy, y[0]);
        let mut best_num = i32::from(mult16_16_q15(rxy, rxy));

        for j in 1..n {
            let rxy = extract16(shr32(add32(xy, i32::from(x[j])), rshift as u32));
            let ryy = add16(yy, y[j]);
            let rxy_sq = mult16_16_q15(rxy, rxy);
            if mult16_16(best_den, rxy_sq) > i32::from(ryy).wrapping_mul(best_num) {
                best_den = ryy;
                best_num = i32::from(rxy_sq);
                best_id = j;
            }
        }

        xy = add32(xy, i32::from(x[best_id]));
        yy = add16(yy, y[best_id]);
        y[best_id] = y[best_id].wrapping_add(2);
        pulses[best_id] += 1;
    }

    for (pulse, &sign) in pulses.iter_mut().zip(&signx) {
        *pulse = (*pulse ^ -sign) + sign;
    }

    yy
}

/// Scales `x` to an L2 norm of `gain`.
pub(crate) fn renormalise_vector(x: &mut [f32], gain: f32) {
    let energy: f32 = x.iter().map(|v| v * v).sum();
    let scale = celt_rsqrt(energy) * gain;
    for sample in x.iter_mut() {
        *sample *= scale;
    }
}

/// Scales `Q14` samples to an L2 norm of `gain` (`Q31`).
///
/// The energy is accumulated in 64 bits, so the input may hold weighted
/// history samples as well as unit-norm coefficients.
pub(crate) fn renormalise_vector_fixed(x: &mut [Word16], gain: Word32) {
    let energy = x
        .iter()
        .fold(i64::from(EPSILON), |acc, &v| acc + i64::from(v) * i64::from(v));
    let k = (63 - energy.leading_zeros() as i32) >> 1;
    // Bring the energy into [0.25, 1) in Q16.
    let t = if k >= 7 {
        (energy >> (2 * (k - 7))) as Word32
    } else {
        (energy << (2 * (7 - k))) as Word32
    };
    let g = mult32_32_q31(i32::from(celt_rsqrt_norm(t)), gain) as Word16;

    for sample in x.iter_mut() {
        *sample = extract16(pshr32(mult16_16(g, *sample), (k + 1) as u32));
    }
}

/// Quantises `x` against the reference `p` with `k` pulses.
///
/// On return `x` holds the decoder's reconstruction.
pub(crate) fn alg_quant<A: Numeric>(
    x: &mut [A::Norm],
    k: usize,
    p: &[A::Norm],
    enc: &mut EcEnc<'_>,
) {
    assert!(k > 0, "alg_quant requires at least one pulse");
    assert_eq!(x.len(), p.len(), "reference and band lengths differ");

    let mut target: Vec<A::Norm> = x.iter().zip(p).map(|(&x, &p)| A::residual(x, p)).collect();
    let mut pulses = vec![0i32; x.len()];
    A::pvq_search(&mut target, &mut pulses, k);
    encode_pulses(&pulses, k, enc);
    A::mix_pitch_and_residual(&pulses, p, x);
}

/// Decodes `k` pulses and reconstructs `x` against the reference `p`.
pub(crate) fn alg_unquant<A: Numeric>(
    x: &mut [A::Norm],
    k: usize,
    p: &[A::Norm],
    dec: &mut EcDec<'_>,
) {
    assert!(k > 0, "alg_unquant requires at least one pulse");
    assert_eq!(x.len(), p.len(), "reference and band lengths differ");

    let mut pulses = vec![0i32; x.len()];
    decode_pulses(&mut pulses, k, dec);
    A::mix_pitch_and_residual(&pulses, p, x);
}

/// Builds a unit-norm reference for a band from the coded `history`.
///
/// `history` holds the weighted reconstruction of every bin below the band
/// (`stride` samples per bin); `nmax` is the bin count of the full buffer.
/// Bands in the upper half mirror the history around the band start, lower
/// bands repeat the history from bin zero.
fn fold_reference<A: Numeric>(history: &[A::Norm], p: &mut [A::Norm], stride: usize, nmax: usize) {
    let n0 = history.len() / stride;
    let width = p.len() / stride;
    if history.is_empty() {
        p.fill(A::Norm::default());
        return;
    }
    // The mirrored span must stay inside the history: nmax - n0 <= n0.
    if 2 * n0 >= nmax {
        for i in 0..stride {
            for j in 0..width {
                p[j * stride + i] = history[(nmax - n0 - j - 1) * stride + i];
            }
        }
    } else {
        for (j, sample) in p.iter_mut().enumerate() {
            *sample = history[j % history.len()];
        }
    }
    A::renormalise_vector(p, Q15_ONE);
}

/// Zero-bit prediction: fills `p` from the coded history and copies it to `x`.
pub(crate) fn intra_fold<A: Numeric>(
    x: &mut [A::Norm],
    history: &[A::Norm],
    p: &mut [A::Norm],
    stride: usize,
    nmax: usize,
) {
    fold_reference::<A>(history, p, stride, nmax);
    x.copy_from_slice(p);
}

/// Number of candidate lags that fit below a band of `band_len` samples.
fn intra_lags<T>(history: &[T], band_len: usize, stride: usize) -> usize {
    let n0 = history.len() / stride;
    let width = band_len / stride;
    n0.saturating_sub(width).min(MAX_INTRA_LAGS)
}

/// Writes `p` as the time-reversed history at `lag`, scaled for `k` pulses.
fn predict_from_lag<A: Numeric>(
    history: &[A::Norm],
    p: &mut [A::Norm],
    stride: usize,
    lag: usize,
    negative: bool,
    k: usize,
) {
    let n = p.len();
    for (j, sample) in p.iter_mut().enumerate() {
        let y = history[lag * stride + n - j - 1];
        *sample = if negative { A::negate(y) } else { y };
    }
    A::renormalise_vector(p, PRED_GAIN_Q15[k.min(PRED_GAIN_Q15.len() - 1)]);
}

/// Intra-frame prediction for the encoder.
///
/// Searches the coded history for the lag whose time-reversed copy best
/// matches `x`, codes the lag and then its sign as an even bit, and leaves
/// the scaled prediction in `p`. With no residual pulses (`k == 0`) the
/// prediction also becomes `x`.
pub(crate) fn intra_prediction<A: Numeric>(
    x: &mut [A::Norm],
    k: usize,
    history: &[A::Norm],
    p: &mut [A::Norm],
    stride: usize,
    nmax: usize,
    enc: &mut EcEnc<'_>,
) {
    let n = x.len();
    let max_pos = intra_lags(history, n, stride);
    if max_pos == 0 {
        fold_reference::<A>(history, p, stride, nmax);
        if k == 0 {
            x.copy_from_slice(p);
        }
        return;
    }

    let mut best = 0usize;
    let mut best_score = A::Acc::default();
    let mut negative = false;
    for lag in 0..max_pos {
        let mut xy = A::Acc::default();
        let mut yy = A::Acc::default();
        for (j, &sample) in x.iter().enumerate() {
            let y = history[lag * stride + n - j - 1];
            xy = A::mac(xy, sample, y);
            yy = A::mac(yy, y, y);
        }
        let score = A::prediction_score(xy, yy);
        if score > best_score {
            best_score = score;
            best = lag;
            negative = xy < A::Acc::default();
        }
    }
    trace!("intra_prediction: lag {best} of {max_pos}, negative={negative}");

    if max_pos > 1 {
        enc.enc_uint(best as u32, max_pos as u32);
    }
    enc.enc_bit_logp(negative, 1);
    predict_from_lag::<A>(history, p, stride, best, negative, k);
    if k == 0 {
        x.copy_from_slice(p);
    }
}

/// Decoder mirror of [`intra_prediction`].
pub(crate) fn intra_unquant<A: Numeric>(
    x: &mut [A::Norm],
    k: usize,
    history: &[A::Norm],
    p: &mut [A::Norm],
    stride: usize,
    nmax: usize,
    dec: &mut EcDec<'_>,
) {
    let n = x.len();
    let max_pos = intra_lags(history, n, stride);
    if max_pos == 0 {
        fold_reference::<A>(history, p, stride, nmax);
        if k == 0 {
            x.copy_from_slice(p);
        }
        return;
    }

    let lag = if max_pos > 1 {
        dec.dec_uint(max_pos as u32) as usize
    } else {
        0
    };
    let negative = dec.dec_bit_logp(1);
    predict_from_lag::<A>(history, p, stride, lag, negative, k);
    if k == 0 {
        x.copy_from_slice(p);
    }
}
