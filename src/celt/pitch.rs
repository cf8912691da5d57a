//! Pitch prediction: per pitch band gains that scale the reference spectrum.
//!
//! The predictor only ever applies quantised gains, so the encoder runs
//! [`compute_pitch_gain`], [`quant_pitch_gains`] and [`pitch_quant_bands`]
//! while the decoder runs [`unquant_pitch_gains`] and [`pitch_quant_bands`].

use log::trace;

use crate::celt::backend::Numeric;
use crate::celt::entdec::EcDec;
use crate::celt::entenc::EcEnc;
use crate::celt::mode::Mode;
use crate::celt::types::Word16;

/// Number of levels in the pitch gain codebook.
pub const PITCH_GAIN_LEVELS: usize = 16;

/// Uniform gain codebook over `[0, 0.9]` in `Q15`.
const PITCH_GAIN_TABLE: [Word16; PITCH_GAIN_LEVELS] = gain_table();

const fn gain_table() -> [Word16; PITCH_GAIN_LEVELS] {
    let mut table = [0; PITCH_GAIN_LEVELS];
    let mut i = 0;
    while i < PITCH_GAIN_LEVELS {
        table[i] = (i as i32 * 29_491 / (PITCH_GAIN_LEVELS as i32 - 1)) as Word16;
        i += 1;
    }
    table
}

fn check_layout<T>(mode: &Mode, x: &[T], what: &str) {
    assert_eq!(
        x.len(),
        mode.spectrum_len(),
        "{what} must hold B * C * e_bands[nb + 1] samples"
    );
}

/// Least-squares gain of `p` onto `x` for each pitch band, shrunk by 0.9.
///
/// The correlation is clamped to `[0, Sxx]` first, so every gain lies in
/// `[0, 0.9]` whatever the inputs.
pub fn compute_pitch_gain<A: Numeric>(
    mode: &Mode,
    x: &[A::Norm],
    p: &[A::Norm],
    gains: &mut [A::Gain],
) {
    check_layout(mode, x, "normalised spectrum");
    check_layout(mode, p, "pitch reference");
    assert!(gains.len() >= mode.nb_pbands(), "one gain per pitch band required");

    let zero = A::Acc::default();
    for (band, gain) in gains.iter_mut().enumerate().take(mode.nb_pbands()) {
        let range = mode.pitch_band_range(band);
        let (mut sxy, mut sxx) = (zero, zero);
        for (&xj, &pj) in x[range.clone()].iter().zip(&p[range]) {
            sxy = A::mac(sxy, xj, pj);
            sxx = A::mac(sxx, xj, xj);
        }
        if sxy < zero {
            sxy = zero;
        }
        if sxy > sxx {
            sxy = sxx;
        }
        *gain = A::pitch_gain(sxy, sxx);
    }
}

/// Scales each pitch band of `p` by its gain and clears the rest of `p`.
pub fn pitch_quant_bands<A: Numeric>(mode: &Mode, p: &mut [A::Norm], gains: &[A::Gain]) {
    check_layout(mode, p, "pitch reference");
    assert!(gains.len() >= mode.nb_pbands(), "one gain per pitch band required");

    for (band, &gain) in gains.iter().enumerate().take(mode.nb_pbands()) {
        for sample in &mut p[mode.pitch_band_range(band)] {
            *sample = A::apply_gain(gain, *sample);
        }
    }
    p[mode.pitch_tail_range()].fill(A::Norm::default());
}

fn nearest_level(q: Word16) -> usize {
    let q = i32::from(q);
    PITCH_GAIN_TABLE
        .iter()
        .enumerate()
        .min_by_key(|&(_, &level)| (i32::from(level) - q).abs())
        .map_or(0, |(index, _)| index)
}

/// Codes every gain with 4 bits and replaces it by its quantised value.
pub fn quant_pitch_gains<A: Numeric>(gains: &mut [A::Gain], enc: &mut EcEnc<'_>) {
    for (band, gain) in gains.iter_mut().enumerate() {
        let index = nearest_level(A::gain_to_q15(*gain));
        enc.enc_uint(index as u32, PITCH_GAIN_LEVELS as u32);
        *gain = A::gain_from_q15(PITCH_GAIN_TABLE[index]);
        trace!("quant_pitch_gains: band {band} -> level {index}");
    }
}

/// Decoder side of [`quant_pitch_gains`].
pub fn unquant_pitch_gains<A: Numeric>(gains: &mut [A::Gain], dec: &mut EcDec<'_>) {
    for gain in gains.iter_mut() {
        let index = (dec.dec_uint(PITCH_GAIN_LEVELS as u32) as usize).min(PITCH_GAIN_LEVELS - 1);
        *gain = A::gain_from_q15(PITCH_GAIN_TABLE[index]);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::{
        PITCH_GAIN_TABLE, compute_pitch_gain, nearest_level, pitch_quant_bands,
        quant_pitch_gains, unquant_pitch_gains,
    };
    use crate::celt::backend::{FixedBackend, FloatBackend, Numeric};
    use crate::celt::entdec::EcDec;
    use crate::celt::entenc::EcEnc;
    use crate::celt::mode::Mode;

    fn spectrum(len: usize, mut seed: u32) -> Vec<f32> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (((seed >> 16) & 0x7fff) as f32 - 16_384.0) / 65_536.0
            })
            .collect()
    }

    fn to_norm<A: Numeric>(x: &[f32]) -> Vec<A::Norm> {
        x.iter().map(|&v| A::norm_from_f32(v)).collect()
    }

    fn gains_for<A: Numeric>(mode: &Mode, x: &[f32], p: &[f32]) -> Vec<f32> {
        let mut gains = vec![A::Gain::default(); mode.nb_pbands()];
        compute_pitch_gain::<A>(mode, &to_norm::<A>(x), &to_norm::<A>(p), &mut gains);
        gains.iter().map(|&g| A::gain_to_f32(g)).collect()
    }

    fn clamp_case<A: Numeric>() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let x = spectrum(mode.spectrum_len(), 21);

        // Identical shapes hit the 0.9 cap.
        for g in gains_for::<A>(&mode, &x, &x) {
            assert!((g - 0.9).abs() < 2e-3, "{g}");
        }
        // Anti-correlated references contribute nothing.
        let negated: Vec<f32> = x.iter().map(|v| -v).collect();
        assert!(gains_for::<A>(&mode, &x, &negated).iter().all(|&g| g == 0.0));
        // A louder reference would overshoot without the clamp.
        let louder: Vec<f32> = x.iter().map(|v| 3.0 * v).collect();
        for g in gains_for::<A>(&mode, &x, &louder) {
            assert!((0.0..=0.9 + 1e-3).contains(&g), "{g}");
        }
        // A silent target.
        let silent = vec![0.0; mode.spectrum_len()];
        assert!(gains_for::<A>(&mode, &silent, &x).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn gains_stay_within_the_shrunk_unit_interval() {
        clamp_case::<FloatBackend>();
        clamp_case::<FixedBackend>();
    }

    fn apply_case<A: Numeric>() {
        let mode = Mode::create(48_000, 2, 256, 1).unwrap();
        let mut p = to_norm::<A>(&vec![0.25; mode.spectrum_len()]);
        let gains: Vec<A::Gain> = (0..mode.nb_pbands())
            .map(|band| A::gain_from_q15(PITCH_GAIN_TABLE[band]))
            .collect();
        pitch_quant_bands::<A>(&mode, &mut p, &gains);

        for band in 0..mode.nb_pbands() {
            let expected = 0.25 * A::gain_to_f32(gains[band]);
            for &v in &p[mode.pitch_band_range(band)] {
                assert!((A::norm_to_f32(v) - expected).abs() < 1e-3);
            }
        }
        assert!(p[mode.pitch_tail_range()].iter().all(|&v| v == A::Norm::default()));
    }

    #[test]
    fn quantised_gains_scale_the_reference() {
        apply_case::<FloatBackend>();
        apply_case::<FixedBackend>();
    }

    #[test]
    fn codebook_spans_zero_to_nine_tenths() {
        assert_eq!(PITCH_GAIN_TABLE[0], 0);
        assert_eq!(PITCH_GAIN_TABLE[15], 29_491);
        assert!(PITCH_GAIN_TABLE.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(nearest_level(29_000), 15);
        assert_eq!(nearest_level(-5), 0);
    }

    fn gain_coding_case<A: Numeric>() {
        let mut gains: Vec<A::Gain> = [0.0f32, 0.13, 0.5, 0.87, 0.9]
            .iter()
            .map(|&g| A::gain_from_q15((g * 32_767.0) as i16))
            .collect();
        let mut buffer = vec![0u8; 16];
        {
            let mut enc = EcEnc::new(&mut buffer);
            quant_pitch_gains::<A>(&mut gains, &mut enc);
            enc.enc_done();
        }
        let mut decoded = vec![A::Gain::default(); gains.len()];
        let mut dec = EcDec::new(&mut buffer);
        unquant_pitch_gains::<A>(&mut decoded, &mut dec);
        assert_eq!(decoded, gains);
        assert!((A::gain_to_f32(gains[2]) - 0.5).abs() < 0.04);
    }

    #[test]
    fn coded_gains_match_on_both_sides() {
        gain_coding_case::<FloatBackend>();
        gain_coding_case::<FixedBackend>();
    }
}
