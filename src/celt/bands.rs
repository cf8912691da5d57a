//! Band energy analysis, normalisation and stereo mixing.
//!
//! Every routine walks the band layout of a [`Mode`] and works on one
//! channel of one band at a time through the mode's typed views. Samples
//! past the last coded band are always written as zero.

use alloc::vec;
use alloc::vec::Vec;

use crate::celt::backend::Numeric;
use crate::celt::mode::{MAX_CHANNELS, Mode};

fn check_spectrum<T>(mode: &Mode, x: &[T], what: &str) {
    assert_eq!(
        x.len(),
        mode.spectrum_len(),
        "{what} must hold B * C * e_bands[nb + 1] samples"
    );
}

fn check_bank<T>(mode: &Mode, bank: &[T]) {
    assert_eq!(bank.len(), mode.bank_len(), "energy bank must hold nb_ebands * C entries");
}

/// Measures the amplitude of every band and channel of `freq` into `bank`.
///
/// Entries never drop below the backend's energy floor, so the bank can be
/// used as a divisor as is.
pub fn compute_band_energies<A: Numeric>(mode: &Mode, freq: &[A::Sig], bank: &mut [A::Ener]) {
    check_spectrum(mode, freq, "spectrum");
    check_bank(mode, bank);

    for band in 0..mode.nb_ebands() {
        for channel in 0..mode.channels() {
            bank[mode.bank_index(band, channel)] =
                A::band_amplitude(mode.channel_band(freq, band, channel));
        }
    }
}

/// Divides each band of `freq` by `bank * sqrt(C)` into `x`.
pub fn normalise_bands<A: Numeric>(
    mode: &Mode,
    freq: &[A::Sig],
    x: &mut [A::Norm],
    bank: &[A::Ener],
) {
    check_spectrum(mode, freq, "spectrum");
    check_spectrum(mode, x, "normalised spectrum");
    check_bank(mode, bank);

    let channels = mode.channels();
    for band in 0..mode.nb_ebands() {
        for channel in 0..channels {
            let scale = A::normaliser(bank[mode.bank_index(band, channel)], channels);
            let input = mode.channel_band(freq, band, channel);
            let mut output = mode.channel_band_mut(x, band, channel);
            for (out, sample) in output.iter_mut().zip(input.iter()) {
                *out = A::normalise(sample, scale);
            }
        }
    }
    x[mode.tail_range()].fill(A::Norm::default());
}

/// Inverse of [`normalise_bands`]: multiplies each band of `x` by
/// `bank * sqrt(C)` into `freq`.
///
/// # Panics
///
/// Panics when the mode has more than two channels or when a buffer does
/// not match the mode's layout.
pub fn denormalise_bands<A: Numeric>(
    mode: &Mode,
    x: &[A::Norm],
    freq: &mut [A::Sig],
    bank: &[A::Ener],
) {
    let channels = mode.channels();
    assert!(channels <= MAX_CHANNELS, "denormalisation supports at most two channels");
    check_spectrum(mode, x, "normalised spectrum");
    check_spectrum(mode, freq, "spectrum");
    check_bank(mode, bank);

    for band in 0..mode.nb_ebands() {
        for channel in 0..channels {
            let scale = A::denormaliser(bank[mode.bank_index(band, channel)], channels);
            let input = mode.channel_band(x, band, channel);
            let mut output = mode.channel_band_mut(freq, band, channel);
            for (out, sample) in output.iter_mut().zip(input.iter()) {
                *out = A::denormalise(sample, scale);
            }
        }
    }
    freq[mode.tail_range()].fill(A::Sig::default());
}

/// Restores unit energy in every band of an already normalised spectrum.
pub fn renormalise_bands<A: Numeric>(mode: &Mode, x: &mut [A::Norm]) {
    check_spectrum(mode, x, "normalised spectrum");

    let lifted: Vec<A::Sig> = x.iter().map(|&v| A::norm_to_sig(v)).collect();
    let mut bank = energy_bank::<A>(mode);
    compute_band_energies::<A>(mode, &lifted, &mut bank);
    normalise_bands::<A>(mode, &lifted, x, &bank);
}

/// Rotates a stereo spectrum between left/right and a mid/side-like basis.
///
/// The angle of each band follows the two channel amplitudes in `bank`;
/// `dir = 1` mixes and `dir = -1` undoes the mix.
///
/// # Panics
///
/// Panics unless the mode has exactly two channels.
pub fn stereo_mix<A: Numeric>(mode: &Mode, x: &mut [A::Norm], bank: &[A::Ener], dir: i32) {
    assert_eq!(mode.channels(), 2, "stereo mixing needs two channels");
    check_spectrum(mode, x, "normalised spectrum");
    check_bank(mode, bank);

    for band in 0..mode.nb_ebands() {
        let (a1, a2) = A::stereo_coefs(
            bank[mode.bank_index(band, 0)],
            bank[mode.bank_index(band, 1)],
            dir,
        );
        for pair in x[mode.band_range(band)].chunks_exact_mut(2) {
            let (l, r) = A::stereo_rotate(a1, a2, pair[0], pair[1]);
            pair[0] = l;
            pair[1] = r;
        }
    }
    x[mode.tail_range()].fill(A::Norm::default());
}

/// Allocates a zeroed energy bank for `mode`.
#[must_use]
pub fn energy_bank<A: Numeric>(mode: &Mode) -> Vec<A::Ener> {
    vec![A::ener_from_f32(0.0); mode.bank_len()]
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::{
        compute_band_energies, denormalise_bands, energy_bank, normalise_bands,
        renormalise_bands, stereo_mix,
    };
    use crate::celt::backend::{FixedBackend, FloatBackend, Numeric};
    use crate::celt::mode::Mode;

    fn spectrum(len: usize, mut seed: u32, scale: f32) -> Vec<f32> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (((seed >> 16) & 0x7fff) as f32 - 16_384.0) / 16_384.0 * scale
            })
            .collect()
    }

    fn band_energies<A: Numeric>(mode: &Mode, x: &[A::Norm]) -> Vec<f32> {
        let channels = mode.channels();
        let mut out = Vec::new();
        for band in 0..mode.nb_ebands() {
            for channel in 0..channels {
                let e: f32 = mode
                    .channel_band(x, band, channel)
                    .iter()
                    .map(|v| A::norm_to_f32(v) * A::norm_to_f32(v))
                    .sum();
                out.push(e);
            }
        }
        out
    }

    fn normalise_case<A: Numeric>(mode: &Mode, scale: f32, tolerance: f32) {
        let input = spectrum(mode.spectrum_len(), 17, scale);
        let freq: Vec<A::Sig> = input.iter().map(|&v| A::sig_from_f32(v)).collect();
        let mut bank = energy_bank::<A>(mode);
        compute_band_energies::<A>(mode, &freq, &mut bank);

        let mut x = vec![A::Norm::default(); mode.spectrum_len()];
        normalise_bands::<A>(mode, &freq, &mut x, &bank);
        // Each channel carries 1/C of the band's unit energy.
        let per_channel = 1.0 / mode.channels() as f32;
        for e in band_energies::<A>(mode, &x) {
            assert!((e - per_channel).abs() < 1e-2, "band energy {e}");
        }

        let mut back = vec![A::sig_from_f32(1.0); mode.spectrum_len()];
        denormalise_bands::<A>(mode, &x, &mut back, &bank);
        let coded = mode.band_range(0).start..mode.tail_range().start;
        for i in coded {
            let err = (A::sig_to_f32(back[i]) - input[i]).abs();
            assert!(err <= tolerance * scale, "sample {i}: error {err}");
        }
        assert!(back[mode.tail_range()].iter().all(|&v| v == A::Sig::default()));
    }

    #[test]
    fn normalisation_round_trips() {
        for channels in 1..=2 {
            let mode = Mode::create(48_000, channels, 256, 1).unwrap();
            normalise_case::<FloatBackend>(&mode, 1.0, 1e-5);
            normalise_case::<FloatBackend>(&mode, 1_000.0, 1e-5);
            normalise_case::<FixedBackend>(&mode, 1.0, 1e-2);
            normalise_case::<FixedBackend>(&mode, 1_000.0, 1e-2);
        }
    }

    #[test]
    fn silent_bands_keep_a_positive_energy() {
        let mode = Mode::create(48_000, 2, 120, 2).unwrap();
        let freq = vec![0i32; mode.spectrum_len()];
        let mut bank = energy_bank::<FixedBackend>(&mode);
        compute_band_energies::<FixedBackend>(&mode, &freq, &mut bank);
        assert!(bank.iter().all(|&e| e > 0));

        let freq = vec![0.0f32; mode.spectrum_len()];
        let mut bank = energy_bank::<FloatBackend>(&mode);
        compute_band_energies::<FloatBackend>(&mode, &freq, &mut bank);
        assert!(bank.iter().all(|&e| e > 0.0));

        let mut x = vec![0.0f32; mode.spectrum_len()];
        normalise_bands::<FloatBackend>(&mode, &freq, &mut x, &bank);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn bank_is_interleaved_by_channel() {
        let mode = Mode::new(&[0, 2, 4, 4], &[0, 4, 4], 1, 2, 4).unwrap();
        // Left is silent in band 0, right in band 1.
        let freq = [0.0f32, 3.0, 0.0, 4.0, 1.0, 0.0, 0.0, 0.0];
        let mut bank = energy_bank::<FloatBackend>(&mode);
        compute_band_energies::<FloatBackend>(&mode, &freq, &mut bank);
        assert!(bank[0] < 1e-4);
        assert!((bank[1] - 5.0).abs() < 1e-4);
        assert!((bank[2] - 1.0).abs() < 1e-4);
        assert!(bank[3] < 1e-4);
    }

    fn renormalise_case<A: Numeric>() {
        let mode = Mode::create(48_000, 1, 256, 2).unwrap();
        let mut x: Vec<A::Norm> = spectrum(mode.spectrum_len(), 5, 0.1)
            .iter()
            .map(|&v| A::norm_from_f32(v))
            .collect();
        renormalise_bands::<A>(&mode, &mut x);
        for e in band_energies::<A>(&mode, &x) {
            assert!((e - 1.0).abs() < 1e-2, "band energy {e}");
        }
        assert!(x[mode.tail_range()].iter().all(|&v| v == A::Norm::default()));
    }

    #[test]
    fn renormalisation_restores_unit_energy() {
        renormalise_case::<FloatBackend>();
        renormalise_case::<FixedBackend>();
    }

    fn stereo_case<A: Numeric>(tolerance: f32) {
        let mode = Mode::create(48_000, 2, 256, 1).unwrap();
        let input = spectrum(mode.spectrum_len(), 11, 2.0);
        let freq: Vec<A::Sig> = input.iter().map(|&v| A::sig_from_f32(v)).collect();
        let mut bank = energy_bank::<A>(&mode);
        compute_band_energies::<A>(&mode, &freq, &mut bank);
        let mut x = vec![A::Norm::default(); mode.spectrum_len()];
        normalise_bands::<A>(&mode, &freq, &mut x, &bank);
        let original = x.clone();

        stereo_mix::<A>(&mode, &mut x, &bank, 1);
        assert_ne!(x, original);
        stereo_mix::<A>(&mode, &mut x, &bank, -1);
        for (&a, &b) in x.iter().zip(&original) {
            assert!((A::norm_to_f32(a) - A::norm_to_f32(b)).abs() < tolerance);
        }
    }

    #[test]
    fn stereo_mix_is_invertible() {
        stereo_case::<FloatBackend>(1e-5);
        stereo_case::<FixedBackend>(3e-3);
    }

    #[test]
    #[should_panic(expected = "stereo mixing needs two channels")]
    fn stereo_mix_rejects_mono() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let mut x = vec![0.0f32; mode.spectrum_len()];
        let bank = energy_bank::<FloatBackend>(&mode);
        stereo_mix::<FloatBackend>(&mode, &mut x, &bank, 1);
    }
}
