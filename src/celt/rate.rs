//! Pulse allocation for the residual quantiser.
//!
//! The band loop asks a [`BitAllocator`] once per frame for the number of
//! pulses each band may spend. Encoder and decoder call it with identical
//! arguments, so any implementation must be a pure function of its inputs.

use alloc::vec::Vec;

use log::trace;

use crate::celt::cwrs::{log2_frac, pvq_count};
use crate::celt::entcode::BITRES;
use crate::celt::mode::Mode;

/// Maximum pulses tracked by the allocation helpers.
pub(crate) const CELT_MAX_PULSES: usize = 128;

/// Determines if `V(N, K)` fits inside an unsigned 32-bit integer.
///
/// For small `N` the limit is expressed on `K`, for larger `N` on `N`.
pub(crate) fn fits_in32(n: i32, k: i32) -> bool {
    const MAX_N: [i16; 15] = [
        32767, 32767, 32767, 1476, 283, 109, 60, 40, 29, 24, 20, 18, 16, 14, 13,
    ];
    const MAX_K: [i16; 15] = [
        32767, 32767, 32767, 32767, 1172, 238, 95, 53, 36, 27, 22, 18, 16, 15, 13,
    ];

    if n >= 14 {
        if k >= 14 {
            false
        } else {
            n <= MAX_N[k as usize] as i32
        }
    } else {
        k <= MAX_K[n as usize] as i32
    }
}

/// Maps a bit budget to per-band pulse counts.
pub trait BitAllocator {
    /// Fills `pulses` (one entry per coded band) for a budget of `total_bits`.
    ///
    /// `offsets` biases individual bands; the band loop always passes zeros.
    /// Must be deterministic: the decoder repeats the exact same call.
    fn compute_allocation(&self, mode: &Mode, offsets: &[i32], total_bits: i32, pulses: &mut [i32]);
}

/// Greedy allocator that prices every band in 1/8 bit units.
///
/// Pulses are granted one at a time to the band with the lowest pulse
/// density (pulses per sample, minus its offset) whose next pulse still fits
/// in the remaining budget. Ties go to the lowest band.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseAllocator;

impl PulseAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Cost in 1/8 bits of coding `k` pulses in `band`.
///
/// Bands above the pitch cutoff spend their first pulse on the intra
/// prediction lag and its sign, the rest on the pulse vector.
pub(crate) fn band_cost(mode: &Mode, band: usize, k: usize) -> i32 {
    let n = mode.band_range(band).len();
    if !mode.is_above_pitch_end(band) {
        return pulse_bits(n, k);
    }
    if k == 0 {
        return 0;
    }
    let lags = mode.intra_lags(band);
    let lag_bits = if lags > 0 {
        log2_frac(2 * lags as u32, BITRES as i32)
    } else {
        0
    };
    lag_bits + pulse_bits(n, k - 1)
}

fn pulse_bits(n: usize, k: usize) -> i32 {
    if k == 0 {
        0
    } else {
        log2_frac(pvq_count(n, k), BITRES as i32)
    }
}

fn can_grow(n: usize, k: usize) -> bool {
    k < CELT_MAX_PULSES && fits_in32(n as i32, (k + 1) as i32)
}

impl BitAllocator for PulseAllocator {
    fn compute_allocation(&self, mode: &Mode, offsets: &[i32], total_bits: i32, pulses: &mut [i32]) {
        let nb = mode.nb_ebands();
        assert!(offsets.len() >= nb, "one offset per band required");
        assert!(pulses.len() >= nb, "one pulse slot per band required");

        pulses[..nb].fill(0);
        if total_bits <= 0 {
            return;
        }
        let mut remaining = total_bits << BITRES;

        let widths: Vec<usize> = (0..nb).map(|band| mode.band_range(band).len()).collect();
        let mut deltas: Vec<Option<i32>> = (0..nb)
            .map(|band| can_grow(widths[band], 0).then(|| band_cost(mode, band, 1)))
            .collect();

        loop {
            let mut best: Option<(usize, i32)> = None;
            for band in 0..nb {
                let Some(delta) = deltas[band] else { continue };
                if delta > remaining {
                    continue;
                }
                let next = pulses[band] + 1;
                let metric = (next << 8) / widths[band] as i32 - offsets[band];
                if best.is_none_or(|(_, best_metric)| metric < best_metric) {
                    best = Some((band, metric));
                }
            }
            let Some((band, _)) = best else { break };

            let k = pulses[band] as usize + 1;
            let spent = deltas[band].unwrap_or(0);
            remaining -= spent;
            pulses[band] = k as i32;
            deltas[band] = can_grow(widths[band], k)
                .then(|| band_cost(mode, band, k + 1) - band_cost(mode, band, k));
            trace!("compute_allocation: band {band} -> {k} pulses ({spent}/8 bits)");
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::{BitAllocator, CELT_MAX_PULSES, PulseAllocator, band_cost, fits_in32};
    use crate::celt::entcode::BITRES;
    use crate::celt::mode::Mode;

    fn allocate(mode: &Mode, offsets: &[i32], bits: i32) -> Vec<i32> {
        let mut pulses = vec![-1; mode.nb_ebands()];
        PulseAllocator::new().compute_allocation(mode, offsets, bits, &mut pulses);
        pulses
    }

    #[test]
    fn fits_in32_replicates_thresholds() {
        assert!(fits_in32(13, 15));
        assert!(!fits_in32(13, 16));
        assert!(fits_in32(14, 13));
        assert!(!fits_in32(14, 14));
        assert!(fits_in32(2, 32767));
        assert!(!fits_in32(15, 13));
        assert!(fits_in32(512, 3));
        assert!(!fits_in32(512, 4));
    }

    #[test]
    fn empty_budget_grants_nothing() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let offsets = vec![0; mode.nb_ebands()];
        assert!(allocate(&mode, &offsets, 0).iter().all(|&k| k == 0));
        assert!(allocate(&mode, &offsets, -17).iter().all(|&k| k == 0));
    }

    #[test]
    fn allocation_is_deterministic_and_within_budget() {
        let mode = Mode::create(48_000, 2, 256, 1).unwrap();
        let offsets = vec![0; mode.nb_ebands()];
        for bits in [5, 40, 200, 640, 1500] {
            let first = allocate(&mode, &offsets, bits);
            let second = allocate(&mode, &offsets, bits);
            assert_eq!(first, second);

            let spent: i32 = first
                .iter()
                .enumerate()
                .map(|(band, &k)| band_cost(&mode, band, k as usize))
                .sum();
            assert!(spent <= bits << BITRES, "bits={bits}: spent {spent}/8");
        }
    }

    #[test]
    fn pulse_counts_respect_caps() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let offsets = vec![0; mode.nb_ebands()];
        let pulses = allocate(&mode, &offsets, 100_000);
        for (band, &k) in pulses.iter().enumerate() {
            let n = mode.band_range(band).len() as i32;
            assert!(k as usize <= CELT_MAX_PULSES);
            assert!(fits_in32(n, k), "band {band}: V({n}, {k}) overflows");
            assert!(k > 0);
        }
    }

    #[test]
    fn offsets_bias_the_first_grant() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let mut offsets = vec![0; mode.nb_ebands()];
        offsets[5] = 1 << 12;
        let pulses = allocate(&mode, &offsets, 3);
        for (band, &k) in pulses.iter().enumerate() {
            assert_eq!(k, i32::from(band == 5), "band {band}");
        }
    }

    #[test]
    fn bands_above_pitch_end_pay_for_the_lag() {
        let mode = Mode::create(48_000, 1, 256, 1).unwrap();
        let band = mode.nb_ebands() - 1;
        assert!(mode.is_above_pitch_end(band));
        // 64 lag symbols cost exactly six bits.
        assert_eq!(band_cost(&mode, band, 1), 6 << BITRES);
        assert!(band_cost(&mode, band, 2) > band_cost(&mode, band, 1));
        assert_eq!(band_cost(&mode, 0, 0), 0);
    }
}
