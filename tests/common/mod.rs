#![allow(dead_code)]

use celt_bands::{BitAllocator, Mode, Numeric};

/// Deterministic spectrum in `[-scale, scale)`.
pub fn lcg_spectrum(len: usize, mut seed: u32, scale: f32) -> Vec<f32> {
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (((seed >> 16) & 0x7fff) as f32 - 16_384.0) / 16_384.0 * scale
        })
        .collect()
}

pub fn to_sig<A: Numeric>(x: &[f32]) -> Vec<A::Sig> {
    x.iter().map(|&v| A::sig_from_f32(v)).collect()
}

pub fn to_norm<A: Numeric>(x: &[f32]) -> Vec<A::Norm> {
    x.iter().map(|&v| A::norm_from_f32(v)).collect()
}

pub fn norm_to_f32<A: Numeric>(x: &[A::Norm]) -> Vec<f32> {
    x.iter().map(|&v| A::norm_to_f32(v)).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Hands out a fixed pulse count per band regardless of the budget.
pub struct FixedPulses(pub Vec<i32>);

impl BitAllocator for FixedPulses {
    fn compute_allocation(&self, mode: &Mode, _offsets: &[i32], _bits: i32, pulses: &mut [i32]) {
        pulses[..mode.nb_ebands()].copy_from_slice(&self.0);
    }
}
