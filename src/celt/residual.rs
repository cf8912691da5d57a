//! The band-by-band residual quantiser.
//!
//! Encoder and decoder share a single band loop. It derives the pulse
//! budget, picks a prediction for each band and rotates the band. It then
//! hands the band to a [`BandCoder`] leaf that either writes or reads the
//! bitstream. Every branch depends only on the allocation, so both sides
//! walk the same path.

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::celt::backend::Numeric;
use crate::celt::entcode::ec_tell;
use crate::celt::entdec::EcDec;
use crate::celt::entenc::EcEnc;
use crate::celt::mode::Mode;
use crate::celt::rate::BitAllocator;
use crate::celt::vq::{
    alg_quant, alg_unquant, exp_rotation, intra_fold, intra_prediction, intra_unquant,
    rotation_count,
};

/// Source of the shape prediction for a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    /// Copied from lower bands without spending bits.
    Fold,
    /// Predicted from a coded lag into the lower bands.
    Intra,
    /// Predicted from the pitch reference.
    Pitch,
}

/// What the band loop did with one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandPlan {
    pub prediction: Prediction,
    /// Pulses spent on the residual after the prediction.
    pub pulses: usize,
}

/// Bitstream side of the band loop.
pub(crate) trait BandCoder {
    /// Bits consumed so far.
    fn tell(&self) -> i32;

    /// Codes or decodes the intra-frame prediction of a band into `p`.
    fn predict<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        history: &[A::Norm],
        p: &mut [A::Norm],
        stride: usize,
        nmax: usize,
    );

    /// Codes or decodes `k` pulses against the rotated reference `p`.
    ///
    /// On return `x` holds the rotated reconstruction.
    fn residual<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        p: &[A::Norm],
        stride: usize,
        iterations: usize,
    );
}

struct BandEncoder<'e, 'b> {
    enc: &'e mut EcEnc<'b>,
}

impl BandCoder for BandEncoder<'_, '_> {
    fn tell(&self) -> i32 {
        ec_tell(&*self.enc)
    }

    fn predict<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        history: &[A::Norm],
        p: &mut [A::Norm],
        stride: usize,
        nmax: usize,
    ) {
        intra_prediction::<A>(x, k, history, p, stride, nmax, self.enc);
    }

    fn residual<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        p: &[A::Norm],
        stride: usize,
        iterations: usize,
    ) {
        exp_rotation::<A>(x, -1, stride, iterations);
        alg_quant::<A>(x, k, p, self.enc);
    }
}

struct BandDecoder<'d, 'b> {
    dec: &'d mut EcDec<'b>,
}

impl BandCoder for BandDecoder<'_, '_> {
    fn tell(&self) -> i32 {
        ec_tell(&*self.dec)
    }

    fn predict<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        history: &[A::Norm],
        p: &mut [A::Norm],
        stride: usize,
        nmax: usize,
    ) {
        intra_unquant::<A>(x, k, history, p, stride, nmax, self.dec);
    }

    fn residual<A: Numeric>(
        &mut self,
        x: &mut [A::Norm],
        k: usize,
        p: &[A::Norm],
        _stride: usize,
        _iterations: usize,
    ) {
        alg_unquant::<A>(x, k, p, self.dec);
    }
}

/// Per-call scratch, dropped when the band loop returns.
struct BandScratch<A: Numeric> {
    /// Weighted reconstruction of the bands coded so far.
    norm: Vec<A::Norm>,
    pulses: Vec<i32>,
    offsets: Vec<i32>,
}

impl<A: Numeric> BandScratch<A> {
    fn new(mode: &Mode) -> Self {
        Self {
            norm: vec![A::Norm::default(); mode.spectrum_len()],
            pulses: vec![0; mode.nb_ebands()],
            offsets: vec![0; mode.nb_ebands()],
        }
    }
}

fn code_bands<A, L, C>(
    mode: &Mode,
    allocator: &L,
    x: &mut [A::Norm],
    p: &mut [A::Norm],
    total_bits: i32,
    coder: &mut C,
) -> Vec<BandPlan>
where
    A: Numeric,
    L: BitAllocator + ?Sized,
    C: BandCoder,
{
    assert_eq!(x.len(), mode.spectrum_len(), "band buffer does not match the mode");
    assert_eq!(p.len(), mode.spectrum_len(), "pitch reference does not match the mode");

    let nb = mode.nb_ebands();
    let stride = mode.stride();
    let nmax = mode.e_bands()[nb + 1];
    let mut scratch = BandScratch::<A>::new(mode);

    let bits = total_bits - coder.tell() - 1;
    allocator.compute_allocation(mode, &scratch.offsets, bits, &mut scratch.pulses);
    debug!(
        "code_bands: {bits} bits, {} pulses over {nb} bands",
        scratch.pulses.iter().sum::<i32>()
    );

    let mut plans = Vec::with_capacity(nb);
    for band in 0..nb {
        let range = mode.band_range(band);
        let n = range.len();
        let mut q = scratch.pulses[band];

        let prediction = if mode.is_above_pitch_end(band) || q <= 0 {
            // The prediction takes the place of one pulse.
            q -= 1;
            let history = &scratch.norm[..range.start];
            if q < 0 {
                intra_fold::<A>(
                    &mut x[range.clone()],
                    history,
                    &mut p[range.clone()],
                    stride,
                    nmax,
                );
                Prediction::Fold
            } else {
                coder.predict::<A>(
                    &mut x[range.clone()],
                    q as usize,
                    history,
                    &mut p[range.clone()],
                    stride,
                    nmax,
                );
                Prediction::Intra
            }
        } else {
            Prediction::Pitch
        };

        let pulses = q.max(0) as usize;
        if pulses > 0 {
            let iterations = rotation_count(n, pulses);
            exp_rotation::<A>(&mut p[range.clone()], -1, stride, iterations);
            coder.residual::<A>(&mut x[range.clone()], pulses, &p[range.clone()], stride, iterations);
            exp_rotation::<A>(&mut x[range.clone()], 1, stride, iterations);
            trace!("code_bands: band {band} {prediction:?}, {pulses} pulses, {iterations} rotations");
        } else {
            trace!("code_bands: band {band} {prediction:?}, no pulses");
        }

        let w = A::band_weight(n);
        for (norm, &sample) in scratch.norm[range.clone()].iter_mut().zip(&x[range]) {
            *norm = A::weight(w, sample);
        }
        plans.push(BandPlan { prediction, pulses });
    }
    x[mode.tail_range()].fill(A::Norm::default());
    plans
}

/// Quantises the normalised spectrum `x` against the pitch reference `p`.
///
/// `total_bits` is the frame budget including whatever `enc` already holds.
/// On return `x` holds exactly what [`unquant_bands`] will reconstruct and
/// `p` holds the rotated predictions that were used.
///
/// # Panics
///
/// Panics if `x` or `p` does not match the mode's layout.
pub fn quant_bands<A, L>(
    mode: &Mode,
    allocator: &L,
    x: &mut [A::Norm],
    p: &mut [A::Norm],
    total_bits: i32,
    enc: &mut EcEnc<'_>,
) -> Vec<BandPlan>
where
    A: Numeric,
    L: BitAllocator + ?Sized,
{
    code_bands::<A, L, _>(mode, allocator, x, p, total_bits, &mut BandEncoder { enc })
}

/// Decoder mirror of [`quant_bands`].
///
/// # Panics
///
/// Panics if `x` or `p` does not match the mode's layout.
pub fn unquant_bands<A, L>(
    mode: &Mode,
    allocator: &L,
    x: &mut [A::Norm],
    p: &mut [A::Norm],
    total_bits: i32,
    dec: &mut EcDec<'_>,
) -> Vec<BandPlan>
where
    A: Numeric,
    L: BitAllocator + ?Sized,
{
    code_bands::<A, L, _>(mode, allocator, x, p, total_bits, &mut BandDecoder { dec })
}
