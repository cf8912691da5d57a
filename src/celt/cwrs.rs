//! Enumeration of pyramid vector quantiser codewords.
//!
//! A codeword is an integer vector `y` of dimension `N` with `sum |y| == K`.
//! There are `V(N, K)` of them; [`encode_pulses`] maps a vector to its index
//! in `[0, V(N, K))` and [`decode_pulses`] inverts the mapping. Both walk the
//! rows of `U(N, K)`, the number of codewords whose first non-zero entry is
//! positive, using the recurrence `U(N, K) = U(N-1, K) + U(N, K-1) + U(N-1, K-1)`.
//!
//! Callers keep `V(N, K)` below 2^32 (see [`fits_in32`](crate::celt::rate::fits_in32)).

use alloc::vec;
use alloc::vec::Vec;

use crate::celt::entcode::ec_ilog;
use crate::celt::entdec::EcDec;
use crate::celt::entenc::EcEnc;
use crate::celt::types::{UWord32, Word32};

/// Returns a conservatively large estimate of `log2(val)` with `frac` fractional bits.
///
/// The estimate is never below the exact value, which is what the bit
/// allocator needs to stay inside its budget.
#[must_use]
pub(crate) fn log2_frac(mut val: UWord32, frac: Word32) -> Word32 {
    debug_assert!(val > 0);
    debug_assert!(frac >= 0);

    let l = ec_ilog(val);
    if val & (val - 1) == 0 {
        return (l - 1) << frac;
    }

    if l > 16 {
        val = ((val - 1) >> ((l - 16) as u32)) + 1;
    } else {
        val <<= (16 - l) as u32;
    }

    let mut acc = (l - 1) << frac;
    let mut current_frac = frac;
    loop {
        let b = (val >> 16) as Word32;
        acc += b << current_frac as u32;
        val = (val + b as UWord32) >> (b as u32);
        val = ((val * val) + 0x7FFF) >> 15;
        if current_frac <= 0 {
            break;
        }
        current_frac -= 1;
    }
    acc + Word32::from(val > 0x8000)
}

/// Advances a row of `U` from dimension `n` to `n + 1`.
fn unext(u: &mut [UWord32], mut u0: UWord32) {
    for j in 1..u.len() {
        let u1 = u[j].wrapping_add(u[j - 1]).wrapping_add(u0);
        u[j - 1] = u0;
        u0 = u1;
    }
    if let Some(last) = u.last_mut() {
        *last = u0;
    }
}

/// Steps a row of `U` from dimension `n` back to `n - 1`.
fn uprev(u: &mut [UWord32], mut u0: UWord32) {
    for j in 1..u.len() {
        let u1 = u[j].wrapping_sub(u[j - 1]).wrapping_sub(u0);
        u[j - 1] = u0;
        u0 = u1;
    }
    if let Some(last) = u.last_mut() {
        *last = u0;
    }
}

/// Fills `u` with `U(n, 0..=k+1)` and returns `V(n, k)`.
fn ncwrs_urow(n: usize, k: usize, u: &mut [UWord32]) -> UWord32 {
    debug_assert!(n >= 2 && k > 0);
    debug_assert_eq!(u.len(), k + 2);
    u[0] = 0;
    u[1] = 1;
    for (idx, slot) in u.iter_mut().enumerate().skip(2) {
        *slot = ((idx as UWord32) << 1) - 1;
    }
    for _ in 2..n {
        unext(&mut u[1..], 1);
    }
    u[k].wrapping_add(u[k + 1])
}

/// Number of codewords `V(n, k)`.
///
/// Only meaningful while the result fits in 32 bits.
#[must_use]
pub(crate) fn pvq_count(n: usize, k: usize) -> UWord32 {
    match (n, k) {
        (_, 0) => 1,
        (0, _) => 0,
        (1, _) => 2,
        _ => {
            let mut u = vec![0; k + 2];
            ncwrs_urow(n, k, &mut u)
        }
    }
}

/// Index of the codeword `y`, together with `V(n, k)`.
fn icwrs(y: &[Word32], k: usize, u: &mut [UWord32]) -> (UWord32, UWord32) {
    let n = y.len();
    debug_assert!(n >= 2);
    u[0] = 0;
    for (idx, slot) in u.iter_mut().enumerate().skip(1) {
        *slot = ((idx as UWord32) << 1) - 1;
    }

    let last = y[n - 1];
    let mut index = UWord32::from(last < 0);
    let mut kk = last.unsigned_abs() as usize;

    let mut j = n - 2;
    loop {
        index = index.wrapping_add(u[kk]);
        kk += y[j].unsigned_abs() as usize;
        if y[j] < 0 {
            index = index.wrapping_add(u[kk + 1]);
        }
        if j == 0 {
            break;
        }
        j -= 1;
        unext(u, 0);
    }
    debug_assert_eq!(kk, k);
    (index, u[kk].wrapping_add(u[kk + 1]))
}

/// Rebuilds the codeword with index `index` from a row primed by [`ncwrs_urow`].
fn cwrsi(mut k: usize, mut index: UWord32, y: &mut [Word32], u: &mut [UWord32]) {
    for slot in y.iter_mut() {
        let p = u[k + 1];
        let negative = index >= p;
        if negative {
            index -= p;
        }
        let start = k;
        let mut p = u[k];
        while p > index {
            k -= 1;
            p = u[k];
        }
        index -= p;
        let magnitude = (start - k) as Word32;
        *slot = if negative { -magnitude } else { magnitude };
        uprev(&mut u[..k + 2], 0);
    }
}

/// Writes the codeword `y` (with `k` pulses) to the bitstream.
pub(crate) fn encode_pulses(y: &[Word32], k: usize, enc: &mut EcEnc<'_>) {
    assert!(k > 0, "encode_pulses requires at least one pulse");
    assert!(!y.is_empty(), "encode_pulses requires a non-empty vector");
    debug_assert_eq!(y.iter().map(|v| v.unsigned_abs() as usize).sum::<usize>(), k);

    if y.len() == 1 {
        enc.enc_bits(UWord32::from(y[0] < 0), 1);
        return;
    }
    let mut u = vec![0; k + 2];
    let (index, count) = icwrs(y, k, &mut u);
    enc.enc_uint(index, count);
}

/// Reads a codeword with `k` pulses into `y`, returning its energy `sum y^2`.
pub(crate) fn decode_pulses(y: &mut [Word32], k: usize, dec: &mut EcDec<'_>) -> Word32 {
    assert!(k > 0, "decode_pulses requires at least one pulse");
    assert!(!y.is_empty(), "decode_pulses requires a non-empty vector");

    if y.len() == 1 {
        let negative = dec.dec_bits(1) != 0;
        y[0] = if negative { -(k as Word32) } else { k as Word32 };
        return y[0] * y[0];
    }
    let mut u: Vec<UWord32> = vec![0; k + 2];
    let count = ncwrs_urow(y.len(), k, &mut u);
    let index = dec.dec_uint(count);
    cwrsi(k, index, y, &mut u);
    y.iter().map(|&v| v * v).sum()
}
