//! Range decoder mirroring [`EcEnc`](crate::celt::entenc::EcEnc).
//!
//! Reads past the end of the buffer yield zero bytes, so decoding arbitrary
//! input never panics; out-of-range integers are clamped and flagged through
//! the shared error field instead.

use core::cmp::min;

use crate::celt::entcode::{
    EC_CODE_BITS, EC_CODE_BOT, EC_CODE_EXTRA, EC_CODE_TOP, EC_SYM_BITS, EC_SYM_MAX, EC_UINT_BITS,
    EC_WINDOW_SIZE, EcCtx, EcWindow, celt_udiv,
};
use crate::celt::types::{UWord32, Word32};

/// Range decoder reading from a caller-owned byte slice.
#[derive(Debug)]
pub struct EcDec<'a> {
    ctx: EcCtx<'a>,
}

impl<'a> EcDec<'a> {
    /// Primes the decoder with the first bytes of `buf`.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        let mut ctx = EcCtx::new(buf);
        ctx.nbits_total = EC_CODE_BITS as Word32 + 1
            - ((EC_CODE_BITS - EC_CODE_EXTRA) / EC_SYM_BITS * EC_SYM_BITS) as Word32;
        ctx.rng = 1u32 << EC_CODE_EXTRA;

        let mut dec = Self { ctx };
        dec.ctx.rem = Word32::from(dec.read_byte());
        dec.ctx.val = dec.ctx.rng - 1 - ((dec.ctx.rem as UWord32) >> (EC_SYM_BITS - EC_CODE_EXTRA));
        dec.normalize();
        dec
    }

    fn read_byte(&mut self) -> u8 {
        if self.ctx.offs < self.ctx.storage {
            let byte = self.ctx.buf[self.ctx.offs as usize];
            self.ctx.offs += 1;
            byte
        } else {
            0
        }
    }

    fn read_byte_from_end(&mut self) -> u8 {
        if self.ctx.end_offs < self.ctx.storage {
            self.ctx.end_offs += 1;
            self.ctx.buf[(self.ctx.storage - self.ctx.end_offs) as usize]
        } else {
            0
        }
    }

    fn normalize(&mut self) {
        while self.ctx.rng <= EC_CODE_BOT {
            self.ctx.nbits_total += EC_SYM_BITS as Word32;
            self.ctx.rng <<= EC_SYM_BITS;
            let prev = self.ctx.rem as UWord32;
            self.ctx.rem = Word32::from(self.read_byte());
            let sym = ((prev << EC_SYM_BITS) | self.ctx.rem as UWord32) >> (EC_SYM_BITS - EC_CODE_EXTRA);
            self.ctx.val =
                (self.ctx.val << EC_SYM_BITS).wrapping_add(EC_SYM_MAX & !sym) & (EC_CODE_TOP - 1);
        }
    }

    /// Returns the cumulative frequency of the next symbol out of `ft`.
    ///
    /// Must be followed by [`EcDec::update`] with the symbol's interval.
    #[must_use]
    pub fn decode(&mut self, ft: UWord32) -> UWord32 {
        self.ctx.ext = celt_udiv(self.ctx.rng, ft);
        let s = self.ctx.val / self.ctx.ext;
        ft - min(s + 1, ft)
    }

    /// Consumes the interval `[fl, fh)` located by [`EcDec::decode`].
    pub fn update(&mut self, fl: UWord32, fh: UWord32, ft: UWord32) {
        let s = self.ctx.ext.wrapping_mul(ft - fh);
        self.ctx.val = self.ctx.val.wrapping_sub(s);
        self.ctx.rng = if fl > 0 {
            self.ctx.ext.wrapping_mul(fh - fl)
        } else {
            self.ctx.rng.wrapping_sub(s)
        };
        self.normalize();
    }

    /// Decodes a flag whose probability of being set is `1 / (1 << logp)`.
    #[must_use]
    pub fn dec_bit_logp(&mut self, logp: u32) -> bool {
        let r = self.ctx.rng;
        let d = self.ctx.val;
        let s = r >> logp;
        let set = d < s;
        if set {
            self.ctx.rng = s;
        } else {
            self.ctx.val = d - s;
            self.ctx.rng = r - s;
        }
        self.normalize();
        set
    }

    /// Decodes an integer coded with `enc_uint(_, ft)`.
    ///
    /// Corrupt input can produce a value past `ft - 1`; it is clamped and
    /// the error flag is raised.
    #[must_use]
    pub fn dec_uint(&mut self, ft: UWord32) -> UWord32 {
        assert!(ft > 1, "dec_uint needs at least two symbols");
        let ft = ft - 1;
        let ftb = UWord32::BITS - ft.leading_zeros();
        if ftb > EC_UINT_BITS {
            let raw = ftb - EC_UINT_BITS;
            let ft_small = (ft >> raw) + 1;
            let s = self.decode(ft_small);
            self.update(s, s + 1, ft_small);
            let t = (s << raw) | self.dec_bits(raw);
            if t <= ft {
                return t;
            }
            self.ctx.error = 1;
            ft
        } else {
            let s = self.decode(ft + 1);
            self.update(s, s + 1, ft + 1);
            s
        }
    }

    /// Reads `bits` raw bits from the tail of the buffer.
    #[must_use]
    pub fn dec_bits(&mut self, bits: u32) -> UWord32 {
        let mut window: EcWindow = self.ctx.end_window;
        let mut available = self.ctx.nend_bits;
        if (available as u32) < bits {
            while available <= EC_WINDOW_SIZE as Word32 - EC_SYM_BITS as Word32 {
                window |= EcWindow::from(self.read_byte_from_end()) << (available as u32);
                available += EC_SYM_BITS as Word32;
            }
        }
        let ret = window & ((1u32 << bits) - 1);
        window >>= bits;
        available -= bits as Word32;
        self.ctx.end_window = window;
        self.ctx.nend_bits = available;
        self.ctx.nbits_total += bits as Word32;
        ret
    }
}

impl<'a> core::ops::Deref for EcDec<'a> {
    type Target = EcCtx<'a>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl<'a> core::ops::DerefMut for EcDec<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}
