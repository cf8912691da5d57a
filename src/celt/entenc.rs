//! Range encoder.
//!
//! Range-coded symbols grow from the front of the caller's buffer while raw
//! bits are packed backwards from its end; [`EcEnc::enc_done`] joins the two.

use crate::celt::entcode::{
    EC_CODE_BITS, EC_CODE_BOT, EC_CODE_SHIFT, EC_CODE_TOP, EC_SYM_BITS, EC_SYM_MAX, EC_UINT_BITS,
    EC_WINDOW_SIZE, EcCtx, EcWindow, celt_udiv, ec_ilog,
};
use crate::celt::types::{UWord32, Word32};

/// Range encoder writing into a caller-owned byte slice.
#[derive(Debug)]
pub struct EcEnc<'a> {
    ctx: EcCtx<'a>,
}

impl<'a> EcEnc<'a> {
    /// Starts an empty bitstream in `buf`.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        let mut ctx = EcCtx::new(buf);
        ctx.nbits_total = EC_CODE_BITS as Word32 + 1;
        ctx.rng = EC_CODE_TOP;
        ctx.rem = -1;
        Self { ctx }
    }

    fn write_byte(&mut self, value: UWord32) -> Word32 {
        if self.ctx.offs + self.ctx.end_offs >= self.ctx.storage {
            return -1;
        }
        self.ctx.buf[self.ctx.offs as usize] = value as u8;
        self.ctx.offs += 1;
        0
    }

    fn write_byte_at_end(&mut self, value: UWord32) -> Word32 {
        if self.ctx.offs + self.ctx.end_offs >= self.ctx.storage {
            return -1;
        }
        self.ctx.end_offs += 1;
        let idx = (self.ctx.storage - self.ctx.end_offs) as usize;
        self.ctx.buf[idx] = value as u8;
        0
    }

    /// Buffers one output symbol, resolving pending carries.
    fn carry_out(&mut self, c: Word32) {
        if c == EC_SYM_MAX as Word32 {
            self.ctx.ext = self.ctx.ext.wrapping_add(1);
            return;
        }
        let carry = c >> EC_SYM_BITS;
        if self.ctx.rem >= 0 {
            let value = (self.ctx.rem + carry) as UWord32;
            self.ctx.error |= self.write_byte(value);
        }
        if self.ctx.ext > 0 {
            let sym = (EC_SYM_MAX + carry as UWord32) & EC_SYM_MAX;
            while self.ctx.ext > 0 {
                self.ctx.error |= self.write_byte(sym);
                self.ctx.ext -= 1;
            }
        }
        self.ctx.rem = c & EC_SYM_MAX as Word32;
    }

    fn normalize(&mut self) {
        while self.ctx.rng <= EC_CODE_BOT {
            self.carry_out((self.ctx.val >> EC_CODE_SHIFT) as Word32);
            self.ctx.val = (self.ctx.val << EC_SYM_BITS) & (EC_CODE_TOP - 1);
            self.ctx.rng <<= EC_SYM_BITS;
            self.ctx.nbits_total += EC_SYM_BITS as Word32;
        }
    }

    /// Codes the interval `[fl, fh)` out of a total frequency `ft`.
    pub fn encode(&mut self, fl: UWord32, fh: UWord32, ft: UWord32) {
        let r = celt_udiv(self.ctx.rng, ft);
        if fl > 0 {
            self.ctx.val = self
                .ctx
                .val
                .wrapping_add(self.ctx.rng.wrapping_sub(r.wrapping_mul(ft - fl)));
            self.ctx.rng = r.wrapping_mul(fh - fl);
        } else {
            self.ctx.rng = self.ctx.rng.wrapping_sub(r.wrapping_mul(ft - fh));
        }
        self.normalize();
    }

    /// Codes a flag whose probability of being set is `1 / (1 << logp)`.
    pub fn enc_bit_logp(&mut self, val: bool, logp: u32) {
        let r = self.ctx.rng;
        let s = r >> logp;
        if val {
            self.ctx.val = self.ctx.val.wrapping_add(r - s);
            self.ctx.rng = s;
        } else {
            self.ctx.rng = r - s;
        }
        self.normalize();
    }

    /// Codes `fl` uniformly in `[0, ft)`.
    ///
    /// Wide ranges range-code their top [`EC_UINT_BITS`] bits and append the
    /// remainder as raw bits.
    pub fn enc_uint(&mut self, fl: UWord32, ft: UWord32) {
        assert!(ft > 1, "enc_uint needs at least two symbols");
        debug_assert!(fl < ft);
        let ft = ft - 1;
        let ftb = UWord32::BITS - ft.leading_zeros();
        if ftb > EC_UINT_BITS {
            let raw = ftb - EC_UINT_BITS;
            let top = fl >> raw;
            self.encode(top, top + 1, (ft >> raw) + 1);
            self.enc_bits(fl & ((1u32 << raw) - 1), raw);
        } else {
            self.encode(fl, fl + 1, ft + 1);
        }
    }

    /// Appends `bits` raw bits at the tail of the buffer.
    pub fn enc_bits(&mut self, fl: UWord32, bits: u32) {
        debug_assert!(bits > 0);
        let mut window = self.ctx.end_window;
        let mut used = self.ctx.nend_bits;
        if used as u32 + bits > EC_WINDOW_SIZE as u32 {
            while used >= EC_SYM_BITS as Word32 {
                self.ctx.error |= self.write_byte_at_end(window & EC_SYM_MAX);
                window >>= EC_SYM_BITS;
                used -= EC_SYM_BITS as Word32;
            }
        }
        window |= (fl as EcWindow) << (used as u32);
        used += bits as Word32;
        self.ctx.end_window = window;
        self.ctx.nend_bits = used;
        self.ctx.nbits_total += bits as Word32;
    }

    /// Flushes the coder state so the buffer can be handed to a decoder.
    pub fn enc_done(&mut self) {
        let mut window = self.ctx.end_window;
        let mut used = self.ctx.nend_bits;
        let mut l = EC_CODE_BITS as Word32 - ec_ilog(self.ctx.rng);
        let mut msk = (EC_CODE_TOP - 1) >> l;
        let mut end = self.ctx.val.wrapping_add(msk) & !msk;
        if (end | msk) >= self.ctx.val.wrapping_add(self.ctx.rng) {
            l += 1;
            msk >>= 1;
            end = self.ctx.val.wrapping_add(msk) & !msk;
        }
        while l > 0 {
            self.carry_out((end >> EC_CODE_SHIFT) as Word32);
            end = (end << EC_SYM_BITS) & (EC_CODE_TOP - 1);
            l -= EC_SYM_BITS as Word32;
        }
        if self.ctx.rem >= 0 || self.ctx.ext > 0 {
            self.carry_out(0);
        }
        while used >= EC_SYM_BITS as Word32 {
            self.ctx.error |= self.write_byte_at_end(window & EC_SYM_MAX);
            window >>= EC_SYM_BITS;
            used -= EC_SYM_BITS as Word32;
        }
        if self.ctx.error == 0 {
            let start = self.ctx.offs as usize;
            let stop = (self.ctx.storage - self.ctx.end_offs) as usize;
            self.ctx.buf[start..stop].fill(0);
            if used > 0 {
                if self.ctx.end_offs >= self.ctx.storage {
                    self.ctx.error = -1;
                } else {
                    let room = -l;
                    if self.ctx.offs + self.ctx.end_offs >= self.ctx.storage && room < used {
                        window &= if room > 0 { (1u32 << room as u32) - 1 } else { 0 };
                        self.ctx.error = -1;
                    }
                    let idx = (self.ctx.storage - self.ctx.end_offs - 1) as usize;
                    self.ctx.buf[idx] |= window as u8;
                }
            }
        }
        self.ctx.end_window = window;
        self.ctx.nend_bits = used;
    }
}

impl<'a> core::ops::Deref for EcEnc<'a> {
    type Target = EcCtx<'a>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl<'a> core::ops::DerefMut for EcEnc<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::EcEnc;
    use crate::celt::entcode::{EC_CODE_BITS, EC_CODE_TOP, EC_WINDOW_SIZE, ec_tell};
    use crate::celt::entdec::EcDec;

    struct Lcg(u32);

    impl Lcg {
        fn next(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            self.0
        }
    }

    #[test]
    fn fresh_encoder_state() {
        let mut buf = vec![0u8; 8];
        let enc = EcEnc::new(&mut buf);
        assert_eq!(enc.storage, 8);
        assert_eq!(enc.nbits_total, EC_CODE_BITS as i32 + 1);
        assert_eq!(enc.rng, EC_CODE_TOP);
        assert_eq!(enc.rem, -1);
        assert_eq!(enc.error, 0);
        assert_eq!(ec_tell(&enc), 1);
    }

    #[test]
    fn raw_bits_land_at_the_tail() {
        let mut buf = vec![0u8; 4];
        let mut enc = EcEnc::new(&mut buf);
        enc.enc_bits(0b1011, 4);
        assert_eq!(enc.end_window, 0b1011);
        assert_eq!(enc.nend_bits, 4);
        enc.enc_done();
        assert_eq!(enc.error, 0);
        assert_eq!(enc.buf[3], 0b1011);
        assert!(enc.nend_bits < EC_WINDOW_SIZE as i32);
    }

    #[test]
    fn uniform_integers_round_trip() {
        let mut buf = vec![0u8; 200_000];
        {
            let mut enc = EcEnc::new(&mut buf);
            for ft in 2..512u32 {
                for i in (0..ft).step_by(3) {
                    enc.enc_uint(i, ft);
                }
            }
            enc.enc_uint(0xDEAD_BEEF, u32::MAX);
            enc.enc_done();
            assert_eq!(enc.error, 0);
        }

        let mut dec = EcDec::new(&mut buf);
        for ft in 2..512u32 {
            for i in (0..ft).step_by(3) {
                assert_eq!(dec.dec_uint(ft), i, "ft={ft}");
            }
        }
        assert_eq!(dec.dec_uint(u32::MAX), 0xDEAD_BEEF);
        assert_eq!(dec.error, 0);
    }

    #[test]
    fn raw_bits_cost_exactly_their_width() {
        let mut buf = vec![0u8; 100_000];
        {
            let mut enc = EcEnc::new(&mut buf);
            for ftb in 1..13u32 {
                for i in 0..(1u32 << ftb) {
                    let before = ec_tell(&enc);
                    enc.enc_bits(i, ftb);
                    assert_eq!(ec_tell(&enc) - before, ftb as i32);
                }
            }
            enc.enc_done();
            assert_eq!(enc.error, 0);
        }

        let mut dec = EcDec::new(&mut buf);
        for ftb in 1..13u32 {
            for i in 0..(1u32 << ftb) {
                assert_eq!(dec.dec_bits(ftb), i);
            }
        }
    }

    #[test]
    fn overfilling_raw_bits_sets_the_error_flag() {
        let mut buf = vec![0u8; 2];
        let mut enc = EcEnc::new(&mut buf);
        for _ in 0..17 {
            enc.enc_bits(0, 1);
        }
        enc.enc_done();
        assert_ne!(enc.error, 0);
    }

    #[test]
    fn random_streams_agree_on_tell() {
        let mut buf = vec![0u8; 10_000];
        let mut rng = Lcg(12_345);

        for iteration in 0..300 {
            let ft = rng.next() % 100_000 + 10;
            let sz = (rng.next() % 200) as usize;
            let data: Vec<u32> = (0..sz).map(|_| rng.next() % ft).collect();

            let mut tells = Vec::with_capacity(sz + 1);
            {
                let mut enc = EcEnc::new(&mut buf);
                tells.push(ec_tell(&enc));
                for &value in &data {
                    enc.enc_uint(value, ft);
                    tells.push(ec_tell(&enc));
                }
                enc.enc_done();
                assert_eq!(enc.error, 0, "iteration {iteration}");
            }

            let mut dec = EcDec::new(&mut buf);
            assert_eq!(ec_tell(&dec), tells[0]);
            for (j, &expected) in data.iter().enumerate() {
                assert_eq!(dec.dec_uint(ft), expected, "iteration {iteration}, symbol {j}");
                assert_eq!(ec_tell(&dec), tells[j + 1]);
            }
        }
    }

    #[test]
    fn biased_flags_round_trip() {
        let mut buf = vec![0u8; 64];
        let flags = [(true, 1), (false, 3), (true, 15), (false, 1), (true, 2)];
        {
            let mut enc = EcEnc::new(&mut buf);
            for &(flag, logp) in &flags {
                enc.enc_bit_logp(flag, logp);
            }
            enc.enc_done();
        }
        let mut dec = EcDec::new(&mut buf);
        for &(flag, logp) in &flags {
            assert_eq!(dec.dec_bit_logp(logp), flag);
        }
    }
}
