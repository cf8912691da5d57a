#![no_main]

use celt_bands::{EcDec, FixedBackend, FloatBackend, Mode, Numeric, PulseAllocator, unquant_bands};
use libfuzzer_sys::fuzz_target;

const SETUP_BYTE_COUNT: usize = 3;
const FRAME_SIZES: [usize; 4] = [64, 120, 256, 480];

fn decode<A: Numeric>(mode: &Mode, total_bits: i32, payload: &[u8]) {
    let mut buffer = payload.to_vec();
    let mut dec = EcDec::new(&mut buffer);
    let mut x = vec![A::Norm::default(); mode.spectrum_len()];
    let mut p = vec![A::norm_from_f32(0.125); mode.spectrum_len()];
    let plans = unquant_bands::<A, _>(mode, &PulseAllocator::new(), &mut x, &mut p, total_bits, &mut dec);
    assert_eq!(plans.len(), mode.nb_ebands());
}

fuzz_target!(|data: &[u8]| {
    if data.len() < SETUP_BYTE_COUNT + 1 {
        return;
    }

    let channels = 1 + usize::from(data[0] & 1);
    let blocks = 1 << ((data[0] >> 1) & 3);
    let frame_size = FRAME_SIZES[usize::from(data[1] & 3)];
    let Ok(mode) = Mode::create(48_000, channels, frame_size, blocks) else {
        return;
    };

    let payload = &data[SETUP_BYTE_COUNT..];
    // Ask for anything up to twice what the payload can hold.
    let total_bits = i32::from(data[2]) * (payload.len() as i32 * 16) / 255;
    if data[1] & 4 == 0 {
        decode::<FloatBackend>(&mode, total_bits, payload);
    } else {
        decode::<FixedBackend>(&mode, total_bits, payload);
    }
});
