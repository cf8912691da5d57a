//! CELT band coding internals.
//!
//! The range coder, pulse codec and allocator are the collaborators of the
//! band pipeline; `bands`, `pitch`, `vq` and `residual` implement the
//! pipeline itself, generically over a [`Numeric`] backend.

mod backend;
mod bands;
mod cwrs;
mod entcode;
mod entdec;
mod entenc;
mod fixed_ops;
mod math;
mod math_fixed;
mod mode;
mod pitch;
mod rate;
mod residual;
mod types;
mod vq;

pub use backend::{FixedBackend, FixedNormScale, FloatBackend, Numeric};
pub use bands::{
    compute_band_energies, denormalise_bands, energy_bank, normalise_bands, renormalise_bands,
    stereo_mix,
};
pub use entcode::{BITRES, EcCtx, ec_tell};
pub use entdec::EcDec;
pub use entenc::EcEnc;
pub use mode::{
    ChannelBand, ChannelBandMut, MAX_BAND_SAMPLES, MAX_BLOCKS, MAX_CHANNELS, MAX_INTRA_LAGS, Mode,
    ModeError,
};
pub use pitch::{
    PITCH_GAIN_LEVELS, compute_pitch_gain, pitch_quant_bands, quant_pitch_gains,
    unquant_pitch_gains,
};
pub use rate::{BitAllocator, PulseAllocator};
pub use residual::{BandPlan, Prediction, quant_bands, unquant_bands};
pub use types::{Q15_ONE, Word16, Word32};
pub use vq::{exp_rotation, rotation_count};
