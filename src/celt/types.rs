//! Scalar aliases and fixed-point scaling constants shared by the band code.

/// 16-bit fixed-point word (`Q14` coefficients, `Q15` gains).
pub type Word16 = i16;
/// 32-bit fixed-point word (signal samples, band amplitudes).
pub type Word32 = i32;
/// Unsigned word used by the range coder and the pulse enumeration.
pub type UWord32 = u32;

/// Largest positive `Q15` value, standing in for 1.0.
pub const Q15_ONE: Word16 = i16::MAX;
/// Number of fractional bits carried by a fixed-point signal sample.
pub const SIG_SHIFT: u32 = 12;
/// Fixed-point unit of a normalised coefficient (`Q14`).
pub const NORM_SCALING: Word16 = 1 << 14;
/// Shift applied when a normalised coefficient is lifted back to signal scale.
pub const NORM_TO_SIG_SHIFT: u32 = 10;
/// Smallest positive fixed-point amplitude; guards every reciprocal.
pub const EPSILON: Word32 = 1;

/// Floor added to float sums before square roots.
pub const FLOAT_ENERGY_FLOOR: f32 = 1e-10;
/// Floor added to float denominators.
pub const FLOAT_EPSILON: f32 = 1e-15;
