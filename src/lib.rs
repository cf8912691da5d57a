#![no_std]

extern crate alloc;

mod celt;

pub use celt::*;

/// Backend selected by the `fixed_point` feature.
#[cfg(feature = "fixed_point")]
pub type Backend = FixedBackend;

/// Backend selected by the `fixed_point` feature.
#[cfg(not(feature = "fixed_point"))]
pub type Backend = FloatBackend;
