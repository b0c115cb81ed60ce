//! Core engines for time-ordered-data map-making.
//!
//! Two numeric cores live here: a flat-sky projection engine that moves
//! detector signal between the time domain and a pixelized sky map (spin-0
//! intensity or spin-2 T/Q/U), and a fixed-point Butterworth filter bank
//! that models the readout's integer IIR cascade. Both operate on strided
//! views over caller-owned memory and never copy their inputs.

pub mod filters;
pub mod projection;
pub mod utilities;

pub use filters::{ButterworthBank, ButterworthBankBuilder, ButterworthError, ButterworthStage};
pub use projection::{
    FlatPixelizor, FlatPixelizorBuilder, FlatPointer, ProjectionEngine, ProjectionEngine0,
    ProjectionEngine2, ProjectionError, Spin0, Spin2,
};
pub use utilities::{BufferError, BufferView, BufferViewMut, NdBuffer};
