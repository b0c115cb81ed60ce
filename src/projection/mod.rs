//! Flat-sky projection between time-ordered detector data and map pixels.
//!
//! The engine composes three roles: a pointer that turns boresight plus
//! per-detector offsets into sky coordinates, a pixelizor that turns sky
//! coordinates into map byte offsets, and an accumulator that moves signal
//! between the time domain and the map domain. Composition is static; the
//! spin model is a type parameter so each `(pointer, pixelizor, spin)` triple
//! monomorphizes into its own pair of inner loops.

pub mod accumulator;
pub mod engine;
pub mod pixelizor;
pub mod pointing;

pub use accumulator::{Accumulator, Spin0, Spin2, SpinModel};
pub use engine::{ProjectionEngine, ProjectionEngine0, ProjectionEngine2};
pub use pixelizor::{BoundPixelizor, FlatPixelizor, FlatPixelizorBuilder};
pub use pointing::FlatPointer;

use crate::utilities::buffer::BufferError;
use thiserror::Error;

/// Errors raised at the boundary of every projection operation, before any
/// output buffer is touched.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A strided view could not be resolved for the named argument.
    #[error("cannot resolve a strided view for `{name}`")]
    BadBuffer {
        name: &'static str,
        #[source]
        source: BufferError,
    },
    /// The named argument has the wrong rank, wrong leading axis, or is
    /// present when it must be absent.
    #[error("`{name}` has the wrong shape: expected {expected}")]
    BadShape {
        name: &'static str,
        expected: &'static str,
    },
}
