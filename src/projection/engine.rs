//! The projection engine: two tightly coupled inner loops over
//! `(n_det, n_time)`.
//!
//! Every operation follows the same skeleton: validate all arguments up
//! front, bind the pointer / pixelizor / accumulator working structures for
//! this call, then run the detector-major, sample-minor double loop. The
//! sequential iteration order is part of the contract; floating-point
//! accumulation is not associative, so repeated runs must bit-match.
//!
//! Samples whose pixel falls off the grid are skipped: `to_map` never
//! writes them, `from_map` leaves the corresponding signal sample
//! untouched, and `pixels` reports them as `-1`.

use super::accumulator::{Accumulator, SpinModel};
use super::pixelizor::FlatPixelizor;
use super::pointing::FlatPointer;
use super::ProjectionError;
use crate::utilities::buffer::{BufferView, BufferViewMut, NdBuffer};
use std::marker::PhantomData;

/// Engine composing the flat pointer, a flat pixelizor, and one spin model.
///
/// Engines are cheap to construct and reusable; each operation builds fresh
/// stateless working structures, so a single instance can serve many calls
/// (though not concurrently, as it borrows caller buffers for the duration
/// of a call).
#[derive(Clone, Debug)]
pub struct ProjectionEngine<S: SpinModel> {
    pixelizor: FlatPixelizor,
    _spin: PhantomData<S>,
}

/// Intensity-only engine.
pub type ProjectionEngine0 = ProjectionEngine<super::Spin0>;
/// T/Q/U engine.
pub type ProjectionEngine2 = ProjectionEngine<super::Spin2>;

impl<S: SpinModel> ProjectionEngine<S> {
    pub fn new(pixelizor: FlatPixelizor) -> Self {
        Self {
            pixelizor,
            _spin: PhantomData,
        }
    }

    /// Zeroed map storage shaped for this engine's pixelizor.
    pub fn zeros(&self, n_prefix: Option<usize>) -> NdBuffer<f64> {
        self.pixelizor.zeros(n_prefix)
    }

    fn check_signal(
        signal: &BufferViewMut<'_, f64>,
        n_det: usize,
        n_time: usize,
    ) -> Result<(), ProjectionError> {
        if signal.ndim() != 3
            || signal.shape()[0] != 1
            || signal.shape()[1] != n_det
            || signal.shape()[2] != n_time
        {
            return Err(ProjectionError::BadShape {
                name: "signal",
                expected: "(1, n_det, n_time)",
            });
        }
        Ok(())
    }

    /// Projects time-ordered signal into the map (`map += P s`). The map is
    /// accumulated into, never zeroed.
    pub fn to_map(
        &self,
        map: &mut BufferViewMut<'_, f64>,
        boresight: &BufferView<'_, f64>,
        offsets: &BufferView<'_, f64>,
        signal: &mut BufferViewMut<'_, f64>,
        weights: Option<&BufferView<'_, f64>>,
    ) -> Result<(), ProjectionError> {
        let mut pointer = FlatPointer::bind(boresight, offsets)?;
        let n_det = pointer.n_det();
        let n_time = pointer.n_time();
        Self::check_signal(signal, n_det, n_time)?;
        let pix = self.pixelizor.bind(&map.as_view())?;
        let acc = Accumulator::<S>::bind(map, signal, weights)?;

        let mut coords = [0.0f64; 4];
        for i_det in 0..n_det {
            pointer.begin_detector(i_det);
            for i_t in 0..n_time {
                pointer.sample(i_t, &mut coords);
                if let Some(off) = pix.pixel_offset(&coords) {
                    acc.forward(i_det, i_t, off, &coords);
                }
            }
        }
        Ok(())
    }

    /// Samples the map back into the time domain (`signal += P^T m`). The
    /// signal is accumulated into, never zeroed.
    pub fn from_map(
        &self,
        map: &mut BufferViewMut<'_, f64>,
        boresight: &BufferView<'_, f64>,
        offsets: &BufferView<'_, f64>,
        signal: &mut BufferViewMut<'_, f64>,
        weights: Option<&BufferView<'_, f64>>,
    ) -> Result<(), ProjectionError> {
        let mut pointer = FlatPointer::bind(boresight, offsets)?;
        let n_det = pointer.n_det();
        let n_time = pointer.n_time();
        Self::check_signal(signal, n_det, n_time)?;
        let pix = self.pixelizor.bind(&map.as_view())?;
        let acc = Accumulator::<S>::bind(map, signal, weights)?;

        let mut coords = [0.0f64; 4];
        for i_det in 0..n_det {
            pointer.begin_detector(i_det);
            for i_t in 0..n_time {
                pointer.sample(i_t, &mut coords);
                if let Some(off) = pix.pixel_offset(&coords) {
                    acc.reverse(i_det, i_t, off, &coords);
                }
            }
        }
        Ok(())
    }

    /// Fills `coord_out` of shape `(n_det, n_time, 4)` with the raw pointing
    /// tuples; no pixelization is involved.
    pub fn coords(
        &self,
        boresight: &BufferView<'_, f64>,
        offsets: &BufferView<'_, f64>,
        coord_out: &mut BufferViewMut<'_, f64>,
    ) -> Result<(), ProjectionError> {
        let mut pointer = FlatPointer::bind(boresight, offsets)?;
        let n_det = pointer.n_det();
        let n_time = pointer.n_time();
        if coord_out.ndim() != 3
            || coord_out.shape()[0] != n_det
            || coord_out.shape()[1] != n_time
            || coord_out.shape()[2] < 4
        {
            return Err(ProjectionError::BadShape {
                name: "coords",
                expected: "(n_det, n_time, 4)",
            });
        }
        let base = coord_out.base();
        let s0 = coord_out.strides()[0];
        let s1 = coord_out.strides()[1];
        let s2 = coord_out.strides()[2];

        let mut coords = [0.0f64; 4];
        for i_det in 0..n_det {
            pointer.begin_detector(i_det);
            for i_t in 0..n_time {
                pointer.sample(i_t, &mut coords);
                let row = s0 * i_det as isize + s1 * i_t as isize;
                for (ic, &v) in coords.iter().enumerate() {
                    unsafe {
                        (base.offset(row + s2 * ic as isize) as *mut f64).write_unaligned(v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Fills `pixel_out` of shape `(n_det, n_time)` with per-sample map byte
    /// offsets, `-1` for samples off the grid. The map argument supplies the
    /// layout the offsets refer to.
    pub fn pixels(
        &self,
        map: &BufferView<'_, f64>,
        boresight: &BufferView<'_, f64>,
        offsets: &BufferView<'_, f64>,
        pixel_out: &mut BufferViewMut<'_, i32>,
    ) -> Result<(), ProjectionError> {
        let mut pointer = FlatPointer::bind(boresight, offsets)?;
        let n_det = pointer.n_det();
        let n_time = pointer.n_time();
        let pix = self.pixelizor.bind(map)?;
        if pixel_out.ndim() != 2
            || pixel_out.shape()[0] != n_det
            || pixel_out.shape()[1] != n_time
        {
            return Err(ProjectionError::BadShape {
                name: "pixels",
                expected: "(n_det, n_time)",
            });
        }
        let base = pixel_out.base();
        let s0 = pixel_out.strides()[0];
        let s1 = pixel_out.strides()[1];

        let mut coords = [0.0f64; 4];
        for i_det in 0..n_det {
            pointer.begin_detector(i_det);
            for i_t in 0..n_time {
                pointer.sample(i_t, &mut coords);
                let value = match pix.pixel_offset(&coords) {
                    Some(off) => off as i32,
                    None => -1,
                };
                unsafe {
                    (base.offset(s0 * i_det as isize + s1 * i_t as isize) as *mut i32)
                        .write_unaligned(value);
                }
            }
        }
        Ok(())
    }
}
