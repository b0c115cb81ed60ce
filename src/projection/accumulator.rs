//! Signal accumulation between the time domain and the map domain.
//!
//! Two spin models are supported: spin-0 (a single intensity component,
//! unit weight everywhere) and spin-2 (T/Q/U components, weighted by the
//! 2-psi rotation derived from the pointing's cosine/sine pair). The model
//! is a type parameter so the component loop unrolls at compile time; the
//! set is closed and sealed.

use super::ProjectionError;
use crate::utilities::buffer::{BufferView, BufferViewMut};
use std::marker::PhantomData;
use std::ptr;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Spin0 {}
    impl Sealed for super::Spin2 {}
}

/// Closed set of accumulation models; supplies the component count and the
/// per-sample weight vector.
pub trait SpinModel: sealed::Sealed + 'static {
    const N_COMP: usize;
    const MAP_SHAPE: &'static str;

    /// Fills the first `N_COMP` entries of `wt` from the pointing tuple.
    fn weights(coords: &[f64; 4], wt: &mut [f64; 3]);
}

/// Intensity-only accumulation: one map component, weight 1.
#[derive(Copy, Clone, Debug, Default)]
pub struct Spin0;

impl SpinModel for Spin0 {
    const N_COMP: usize = 1;
    const MAP_SHAPE: &'static str = "(1, n_y, n_x)";

    #[inline(always)]
    fn weights(_coords: &[f64; 4], wt: &mut [f64; 3]) {
        wt[0] = 1.0;
    }
}

/// T/Q/U accumulation. `coords[2..4]` carry `(cos psi, sin psi)` of the
/// combined detector + boresight angle; squaring them yields the 2-psi
/// weights `(1, cos 2psi, sin 2psi)` applied to (T, Q, U) in that order.
#[derive(Copy, Clone, Debug, Default)]
pub struct Spin2;

impl SpinModel for Spin2 {
    const N_COMP: usize = 3;
    const MAP_SHAPE: &'static str = "(3, n_y, n_x)";

    #[inline(always)]
    fn weights(coords: &[f64; 4], wt: &mut [f64; 3]) {
        let c = coords[2];
        let s = coords[3];
        wt[0] = 1.0;
        wt[1] = c * c - s * s;
        wt[2] = 2.0 * c * s;
    }
}

/// Per-call accumulation kernel bound to one map and one signal buffer.
#[derive(Debug)]
pub struct Accumulator<'a, S: SpinModel> {
    map_base: *mut u8,
    map_s0: isize,
    sig_base: *mut u8,
    sig_s1: isize,
    sig_s2: isize,
    _marker: PhantomData<(&'a mut (), S)>,
}

impl<'a, S: SpinModel> Accumulator<'a, S> {
    /// Validates the map `(N_COMP, n_y, n_x)` and signal `(1, n_det, n_time)`
    /// descriptors, insists the weights argument is absent (both spin models
    /// derive their weights from the pointing), and captures the raw layout
    /// for the kernels. No buffer is written here.
    pub fn bind(
        map: &'a mut BufferViewMut<'_, f64>,
        signal: &'a mut BufferViewMut<'_, f64>,
        weights: Option<&BufferView<'_, f64>>,
    ) -> Result<Self, ProjectionError> {
        if map.ndim() != 3 || map.shape()[0] != S::N_COMP {
            return Err(ProjectionError::BadShape {
                name: "map",
                expected: S::MAP_SHAPE,
            });
        }
        if signal.ndim() != 3 || signal.shape()[0] != 1 {
            return Err(ProjectionError::BadShape {
                name: "signal",
                expected: "(1, n_det, n_time)",
            });
        }
        if weights.is_some() {
            return Err(ProjectionError::BadShape {
                name: "weights",
                expected: "absent (weights are derived from the pointing)",
            });
        }
        Ok(Self {
            map_base: map.base(),
            map_s0: map.strides()[0],
            sig_base: signal.base(),
            sig_s1: signal.strides()[1],
            sig_s2: signal.strides()[2],
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    fn signal_ptr(&self, i_det: usize, i_t: usize) -> *mut f64 {
        let off = self.sig_s1 * i_det as isize + self.sig_s2 * i_t as isize;
        unsafe { self.sig_base.offset(off) as *mut f64 }
    }

    /// Time domain to map domain: `map[k] += signal * wt[k]` for each
    /// component, walking the component axis by its byte stride.
    #[inline(always)]
    pub fn forward(&self, i_det: usize, i_t: usize, pixel_offset: isize, coords: &[f64; 4]) {
        let sig = unsafe { ptr::read_unaligned(self.signal_ptr(i_det, i_t) as *const f64) };
        let mut wt = [0.0f64; 3];
        S::weights(coords, &mut wt);
        let mut off = pixel_offset;
        for &w in wt.iter().take(S::N_COMP) {
            unsafe {
                let p = self.map_base.offset(off) as *mut f64;
                p.write_unaligned(p.read_unaligned() + sig * w);
            }
            off += self.map_s0;
        }
    }

    /// Map domain to time domain: `signal += sum_k map[k] * wt[k]`.
    #[inline(always)]
    pub fn reverse(&self, i_det: usize, i_t: usize, pixel_offset: isize, coords: &[f64; 4]) {
        let mut wt = [0.0f64; 3];
        S::weights(coords, &mut wt);
        let mut acc = 0.0f64;
        let mut off = pixel_offset;
        for &w in wt.iter().take(S::N_COMP) {
            unsafe {
                acc += ptr::read_unaligned(self.map_base.offset(off) as *const f64) * w;
            }
            off += self.map_s0;
        }
        unsafe {
            let p = self.signal_ptr(i_det, i_t);
            p.write_unaligned(p.read_unaligned() + acc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::buffer::NdBuffer;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn spin0_forward_and_reverse_accumulate() {
        let mut map = NdBuffer::<f64>::zeros(&[1, 2, 2]);
        let mut signal = NdBuffer::<f64>::zeros(&[1, 1, 1]);
        signal.as_mut_slice()[0] = 7.0;

        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let acc = Accumulator::<Spin0>::bind(&mut map_view, &mut sig_view, None).unwrap();
        let coords = [0.0, 0.0, 1.0, 0.0];
        // Pixel (1, 0): one row down in a 2x2 f64 map is 16 bytes.
        acc.forward(0, 0, 16, &coords);
        acc.reverse(0, 0, 16, &coords);
        drop(acc);

        assert_eq!(map.at(&[0, 1, 0]), 7.0);
        assert_eq!(signal.as_slice()[0], 14.0);
    }

    #[test]
    fn spin2_weights_at_45_degrees() {
        let mut map = NdBuffer::<f64>::zeros(&[3, 1, 1]);
        let mut signal = NdBuffer::<f64>::zeros(&[1, 1, 1]);
        signal.as_mut_slice()[0] = 1.0;

        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let acc = Accumulator::<Spin2>::bind(&mut map_view, &mut sig_view, None).unwrap();
        let coords = [0.0, 0.0, FRAC_PI_4.cos(), FRAC_PI_4.sin()];
        acc.forward(0, 0, 0, &coords);
        drop(acc);

        assert_eq!(map.at(&[0, 0, 0]), 1.0);
        assert!(map.at(&[1, 0, 0]).abs() < 1e-15);
        assert!((map.at(&[2, 0, 0]) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn spin2_reverse_projects_with_the_same_weights() {
        let mut map = NdBuffer::<f64>::zeros(&[3, 1, 1]);
        map.as_mut_slice().copy_from_slice(&[2.0, 3.0, 5.0]);
        let mut signal = NdBuffer::<f64>::zeros(&[1, 1, 1]);

        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let acc = Accumulator::<Spin2>::bind(&mut map_view, &mut sig_view, None).unwrap();
        let psi = 0.2f64;
        let coords = [0.0, 0.0, psi.cos(), psi.sin()];
        acc.reverse(0, 0, 0, &coords);
        drop(acc);

        let expected = 2.0 + 3.0 * (2.0 * psi).cos() + 5.0 * (2.0 * psi).sin();
        assert!((signal.as_slice()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn wrong_component_count_is_rejected() {
        let mut map = NdBuffer::<f64>::zeros(&[3, 2, 2]);
        let mut signal = NdBuffer::<f64>::zeros(&[1, 1, 1]);
        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let err = Accumulator::<Spin0>::bind(&mut map_view, &mut sig_view, None).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::BadShape { name: "map", .. }
        ));
    }

    #[test]
    fn explicit_weights_are_forbidden() {
        let mut map = NdBuffer::<f64>::zeros(&[1, 2, 2]);
        let mut signal = NdBuffer::<f64>::zeros(&[1, 1, 1]);
        let weights = NdBuffer::<f64>::zeros(&[1, 1, 1]);
        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let weights_view = weights.view();
        let err = Accumulator::<Spin0>::bind(&mut map_view, &mut sig_view, Some(&weights_view))
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::BadShape {
                name: "weights",
                ..
            }
        ));
    }

    #[test]
    fn multi_slice_signal_is_rejected() {
        let mut map = NdBuffer::<f64>::zeros(&[1, 2, 2]);
        let mut signal = NdBuffer::<f64>::zeros(&[2, 1, 1]);
        let mut map_view = map.view_mut();
        let mut sig_view = signal.view_mut();
        let err = Accumulator::<Spin0>::bind(&mut map_view, &mut sig_view, None).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::BadShape { name: "signal", .. }
        ));
    }
}
