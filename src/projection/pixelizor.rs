//! Flat-sky pixel grid: the affine map from sky coordinates to map offsets.
//!
//! ## Parameters
//! - **nx, ny**: grid size in pixels.
//! - **dx, dy**: sky step per pixel (`cdelt`).
//! - **x0, y0**: sky value at the reference pixel (`crval`).
//! - **ix0, iy0**: reference pixel index (`crpix`).
//!
//! The floating pixel coordinate is `ix = (x - crval) / cdelt + crpix + 0.5`;
//! the `+0.5` shift centers the pixel at `crpix` when the sky value equals
//! `crval`, and the integer pixel is the truncation of `ix` after an early
//! bounds check. Both conventions are part of the external contract.
//!
//! Grid parameters are stored y-then-x to match map storage order
//! `(n_map, n_y, n_x)`.

use super::ProjectionError;
use crate::utilities::buffer::{BufferView, NdBuffer};

/// Flat (tangent-plane) pixelization over a rectangular grid.
#[derive(Clone, Debug)]
pub struct FlatPixelizor {
    naxis: [usize; 2],
    cdelt: [f64; 2],
    crval: [f64; 2],
    crpix: [f64; 2],
}

/// Fluent constructor for [`FlatPixelizor`]; unset fields keep the unit-grid
/// defaults (`dx = dy = 1`, reference sky value and pixel at the origin).
#[derive(Copy, Clone, Debug)]
pub struct FlatPixelizorBuilder {
    nx: usize,
    ny: usize,
    dx: f64,
    dy: f64,
    x0: f64,
    y0: f64,
    ix0: f64,
    iy0: f64,
}

impl FlatPixelizorBuilder {
    #[inline(always)]
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            dx: 1.0,
            dy: 1.0,
            x0: 0.0,
            y0: 0.0,
            ix0: 0.0,
            iy0: 0.0,
        }
    }

    #[inline(always)]
    pub fn step(mut self, dx: f64, dy: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    #[inline(always)]
    pub fn reference(mut self, x0: f64, y0: f64) -> Self {
        self.x0 = x0;
        self.y0 = y0;
        self
    }

    #[inline(always)]
    pub fn reference_pixel(mut self, ix0: f64, iy0: f64) -> Self {
        self.ix0 = ix0;
        self.iy0 = iy0;
        self
    }

    #[inline(always)]
    pub fn build(self) -> FlatPixelizor {
        FlatPixelizor::new(
            self.nx, self.ny, self.dx, self.dy, self.x0, self.y0, self.ix0, self.iy0,
        )
    }
}

impl FlatPixelizor {
    /// Full-parameter constructor; see the module docs for the meaning of
    /// each argument.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        x0: f64,
        y0: f64,
        ix0: f64,
        iy0: f64,
    ) -> Self {
        Self {
            naxis: [ny, nx],
            cdelt: [dy, dx],
            crval: [y0, x0],
            crpix: [iy0, ix0],
        }
    }

    #[inline]
    pub fn n_x(&self) -> usize {
        self.naxis[1]
    }

    #[inline]
    pub fn n_y(&self) -> usize {
        self.naxis[0]
    }

    /// Freshly zeroed map storage: `(n, n_y, n_x)` when a prefix count is
    /// given, `(n_y, n_x)` otherwise.
    pub fn zeros(&self, n_prefix: Option<usize>) -> NdBuffer<f64> {
        match n_prefix {
            Some(n) => NdBuffer::zeros(&[n, self.naxis[0], self.naxis[1]]),
            None => NdBuffer::zeros(&[self.naxis[0], self.naxis[1]]),
        }
    }

    /// Captures the map view's y/x byte strides (the axes after the map
    /// component axis) for per-sample offset computation.
    pub fn bind(&self, map: &BufferView<'_, f64>) -> Result<BoundPixelizor, ProjectionError> {
        if map.ndim() != 3 {
            return Err(ProjectionError::BadShape {
                name: "map",
                expected: "(n_map, n_y, n_x)",
            });
        }
        Ok(BoundPixelizor {
            naxis: self.naxis,
            cdelt: self.cdelt,
            crval: self.crval,
            crpix: self.crpix,
            stride_y: map.strides()[1],
            stride_x: map.strides()[2],
        })
    }
}

/// A pixelizor bound to one map layout for the duration of a call.
#[derive(Copy, Clone, Debug)]
pub struct BoundPixelizor {
    naxis: [usize; 2],
    cdelt: [f64; 2],
    crval: [f64; 2],
    crpix: [f64; 2],
    stride_y: isize,
    stride_x: isize,
}

impl BoundPixelizor {
    /// Byte offset from the start of the first map component to the pixel
    /// under `coords`, or `None` when the sample falls off the grid.
    #[inline(always)]
    pub fn pixel_offset(&self, coords: &[f64; 4]) -> Option<isize> {
        let ix = (coords[0] - self.crval[1]) / self.cdelt[1] + self.crpix[1] + 0.5;
        if ix < 0.0 || ix >= self.naxis[1] as f64 {
            return None;
        }
        let iy = (coords[1] - self.crval[0]) / self.cdelt[0] + self.crpix[0] + 0.5;
        if iy < 0.0 || iy >= self.naxis[0] as f64 {
            return None;
        }
        // Truncation toward zero; the bounds check above guarantees the
        // result is non-negative and on the grid.
        Some(self.stride_y * iy as isize + self.stride_x * ix as isize)
    }
}
