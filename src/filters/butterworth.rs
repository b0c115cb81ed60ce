//! # Fixed-point Butterworth filter bank
//!
//! A bank is an ordered cascade of first-order IIR stages applied
//! independently to every channel of a `(n_chan, n_samp)` block. Stages use
//! integer coefficients and a rounding arithmetic right shift so that the
//! same bank produces bit-identical output on any platform, matching the
//! readout firmware it models.
//!
//! ## Per-sample stage update
//!
//! For stage input `x` and delay line `w`:
//!
//! ```text
//! acc  = b0 * x + b1 * w[0]        (64-bit product and sum)
//! y    = (acc + r) >> shift        (r = 1 << (shift - 1), 0 when shift == 0)
//! w[1] = w[0]
//! w[0] = x
//! ```
//!
//! The cast of `y` back to `i32` wraps on overflow; staying inside the
//! `b_bits`/`p_bits` headroom budget is the caller's contract, and
//! saturation is left as a future opt-in.
//!
//! ## State
//!
//! Delay state is owned by the bank, shaped `(n_stage, n_chan, 2)`, and
//! persists across `apply` calls so long blocks can be streamed in pieces.
//! `init(n_chan)` reallocates it zero-filled; adding a stage to an
//! initialized bank does the same.
//!
//! ## Errors
//! - **Uninitialized**: `apply` before `init(n_chan)`.
//! - **BadShape**: input/output slice lengths disagree with
//!   `n_chan * n_samp`.

use aligned_vec::{AVec, CACHELINE_ALIGN};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ButterworthError {
    #[error("filter bank has no channel state; call init(n_chan) before apply")]
    Uninitialized,
    #[error("`{name}` has the wrong shape: expected {expected}")]
    BadShape {
        name: &'static str,
        expected: &'static str,
    },
}

/// One first-order stage in fixed-point form.
///
/// `b_bits` and `p_bits` record the coefficient and signal quantization
/// widths the stage was designed for; they travel with calibration data and
/// document how much of the 64-bit accumulator the stage may use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ButterworthStage {
    pub b0: i32,
    pub b1: i32,
    pub b_bits: u32,
    pub p_bits: u32,
    pub shift: u32,
}

impl ButterworthStage {
    pub fn new(b0: i32, b1: i32, b_bits: u32, p_bits: u32, shift: u32) -> Self {
        debug_assert!(shift < 63, "shift {shift} leaves no accumulator headroom");
        Self {
            b0,
            b1,
            b_bits,
            p_bits,
            shift,
        }
    }
}

/// Cascade of fixed-point stages with per-channel streaming state.
#[derive(Clone, Debug, Default)]
pub struct ButterworthBank {
    stages: Vec<ButterworthStage>,
    // Flattened (n_stage, n_chan) delay pairs.
    state: Vec<[i64; 2]>,
    n_chan: usize,
}

/// Fluent construction of a fully configured bank.
#[derive(Clone, Debug, Default)]
pub struct ButterworthBankBuilder {
    stages: Vec<ButterworthStage>,
    n_chan: Option<usize>,
}

impl ButterworthBankBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn stage(mut self, stage: ButterworthStage) -> Self {
        self.stages.push(stage);
        self
    }

    #[inline(always)]
    pub fn channels(mut self, n_chan: usize) -> Self {
        self.n_chan = Some(n_chan);
        self
    }

    pub fn build(self) -> ButterworthBank {
        let mut bank = ButterworthBank::new();
        for stage in self.stages {
            bank.add_stage(stage);
        }
        if let Some(n_chan) = self.n_chan {
            bank.init(n_chan);
        }
        bank
    }
}

impl ButterworthBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage to the cascade. If the bank already carries channel
    /// state, the delay array is reseated zero-filled to match the new
    /// cascade depth.
    pub fn add_stage(&mut self, stage: ButterworthStage) -> &mut Self {
        self.stages.push(stage);
        if self.n_chan > 0 {
            self.state = vec![[0; 2]; self.stages.len() * self.n_chan];
        }
        self
    }

    /// Allocates zero-filled delay state for `n_chan` channels, discarding
    /// whatever state the bank held before.
    pub fn init(&mut self, n_chan: usize) -> &mut Self {
        self.n_chan = n_chan;
        self.state = vec![[0; 2]; self.stages.len() * n_chan];
        self
    }

    #[inline]
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.n_chan
    }

    fn check_block(
        &self,
        input_len: usize,
        output_len: usize,
        n_samp: usize,
    ) -> Result<(), ButterworthError> {
        if self.n_chan == 0 {
            return Err(ButterworthError::Uninitialized);
        }
        let expected = self.n_chan * n_samp;
        if input_len != expected {
            return Err(ButterworthError::BadShape {
                name: "input",
                expected: "n_chan * n_samp elements, channel-major",
            });
        }
        if output_len != expected {
            return Err(ButterworthError::BadShape {
                name: "output",
                expected: "n_chan * n_samp elements, channel-major",
            });
        }
        Ok(())
    }

    /// Runs the cascade over a channel-major `(n_chan, n_samp)` block.
    /// State persists, so consecutive calls are equivalent to one call on
    /// the concatenated block. A bank with no stages copies input to output.
    pub fn apply(
        &mut self,
        input: &[i32],
        output: &mut [i32],
        n_samp: usize,
    ) -> Result<(), ButterworthError> {
        self.check_block(input.len(), output.len(), n_samp)?;
        let n_chan = self.n_chan;
        for c in 0..n_chan {
            let row = c * n_samp;
            for i in 0..n_samp {
                let mut x = input[row + i];
                for (s, stage) in self.stages.iter().enumerate() {
                    let w = &mut self.state[s * n_chan + c];
                    let acc = stage.b0 as i64 * x as i64 + stage.b1 as i64 * w[0];
                    let r = if stage.shift > 0 {
                        1i64 << (stage.shift - 1)
                    } else {
                        0
                    };
                    let y = (acc + r) >> stage.shift;
                    w[1] = w[0];
                    w[0] = x as i64;
                    x = y as i32;
                }
                output[row + i] = x;
            }
        }
        Ok(())
    }

    /// Float entry point sharing the integer state: input is scaled by
    /// `unit` and rounded half away from zero into `i32`, the integer
    /// cascade runs, and the result is scaled back down on the way out.
    pub fn apply_to_float(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        unit: f32,
        n_samp: usize,
    ) -> Result<(), ButterworthError> {
        self.check_block(input.len(), output.len(), n_samp)?;
        let mut ibuf: AVec<i32> = AVec::with_capacity(CACHELINE_ALIGN, input.len());
        for &v in input {
            ibuf.push((v * unit).round() as i32);
        }
        let mut obuf: AVec<i32> = AVec::with_capacity(CACHELINE_ALIGN, input.len());
        for _ in 0..input.len() {
            obuf.push(0);
        }
        self.apply(&ibuf, &mut obuf, n_samp)?;
        for (dst, &y) in output.iter_mut().zip(obuf.iter()) {
            *dst = y as f32 / unit;
        }
        Ok(())
    }
}
