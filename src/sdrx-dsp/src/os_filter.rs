// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Overlap-and-save streaming adapter for [`BlockOp`] kernels.

use num_complex::Complex;

use crate::block_op::BlockOp;
use crate::error::{DspError, DspResult};

/// Streams arbitrarily chunked input through a fixed-size block kernel.
///
/// Each kernel call sees `[history | chunk | zero pad]`. The first
/// `save_length` inputs are the tail of everything fed so far, so the
/// outputs for `chunk` come out exactly as a single long linear
/// convolution would produce them, whatever the caller's chunking.
pub struct OsFilter<B: BlockOp> {
    op: B,
    save: usize,
    discard: usize,
    interp: usize,
    decim: usize,
    max_chunk: usize,
    work_in: Vec<Complex<f32>>,
    work_out: Vec<Complex<f32>>,
    real_in: Vec<Complex<f32>>,
    real_out: Vec<Complex<f32>>,
}

impl<B: BlockOp> OsFilter<B> {
    /// Wrap `op`. `save_length` is in input samples; `discard_length` is
    /// the matching count in output samples (`save * U / D`), and 0 picks
    /// that value.
    pub fn new(op: B, save_length: usize, discard_length: usize) -> DspResult<Self> {
        let (interp, decim) = op.ratio();
        if interp == 0 || decim == 0 {
            return Err(DspError::BadRate(format!(
                "block op ratio {interp}/{decim} is degenerate"
            )));
        }
        if save_length < op.history_len() {
            return Err(DspError::BadSize(format!(
                "save length {save_length} is shorter than the {} samples of history the kernel needs",
                op.history_len()
            )));
        }
        if save_length % decim != 0 {
            return Err(DspError::BadSize(format!(
                "save length {save_length} is not a multiple of the decimation {decim}"
            )));
        }
        let discard = save_length * interp / decim;
        if discard_length != 0 && discard_length != discard {
            return Err(DspError::BadSize(format!(
                "discard length {discard_length} does not match save length {save_length} at ratio {interp}/{decim}"
            )));
        }
        let room = op.input_len().saturating_sub(save_length);
        let max_chunk = room - room % decim;
        if max_chunk == 0 {
            return Err(DspError::BadSize(format!(
                "block length {} leaves no room after {save_length} samples of history",
                op.input_len()
            )));
        }

        let work_in = vec![Complex::new(0.0, 0.0); op.input_len()];
        let work_out = vec![Complex::new(0.0, 0.0); op.output_len()];
        Ok(Self {
            op,
            save: save_length,
            discard,
            interp,
            decim,
            max_chunk,
            work_in,
            work_out,
            real_in: Vec::new(),
            real_out: Vec::new(),
        })
    }

    /// Wrap `op` with exactly the history it asks for.
    pub fn from_op(op: B) -> DspResult<Self> {
        let save = op.history_len();
        Self::new(op, save, 0)
    }

    pub fn op(&self) -> &B {
        &self.op
    }

    pub fn save_length(&self) -> usize {
        self.save
    }

    pub fn discard_length(&self) -> usize {
        self.discard
    }

    /// Largest chunk handed to the kernel in one call; longer inputs are
    /// split.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Output samples produced for `input_len` input samples.
    pub fn output_len_for(&self, input_len: usize) -> usize {
        input_len * self.interp / self.decim
    }

    /// Forget the stream history.
    pub fn reset(&mut self) {
        self.work_in.fill(Complex::new(0.0, 0.0));
    }

    /// Filter `input` and append `input.len() * U / D` samples to `output`.
    ///
    /// `input.len()` must be a multiple of the kernel's decimation factor.
    pub fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut Vec<Complex<f32>>,
        gain: f32,
    ) -> DspResult<usize> {
        if input.len() % self.decim != 0 {
            return Err(DspError::BadBufferSize {
                input: input.len(),
                output: output.len(),
                required: input.len().next_multiple_of(self.decim),
            });
        }
        let start = output.len();
        for chunk in input.chunks(self.max_chunk) {
            self.apply_chunk(chunk, output, gain)?;
        }
        Ok(output.len() - start)
    }

    fn apply_chunk(
        &mut self,
        chunk: &[Complex<f32>],
        output: &mut Vec<Complex<f32>>,
        gain: f32,
    ) -> DspResult<()> {
        let len = chunk.len();
        let end = self.save + len;
        self.work_in[self.save..end].copy_from_slice(chunk);
        self.work_in[end..].fill(Complex::new(0.0, 0.0));

        self.op.apply(&self.work_in, &mut self.work_out, gain)?;

        let produced = len * self.interp / self.decim;
        output.extend_from_slice(&self.work_out[self.discard..self.discard + produced]);

        // New history is the tail of [history | chunk].
        self.work_in.copy_within(len..end, 0);
        Ok(())
    }

    /// Real-valued convenience wrapper; keeps the real part of the result.
    pub fn apply_real(&mut self, input: &[f32], output: &mut Vec<f32>, gain: f32) -> DspResult<usize> {
        let mut real_in = std::mem::take(&mut self.real_in);
        let mut real_out = std::mem::take(&mut self.real_out);
        real_in.clear();
        real_in.extend(input.iter().map(|&x| Complex::new(x, 0.0)));
        real_out.clear();
        let result = self.apply(&real_in, &mut real_out, gain);
        output.extend(real_out.iter().map(|c| c.re));
        self.real_in = real_in;
        self.real_out = real_out;
        result
    }
}
