// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

use crate::error::DspResult;

/// A fixed-size block kernel that [`crate::OsFilter`] can stream through.
///
/// One `apply` call consumes exactly `input_len()` samples and produces
/// exactly `output_len()` samples. Kernels are circular: the first
/// `history_len()` inputs of a block only prime the convolution and the
/// corresponding outputs are not valid.
pub trait BlockOp: Send {
    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;

    /// Interpolation / decimation factors `(U, D)`; output rate is
    /// `input rate * U / D`.
    fn ratio(&self) -> (usize, usize) {
        (1, 1)
    }

    /// Input samples of history needed before an output is alias free.
    fn history_len(&self) -> usize;

    fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        gain: f32,
    ) -> DspResult<()>;
}
