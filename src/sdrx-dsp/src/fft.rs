// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-length complex FFT wrapper and spectrum index remapping.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::{DspError, DspResult};

/// Forward/inverse transform pair of one fixed length.
///
/// Plans are built once and are immutable afterwards; only the scratch
/// buffer is mutated per call. Both directions are unnormalised, so a
/// forward transform followed by an inverse one scales the data by `len()`.
pub struct Fft {
    len: usize,
    forward: Arc<dyn rustfft::Fft<f32>>,
    inverse: Arc<dyn rustfft::Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Fft {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            len,
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-place forward transform. `buf` must be exactly `len()` long.
    pub fn forward(&mut self, buf: &mut [Complex<f32>]) -> DspResult<()> {
        self.check_len(buf.len())?;
        if self.len > 0 {
            self.forward.process_with_scratch(buf, &mut self.scratch);
        }
        Ok(())
    }

    /// In-place inverse transform. `buf` must be exactly `len()` long.
    pub fn inverse(&mut self, buf: &mut [Complex<f32>]) -> DspResult<()> {
        self.check_len(buf.len())?;
        if self.len > 0 {
            self.inverse.process_with_scratch(buf, &mut self.scratch);
        }
        Ok(())
    }

    fn check_len(&self, got: usize) -> DspResult<()> {
        if got != self.len {
            return Err(DspError::BadBufferSize {
                input: got,
                output: got,
                required: self.len,
            });
        }
        Ok(())
    }
}

/// Move the zero-frequency element of a natural-order spectrum to the
/// centre (index `n / 2`).
pub fn fftshift<T: Copy>(input: &[T], out: &mut [T]) -> DspResult<()> {
    let n = check_shift_len(input.len(), out.len())?;
    let half = n / 2;
    for (i, &value) in input.iter().enumerate() {
        out[(i + half) % n] = value;
    }
    Ok(())
}

/// Inverse of [`fftshift`]: bring the centred element back to index 0.
pub fn ifftshift<T: Copy>(input: &[T], out: &mut [T]) -> DspResult<()> {
    let n = check_shift_len(input.len(), out.len())?;
    let half = n / 2;
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = input[(i + half) % n];
    }
    Ok(())
}

fn check_shift_len(input: usize, output: usize) -> DspResult<usize> {
    if input != output {
        return Err(DspError::BadBufferSize {
            input,
            output,
            required: input,
        });
    }
    Ok(input)
}

/// Smallest `2^a * 3^b * 5^c` that is at least `min`.
pub fn good_size(min: usize) -> usize {
    let mut candidate = min.max(1);
    loop {
        let mut rest = candidate;
        for factor in [2, 3, 5] {
            while rest % factor == 0 {
                rest /= factor;
            }
        }
        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}
