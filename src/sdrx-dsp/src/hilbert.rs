// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Overlap-and-save Hilbert transformer producing analytic signals.
//!
//! Two frequency images run side by side over the same input transform:
//! a truncated Hilbert response (`2 / (pi * n)` for odd `n`) and a pure
//! delay equalised to the same magnitude. Both are centred on tap `Q / 2`,
//! so the straight-through rail and the quadrature rail leave with the
//! same group delay.

use std::f32::consts::PI;

use num_complex::Complex;

use crate::error::{DspError, DspResult};
use crate::fft::Fft;

/// Equalisation is skipped for bins where the delay image is this small.
const EQ_FLOOR: f32 = 0.001;
/// Bins that would need more than this much lift keep unit gain.
const EQ_MAX_RATIO: f32 = 2.0;

pub struct HilbertTransformer {
    /// Block length (`M`).
    block_len: usize,
    /// Transform length (`N`).
    image_len: usize,
    /// Filter length (`Q`).
    filter_len: usize,
    ht_upper: Vec<Complex<f32>>,
    ht_lower: Vec<Complex<f32>>,
    pass_upper: Vec<Complex<f32>>,
    pass_lower: Vec<Complex<f32>>,
    ht_gain: f32,
    pass_gain: f32,
    fft: Fft,
    /// `[history | block]` for the straight-through / real rail.
    i_save: Vec<Complex<f32>>,
    /// `[history | block]` for the quadrature rail of `apply_iq`.
    q_save: Vec<Complex<f32>>,
    i_work: Vec<Complex<f32>>,
    q_work: Vec<Complex<f32>>,
    real_scratch: Vec<Complex<f32>>,
}

impl HilbertTransformer {
    pub fn new(block_len: usize, filter_len: usize) -> DspResult<Self> {
        if block_len == 0 || filter_len == 0 {
            return Err(DspError::BadSize(format!(
                "hilbert transformer needs a non-empty block ({block_len}) and filter ({filter_len})"
            )));
        }
        let mut image_len = 4 * filter_len;
        while image_len < block_len + filter_len {
            image_len *= 2;
        }
        let q = image_len - block_len + 1;
        let centre = q / 2;

        let mut ht_upper = vec![Complex::new(0.0, 0.0); image_len];
        let mut ht_lower = vec![Complex::new(0.0, 0.0); image_len];
        for i in (1..centre).step_by(2) {
            let coeff = 1.0 / i as f32;
            ht_upper[centre + i] = Complex::new(coeff, 0.0);
            ht_upper[centre - i] = Complex::new(-coeff, 0.0);
            ht_lower[centre + i] = Complex::new(-coeff, 0.0);
            ht_lower[centre - i] = Complex::new(coeff, 0.0);
        }
        let mut delay = vec![Complex::new(0.0, 0.0); image_len];
        delay[centre] = Complex::new(1.0, 0.0);

        let mut fft = Fft::new(image_len);
        fft.forward(&mut ht_upper)?;
        fft.forward(&mut ht_lower)?;
        fft.forward(&mut delay)?;

        // Match the delay rail's magnitude to the truncated transformer so
        // the low and high band edges roll off together.
        let mut pass_upper = delay.clone();
        let mut pass_lower = delay;
        for k in 0..image_len {
            let pmag = pass_upper[k].norm();
            if pmag <= EQ_FLOOR {
                continue;
            }
            let uadj = equaliser(ht_upper[k].norm() / pmag);
            let ladj = equaliser(ht_lower[k].norm() / pmag);
            pass_upper[k] *= uadj;
            pass_lower[k] *= ladj;
        }

        // 1/N for the unnormalised inverse transform, 2/pi for the Hilbert
        // coefficients. The delay rail now has the same magnitude, so it
        // shares the gain.
        let ht_gain = 2.0 / (PI * image_len as f32);

        Ok(Self {
            block_len,
            image_len,
            filter_len: q,
            ht_upper,
            ht_lower,
            pass_upper,
            pass_lower,
            ht_gain,
            pass_gain: ht_gain,
            fft,
            i_save: vec![Complex::new(0.0, 0.0); image_len],
            q_save: vec![Complex::new(0.0, 0.0); image_len],
            i_work: vec![Complex::new(0.0, 0.0); image_len],
            q_work: vec![Complex::new(0.0, 0.0); image_len],
            real_scratch: vec![Complex::new(0.0, 0.0); block_len],
        })
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn image_len(&self) -> usize {
        self.image_len
    }

    pub fn filter_len(&self) -> usize {
        self.filter_len
    }

    /// Group delay of both rails, in samples.
    pub fn delay(&self) -> usize {
        self.filter_len / 2
    }

    /// Build an analytic signal from the real part of `input`.
    ///
    /// `output[i] = (delayed input, Hilbert(input))`. With `pos_sided` the
    /// quadrature rail is the plain Hilbert transform, giving a signal
    /// whose content is on the positive-frequency side; otherwise it is
    /// negated and the content lands on the negative side.
    pub fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        pos_sided: bool,
        gain: f32,
    ) -> DspResult<()> {
        self.check_sizes(input.len(), output.len())?;
        let history = self.image_len - self.block_len;

        self.i_save[history..].copy_from_slice(input);
        self.i_work.copy_from_slice(&self.i_save);
        self.i_save.copy_within(self.block_len.., 0);

        self.fft.forward(&mut self.i_work)?;
        let (ht, pass) = if pos_sided {
            (&self.ht_upper, &self.pass_upper)
        } else {
            (&self.ht_lower, &self.pass_lower)
        };
        for k in 0..self.image_len {
            let x = self.i_work[k];
            self.q_work[k] = x * ht[k];
            self.i_work[k] = x * pass[k];
        }
        self.fft.inverse(&mut self.i_work)?;
        self.fft.inverse(&mut self.q_work)?;

        self.collect(output, gain);
        Ok(())
    }

    /// Real-input form of [`HilbertTransformer::apply`].
    pub fn apply_real(
        &mut self,
        input: &[f32],
        output: &mut [Complex<f32>],
        pos_sided: bool,
        gain: f32,
    ) -> DspResult<()> {
        if input.len() != self.block_len {
            return Err(DspError::BadBufferSize {
                input: input.len(),
                output: output.len(),
                required: self.block_len,
            });
        }
        let mut scratch = std::mem::take(&mut self.real_scratch);
        for (slot, &x) in scratch.iter_mut().zip(input.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        let result = self.apply(&scratch, output, pos_sided, gain);
        self.real_scratch = scratch;
        result
    }

    /// Treat `input` as an I/Q pair: I goes through the delay rail, Q
    /// through the Hilbert rail.
    ///
    /// For content above 0 Hz the two output rails come out in
    /// anti-phase (`I + Q` cancels); for content below 0 Hz they come out
    /// in phase (`I - Q` cancels).
    pub fn apply_iq(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        gain: f32,
    ) -> DspResult<()> {
        self.check_sizes(input.len(), output.len())?;
        let history = self.image_len - self.block_len;

        for ((i_slot, q_slot), x) in self.i_save[history..]
            .iter_mut()
            .zip(self.q_save[history..].iter_mut())
            .zip(input.iter())
        {
            *i_slot = Complex::new(x.re, 0.0);
            *q_slot = Complex::new(x.im, 0.0);
        }
        self.i_work.copy_from_slice(&self.i_save);
        self.q_work.copy_from_slice(&self.q_save);
        self.i_save.copy_within(self.block_len.., 0);
        self.q_save.copy_within(self.block_len.., 0);

        self.fft.forward(&mut self.i_work)?;
        self.fft.forward(&mut self.q_work)?;
        for k in 0..self.image_len {
            self.i_work[k] *= self.pass_upper[k];
            self.q_work[k] *= self.ht_upper[k];
        }
        self.fft.inverse(&mut self.i_work)?;
        self.fft.inverse(&mut self.q_work)?;

        self.collect(output, gain);
        Ok(())
    }

    fn collect(&self, output: &mut [Complex<f32>], gain: f32) {
        let start = self.filter_len - 1;
        let i_rail = &self.i_work[start..];
        let q_rail = &self.q_work[start..];
        for ((out, i), q) in output.iter_mut().zip(i_rail).zip(q_rail) {
            *out = Complex::new(
                i.re * self.pass_gain * gain,
                q.re * self.ht_gain * gain,
            );
        }
    }

    fn check_sizes(&self, input: usize, output: usize) -> DspResult<()> {
        if input != self.block_len || output != self.block_len {
            return Err(DspError::BadBufferSize {
                input,
                output,
                required: self.block_len,
            });
        }
        Ok(())
    }
}

fn equaliser(ratio: f32) -> f32 {
    if ratio > EQ_MAX_RATIO {
        1.0
    } else {
        ratio
    }
}
