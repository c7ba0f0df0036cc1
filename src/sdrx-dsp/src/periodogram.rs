// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;

use num_complex::Complex;

use crate::error::{DspError, DspResult};
use crate::fft::Fft;

/// Analysis window applied to every segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    #[default]
    Hann,
    Blackman,
}

impl Window {
    fn coefficients(self, len: usize) -> Vec<f32> {
        let m = (len.max(2) - 1) as f32;
        (0..len)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / m;
                match self {
                    Window::Hann => 0.5 * (1.0 - x.cos()),
                    Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

/// Windowed, 50%-overlapped magnitude-spectrum accumulator.
///
/// With `alpha == 0` segments are summed and [`Periodogram::scale_factor`]
/// undoes the count; otherwise each segment is blended in as
/// `acc = alpha * new + (1 - alpha) * acc`.
pub struct Periodogram {
    segment_len: usize,
    alpha: f32,
    beta: f32,
    summing: bool,
    window: Vec<f32>,
    fft_scale: f32,
    fft: Fft,
    work: Vec<Complex<f32>>,
    pending: Vec<Complex<f32>>,
    acc: Vec<f32>,
    count: usize,
}

impl Periodogram {
    pub fn new(segment_len: usize, alpha: f32, window: Window) -> DspResult<Self> {
        if segment_len < 2 {
            return Err(DspError::BadSize(format!(
                "periodogram segment length {segment_len} is too short"
            )));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(DspError::BadSize(format!(
                "periodogram alpha {alpha} is outside 0..=1"
            )));
        }
        let window = window.coefficients(segment_len);
        let avg_window = window.iter().sum::<f32>() / segment_len as f32;
        let summing = alpha == 0.0;
        let (alpha, beta) = if summing { (1.0, 1.0) } else { (alpha, 1.0 - alpha) };
        Ok(Self {
            segment_len,
            alpha,
            beta,
            summing,
            window,
            fft_scale: 1.0 / (segment_len as f32 * avg_window),
            fft: Fft::new(segment_len),
            work: vec![Complex::new(0.0, 0.0); segment_len],
            pending: Vec::with_capacity(2 * segment_len),
            acc: vec![0.0; segment_len],
            count: 0,
        })
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Feed samples; every complete segment (advancing by half a segment)
    /// is folded into the accumulator. Leftovers wait for the next call.
    pub fn accumulate(&mut self, input: &[Complex<f32>]) -> DspResult<()> {
        self.pending.extend_from_slice(input);
        let hop = self.segment_len / 2;
        let mut start = 0;
        while self.pending.len() - start >= self.segment_len {
            for ((w, &x), &win) in self
                .work
                .iter_mut()
                .zip(&self.pending[start..start + self.segment_len])
                .zip(&self.window)
            {
                *w = x * win;
            }
            self.fft.forward(&mut self.work)?;
            for (acc, x) in self.acc.iter_mut().zip(&self.work) {
                *acc = self.alpha * x.norm() * self.fft_scale + self.beta * *acc;
            }
            self.count += 1;
            start += hop.max(1);
        }
        self.pending.drain(..start);
        Ok(())
    }

    /// Accumulated magnitudes in natural FFT bin order.
    pub fn get(&self) -> &[f32] {
        &self.acc
    }

    /// Multiplier that normalises [`Periodogram::get`] to per-segment
    /// magnitude.
    pub fn scale_factor(&self) -> f32 {
        if self.summing && self.count > 0 {
            1.0 / self.count as f32
        } else {
            1.0
        }
    }

    pub fn accumulation_count(&self) -> usize {
        self.count
    }

    pub fn clear(&mut self) {
        self.acc.fill(0.0);
        self.pending.clear();
        self.count = 0;
    }

    /// Normalised spectrum in dB with 0 Hz in the middle, for display.
    pub fn to_db_centered(&self) -> Vec<f32> {
        let scale = self.scale_factor();
        let mut db: Vec<f32> = self
            .acc
            .iter()
            .map(|&mag| 20.0 * (mag * scale).max(1e-10).log10())
            .collect();
        // Same placement as `fftshift`: bin 0 lands at index n / 2.
        db.rotate_right(self.segment_len / 2);
        db
    }
}
