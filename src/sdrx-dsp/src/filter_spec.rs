// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Declarative frequency-response description for FFT-domain FIR filters.
//!
//! A spec is a list of `(frequency, gain_dB)` corners. Between corners the
//! linear amplitude is interpolated geometrically (a straight line in dB),
//! and the band outside the first and last corner rolls off to
//! [`MIN_GAIN_DB`].

use num_complex::Complex;

use crate::error::{DspError, DspResult};

/// Floor for corner gains; keeps the logarithms well defined.
pub const MIN_GAIN_DB: f32 = -200.0;

/// Assumed stopband attenuation (dB) for the tap estimate.
const ESTIMATE_ATTEN_DB: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Real-valued filter: corners must be at or above 0 Hz and the
    /// response is mirrored onto the negative half of the band.
    Real,
    /// Complex filter: corners span the whole `-Fs/2 .. Fs/2` range.
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub freq: f32,
    pub gain_db: f32,
}

impl Corner {
    fn amplitude(&self) -> f32 {
        db_to_amplitude(self.gain_db)
    }
}

fn db_to_amplitude(gain_db: f32) -> f32 {
    10f32.powf(0.05 * gain_db)
}

#[derive(Debug, Clone)]
pub struct FilterSpec {
    sample_rate: f32,
    taps: usize,
    kind: FilterKind,
    /// Kept sorted by frequency; equal frequencies keep insertion order.
    corners: Vec<Corner>,
}

impl FilterSpec {
    pub fn new(sample_rate: f32, taps: usize, kind: FilterKind) -> Self {
        Self {
            sample_rate,
            taps,
            kind,
            corners: Vec::new(),
        }
    }

    /// Add a corner at the lower band edge (`-Fs/2`, or 0 Hz for a REAL spec).
    pub fn start(&mut self, gain_db: f32) -> &mut Self {
        let freq = self.band_start();
        self.insert(Corner {
            freq,
            gain_db: gain_db.max(MIN_GAIN_DB),
        });
        self
    }

    /// Append a corner.
    pub fn add(&mut self, freq: f32, gain_db: f32) -> DspResult<&mut Self> {
        if self.kind == FilterKind::Real && freq < 0.0 {
            return Err(DspError::BadRealSpec { freq });
        }
        self.insert(Corner {
            freq,
            gain_db: gain_db.max(MIN_GAIN_DB),
        });
        Ok(self)
    }

    fn insert(&mut self, corner: Corner) {
        let pos = self.corners.partition_point(|c| c.freq <= corner.freq);
        self.corners.insert(pos, corner);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn set_taps(&mut self, taps: usize) {
        self.taps = taps;
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    fn band_start(&self) -> f32 {
        match self.kind {
            FilterKind::Real => 0.0,
            FilterKind::Complex => -self.sample_rate / 2.0,
        }
    }

    /// Prototype bin for `freq`: `round((freq + Fs/2) / Fs * taps)`,
    /// clamped to the prototype length.
    pub fn index_hproto(&self, freq: f32) -> usize {
        let half = self.sample_rate / 2.0;
        let pos = ((freq + half) / self.sample_rate) * self.taps as f32 + 0.5;
        if pos <= 0.0 {
            return 0;
        }
        (pos.floor() as usize).min(self.taps.saturating_sub(1))
    }

    /// Frequency represented by prototype bin `index`, measured from the
    /// bin that holds 0 Hz.
    pub fn hproto_freq(&self, index: usize) -> f32 {
        let dc = self.index_hproto(0.0) as f32;
        (index as f32 - dc) * self.sample_rate / self.taps as f32
    }

    /// Fill a centred (`-Fs/2 .. Fs/2`) frequency-domain prototype of
    /// `taps` bins from the corner list.
    pub fn fill_hproto(&self, hproto: &mut [Complex<f32>]) -> DspResult<()> {
        if hproto.len() != self.taps {
            return Err(DspError::BadBufferSize {
                input: hproto.len(),
                output: hproto.len(),
                required: self.taps,
            });
        }
        hproto.fill(Complex::new(0.0, 0.0));
        if self.taps == 0 {
            return Ok(());
        }

        let floor = Corner {
            freq: self.band_start(),
            gain_db: MIN_GAIN_DB,
        };
        let top = Corner {
            freq: self.sample_rate / 2.0,
            gain_db: MIN_GAIN_DB,
        };
        let mut last = floor;
        for &corner in self.corners.iter().chain(std::iter::once(&top)) {
            self.fill_segment(hproto, last, corner);
            last = corner;
        }

        if self.kind == FilterKind::Real {
            // Mirror the positive half so the impulse response comes out real.
            let dc = self.index_hproto(0.0);
            for idx in 0..dc {
                hproto[idx] = hproto[(2 * dc - idx) % self.taps];
            }
        }
        Ok(())
    }

    fn fill_segment(&self, hproto: &mut [Complex<f32>], from: Corner, to: Corner) {
        let start = self.index_hproto(from.freq);
        let end = self.index_hproto(to.freq);
        let (a_from, a_to) = (from.amplitude(), to.amplitude());
        if start >= end {
            let amp = a_from.max(a_to).max(hproto[start].re);
            hproto[start] = Complex::new(amp, 0.0);
            return;
        }
        let ratio = a_to / a_from;
        let span = (end - start) as f32;
        for (step, slot) in hproto[start..=end].iter_mut().enumerate() {
            let amp = a_from * ratio.powf(step as f32 / span);
            *slot = Complex::new(amp, 0.0);
        }
    }

    /// Estimate the tap count for the narrowest transition in the spec.
    ///
    /// Uses the harris rule `Fs * atten / (22 * transition)` with 40 dB of
    /// stopband attenuation, rounded to the nearest odd integer and clamped
    /// to `[min, max]`. Specs without any transition get `min`.
    pub fn estimate_taps(&self, min: usize, max: usize) -> usize {
        let narrowest = self
            .corners
            .windows(2)
            .filter(|pair| pair[0].gain_db != pair[1].gain_db && pair[1].freq > pair[0].freq)
            .map(|pair| pair[1].freq - pair[0].freq)
            .fold(f32::INFINITY, f32::min);
        if !narrowest.is_finite() {
            return min;
        }
        let ftaps = self.sample_rate * ESTIMATE_ATTEN_DB / (narrowest * 22.0);
        let mut taps = ftaps.round() as usize;
        if taps % 2 == 0 {
            taps += 1;
        }
        taps.clamp(min, max.max(min))
    }

    /// Passband edges: the first corner whose amplitude rises above 99% of
    /// full scale, and the last corner before the amplitude drops back
    /// under 10%.
    pub fn filter_edges(&self) -> (f32, f32) {
        let mut low = self.band_start();
        let mut high = self.sample_rate / 2.0;
        let mut in_band = false;
        let mut last_freq = low;
        for corner in &self.corners {
            let amp = corner.amplitude();
            if !in_band {
                if amp > 0.99 {
                    low = corner.freq;
                    in_band = true;
                }
            } else if amp < 0.1 {
                high = last_freq;
                break;
            }
            last_freq = corner.freq;
        }
        (low, high)
    }
}
