// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FFT-domain FIR filter built from a [`FilterSpec`].

use std::f32::consts::PI;

use num_complex::Complex;

use crate::block_op::BlockOp;
use crate::error::{DspError, DspResult};
use crate::fft::{fftshift, Fft};
use crate::filter_spec::FilterSpec;

fn hamming(i: usize, taps: usize) -> f32 {
    if taps <= 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * i as f32 / (taps - 1) as f32).cos()
}

/// A FIR filter held as its frequency image `H` of length `image_size`.
///
/// `apply` is one circular convolution over a full image; there is no
/// state carried between calls. Wrap it in an [`crate::OsFilter`] to
/// filter a continuous stream.
pub struct Filter {
    sample_rate: f32,
    taps: usize,
    image: Vec<Complex<f32>>,
    fft: Fft,
    work: Vec<Complex<f32>>,
}

impl Filter {
    pub fn new(spec: &FilterSpec, image_size: usize) -> DspResult<Self> {
        if spec.corners().is_empty() {
            return Err(DspError::EmptySpec);
        }
        let taps = spec.taps();
        if taps == 0 {
            return Err(DspError::BadSize("filter spec has zero taps".into()));
        }
        if image_size < taps {
            return Err(DspError::BadSize(format!(
                "image size {image_size} is smaller than the {taps}-tap filter"
            )));
        }

        let mut hproto = vec![Complex::new(0.0, 0.0); taps];
        spec.fill_hproto(&mut hproto)?;

        // Centred prototype -> natural bin order.
        let dc = spec.index_hproto(0.0);
        let mut natural: Vec<Complex<f32>> =
            (0..taps).map(|i| hproto[(i + dc) % taps]).collect();
        Fft::new(taps).inverse(&mut natural)?;

        // Time zero to the middle of the tap window, then taper.
        let mut centred = vec![Complex::new(0.0, 0.0); taps];
        fftshift(&natural, &mut centred)?;

        let mut image = vec![Complex::new(0.0, 0.0); image_size];
        for (i, (slot, h)) in image.iter_mut().zip(centred.iter()).enumerate() {
            *slot = *h * (hamming(i, taps) / taps as f32);
        }

        let mut fft = Fft::new(image_size);
        fft.forward(&mut image)?;
        let scale = 1.0 / image_size as f32;
        for h in &mut image {
            *h *= scale;
        }

        Ok(Self {
            sample_rate: spec.sample_rate(),
            taps,
            image,
            fft,
            work: vec![Complex::new(0.0, 0.0); image_size],
        })
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn image_size(&self) -> usize {
        self.image.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frequency image, already scaled by `1 / image_size`.
    pub fn image(&self) -> &[Complex<f32>] {
        &self.image
    }

    /// Complex gain of the filter at `freq` Hz (nearest image bin).
    pub fn response_at(&self, freq: f32) -> Complex<f32> {
        let n = self.image.len() as f32;
        let bin = (freq / self.sample_rate * n).round() as i64;
        let idx = bin.rem_euclid(self.image.len() as i64) as usize;
        self.image[idx] * n
    }

    /// `output = IFFT(FFT(input) * H) * gain`; both buffers must be
    /// exactly `image_size` long.
    pub fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        gain: f32,
    ) -> DspResult<()> {
        self.check_sizes(input.len(), output.len())?;
        self.work.copy_from_slice(input);
        self.convolve()?;
        for (out, w) in output.iter_mut().zip(self.work.iter()) {
            *out = *w * gain;
        }
        Ok(())
    }

    /// Real-valued variant of [`Filter::apply`]; keeps the real part.
    pub fn apply_real(&mut self, input: &[f32], output: &mut [f32], gain: f32) -> DspResult<()> {
        self.check_sizes(input.len(), output.len())?;
        for (w, &x) in self.work.iter_mut().zip(input.iter()) {
            *w = Complex::new(x, 0.0);
        }
        self.convolve()?;
        for (out, w) in output.iter_mut().zip(self.work.iter()) {
            *out = w.re * gain;
        }
        Ok(())
    }

    fn convolve(&mut self) -> DspResult<()> {
        self.fft.forward(&mut self.work)?;
        for (x, h) in self.work.iter_mut().zip(self.image.iter()) {
            *x *= *h;
        }
        self.fft.inverse(&mut self.work)
    }

    fn check_sizes(&self, input: usize, output: usize) -> DspResult<()> {
        let required = self.image.len();
        if input != required || output != required {
            return Err(DspError::BadBufferSize {
                input,
                output,
                required,
            });
        }
        Ok(())
    }
}

impl BlockOp for Filter {
    fn input_len(&self) -> usize {
        self.image.len()
    }

    fn output_len(&self) -> usize {
        self.image.len()
    }

    fn history_len(&self) -> usize {
        self.taps - 1
    }

    fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        gain: f32,
    ) -> DspResult<()> {
        Filter::apply(self, input, output, gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_spec::FilterKind;

    fn bandpass(taps: usize) -> FilterSpec {
        let mut spec = FilterSpec::new(8000.0, taps, FilterKind::Complex);
        spec.add(300.0, -60.0)
            .unwrap()
            .add(500.0, 0.0)
            .unwrap()
            .add(2000.0, 0.0)
            .unwrap()
            .add(2200.0, -60.0)
            .unwrap();
        spec
    }

    #[test]
    fn test_image_size_must_cover_taps() {
        let spec = bandpass(255);
        assert!(matches!(
            Filter::new(&spec, 128),
            Err(DspError::BadSize(_))
        ));
    }

    #[test]
    fn test_apply_rejects_wrong_buffer_size() {
        let mut filter = Filter::new(&bandpass(127), 512).unwrap();
        let input = vec![Complex::new(0.0, 0.0); 511];
        let mut output = vec![Complex::new(0.0, 0.0); 512];
        assert_eq!(
            filter.apply(&input, &mut output, 1.0),
            Err(DspError::BadBufferSize {
                input: 511,
                output: 512,
                required: 512
            })
        );
    }

    #[test]
    fn test_response_matches_spec() {
        let filter = Filter::new(&bandpass(255), 1024).unwrap();
        for freq in [700.0, 1000.0, 1500.0, 1800.0] {
            let db = 20.0 * filter.response_at(freq).norm().log10();
            assert!(db.abs() < 1.0, "passband {freq} Hz: {db} dB");
        }
        for freq in [-2000.0, -1000.0, 0.0, 3000.0] {
            let db = 20.0 * filter.response_at(freq).norm().log10();
            assert!(db < -35.0, "stopband {freq} Hz: {db} dB");
        }
    }

    #[test]
    fn test_impulse_is_linear_phase_and_causal() {
        let taps = 63;
        let mut filter = Filter::new(&bandpass(taps), 256).unwrap();
        let mut input = vec![Complex::new(0.0, 0.0); 256];
        input[0] = Complex::new(1.0, 0.0);
        let mut output = vec![Complex::new(0.0, 0.0); 256];
        filter.apply(&input, &mut output, 1.0).unwrap();
        for (i, sample) in output.iter().enumerate().skip(taps) {
            assert!(sample.norm() < 1e-5, "tap {i} outside the window");
        }
        // Peak energy sits in the middle of the tap window.
        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, taps / 2);
    }

    #[test]
    fn test_apply_real_lowpass() {
        let mut spec = FilterSpec::new(8000.0, 101, FilterKind::Real);
        spec.start(0.0);
        spec.add(1000.0, 0.0).unwrap().add(1400.0, -60.0).unwrap();
        let mut filter = Filter::new(&spec, 512).unwrap();
        // A bin-centred 500 Hz tone passes, a 3000 Hz tone is rejected.
        let tone = |f: f32| -> Vec<f32> {
            (0..512)
                .map(|i| (2.0 * PI * f * i as f32 / 8000.0).cos())
                .collect()
        };
        let mut out = vec![0.0; 512];
        filter.apply_real(&tone(500.0), &mut out, 1.0).unwrap();
        let pass = out.iter().map(|x| x * x).sum::<f32>() / 512.0;
        filter.apply_real(&tone(3000.0), &mut out, 1.0).unwrap();
        let stop = out.iter().map(|x| x * x).sum::<f32>() / 512.0;
        assert!((pass - 0.5).abs() < 0.05, "pass power {pass}");
        assert!(stop < 1e-4, "stop power {stop}");
    }
}
