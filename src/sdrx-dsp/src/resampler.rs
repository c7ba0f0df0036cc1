// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rational `U/D` sample-rate converter working in the frequency domain.
//!
//! A block of `L` inputs is transformed once. Zero-stuffing by `U` only
//! replicates that spectrum, so the interpolation filter is applied to the
//! replicated spectrum directly, and decimation by `D` is an aliasing fold
//! of the `L * U` bins down to `L * U / D` bins before a single inverse
//! transform.

use num_complex::Complex;
use tracing::debug;

use crate::block_op::BlockOp;
use crate::error::{DspError, DspResult};
use crate::fft::{good_size, Fft};
use crate::filter::Filter;
use crate::filter_spec::{FilterKind, FilterSpec};

const PASS_FRACTION: f32 = 0.4;
const STOP_FRACTION: f32 = 0.5;
const STOP_GAIN_DB: f32 = -100.0;
const MIN_TAPS: usize = 15;
const MAX_TAPS_PER_PHASE: usize = 512;
/// How many multiples of `D` to try when looking for an FFT-friendly block.
const BLOCK_SEARCH: usize = 64;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

pub struct Resampler {
    in_rate: u32,
    out_rate: u32,
    interp: usize,
    decim: usize,
    taps: usize,
    history: usize,
    in_len: usize,
    out_len: usize,
    /// Interpolation filter over `in_len * U` bins, scaled for the fold.
    image: Vec<Complex<f32>>,
    fft_in: Fft,
    fft_out: Fft,
    spectrum: Vec<Complex<f32>>,
    fold: Vec<Complex<f32>>,
}

impl Resampler {
    /// Build a converter from `in_rate` to `out_rate` that accepts at least
    /// `block_len` new samples per block on top of its own history.
    pub fn new(in_rate: u32, out_rate: u32, block_len: usize) -> DspResult<Self> {
        if in_rate == 0 || out_rate == 0 {
            return Err(DspError::BadRate(format!(
                "cannot resample {in_rate} Hz to {out_rate} Hz"
            )));
        }
        if block_len == 0 {
            return Err(DspError::BadSize("resampler block length is zero".into()));
        }
        let g = gcd(in_rate as u64, out_rate as u64);
        let interp = (out_rate as u64 / g) as usize;
        let decim = (in_rate as u64 / g) as usize;

        let up_rate = interp as f32 * in_rate as f32;
        let narrow = in_rate.min(out_rate) as f32;
        let (pass, stop) = (PASS_FRACTION * narrow, STOP_FRACTION * narrow);
        let mut spec = FilterSpec::new(up_rate, 0, FilterKind::Complex);
        spec.add(-stop, STOP_GAIN_DB)?
            .add(-pass, 0.0)?
            .add(pass, 0.0)?
            .add(stop, STOP_GAIN_DB)?;
        let taps = spec.estimate_taps(MIN_TAPS, MAX_TAPS_PER_PHASE * interp + 1);
        spec.set_taps(taps);

        let history = (taps - 1).div_ceil(interp).next_multiple_of(decim);
        let in_len = pick_block_len(history + block_len, interp, decim);
        let out_len = in_len * interp / decim;

        let filter = Filter::new(&spec, in_len * interp)?;
        let scale = interp as f32;
        let image = filter.image().iter().map(|h| *h * scale).collect();

        debug!(
            "resampler {} -> {} Hz: U={} D={} taps={} block={} -> {}",
            in_rate, out_rate, interp, decim, taps, in_len, out_len
        );

        Ok(Self {
            in_rate,
            out_rate,
            interp,
            decim,
            taps,
            history,
            in_len,
            out_len,
            image,
            fft_in: Fft::new(in_len),
            fft_out: Fft::new(out_len),
            spectrum: vec![Complex::new(0.0, 0.0); in_len],
            fold: vec![Complex::new(0.0, 0.0); out_len],
        })
    }

    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    pub fn taps(&self) -> usize {
        self.taps
    }
}

/// Smallest multiple of `decim` covering `min_len`, preferring one where
/// both the input and the output transform lengths factor into 2, 3 and 5.
fn pick_block_len(min_len: usize, interp: usize, decim: usize) -> usize {
    let first = min_len.next_multiple_of(decim);
    (0..BLOCK_SEARCH)
        .map(|k| first + k * decim)
        .find(|&len| good_size(len) == len && good_size(len * interp / decim) == len * interp / decim)
        .unwrap_or(first)
}

impl BlockOp for Resampler {
    fn input_len(&self) -> usize {
        self.in_len
    }

    fn output_len(&self) -> usize {
        self.out_len
    }

    fn ratio(&self) -> (usize, usize) {
        (self.interp, self.decim)
    }

    fn history_len(&self) -> usize {
        self.history
    }

    fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [Complex<f32>],
        gain: f32,
    ) -> DspResult<()> {
        if input.len() != self.in_len || output.len() != self.out_len {
            return Err(DspError::BadBufferSize {
                input: input.len(),
                output: output.len(),
                required: self.in_len,
            });
        }
        self.spectrum.copy_from_slice(input);
        self.fft_in.forward(&mut self.spectrum)?;

        for (k, slot) in self.fold.iter_mut().enumerate() {
            let mut acc = Complex::new(0.0, 0.0);
            let mut idx = k;
            while idx < self.image.len() {
                acc += self.spectrum[idx % self.in_len] * self.image[idx];
                idx += self.out_len;
            }
            *slot = acc * gain;
        }

        self.fft_out.inverse(&mut self.fold)?;
        output.copy_from_slice(&self.fold);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os_filter::OsFilter;
    use std::f32::consts::TAU;

    fn tone(freq: f32, rate: f32, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| Complex::from_polar(1.0, TAU * freq * n as f32 / rate))
            .collect()
    }

    fn run(resampler: Resampler, input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut os = OsFilter::from_op(resampler).unwrap();
        let mut out = Vec::new();
        os.apply(input, &mut out, 1.0).unwrap();
        out
    }

    #[test]
    fn test_ratio_is_reduced() {
        let r = Resampler::new(48_000, 8_000, 600).unwrap();
        assert_eq!(r.ratio(), (1, 6));
        let r = Resampler::new(625_000, 48_000, 3000).unwrap();
        assert_eq!(r.ratio(), (48, 625));
        assert_eq!(r.input_len() % 625, 0);
        assert_eq!(r.output_len(), r.input_len() * 48 / 625);
    }

    #[test]
    fn test_bad_rates() {
        assert!(matches!(
            Resampler::new(0, 8000, 10),
            Err(DspError::BadRate(_))
        ));
    }

    #[test]
    fn test_decimate_passes_inband_tone() {
        let input = tone(1000.0, 48_000.0, 4800);
        let out = run(Resampler::new(48_000, 8_000, 600).unwrap(), &input);
        assert_eq!(out.len(), 800);
        for (i, sample) in out.iter().enumerate().skip(100) {
            assert!((sample.norm() - 1.0).abs() < 0.02, "sample {i}: {}", sample.norm());
            // Successive outputs advance by 1000/8000 of a turn.
            let step = (*sample * out[i - 1].conj()).arg();
            assert!((step - TAU / 8.0).abs() < 0.01, "phase step {step}");
        }
    }

    #[test]
    fn test_decimate_rejects_out_of_band_tone() {
        let input = tone(-9000.0, 48_000.0, 4800);
        let out = run(Resampler::new(48_000, 8_000, 600).unwrap(), &input);
        let power = out[100..].iter().map(|s| s.norm_sqr()).sum::<f32>() / 700.0;
        assert!(power < 1e-3, "alias power {power}");
    }

    #[test]
    fn test_interpolate_keeps_amplitude() {
        let input = tone(-700.0, 8_000.0, 800);
        let out = run(Resampler::new(8_000, 48_000, 200).unwrap(), &input);
        assert_eq!(out.len(), 4800);
        for (i, sample) in out.iter().enumerate().skip(600) {
            assert!((sample.norm() - 1.0).abs() < 0.02, "sample {i}: {}", sample.norm());
        }
    }

    #[test]
    fn test_chunked_stream_matches_single_call() {
        let input = tone(1500.0, 48_000.0, 6000);
        let expected = run(Resampler::new(48_000, 8_000, 600).unwrap(), &input);
        let mut os = OsFilter::from_op(Resampler::new(48_000, 8_000, 600).unwrap()).unwrap();
        let mut out = Vec::new();
        for chunk in input.chunks(6 * 37) {
            os.apply(chunk, &mut out, 1.0).unwrap();
        }
        assert_eq!(out.len(), expected.len());
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((*a - *b).norm() < 1e-4);
        }
    }

    #[test]
    fn test_odd_chunk_is_rejected() {
        let mut os = OsFilter::from_op(Resampler::new(48_000, 8_000, 600).unwrap()).unwrap();
        let mut out = Vec::new();
        assert!(os.apply(&tone(0.0, 1.0, 7), &mut out, 1.0).is_err());
    }
}
