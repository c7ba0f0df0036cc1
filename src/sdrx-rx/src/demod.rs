// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-buffer demodulators.

use std::f32::consts::PI;

use num_complex::Complex;
use sdrx_core::ModulationType;
use sdrx_dsp::{DspResult, HilbertTransformer};

/// Peak NBFM deviation (Hz).
const NBFM_DEVIATION_HZ: f32 = 6.25e3;
/// Peak broadcast FM deviation (Hz).
const WBFM_DEVIATION_HZ: f32 = 75.0e3;
/// Extra discriminator gain so NBFM audio lands near the SSB level.
const NBFM_GAIN_BOOST: f32 = 4.0;
/// WBFM needs much more; its phase steps are tiny at the RF rate.
const WBFM_GAIN_BOOST: f32 = 32.0;

/// Default number of buffers the NBFM squelch stays open for.
pub const DEFAULT_SQUELCH_HANG: u32 = 5;

// ---------------------------------------------------------------------------
// SSB / CW
// ---------------------------------------------------------------------------

/// Phasing-method sideband demodulator.
pub struct SsbDemod {
    hilbert: HilbertTransformer,
    rails: Vec<Complex<f32>>,
}

impl SsbDemod {
    pub fn new(block_len: usize, filter_len: usize) -> DspResult<Self> {
        Ok(Self {
            hilbert: HilbertTransformer::new(block_len, filter_len)?,
            rails: vec![Complex::new(0.0, 0.0); block_len],
        })
    }

    pub fn block_len(&self) -> usize {
        self.hilbert.block_len()
    }

    /// Demodulate one block. `input` and `audio` must both be
    /// `block_len()` long.
    pub fn demodulate(
        &mut self,
        input: &[Complex<f32>],
        audio: &mut [f32],
        mode: ModulationType,
    ) -> DspResult<()> {
        self.hilbert.apply_iq(input, &mut self.rails, 1.0)?;
        // I + Q cancels the upper sideband, I - Q the lower.
        let sbmul = if mode.is_lower_sideband() { 1.0 } else { -1.0 };
        for (out, x) in audio.iter_mut().zip(self.rails.iter()) {
            *out = x.re + sbmul * x.im;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AM
// ---------------------------------------------------------------------------

/// Envelope detector. The result sits above DC and needs a band-pass
/// afterwards.
pub fn am_detect(input: &[Complex<f32>], audio: &mut Vec<f32>) {
    audio.clear();
    audio.extend(input.iter().map(|x| 0.5 * x.norm()));
}

// ---------------------------------------------------------------------------
// FM
// ---------------------------------------------------------------------------

/// Arctangent phase-difference discriminator.
#[derive(Debug, Clone)]
pub struct FmDiscriminator {
    gain: f32,
    last_phase: f32,
}

impl FmDiscriminator {
    /// Scale so that full deviation at `sample_rate` gives `boost`.
    pub fn new(sample_rate: f32, deviation_hz: f32, boost: f32) -> Self {
        Self {
            gain: boost / (PI * deviation_hz / sample_rate),
            last_phase: 0.0,
        }
    }

    pub fn nbfm(sample_rate: f32) -> Self {
        Self::new(sample_rate, NBFM_DEVIATION_HZ, NBFM_GAIN_BOOST)
    }

    pub fn wbfm(sample_rate: f32) -> Self {
        Self::new(sample_rate, WBFM_DEVIATION_HZ, WBFM_GAIN_BOOST)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.last_phase = 0.0;
    }

    /// Append one discriminator output per input sample.
    pub fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<f32>) {
        out.reserve(input.len());
        for x in input {
            let phase = x.arg();
            out.push(self.gain * wrap_phase(phase - self.last_phase));
            self.last_phase = phase;
        }
    }
}

/// Fold a phase step back into `[-pi, pi]`.
pub fn wrap_phase(mut dphase: f32) -> f32 {
    if dphase < -PI {
        dphase += 2.0 * PI;
    }
    if dphase > PI {
        dphase -= 2.0 * PI;
    }
    dphase
}

/// Sum of sample magnitudes, the squelch's signal measure.
pub fn magnitude_sum(input: &[Complex<f32>]) -> f32 {
    input.iter().map(|x| x.norm()).sum()
}

/// Carrier squelch with hang time, evaluated once per audio buffer.
///
/// A buffer whose magnitude sum exceeds the level opens the squelch and
/// reloads the hang counter. Below the level the squelch stays open for
/// `hang_time` more buffers and then outputs exact zeros.
#[derive(Debug, Clone)]
pub struct Squelch {
    level: f32,
    hang_time: u32,
    hang: u32,
}

impl Squelch {
    pub fn new(level: f32, hang_time: u32) -> Self {
        Self {
            level,
            hang_time,
            hang: 0,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level;
    }

    pub fn hang_time(&self) -> u32 {
        self.hang_time
    }

    pub fn is_open(&self) -> bool {
        self.hang > 0
    }

    /// Gate `audio` given the buffer's magnitude sum. Returns true when
    /// the buffer was muted.
    pub fn process(&mut self, magnitude: f32, audio: &mut [f32]) -> bool {
        if magnitude > self.level {
            self.hang = self.hang_time;
            false
        } else if self.hang > 0 {
            self.hang -= 1;
            false
        } else {
            audio.fill(0.0);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, rate: f32, len: usize, amp: f32) -> Vec<Complex<f32>> {
        (0..len)
            .map(|i| Complex::from_polar(amp, 2.0 * PI * freq * i as f32 / rate))
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn test_ssb_selects_sideband() {
        let (rate, block) = (48_000.0, 1024);
        let upper = tone(1500.0, rate, block * 8, 1.0);
        let lower = tone(-1500.0, rate, block * 8, 1.0);

        let run = |input: &[Complex<f32>], mode| {
            let mut demod = SsbDemod::new(block, 256).unwrap();
            let mut audio = vec![0.0f32; block];
            let mut last = 0.0;
            for chunk in input.chunks(block) {
                demod.demodulate(chunk, &mut audio, mode).unwrap();
                last = rms(&audio);
            }
            last
        };

        let usb_on_upper = run(&upper, ModulationType::Usb);
        let usb_on_lower = run(&lower, ModulationType::Usb);
        let lsb_on_lower = run(&lower, ModulationType::Lsb);
        let lsb_on_upper = run(&upper, ModulationType::CwL);

        assert!(usb_on_upper > 1.0, "usb passes upper: {usb_on_upper}");
        assert!(usb_on_lower < 0.05 * usb_on_upper, "usb rejects lower: {usb_on_lower}");
        assert!(lsb_on_lower > 1.0, "lsb passes lower: {lsb_on_lower}");
        assert!(lsb_on_upper < 0.05 * lsb_on_lower, "lsb rejects upper: {lsb_on_upper}");
    }

    #[test]
    fn test_am_detects_envelope() {
        let input = vec![Complex::new(3.0, 4.0), Complex::new(0.0, -2.0)];
        let mut audio = vec![9.0];
        am_detect(&input, &mut audio);
        assert_eq!(audio, vec![2.5, 1.0]);
    }

    #[test]
    fn test_discriminator_tracks_frequency_across_wrap() {
        let rate = 48_000.0;
        let mut disc = FmDiscriminator::new(rate, 12_000.0, 1.0);
        let mut out = Vec::new();
        // 6 kHz is an eighth of a turn per sample, so the phase wraps
        // every eight samples. Half the deviation reads as 1.0.
        disc.process(&tone(6000.0, rate, 64, 1.0), &mut out);
        for v in &out[1..] {
            assert!((v - 1.0).abs() < 1e-3, "got {v}");
        }
        out.clear();
        disc.process(&tone(-3000.0, rate, 16, 1.0)[1..], &mut out);
        assert!((out.last().copied().unwrap() + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(1.5 * PI) + 0.5 * PI).abs() < 1e-6);
        assert!((wrap_phase(-1.5 * PI) - 0.5 * PI).abs() < 1e-6);
        assert_eq!(wrap_phase(0.25), 0.25);
    }

    #[test]
    fn test_fm_gains() {
        let nbfm = FmDiscriminator::nbfm(48_000.0);
        assert!((nbfm.gain() - 4.0 / (PI * 6.25e3 / 48_000.0)).abs() < 1e-4);
        let wbfm = FmDiscriminator::wbfm(480_000.0);
        assert!((wbfm.gain() - 32.0 / (PI * 75.0e3 / 480_000.0)).abs() < 1e-3);
    }

    #[test]
    fn test_squelch_hangs_for_exactly_hang_time_buffers() {
        let mut sq = Squelch::new(100.0, DEFAULT_SQUELCH_HANG);
        let mut audio = [1.0f32; 4];

        assert!(sq.process(0.0, &mut audio), "starts closed");
        assert_eq!(audio, [0.0; 4]);

        for _ in 0..3 {
            let mut audio = [1.0f32; 4];
            assert!(!sq.process(500.0, &mut audio));
            assert_eq!(audio, [1.0; 4]);
        }
        for n in 0..DEFAULT_SQUELCH_HANG {
            let mut audio = [1.0f32; 4];
            assert!(!sq.process(1.0, &mut audio), "hang buffer {n} is open");
            assert_eq!(audio, [1.0; 4]);
        }
        let mut audio = [1.0f32; 4];
        assert!(sq.process(1.0, &mut audio));
        assert_eq!(audio, [0.0; 4]);
        assert!(!sq.is_open());
    }
}
