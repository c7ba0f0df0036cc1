// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Band-pass filters used by the receive chain.

use std::collections::HashMap;

use num_complex::Complex;
use sdrx_core::AudioFilterBw;
use sdrx_dsp::{good_size, DspResult, Filter, FilterKind, FilterSpec, OsFilter};

const MIN_TAPS: usize = 31;
const MAX_TAPS: usize = 1023;
const STOP_DB: f32 = -60.0;

/// Passband and skirt width in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f32,
    pub high: f32,
    pub skirt: f32,
}

impl Band {
    pub const fn new(low: f32, high: f32, skirt: f32) -> Self {
        Self { low, high, skirt }
    }
}

pub const FM_AUDIO_BAND: Band = Band::new(100.0, 8000.0, 100.0);
pub const AM_PRE_BAND: Band = Band::new(10.0, 8000.0, 100.0);
pub const AM_AUDIO_BAND: Band = Band::new(300.0, 6300.0, 100.0);
pub const NBFM_PRE_BAND: Band = Band::new(10.0, 12_500.0, 1000.0);

/// Passband for each RX_AF_FILTER selection. `BW_NULL` has none.
pub fn audio_band(bw: AudioFilterBw) -> Option<Band> {
    match bw {
        AudioFilterBw::Bw100 => Some(Band::new(400.0, 500.0, 100.0)),
        AudioFilterBw::Bw500 => Some(Band::new(400.0, 900.0, 100.0)),
        AudioFilterBw::Bw2000 => Some(Band::new(300.0, 2300.0, 100.0)),
        AudioFilterBw::Bw6000 => Some(Band::new(300.0, 6300.0, 100.0)),
        AudioFilterBw::BwWspr => Some(Band::new(1300.0, 1800.0, 100.0)),
        AudioFilterBw::BwPass => Some(Band::new(-10.0, 15_000.0, 3000.0)),
        AudioFilterBw::BwNull => None,
    }
}

/// A streaming real-symmetric band-pass filter.
///
/// The response is mirrored about 0 Hz, so it passes both sidebands of a
/// complex signal; sideband selection happens later in the demodulator.
pub struct BandFilter {
    filter: OsFilter<Filter>,
    band: Band,
    edges: (f32, f32),
}

impl BandFilter {
    pub fn new(sample_rate: f32, band: Band, block_len: usize) -> DspResult<Self> {
        let mut spec = FilterSpec::new(sample_rate, MIN_TAPS, FilterKind::Real);
        let lower_stop = band.low - band.skirt;
        if lower_stop > 0.0 {
            spec.start(STOP_DB);
            spec.add(lower_stop, STOP_DB)?.add(band.low, 0.0)?;
        } else if band.low > 0.0 {
            spec.start(STOP_DB);
            spec.add(band.low, 0.0)?;
        } else {
            // Lowpass.
            spec.start(0.0);
        }
        spec.add(band.high, 0.0)?
            .add(band.high + band.skirt, STOP_DB)?;

        let taps = spec.estimate_taps(MIN_TAPS, MAX_TAPS);
        spec.set_taps(taps);
        let edges = spec.filter_edges();
        let image = good_size(taps - 1 + block_len.max(1));
        let filter = OsFilter::from_op(Filter::new(&spec, image)?)?;
        Ok(Self {
            filter,
            band,
            edges,
        })
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Passband edges as reported by the filter spec.
    pub fn edges(&self) -> (f32, f32) {
        self.edges
    }

    pub fn taps(&self) -> usize {
        self.filter.op().taps()
    }

    pub fn apply(
        &mut self,
        input: &[Complex<f32>],
        output: &mut Vec<Complex<f32>>,
        gain: f32,
    ) -> DspResult<usize> {
        self.filter.apply(input, output, gain)
    }

    pub fn apply_real(&mut self, input: &[f32], output: &mut Vec<f32>, gain: f32) -> DspResult<usize> {
        self.filter.apply_real(input, output, gain)
    }

    pub fn reset(&mut self) {
        self.filter.reset();
    }
}

/// One [`BandFilter`] per RX_AF_FILTER selection, all at the audio rate.
pub struct AudioFilterBank {
    filters: HashMap<AudioFilterBw, BandFilter>,
}

impl AudioFilterBank {
    pub fn new(audio_rate: f32, block_len: usize) -> DspResult<Self> {
        let mut filters = HashMap::new();
        for bw in AudioFilterBw::ALL {
            if let Some(band) = audio_band(bw) {
                filters.insert(bw, BandFilter::new(audio_rate, band, block_len)?);
            }
        }
        Ok(Self { filters })
    }

    /// `bw` if the bank has a filter for it, else the 6 kHz voice filter.
    pub fn resolve(&self, bw: AudioFilterBw) -> AudioFilterBw {
        if self.filters.contains_key(&bw) {
            bw
        } else {
            AudioFilterBw::Bw6000
        }
    }

    pub fn get(&self, bw: AudioFilterBw) -> Option<&BandFilter> {
        self.filters.get(&bw)
    }

    pub fn get_mut(&mut self, bw: AudioFilterBw) -> Option<&mut BandFilter> {
        self.filters.get_mut(&bw)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
