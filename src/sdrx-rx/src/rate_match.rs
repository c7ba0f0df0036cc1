// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Audio clock-drift compensation.
//!
//! The radio's sample clock and the sound card's clock never agree
//! exactly, so the playback backlog slowly grows or drains. When it
//! leaves the watermark band one sample is dropped (catch-up) or repeated
//! (fallback). The position is drawn at random for each correction so the
//! edits never fall into a periodic, audible pattern.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

const RNG_SEED: u64 = 0x13245;

/// What [`RateMatcher::adjust`] did to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    None,
    Dropped(usize),
    Duplicated(usize),
}

pub struct RateMatcher {
    rng: StdRng,
    mask: u32,
    low_water: usize,
    high_water: usize,
    dropped: u64,
    duplicated: u64,
}

/// Largest `2^k - 1` strictly below `len`, so a masked index is always
/// in range.
pub fn index_mask(len: usize) -> u32 {
    if len <= 1 {
        return 0;
    }
    let mut mask: u32 = 1;
    while ((mask as usize) << 1 | 1) < len && mask < u32::MAX >> 1 {
        mask = (mask << 1) | 1;
    }
    mask
}

impl RateMatcher {
    /// Watermarks are backlog sizes in samples.
    pub fn new(buffer_len: usize, low_water: usize, high_water: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(RNG_SEED),
            mask: index_mask(buffer_len),
            low_water,
            high_water: high_water.max(low_water),
            dropped: 0,
            duplicated: 0,
        }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn duplicated(&self) -> u64 {
        self.duplicated
    }

    fn pick(&mut self, len: usize) -> usize {
        let idx = (self.rng.gen::<u32>() & self.mask) as usize;
        idx.min(len.saturating_sub(1))
    }

    /// Drop or repeat one sample of `buf` depending on the playback
    /// backlog. A device that cannot report its backlog is left alone.
    pub fn adjust(&mut self, buf: &mut Vec<f32>, backlog: Option<usize>) -> Correction {
        let Some(backlog) = backlog else {
            return Correction::None;
        };
        if buf.len() < 2 {
            return Correction::None;
        }
        if backlog > self.high_water {
            let idx = self.pick(buf.len());
            buf.remove(idx);
            self.dropped += 1;
            trace!("catch-up: dropped sample {} (backlog {})", idx, backlog);
            Correction::Dropped(idx)
        } else if backlog < self.low_water {
            let idx = self.pick(buf.len());
            buf.insert(idx, buf[idx]);
            self.duplicated += 1;
            trace!("fallback: repeated sample {} (backlog {})", idx, backlog);
            Correction::Duplicated(idx)
        } else {
            Correction::None
        }
    }
}

/// Re-cuts a stream of variable-length pieces into fixed-size buffers.
pub struct Rechunker {
    pending: VecDeque<f32>,
    len: usize,
}

impl Rechunker {
    pub fn new(len: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(len * 2),
            len: len.max(1),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend(samples.iter().copied());
    }

    /// Move the next full buffer into `out`. Returns false if there is not
    /// enough buffered yet.
    pub fn pop_into(&mut self, out: &mut [f32]) -> bool {
        if self.pending.len() < self.len || out.len() < self.len {
            return false;
        }
        for (slot, s) in out.iter_mut().zip(self.pending.drain(..self.len)) {
            *slot = s;
        }
        true
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
