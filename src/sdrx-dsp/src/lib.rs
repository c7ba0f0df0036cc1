// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FFT-domain signal processing blocks: filters, overlap-and-save
//! streaming, rational resampling, Hilbert transformation and periodogram
//! accumulation.

pub mod block_op;
pub mod error;
pub mod fft;
pub mod filter;
pub mod filter_spec;
pub mod hilbert;
pub mod os_filter;
pub mod periodogram;
pub mod resampler;

pub use block_op::BlockOp;
pub use error::{DspError, DspResult};
pub use fft::{fftshift, good_size, ifftshift, Fft};
pub use filter::Filter;
pub use filter_spec::{Corner, FilterKind, FilterSpec, MIN_GAIN_DB};
pub use hilbert::HilbertTransformer;
pub use os_filter::OsFilter;
pub use periodogram::{Periodogram, Window};
pub use resampler::Resampler;
