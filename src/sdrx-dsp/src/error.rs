// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Construction and buffer-contract failures raised by the DSP blocks.
///
/// Everything here is reported at build time or at the call boundary;
/// nothing is silently corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DspError {
    #[error("filter spec is REAL but corner frequency {freq} Hz is negative")]
    BadRealSpec { freq: f32 },

    #[error("bad buffer size: input {input}, output {output}, required {required}")]
    BadBufferSize {
        input: usize,
        output: usize,
        required: usize,
    },

    #[error("filter spec has no corners")]
    EmptySpec,

    #[error("bad sample rate: {0}")]
    BadRate(String),

    #[error("bad size: {0}")]
    BadSize(String),
}

pub type DspResult<T> = Result<T, DspError>;
