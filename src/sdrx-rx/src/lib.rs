// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod audio;
pub mod baseband_rx;
pub mod demod;
pub mod filters;
pub mod output;
pub mod rate_match;
pub mod source;
pub mod spectrum;

/// Mailbox carrying RF sample buffers.
pub const RX_MAILBOX: &str = "rx";
/// Mailbox carrying display spectra.
pub const SPECTRUM_MAILBOX: &str = "spectrum";

pub use audio::{AudioIfc, CaptureAudio, CaptureHandle, FileAudio, NullAudio};
pub use baseband_rx::{BaseBandRx, RxSettings, RxStats};
pub use source::{IfSourceStage, IqSource, SourceKind, SourceSettings};
pub use spectrum::{SpectrumFrame, SpectrumMonitor, SpectrumSettings, SpectrumWindow};
