// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectrum display feed: periodogram of the RF stream.

use std::sync::Arc;
use std::thread;

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use sdrx_core::{
    CmdTarget, CmdType, Command, ComplexPooledBuf, Mailbox, MailboxRegistry, RadioError,
    RadioResult, Stage, Subscriber, CMD_MAILBOX, POLL_INTERVAL,
};
use sdrx_dsp::{Periodogram, Window};

use crate::{RX_MAILBOX, SPECTRUM_MAILBOX};

/// RF buffers kept when the stage falls behind.
const KEEP_BUFFERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumWindow {
    #[default]
    Hann,
    Blackman,
}

impl From<SpectrumWindow> for Window {
    fn from(w: SpectrumWindow) -> Self {
        match w {
            SpectrumWindow::Hann => Window::Hann,
            SpectrumWindow::Blackman => Window::Blackman,
        }
    }
}

/// `[spectrum]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumSettings {
    pub enabled: bool,
    pub segment_length: usize,
    /// Exponential forgetting factor; 0 sums segments instead.
    pub alpha: f32,
    /// Segments folded in between published frames.
    pub update_rate: usize,
    pub window: SpectrumWindow,
    pub center_freq: f64,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            segment_length: 2048,
            alpha: 0.0,
            update_rate: 16,
            window: SpectrumWindow::Hann,
            center_freq: 0.0,
        }
    }
}

/// One published spectrum: dB magnitudes, lowest frequency first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub seq: u64,
    pub center_freq: f64,
    pub span: f64,
    pub bins: Vec<f32>,
}

impl SpectrumFrame {
    /// Frequency of bin `idx`.
    pub fn bin_freq(&self, idx: usize) -> f64 {
        let n = self.bins.len().max(1) as f64;
        self.center_freq + (idx as f64 - n / 2.0) * self.span / n
    }

    /// Index and level of the strongest bin.
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.bins
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

pub struct SpectrumMonitor {
    name: String,
    sample_rate: f64,
    settings: SpectrumSettings,
    periodogram: Periodogram,
    published_at: usize,
    seq: u64,
    skipped: u64,
    cmd: Option<Subscriber<Command>>,
    rf: Option<Subscriber<ComplexPooledBuf>>,
    reports: Option<Arc<Mailbox<Command>>>,
    frames: Option<Arc<Mailbox<SpectrumFrame>>>,
}

impl SpectrumMonitor {
    pub fn new(sample_rate: u32, settings: SpectrumSettings) -> RadioResult<Self> {
        let periodogram =
            Periodogram::new(settings.segment_length, settings.alpha, settings.window.into())?;
        Ok(Self {
            name: "SpectrumMonitor".to_string(),
            sample_rate: sample_rate as f64,
            settings,
            periodogram,
            published_at: 0,
            seq: 0,
            skipped: 0,
            cmd: None,
            rf: None,
            reports: None,
            frames: None,
        })
    }

    pub fn alpha(&self) -> f32 {
        self.settings.alpha
    }

    pub fn update_rate(&self) -> usize {
        self.settings.update_rate
    }

    pub fn center_freq(&self) -> f64 {
        self.settings.center_freq
    }

    fn rebuild(&mut self) -> RadioResult<()> {
        self.periodogram = Periodogram::new(
            self.settings.segment_length,
            self.settings.alpha,
            self.settings.window.into(),
        )?;
        self.published_at = 0;
        Ok(())
    }

    /// Fold RF samples in; returns a frame once enough segments have
    /// been accumulated since the last one.
    pub fn accumulate(&mut self, samples: &[Complex<f32>]) -> RadioResult<Option<SpectrumFrame>> {
        self.periodogram.accumulate(samples)?;
        let count = self.periodogram.accumulation_count();
        if count - self.published_at < self.settings.update_rate.max(1) {
            return Ok(None);
        }
        self.seq += 1;
        let frame = SpectrumFrame {
            seq: self.seq,
            center_freq: self.settings.center_freq,
            span: self.sample_rate,
            bins: self.periodogram.to_db_centered(),
        };
        if self.settings.alpha == 0.0 {
            // Summing: each frame averages its own segments only.
            self.periodogram.clear();
            self.published_at = 0;
        } else {
            self.published_at = count;
        }
        Ok(Some(frame))
    }

    /// Drop all but the newest [`KEEP_BUFFERS`] pending RF buffers; only
    /// recent samples matter for the display.
    fn skip_backlog(&mut self, rf_rx: &Subscriber<ComplexPooledBuf>) -> usize {
        let mut skipped = 0;
        while rf_rx.pending() > KEEP_BUFFERS && rf_rx.get().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            self.skipped += skipped as u64;
            trace!("{}: skipped {} stale RF buffers", self.name, skipped);
        }
        skipped
    }

    pub fn skipped_buffers(&self) -> u64 {
        self.skipped
    }

    fn report(&self, cmd: Command) {
        if let Some(reports) = &self.reports {
            reports.put(cmd);
        }
    }
}

impl Stage for SpectrumMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()> {
        let cmd = mailboxes.get::<Command>(CMD_MAILBOX)?;
        let rf = mailboxes.get::<ComplexPooledBuf>(RX_MAILBOX)?;
        self.frames = Some(mailboxes.get::<SpectrumFrame>(SPECTRUM_MAILBOX)?);
        self.cmd = Some(Subscriber::attach(&cmd));
        self.rf = Some(Subscriber::attach(&rf));
        self.reports = Some(cmd);
        Ok(())
    }

    fn run(&mut self) -> RadioResult<()> {
        let (Some(cmd_rx), Some(rf_rx)) = (self.cmd.take(), self.rf.take()) else {
            return Err(RadioError::runtime(self.name.clone(), "missing a stream connection"));
        };
        loop {
            let mut did_work = false;
            if let Some(cmd) = cmd_rx.get() {
                did_work = true;
                if self.handle_command(&cmd) {
                    break;
                }
            }
            self.skip_backlog(&rf_rx);
            if let Some(buf) = rf_rx.get() {
                did_work = true;
                if let Some(frame) = self.accumulate(buf.as_slice())? {
                    if let Some(frames) = &self.frames {
                        frames.put(frame);
                    }
                }
            }
            if !did_work {
                thread::sleep(POLL_INTERVAL);
            }
        }
        debug!(
            "{}: {} frames published, {} RF buffers skipped",
            self.name, self.seq, self.skipped
        );
        Ok(())
    }

    fn exec_set_command(&mut self, cmd: &Command) -> RadioResult<()> {
        match cmd.target {
            CmdTarget::SpecAvgWindow => {
                let window = cmd.iparm(0);
                self.settings.alpha = if window <= 0 { 0.0 } else { 1.0 / window as f32 };
                debug!("{}: averaging alpha {}", self.name, self.settings.alpha);
                self.rebuild()?;
            }
            CmdTarget::SpecUpdateRate => {
                self.settings.update_rate = cmd.iparm(0).max(1) as usize;
            }
            CmdTarget::SpecCenterFreq => {
                self.settings.center_freq = cmd.dparm(0);
            }
            _ => {}
        }
        Ok(())
    }

    fn exec_get_command(&mut self, cmd: &Command) -> RadioResult<()> {
        if cmd.target == CmdTarget::SpecDims {
            self.report(Command::with_doubles(
                CmdType::Rep,
                CmdTarget::SpecDims,
                [
                    self.settings.center_freq,
                    self.sample_rate,
                    self.settings.segment_length as f64,
                    0.0,
                ],
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::BufferPool;
    use std::f32::consts::PI;

    fn tone(freq: f32, rate: f32, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|i| Complex::from_polar(1.0, 2.0 * PI * freq * i as f32 / rate))
            .collect()
    }

    fn settings() -> SpectrumSettings {
        SpectrumSettings {
            segment_length: 256,
            update_rate: 4,
            center_freq: 14.074e6,
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_peaks_at_tone() {
        let rate = 48_000.0;
        let mut mon = SpectrumMonitor::new(48_000, settings()).unwrap();
        // 256-sample segments advance by 128, so 4 segments need 640
        // samples.
        assert!(mon.accumulate(&tone(6000.0, rate, 600)).unwrap().is_none());
        let frame = mon.accumulate(&tone(6000.0, rate, 40)).unwrap().unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.bins.len(), 256);
        let (idx, _) = frame.peak().unwrap();
        let freq = frame.bin_freq(idx) - frame.center_freq;
        assert!((freq - 6000.0).abs() <= 48_000.0 / 256.0, "peak at {freq}");
    }

    #[test]
    fn test_avg_window_and_update_rate_commands() {
        let mut mon = SpectrumMonitor::new(48_000, settings()).unwrap();
        mon.exec_command(&Command::with_int(CmdType::Set, CmdTarget::SpecAvgWindow, 8))
            .unwrap();
        assert!((mon.alpha() - 0.125).abs() < 1e-6);
        mon.exec_command(&Command::with_int(CmdType::Set, CmdTarget::SpecAvgWindow, 0))
            .unwrap();
        assert_eq!(mon.alpha(), 0.0);
        mon.exec_command(&Command::with_int(CmdType::Set, CmdTarget::SpecUpdateRate, 0))
            .unwrap();
        assert_eq!(mon.update_rate(), 1);
        mon.exec_command(&Command::with_double(CmdType::Set, CmdTarget::SpecCenterFreq, 7.1e6))
            .unwrap();
        assert_eq!(mon.center_freq(), 7.1e6);
    }

    #[test]
    fn test_backlog_is_skipped_and_counted() {
        let mailboxes = MailboxRegistry::new();
        mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        let rf = mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX).unwrap();
        mailboxes.create::<SpectrumFrame>(SPECTRUM_MAILBOX).unwrap();
        let mut mon = SpectrumMonitor::new(48_000, settings()).unwrap();
        mon.subscribe(&mailboxes).unwrap();
        let rf_rx = mon.rf.take().unwrap();

        let pool = BufferPool::<Complex<f32>>::new(256);
        for _ in 0..6 {
            rf.put(pool.get());
        }
        assert_eq!(mon.skip_backlog(&rf_rx), 4);
        assert_eq!(rf_rx.pending(), KEEP_BUFFERS);
        assert_eq!(mon.skip_backlog(&rf_rx), 0);

        rf.put(pool.get());
        assert_eq!(mon.skip_backlog(&rf_rx), 1);
        assert_eq!(mon.skipped_buffers(), 5);
    }

    #[test]
    fn test_spec_dims_report() {
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX).unwrap();
        mailboxes.create::<SpectrumFrame>(SPECTRUM_MAILBOX).unwrap();
        let mut mon = SpectrumMonitor::new(96_000, settings()).unwrap();
        mon.subscribe(&mailboxes).unwrap();
        let reports = Subscriber::attach(&cmd);

        mon.exec_command(&Command::new(CmdType::Get, CmdTarget::SpecDims))
            .unwrap();
        let rep = reports.get().unwrap();
        assert_eq!(rep.cmd, CmdType::Rep);
        assert_eq!(rep.target, CmdTarget::SpecDims);
        assert_eq!(rep.dparm(0), 14.074e6);
        assert_eq!(rep.dparm(1), 96_000.0);
        assert_eq!(rep.dparm(2), 256.0);
    }
}
