// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Baseband receiver: RF buffers in, demodulated audio out.

use std::sync::Arc;
use std::thread;

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sdrx_core::{
    AudioFilterBw, CmdTarget, CmdType, Command, ComplexPooledBuf, Mailbox, MailboxRegistry,
    ModulationType, RadioError, RadioResult, Stage, Subscriber, TxStateSelector, CMD_MAILBOX,
    POLL_INTERVAL,
};
use sdrx_dsp::{BlockOp, OsFilter, Resampler};

use crate::audio::AudioIfc;
use crate::demod::{am_detect, magnitude_sum, FmDiscriminator, SsbDemod, Squelch};
use crate::filters::{
    AudioFilterBank, BandFilter, AM_AUDIO_BAND, AM_PRE_BAND, FM_AUDIO_BAND, NBFM_PRE_BAND,
};
use crate::output::AudioOutput;
use crate::rate_match::{Correction, RateMatcher, Rechunker};
use crate::RX_MAILBOX;

/// RF buffers taken from the mailbox per pass through the run loop.
const MAX_RF_PER_POLL: usize = 5;

/// `[rx]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RxSettings {
    pub rf_sample_rate: u32,
    pub audio_sample_rate: u32,
    /// Complex samples per RF buffer; a multiple of the decimation step.
    pub rf_buffer_size: usize,
    /// Samples per audio buffer handed to the audio device.
    pub audio_buffer_size: usize,
    pub hilbert_filter_len: usize,
    pub mode: ModulationType,
    pub filter: AudioFilterBw,
    /// Gain knob, 50 is unity; every 4 steps is one decade.
    pub af_gain: f64,
    pub sidetone_gain: f64,
    /// NBFM squelch knob; the threshold is `10^(0.5 * x)` per sample.
    /// Unset keeps the default of 1000 per sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squelch: Option<f64>,
    pub squelch_hang: u32,
    /// Playback backlog (in audio buffers) below which a sample is repeated.
    pub catchup_low_buffers: usize,
    /// Playback backlog (in audio buffers) above which a sample is dropped.
    pub catchup_high_buffers: usize,
    /// Silent buffers pended at start and after returning to receive.
    pub prime_buffers: usize,
    pub max_ready_buffers: usize,
}

impl Default for RxSettings {
    fn default() -> Self {
        Self {
            rf_sample_rate: 480_000,
            audio_sample_rate: 48_000,
            rf_buffer_size: 24_000,
            audio_buffer_size: 2400,
            hilbert_filter_len: 256,
            mode: ModulationType::Usb,
            filter: AudioFilterBw::Bw6000,
            af_gain: 50.0,
            sidetone_gain: 50.0,
            squelch: None,
            squelch_hang: crate::demod::DEFAULT_SQUELCH_HANG,
            catchup_low_buffers: 1,
            catchup_high_buffers: 4,
            prime_buffers: 4,
            max_ready_buffers: 16,
        }
    }
}

/// Knob position to linear gain.
pub fn knob_to_gain(knob: f64) -> f32 {
    10f64.powf(0.25 * (knob - 50.0)) as f32
}

/// Linear gain back to the knob scale.
pub fn gain_to_knob(gain: f32) -> f64 {
    50.0 + 4.0 * (gain as f64).log10()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GainSource {
    Af,
    Sidetone,
}

/// Counters reported on DBG_REP.
#[derive(Debug, Clone, Default)]
pub struct RxStats {
    pub rf_buffers: u64,
    pub audio_buffers: u64,
    pub silent_buffers: u64,
    pub squelch_muted: u64,
    pub samples_dropped: u64,
    pub samples_repeated: u64,
}

pub struct BaseBandRx {
    name: String,
    settings: RxSettings,
    cmd: Option<Subscriber<Command>>,
    rf: Option<Subscriber<ComplexPooledBuf>>,
    reports: Option<Arc<Mailbox<Command>>>,

    mode: ModulationType,
    filter_sel: AudioFilterBw,
    af_gain: f32,
    sidetone_gain: f32,
    gain_source: GainSource,
    sidetone_enabled: bool,
    rx_audio_enabled: bool,

    rf_resampler: OsFilter<Resampler>,
    wbfm_resampler: OsFilter<Resampler>,
    bank: AudioFilterBank,
    am_pre: BandFilter,
    am_audio: BandFilter,
    fm_audio: BandFilter,
    nbfm_pre: BandFilter,
    ssb: SsbDemod,
    nbfm_disc: FmDiscriminator,
    wbfm_disc: FmDiscriminator,
    squelch: Squelch,

    rate: RateMatcher,
    rechunk: Rechunker,
    output: AudioOutput,

    iq_scratch: Vec<Complex<f32>>,
    iq_pending: Vec<Complex<f32>>,
    rf_real: Vec<f32>,
    real_scratch: Vec<f32>,
    real_pending: Vec<f32>,
    demod_scratch: Vec<f32>,
    audio_scratch: Vec<f32>,

    stats: RxStats,
}

impl BaseBandRx {
    pub fn new(settings: RxSettings, audio: Box<dyn AudioIfc>) -> RadioResult<Self> {
        const NAME: &str = "BaseBandRX";
        let rf_rate = settings.rf_sample_rate;
        let af_rate = settings.audio_sample_rate;
        let n = settings.audio_buffer_size;
        if n == 0 || settings.rf_buffer_size == 0 {
            return Err(RadioError::runtime(NAME, "buffer sizes must be non-zero"));
        }
        if audio.sample_rate() != af_rate {
            warn!(
                "audio device runs at {} Hz, receiver expects {} Hz",
                audio.sample_rate(),
                af_rate
            );
        }

        let rf_resampler =
            OsFilter::from_op(Resampler::new(rf_rate, af_rate, settings.rf_buffer_size)?)?;
        let (_, decim) = rf_resampler.op().ratio();
        if settings.rf_buffer_size % decim != 0 {
            return Err(RadioError::runtime(
                NAME,
                format!(
                    "RF buffer of {} samples is not a multiple of the decimation step {}",
                    settings.rf_buffer_size, decim
                ),
            ));
        }
        let wbfm_resampler =
            OsFilter::from_op(Resampler::new(rf_rate, af_rate, settings.rf_buffer_size)?)?;

        let af = af_rate as f32;
        let squelch_threshold = settings
            .squelch
            .map_or(1000.0 * n as f32, |knob| squelch_level(knob, n));

        let mode = settings.mode;
        let bank = AudioFilterBank::new(af, n)?;
        let filter_sel = bank.resolve(settings.filter);
        info!(
            "{}: {} Hz -> {} Hz, {} -> {} samples per buffer, {} / {}",
            NAME, rf_rate, af_rate, settings.rf_buffer_size, n, mode, filter_sel
        );

        Ok(Self {
            name: NAME.to_string(),
            cmd: None,
            rf: None,
            reports: None,
            mode,
            filter_sel,
            af_gain: knob_to_gain(settings.af_gain),
            sidetone_gain: knob_to_gain(settings.sidetone_gain),
            gain_source: GainSource::Af,
            sidetone_enabled: false,
            rx_audio_enabled: true,
            rf_resampler,
            wbfm_resampler,
            bank,
            am_pre: BandFilter::new(af, AM_PRE_BAND, n)?,
            am_audio: BandFilter::new(af, AM_AUDIO_BAND, n)?,
            fm_audio: BandFilter::new(af, FM_AUDIO_BAND, n)?,
            nbfm_pre: BandFilter::new(rf_rate as f32, NBFM_PRE_BAND, settings.rf_buffer_size)?,
            ssb: SsbDemod::new(n, settings.hilbert_filter_len)?,
            // NBFM is discriminated after decimation, so it runs at the
            // audio rate.
            nbfm_disc: FmDiscriminator::nbfm(af),
            wbfm_disc: FmDiscriminator::wbfm(rf_rate as f32),
            squelch: Squelch::new(squelch_threshold, settings.squelch_hang),
            rate: RateMatcher::new(
                n,
                settings.catchup_low_buffers * n,
                settings.catchup_high_buffers * n,
            ),
            rechunk: Rechunker::new(n),
            output: AudioOutput::new(audio, n, settings.max_ready_buffers),
            iq_scratch: Vec::with_capacity(n),
            iq_pending: Vec::with_capacity(2 * n),
            rf_real: Vec::with_capacity(settings.rf_buffer_size),
            real_scratch: Vec::with_capacity(n),
            real_pending: Vec::with_capacity(2 * n),
            demod_scratch: Vec::with_capacity(n),
            audio_scratch: Vec::with_capacity(n + 1),
            stats: RxStats::default(),
            settings,
        })
    }

    pub fn mode(&self) -> ModulationType {
        self.mode
    }

    pub fn filter(&self) -> AudioFilterBw {
        self.filter_sel
    }

    pub fn af_gain(&self) -> f32 {
        self.af_gain
    }

    pub fn sidetone_gain(&self) -> f32 {
        self.sidetone_gain
    }

    pub fn squelch(&self) -> &Squelch {
        &self.squelch
    }

    pub fn rx_audio_enabled(&self) -> bool {
        self.rx_audio_enabled
    }

    pub fn sidetone_enabled(&self) -> bool {
        self.sidetone_enabled
    }

    pub fn audio_level(&self) -> f32 {
        self.output.level()
    }

    pub fn stats(&self) -> &RxStats {
        &self.stats
    }

    pub fn output(&self) -> &AudioOutput {
        &self.output
    }

    fn current_gain(&self) -> f32 {
        match self.gain_source {
            GainSource::Af => self.af_gain,
            GainSource::Sidetone => self.sidetone_gain,
        }
    }

    fn report(&self, cmd: Command) {
        if let Some(reports) = &self.reports {
            reports.put(cmd);
        }
    }

    /// Pend the configured number of silent buffers so the audio device
    /// does not underrun straight away.
    pub fn prime(&mut self) -> RadioResult<()> {
        let count = self.settings.prime_buffers;
        self.stats.silent_buffers += count as u64;
        self.output.pend_silence(count)
    }

    // -----------------------------------------------------------------------
    // Signal path
    // -----------------------------------------------------------------------

    /// Run one RF buffer through the receive chain for the current mode.
    pub fn process_rf(&mut self, rf: &[Complex<f32>]) -> RadioResult<()> {
        self.stats.rf_buffers += 1;
        let gain = self.current_gain();
        match self.mode {
            ModulationType::Wbfm => {
                self.rf_real.clear();
                self.wbfm_disc.process(rf, &mut self.rf_real);
                self.real_scratch.clear();
                self.wbfm_resampler
                    .apply_real(&self.rf_real, &mut self.real_scratch, 1.0)?;
                self.fm_audio
                    .apply_real(&self.real_scratch, &mut self.real_pending, gain)?;
            }
            ModulationType::Nbfm => {
                self.iq_scratch.clear();
                self.nbfm_pre.apply(rf, &mut self.iq_scratch, 1.0)?;
                self.rf_resampler
                    .apply(&self.iq_scratch, &mut self.iq_pending, 1.0)?;
            }
            ModulationType::Am => {
                self.iq_scratch.clear();
                self.rf_resampler.apply(rf, &mut self.iq_scratch, 1.0)?;
                self.am_pre
                    .apply(&self.iq_scratch, &mut self.iq_pending, gain)?;
            }
            ModulationType::Lsb | ModulationType::Usb | ModulationType::CwL | ModulationType::CwU => {
                self.iq_scratch.clear();
                self.rf_resampler.apply(rf, &mut self.iq_scratch, 1.0)?;
                let filter = self.bank.get_mut(self.filter_sel).ok_or_else(|| {
                    RadioError::runtime("BaseBandRX", format!("no filter for {}", self.filter_sel))
                })?;
                filter.apply(&self.iq_scratch, &mut self.iq_pending, gain)?;
            }
        }
        self.demodulate_pending()
    }

    fn demodulate_pending(&mut self) -> RadioResult<()> {
        let n = self.output.buffer_len();
        if self.mode == ModulationType::Wbfm {
            while self.real_pending.len() >= n {
                self.audio_scratch.clear();
                self.audio_scratch.extend(self.real_pending.drain(..n));
                self.emit_audio()?;
            }
            return Ok(());
        }

        let mut pending = std::mem::take(&mut self.iq_pending);
        let full = pending.len() / n * n;
        let mut result = Ok(());
        for chunk in pending[..full].chunks_exact(n) {
            result = self.demodulate_block(chunk);
            if result.is_err() {
                break;
            }
        }
        pending.drain(..full);
        self.iq_pending = pending;
        result
    }

    /// Demodulate one audio-rate block into `audio_scratch` and emit it.
    fn demodulate_block(&mut self, block: &[Complex<f32>]) -> RadioResult<()> {
        let mode = self.mode;
        match mode {
            ModulationType::Lsb | ModulationType::Usb | ModulationType::CwL | ModulationType::CwU => {
                self.audio_scratch.clear();
                self.audio_scratch.resize(block.len(), 0.0);
                self.ssb.demodulate(block, &mut self.audio_scratch, mode)?;
            }
            ModulationType::Am => {
                am_detect(block, &mut self.demod_scratch);
                self.audio_scratch.clear();
                self.am_audio
                    .apply_real(&self.demod_scratch, &mut self.audio_scratch, 1.0)?;
            }
            ModulationType::Nbfm => {
                let magnitude = magnitude_sum(block);
                self.demod_scratch.clear();
                self.nbfm_disc.process(block, &mut self.demod_scratch);
                self.audio_scratch.clear();
                let gain = self.current_gain();
                if let Some(filter) = self.bank.get_mut(self.filter_sel) {
                    filter.apply_real(&self.demod_scratch, &mut self.audio_scratch, gain)?;
                } else {
                    self.audio_scratch.extend_from_slice(&self.demod_scratch);
                }
                if self.squelch.process(magnitude, &mut self.audio_scratch) {
                    self.stats.squelch_muted += 1;
                }
            }
            ModulationType::Wbfm => {
                return Err(RadioError::UnsupportedMode {
                    component: self.name.clone(),
                    mode: "WBFM at the audio rate".into(),
                });
            }
        }
        self.emit_audio()
    }

    /// Clock-correct `audio_scratch`, cut it into device buffers and pend
    /// them.
    fn emit_audio(&mut self) -> RadioResult<()> {
        let backlog = self.output.device().send_backlog();
        match self.rate.adjust(&mut self.audio_scratch, backlog) {
            Correction::Dropped(_) => self.stats.samples_dropped += 1,
            Correction::Duplicated(_) => self.stats.samples_repeated += 1,
            Correction::None => {}
        }
        self.rechunk.push(&self.audio_scratch);
        let gain = self.current_gain();
        loop {
            let mut buf = self.output.buffer();
            if !self.rechunk.pop_into(buf.as_mut_slice()) {
                break;
            }
            self.output.pend(buf, gain)?;
            self.stats.audio_buffers += 1;
        }
        Ok(())
    }

    /// Keep the audio device fed while the receiver is muted.
    fn pend_silence(&mut self) -> RadioResult<()> {
        self.stats.silent_buffers += 1;
        self.output.pend_silence(1)
    }

    fn switch_mode(&mut self, mode: ModulationType) {
        if mode == self.mode {
            return;
        }
        debug!("{}: mode {} -> {}", self.name, self.mode, mode);
        self.mode = mode;
        self.iq_pending.clear();
        self.real_pending.clear();
        self.nbfm_disc.reset();
        self.wbfm_disc.reset();
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Passband of the current audio filter as it appears on the RF
    /// display for the current mode.
    pub fn filter_shape(&self) -> (f64, f64) {
        let (lo, hi) = self
            .bank
            .get(self.filter_sel)
            .map_or((0.0, 0.0), |f| f.edges());
        let (lo, hi) = (lo as f64, hi as f64);
        match self.mode {
            ModulationType::Usb | ModulationType::CwU => (lo, hi),
            ModulationType::Lsb | ModulationType::CwL => (-lo, -hi),
            ModulationType::Am => (-hi, hi),
            ModulationType::Nbfm | ModulationType::Wbfm => (-100.0, 100.0),
        }
    }

    fn report_filter_shape(&self) {
        let (lo, hi) = self.filter_shape();
        self.report(Command::with_doubles(
            CmdType::Rep,
            CmdTarget::RxAfFilterShape,
            [lo, hi, 0.0, 0.0],
        ));
    }

    fn report_filter(&self) {
        self.report(Command::with_int(
            CmdType::Rep,
            CmdTarget::RxAfFilter,
            self.filter_sel.into(),
        ));
    }

    fn log_stats(&self) {
        let s = &self.stats;
        info!(
            "{}: mode {} filter {} rf {} audio {} silent {} muted {} dropped {} repeated {} ready {} level {:.1} dB",
            self.name,
            self.mode,
            self.filter_sel,
            s.rf_buffers,
            s.audio_buffers,
            s.silent_buffers,
            s.squelch_muted,
            s.samples_dropped,
            s.samples_repeated,
            self.output.ready_len(),
            self.output.level()
        );
    }
}

/// NBFM squelch threshold for a knob setting and buffer length.
pub fn squelch_level(knob: f64, buffer_len: usize) -> f32 {
    (10f64.powf(0.5 * knob) * buffer_len as f64) as f32
}

impl Stage for BaseBandRx {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()> {
        let cmd = mailboxes.get::<Command>(CMD_MAILBOX)?;
        let rf = mailboxes.get::<ComplexPooledBuf>(RX_MAILBOX)?;
        self.cmd = Some(Subscriber::attach(&cmd));
        self.rf = Some(Subscriber::attach(&rf));
        self.reports = Some(cmd);
        Ok(())
    }

    fn run(&mut self) -> RadioResult<()> {
        let (Some(cmd_rx), Some(rf_rx)) = (self.cmd.take(), self.rf.take()) else {
            return Err(RadioError::runtime(self.name.clone(), "missing a stream connection"));
        };
        self.prime()?;

        loop {
            let mut did_work = false;

            if let Some(cmd) = cmd_rx.get() {
                did_work = true;
                if self.handle_command(&cmd) {
                    break;
                }
            }

            for _ in 0..MAX_RF_PER_POLL {
                let Some(buf) = rf_rx.get() else {
                    break;
                };
                did_work = true;
                if self.rx_audio_enabled {
                    self.process_rf(buf.as_slice())?;
                } else {
                    self.pend_silence()?;
                }
            }

            if self.output.drain()? > 0 {
                did_work = true;
            }
            if !did_work {
                thread::sleep(POLL_INTERVAL);
            }
        }

        self.log_stats();
        Ok(())
    }

    fn exec_set_command(&mut self, cmd: &Command) -> RadioResult<()> {
        match cmd.target {
            CmdTarget::RxMode => {
                let mode = ModulationType::try_from(cmd.iparm(0)).map_err(|v| {
                    RadioError::UnsupportedMode {
                        component: self.name.clone(),
                        mode: v.to_string(),
                    }
                })?;
                self.switch_mode(mode);
                self.report_filter_shape();
            }
            CmdTarget::TxMode => {
                self.sidetone_enabled = matches!(
                    ModulationType::try_from(cmd.iparm(0)),
                    Ok(ModulationType::CwL | ModulationType::CwU)
                );
            }
            CmdTarget::TxState => match TxStateSelector::try_from(cmd.iparm(0)) {
                Ok(TxStateSelector::TxReady) => {
                    self.output.flush();
                    self.rechunk.clear();
                    if cmd.iparm(1) != 0 {
                        debug!("{}: full duplex, receive audio unchanged", self.name);
                    } else if self.sidetone_enabled {
                        debug!("{}: sidetone", self.name);
                        self.gain_source = GainSource::Sidetone;
                    } else {
                        debug!("{}: receive audio off", self.name);
                        self.rx_audio_enabled = false;
                    }
                }
                Ok(TxStateSelector::RxOn) => {
                    debug!("{}: receive audio on", self.name);
                    self.gain_source = GainSource::Af;
                    self.rx_audio_enabled = true;
                    self.output.flush();
                    self.prime()?;
                }
                _ => {}
            },
            CmdTarget::RxAfFilter => {
                let requested = AudioFilterBw::try_from(cmd.iparm(0)).unwrap_or(AudioFilterBw::Bw6000);
                self.filter_sel = self.bank.resolve(requested);
                self.report_filter();
                self.report_filter_shape();
            }
            CmdTarget::RxAfGain => {
                self.af_gain = knob_to_gain(cmd.dparm(0));
                self.report(Command::with_double(
                    CmdType::Rep,
                    CmdTarget::RxAfGain,
                    gain_to_knob(self.af_gain),
                ));
            }
            CmdTarget::RxAfSidetoneGain => {
                self.sidetone_gain = knob_to_gain(cmd.dparm(0));
                self.report(Command::with_double(
                    CmdType::Rep,
                    CmdTarget::RxAfSidetoneGain,
                    gain_to_knob(self.sidetone_gain),
                ));
            }
            CmdTarget::NbfmSquelch => {
                let level = squelch_level(cmd.dparm(0), self.output.buffer_len());
                self.squelch.set_level(level);
            }
            _ => {}
        }
        Ok(())
    }

    fn exec_get_command(&mut self, cmd: &Command) -> RadioResult<()> {
        match cmd.target {
            CmdTarget::RxAfFilter => self.report_filter(),
            CmdTarget::RxAfFilterShape => self.report_filter_shape(),
            CmdTarget::RxAfGain => self.report(Command::with_double(
                CmdType::Rep,
                CmdTarget::RxAfGain,
                gain_to_knob(self.af_gain),
            )),
            CmdTarget::RxAfSidetoneGain => self.report(Command::with_double(
                CmdType::Rep,
                CmdTarget::RxAfSidetoneGain,
                gain_to_knob(self.sidetone_gain),
            )),
            CmdTarget::RxMode => self.report(Command::with_int(
                CmdType::Rep,
                CmdTarget::RxMode,
                self.mode.into(),
            )),
            CmdTarget::AudioBufSize => self.report(Command::with_int(
                CmdType::Rep,
                CmdTarget::AudioBufSize,
                self.output.buffer_len() as i32,
            )),
            CmdTarget::AudioSampleRate => self.report(Command::with_double(
                CmdType::Rep,
                CmdTarget::AudioSampleRate,
                self.settings.audio_sample_rate as f64,
            )),
            CmdTarget::DbgRep => self.log_stats(),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureAudio, CaptureHandle};
    use sdrx_core::{BufferPool, StageOutcome, ThreadRegistry};
    use std::f32::consts::PI;

    fn small_settings() -> RxSettings {
        RxSettings {
            rf_sample_rate: 96_000,
            audio_sample_rate: 48_000,
            rf_buffer_size: 4800,
            audio_buffer_size: 2400,
            ..Default::default()
        }
    }

    fn receiver(settings: RxSettings) -> (BaseBandRx, CaptureHandle) {
        let (audio, handle) = CaptureAudio::new(settings.audio_sample_rate);
        (BaseBandRx::new(settings, Box::new(audio)).unwrap(), handle)
    }

    /// Receiver wired to a command mailbox, plus a cursor that sees its
    /// reports.
    fn wired(settings: RxSettings) -> (BaseBandRx, CaptureHandle, Subscriber<Command>) {
        let (mut rx, handle) = receiver(settings);
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX).unwrap();
        rx.subscribe(&mailboxes).unwrap();
        (rx, handle, Subscriber::attach(&cmd))
    }

    fn tone(freq: f32, rate: f32, start: usize, len: usize) -> Vec<Complex<f32>> {
        (start..start + len)
            .map(|i| Complex::from_polar(1.0, 2.0 * PI * freq * i as f32 / rate))
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len().max(1) as f32).sqrt()
    }

    fn set_int(target: CmdTarget, value: i32) -> Command {
        Command::with_int(CmdType::Set, target, value)
    }

    #[test]
    fn test_gain_knob() {
        assert!((knob_to_gain(50.0) - 1.0).abs() < 1e-6);
        assert!((knob_to_gain(54.0) - 10.0).abs() < 1e-4);
        assert!((gain_to_knob(knob_to_gain(37.5)) - 37.5).abs() < 1e-4);
        assert!((squelch_level(0.0, 2400) - 2400.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_rf_buffer_off_the_decimation_grid() {
        let (audio, _h) = CaptureAudio::new(48_000);
        let settings = RxSettings {
            rf_buffer_size: 4801,
            ..small_settings()
        };
        assert!(BaseBandRx::new(settings, Box::new(audio)).is_err());
    }

    #[test]
    fn test_unsupported_mode_keeps_previous_mode() {
        let (mut rx, _h, _reports) = wired(small_settings());
        rx.exec_command(&set_int(CmdTarget::RxMode, ModulationType::Am.into()))
            .unwrap();
        let err = rx.exec_command(&set_int(CmdTarget::RxMode, 42)).unwrap_err();
        assert!(matches!(err, RadioError::UnsupportedMode { ref mode, .. } if mode == "42"));
        assert_eq!(rx.mode(), ModulationType::Am);
        // The stage swallows the error and carries on.
        assert!(!rx.handle_command(&set_int(CmdTarget::RxMode, -1)));
        assert_eq!(rx.mode(), ModulationType::Am);
    }

    #[test]
    fn test_filter_selection_falls_back_and_reports() {
        let (mut rx, _h, reports) = wired(small_settings());
        rx.exec_command(&set_int(CmdTarget::RxAfFilter, AudioFilterBw::BwNull.into()))
            .unwrap();
        assert_eq!(rx.filter(), AudioFilterBw::Bw6000);

        let rep = reports.get().unwrap();
        assert_eq!(rep.cmd, CmdType::Rep);
        assert_eq!(rep.target, CmdTarget::RxAfFilter);
        assert_eq!(rep.iparm(0), i32::from(AudioFilterBw::Bw6000));

        let shape = reports.get().unwrap();
        assert_eq!(shape.target, CmdTarget::RxAfFilterShape);
        assert!(shape.dparm(0) > 250.0 && shape.dparm(1) > 6000.0);

        rx.exec_command(&set_int(CmdTarget::RxAfFilter, AudioFilterBw::Bw500.into()))
            .unwrap();
        rx.exec_command(&set_int(CmdTarget::RxMode, ModulationType::Lsb.into()))
            .unwrap();
        let (lo, hi) = rx.filter_shape();
        assert!(lo < 0.0 && hi < lo);
    }

    #[test]
    fn test_af_gain_and_gets_report_back() {
        let (mut rx, _h, reports) = wired(small_settings());
        rx.exec_command(&Command::with_double(CmdType::Set, CmdTarget::RxAfGain, 58.0))
            .unwrap();
        assert!((rx.af_gain() - 100.0).abs() < 1e-2);
        let rep = reports.get().unwrap();
        assert_eq!(rep.target, CmdTarget::RxAfGain);
        assert!((rep.dparm(0) - 58.0).abs() < 1e-3);

        rx.exec_command(&Command::new(CmdType::Get, CmdTarget::AudioBufSize))
            .unwrap();
        assert_eq!(reports.get().unwrap().iparm(0), 2400);
        rx.exec_command(&Command::new(CmdType::Get, CmdTarget::AudioSampleRate))
            .unwrap();
        assert_eq!(reports.get().unwrap().dparm(0), 48_000.0);
        rx.exec_command(&Command::new(CmdType::Get, CmdTarget::RxMode))
            .unwrap();
        assert_eq!(reports.get().unwrap().iparm(0), i32::from(ModulationType::Usb));
        rx.exec_command(&Command::new(CmdType::Get, CmdTarget::DbgRep))
            .unwrap();
        assert!(reports.get().is_none());
    }

    #[test]
    fn test_ssb_mode_selects_sideband() {
        let settings = small_settings();
        let rate = settings.rf_sample_rate as f32;
        let len = settings.rf_buffer_size;

        let level = |mode: ModulationType| {
            let (mut rx, handle) = receiver(small_settings());
            rx.exec_command(&set_int(CmdTarget::RxMode, mode.into())).unwrap();
            for b in 0..6 {
                rx.process_rf(&tone(1000.0, rate, b * len, len)).unwrap();
            }
            let samples = handle.samples();
            assert_eq!(samples.len(), 6 * 2400);
            rms(&samples[3 * 2400..])
        };

        let usb = level(ModulationType::Usb);
        let lsb = level(ModulationType::Lsb);
        assert!(usb > 0.5, "usb level {usb}");
        assert!(lsb < 0.05 * usb, "lsb level {lsb} vs usb {usb}");
    }

    #[test]
    fn test_am_and_wbfm_produce_one_buffer_per_rf_buffer() {
        let settings = small_settings();
        let rate = settings.rf_sample_rate as f32;
        let len = settings.rf_buffer_size;
        for mode in [ModulationType::Am, ModulationType::Wbfm] {
            let (mut rx, handle) = receiver(small_settings());
            rx.exec_command(&set_int(CmdTarget::RxMode, mode.into())).unwrap();
            for b in 0..3 {
                rx.process_rf(&tone(700.0, rate, b * len, len)).unwrap();
            }
            assert_eq!(handle.send_count(), 3, "{mode}");
            assert_eq!(rx.stats().audio_buffers, 3);
        }
    }

    #[test]
    fn test_nbfm_squelch_hang_timing() {
        let settings = small_settings();
        let rate = settings.rf_sample_rate as f32;
        let len = settings.rf_buffer_size;
        let (mut rx, handle) = receiver(small_settings());
        rx.exec_command(&set_int(CmdTarget::RxMode, ModulationType::Nbfm.into()))
            .unwrap();
        // Half of a full-scale carrier's magnitude sum.
        rx.exec_command(&Command::with_double(
            CmdType::Set,
            CmdTarget::NbfmSquelch,
            2.0 * 0.5f64.log10(),
        ))
        .unwrap();
        assert!((rx.squelch().level() - 1200.0).abs() < 1.0);

        // FM carrier with a 1 kHz tone.
        let fm = |start: usize| -> Vec<Complex<f32>> {
            (start..start + len)
                .map(|i| {
                    let t = i as f32 / rate;
                    Complex::from_polar(1.0, 2.0 * (2.0 * PI * 1000.0 * t).sin())
                })
                .collect()
        };
        let silence = vec![Complex::new(0.0, 0.0); len];

        let mut muted = Vec::new();
        for b in 0..4 {
            rx.process_rf(&fm(b * len)).unwrap();
            muted.push(rx.stats().squelch_muted);
        }
        for _ in 0..10 {
            rx.process_rf(&silence).unwrap();
            muted.push(rx.stats().squelch_muted);
        }
        let hang = DEFAULT_HANG as usize;
        assert_eq!(muted[3], 0, "open while the carrier is up");
        assert_eq!(muted[3 + hang], 0, "still open {hang} buffers later");
        assert_eq!(muted[4 + hang], 1, "muted on the next buffer");
        assert_eq!(muted[13], 10 - hang as u64);

        let samples = handle.samples();
        assert!(rms(&samples[2400..2 * 2400]) > 0.01, "carrier audio passes");
        assert!(samples[(4 + hang) * 2400..].iter().all(|&s| s == 0.0));
    }

    const DEFAULT_HANG: u32 = crate::demod::DEFAULT_SQUELCH_HANG;

    #[test]
    fn test_tx_state_mutes_and_restores() {
        let (mut rx, handle, _reports) = wired(small_settings());
        rx.exec_command(&Command::with_ints(CmdType::Set, CmdTarget::TxState, [1, 0, 0, 0]))
            .unwrap();
        assert!(!rx.rx_audio_enabled());

        rx.exec_command(&Command::with_ints(CmdType::Set, CmdTarget::TxState, [2, 0, 0, 0]))
            .unwrap();
        assert!(rx.rx_audio_enabled());
        assert_eq!(handle.send_count(), small_settings().prime_buffers);

        // CW keeps the receiver running at the sidetone gain.
        rx.exec_command(&set_int(CmdTarget::TxMode, ModulationType::CwU.into()))
            .unwrap();
        assert!(rx.sidetone_enabled());
        rx.exec_command(&Command::with_double(CmdType::Set, CmdTarget::RxAfSidetoneGain, 46.0))
            .unwrap();
        rx.exec_command(&Command::with_ints(CmdType::Set, CmdTarget::TxState, [1, 0, 0, 0]))
            .unwrap();
        assert!(rx.rx_audio_enabled());
        assert!((rx.current_gain() - 0.1).abs() < 1e-4);

        rx.exec_command(&Command::with_ints(CmdType::Set, CmdTarget::TxState, [2, 0, 0, 0]))
            .unwrap();
        assert_eq!(rx.current_gain(), rx.af_gain());

        // Full duplex leaves everything alone.
        rx.exec_command(&set_int(CmdTarget::TxMode, ModulationType::Usb.into()))
            .unwrap();
        rx.exec_command(&Command::with_ints(CmdType::Set, CmdTarget::TxState, [1, 1, 0, 0]))
            .unwrap();
        assert!(rx.rx_audio_enabled());
    }

    #[test]
    fn test_stage_demodulates_until_stop() {
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        let rf = mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX).unwrap();

        let settings = small_settings();
        let (rx, handle) = receiver(settings.clone());
        let mut registry = ThreadRegistry::new();
        registry.add(Box::new(rx));
        registry.subscribe_all(&mailboxes).unwrap();
        registry.start_all().unwrap();

        let pool = BufferPool::new(settings.rf_buffer_size);
        let rate = settings.rf_sample_rate as f32;
        for b in 0..4 {
            let block = tone(1500.0, rate, b * settings.rf_buffer_size, settings.rf_buffer_size);
            rf.put(pool.get_filled(&block));
        }

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(20);
        let expected = settings.prime_buffers + 4;
        while handle.send_count() < expected && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        let outcomes = registry.shutdown(&cmd);
        assert_eq!(outcomes, vec![("BaseBandRX".to_string(), StageOutcome::Completed)]);
        assert_eq!(handle.send_count(), expected);
    }
}
