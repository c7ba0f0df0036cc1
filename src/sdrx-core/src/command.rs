// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The radio control message shared by every pipeline stage.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Longest string parameter, including the terminating NUL on the wire.
pub const SPARM_LEN: usize = 64;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a [`Command`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CmdType {
    /// Change a piece of state.
    Set,
    /// Ask the owner of a piece of state to report it.
    Get,
    /// Report of a state value, usually in answer to SET or GET.
    Rep,
    None,
}

impl CmdType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CmdType::Set),
            1 => Some(CmdType::Get),
            2 => Some(CmdType::Rep),
            3 => Some(CmdType::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmdType::Set => "SET",
            CmdType::Get => "GET",
            CmdType::Rep => "REP",
            CmdType::None => "NONE",
        }
    }
}

/// The piece of radio state a [`Command`] touches.
///
/// Stages act on the targets they know and ignore the rest, so new targets
/// can be added without touching existing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CmdTarget {
    /// Tune the receiver to a frequency (Hz).
    RxTuneFreq,
    RxFeFreq,
    RxRetuneFreq,
    RxLo3Freq,
    RxCenterFreq,
    TxTuneFreq,
    TxFeFreq,
    TxRetuneFreq,
    RxSampRate,
    TxSampRate,
    RxAnt,
    TxAnt,
    RxRfGain,
    TxRfGain,
    /// Receive audio gain.
    RxAfGain,
    /// Audio gain while transmitting (CW sidetone).
    RxAfSidetoneGain,
    TxAfGain,
    /// Transmit/receive switch, a [`TxStateSelector`].
    TxState,
    RxState,
    TxBeacon,
    TxCwText,
    TxCwSpeed,
    TxCwFlushtext,
    TxCwMarker,
    TxCwEmpty,
    /// Receive demodulation mode, a [`ModulationType`].
    RxMode,
    TxMode,
    RxBw,
    Rbw,
    SpecCenterFreq,
    SpecRangeLow,
    SpecRangeHi,
    SpecStep,
    SpecBufLen,
    /// Spectrum geometry: centre, span and bin count.
    SpecDims,
    /// Number of segments averaged into one spectrum.
    SpecAvgWindow,
    /// Segments between spectrum reports.
    SpecUpdateRate,
    ClockSource,
    LoCheck,
    LoOffset,
    /// Audio filter selection, an [`AudioFilterBw`].
    RxAfFilter,
    /// Passband edges of the selected audio filter.
    RxAfFilterShape,
    GpsLatlon,
    GpsUtc,
    GpsLock,
    /// Version string of the radio server.
    SdrVersion,
    /// Ask stages to log their internal counters.
    DbgRep,
    HwmbRep,
    /// Shut down every stage.
    Stop,
    TvrtLoEnable,
    TvrtLoDisable,
    TvrtLoConfig,
    /// Free-form status text.
    StatusMessage,
    TxAudioIn,
    TxAudioFiltEna,
    RxGainRange,
    TxGainRange,
    RxAntName,
    TxAntName,
    ModSelEntry,
    AfFiltEntry,
    InitSetupComplete,
    CwCharSent,
    RfRecordStart,
    RfRecordStop,
    /// Narrowband FM squelch threshold.
    NbfmSquelch,
    /// Audio buffer length in samples.
    AudioBufSize,
    /// Audio sample rate in Hz.
    AudioSampleRate,
    /// Placeholder target that no stage acts on.
    NullCmd,
}

impl CmdTarget {
    /// Every target, indexed by its wire code.
    pub const ALL: [CmdTarget; 69] = [
        CmdTarget::RxTuneFreq,
        CmdTarget::RxFeFreq,
        CmdTarget::RxRetuneFreq,
        CmdTarget::RxLo3Freq,
        CmdTarget::RxCenterFreq,
        CmdTarget::TxTuneFreq,
        CmdTarget::TxFeFreq,
        CmdTarget::TxRetuneFreq,
        CmdTarget::RxSampRate,
        CmdTarget::TxSampRate,
        CmdTarget::RxAnt,
        CmdTarget::TxAnt,
        CmdTarget::RxRfGain,
        CmdTarget::TxRfGain,
        CmdTarget::RxAfGain,
        CmdTarget::RxAfSidetoneGain,
        CmdTarget::TxAfGain,
        CmdTarget::TxState,
        CmdTarget::RxState,
        CmdTarget::TxBeacon,
        CmdTarget::TxCwText,
        CmdTarget::TxCwSpeed,
        CmdTarget::TxCwFlushtext,
        CmdTarget::TxCwMarker,
        CmdTarget::TxCwEmpty,
        CmdTarget::RxMode,
        CmdTarget::TxMode,
        CmdTarget::RxBw,
        CmdTarget::Rbw,
        CmdTarget::SpecCenterFreq,
        CmdTarget::SpecRangeLow,
        CmdTarget::SpecRangeHi,
        CmdTarget::SpecStep,
        CmdTarget::SpecBufLen,
        CmdTarget::SpecDims,
        CmdTarget::SpecAvgWindow,
        CmdTarget::SpecUpdateRate,
        CmdTarget::ClockSource,
        CmdTarget::LoCheck,
        CmdTarget::LoOffset,
        CmdTarget::RxAfFilter,
        CmdTarget::RxAfFilterShape,
        CmdTarget::GpsLatlon,
        CmdTarget::GpsUtc,
        CmdTarget::GpsLock,
        CmdTarget::SdrVersion,
        CmdTarget::DbgRep,
        CmdTarget::HwmbRep,
        CmdTarget::Stop,
        CmdTarget::TvrtLoEnable,
        CmdTarget::TvrtLoDisable,
        CmdTarget::TvrtLoConfig,
        CmdTarget::StatusMessage,
        CmdTarget::TxAudioIn,
        CmdTarget::TxAudioFiltEna,
        CmdTarget::RxGainRange,
        CmdTarget::TxGainRange,
        CmdTarget::RxAntName,
        CmdTarget::TxAntName,
        CmdTarget::ModSelEntry,
        CmdTarget::AfFiltEntry,
        CmdTarget::InitSetupComplete,
        CmdTarget::CwCharSent,
        CmdTarget::RfRecordStart,
        CmdTarget::RfRecordStop,
        CmdTarget::NbfmSquelch,
        CmdTarget::AudioBufSize,
        CmdTarget::AudioSampleRate,
        CmdTarget::NullCmd,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmdTarget::RxTuneFreq => "RX_TUNE_FREQ",
            CmdTarget::RxFeFreq => "RX_FE_FREQ",
            CmdTarget::RxRetuneFreq => "RX_RETUNE_FREQ",
            CmdTarget::RxLo3Freq => "RX_LO3_FREQ",
            CmdTarget::RxCenterFreq => "RX_CENTER_FREQ",
            CmdTarget::TxTuneFreq => "TX_TUNE_FREQ",
            CmdTarget::TxFeFreq => "TX_FE_FREQ",
            CmdTarget::TxRetuneFreq => "TX_RETUNE_FREQ",
            CmdTarget::RxSampRate => "RX_SAMP_RATE",
            CmdTarget::TxSampRate => "TX_SAMP_RATE",
            CmdTarget::RxAnt => "RX_ANT",
            CmdTarget::TxAnt => "TX_ANT",
            CmdTarget::RxRfGain => "RX_RF_GAIN",
            CmdTarget::TxRfGain => "TX_RF_GAIN",
            CmdTarget::RxAfGain => "RX_AF_GAIN",
            CmdTarget::RxAfSidetoneGain => "RX_AF_SIDETONE_GAIN",
            CmdTarget::TxAfGain => "TX_AF_GAIN",
            CmdTarget::TxState => "TX_STATE",
            CmdTarget::RxState => "RX_STATE",
            CmdTarget::TxBeacon => "TX_BEACON",
            CmdTarget::TxCwText => "TX_CW_TEXT",
            CmdTarget::TxCwSpeed => "TX_CW_SPEED",
            CmdTarget::TxCwFlushtext => "TX_CW_FLUSHTEXT",
            CmdTarget::TxCwMarker => "TX_CW_MARKER",
            CmdTarget::TxCwEmpty => "TX_CW_EMPTY",
            CmdTarget::RxMode => "RX_MODE",
            CmdTarget::TxMode => "TX_MODE",
            CmdTarget::RxBw => "RX_BW",
            CmdTarget::Rbw => "RBW",
            CmdTarget::SpecCenterFreq => "SPEC_CENTER_FREQ",
            CmdTarget::SpecRangeLow => "SPEC_RANGE_LOW",
            CmdTarget::SpecRangeHi => "SPEC_RANGE_HI",
            CmdTarget::SpecStep => "SPEC_STEP",
            CmdTarget::SpecBufLen => "SPEC_BUF_LEN",
            CmdTarget::SpecDims => "SPEC_DIMS",
            CmdTarget::SpecAvgWindow => "SPEC_AVG_WINDOW",
            CmdTarget::SpecUpdateRate => "SPEC_UPDATE_RATE",
            CmdTarget::ClockSource => "CLOCK_SOURCE",
            CmdTarget::LoCheck => "LO_CHECK",
            CmdTarget::LoOffset => "LO_OFFSET",
            CmdTarget::RxAfFilter => "RX_AF_FILTER",
            CmdTarget::RxAfFilterShape => "RX_AF_FILTER_SHAPE",
            CmdTarget::GpsLatlon => "GPS_LATLON",
            CmdTarget::GpsUtc => "GPS_UTC",
            CmdTarget::GpsLock => "GPS_LOCK",
            CmdTarget::SdrVersion => "SDR_VERSION",
            CmdTarget::DbgRep => "DBG_REP",
            CmdTarget::HwmbRep => "HWMB_REP",
            CmdTarget::Stop => "STOP",
            CmdTarget::TvrtLoEnable => "TVRT_LO_ENABLE",
            CmdTarget::TvrtLoDisable => "TVRT_LO_DISABLE",
            CmdTarget::TvrtLoConfig => "TVRT_LO_CONFIG",
            CmdTarget::StatusMessage => "STATUS_MESSAGE",
            CmdTarget::TxAudioIn => "TX_AUDIO_IN",
            CmdTarget::TxAudioFiltEna => "TX_AUDIO_FILT_ENA",
            CmdTarget::RxGainRange => "RX_GAIN_RANGE",
            CmdTarget::TxGainRange => "TX_GAIN_RANGE",
            CmdTarget::RxAntName => "RX_ANT_NAME",
            CmdTarget::TxAntName => "TX_ANT_NAME",
            CmdTarget::ModSelEntry => "MOD_SEL_ENTRY",
            CmdTarget::AfFiltEntry => "AF_FILT_ENTRY",
            CmdTarget::InitSetupComplete => "INIT_SETUP_COMPLETE",
            CmdTarget::CwCharSent => "CW_CHAR_SENT",
            CmdTarget::RfRecordStart => "RF_RECORD_START",
            CmdTarget::RfRecordStop => "RF_RECORD_STOP",
            CmdTarget::NbfmSquelch => "NBFM_SQUELCH",
            CmdTarget::AudioBufSize => "AUDIO_BUF_SIZE",
            CmdTarget::AudioSampleRate => "AUDIO_SAMPLE_RATE",
            CmdTarget::NullCmd => "NULL_CMD",
        }
    }
}

/// Demodulation (and modulation) modes carried by RX_MODE and TX_MODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModulationType {
    Lsb,
    Usb,
    CwU,
    CwL,
    Am,
    Wbfm,
    Nbfm,
}

impl ModulationType {
    pub const ALL: [ModulationType; 7] = [
        ModulationType::Lsb,
        ModulationType::Usb,
        ModulationType::CwU,
        ModulationType::CwL,
        ModulationType::Am,
        ModulationType::Wbfm,
        ModulationType::Nbfm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModulationType::Lsb => "LSB",
            ModulationType::Usb => "USB",
            ModulationType::CwU => "CW_U",
            ModulationType::CwL => "CW_L",
            ModulationType::Am => "AM",
            ModulationType::Wbfm => "WBFM",
            ModulationType::Nbfm => "NBFM",
        }
    }

    /// True for the modes whose audio sits below the carrier.
    pub fn is_lower_sideband(self) -> bool {
        matches!(self, ModulationType::Lsb | ModulationType::CwL)
    }
}

impl From<ModulationType> for i32 {
    fn from(mode: ModulationType) -> Self {
        mode as i32
    }
}

impl TryFrom<i32> for ModulationType {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(value)
    }
}

impl fmt::Display for ModulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio filter selections for RX_AF_FILTER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFilterBw {
    #[serde(rename = "BW_100")]
    Bw100,
    #[serde(rename = "BW_500")]
    Bw500,
    #[serde(rename = "BW_2000")]
    Bw2000,
    #[serde(rename = "BW_6000")]
    Bw6000,
    #[serde(rename = "BW_PASS")]
    BwPass,
    #[serde(rename = "BW_WSPR")]
    BwWspr,
    #[serde(rename = "BW_NULL")]
    BwNull,
}

impl AudioFilterBw {
    pub const ALL: [AudioFilterBw; 7] = [
        AudioFilterBw::Bw100,
        AudioFilterBw::Bw500,
        AudioFilterBw::Bw2000,
        AudioFilterBw::Bw6000,
        AudioFilterBw::BwPass,
        AudioFilterBw::BwWspr,
        AudioFilterBw::BwNull,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFilterBw::Bw100 => "BW_100",
            AudioFilterBw::Bw500 => "BW_500",
            AudioFilterBw::Bw2000 => "BW_2000",
            AudioFilterBw::Bw6000 => "BW_6000",
            AudioFilterBw::BwPass => "BW_PASS",
            AudioFilterBw::BwWspr => "BW_WSPR",
            AudioFilterBw::BwNull => "BW_NULL",
        }
    }
}

impl From<AudioFilterBw> for i32 {
    fn from(bw: AudioFilterBw) -> Self {
        bw as i32
    }
}

impl TryFrom<i32> for AudioFilterBw {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(value)
    }
}

impl fmt::Display for AudioFilterBw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transmit/receive sequencing steps carried by TX_STATE.
///
/// The receive chain goes quiet on `TxReady` and comes back on `RxOn`;
/// the transmit chain keys up on `TxOn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStateSelector {
    RxReady,
    TxReady,
    RxOn,
    TxOn,
}

impl TxStateSelector {
    pub const ALL: [TxStateSelector; 4] = [
        TxStateSelector::RxReady,
        TxStateSelector::TxReady,
        TxStateSelector::RxOn,
        TxStateSelector::TxOn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TxStateSelector::RxReady => "RX_READY",
            TxStateSelector::TxReady => "TX_READY",
            TxStateSelector::RxOn => "RX_ON",
            TxStateSelector::TxOn => "TX_ON",
        }
    }
}

impl From<TxStateSelector> for i32 {
    fn from(state: TxStateSelector) -> Self {
        state as i32
    }
}

impl TryFrom<i32> for TxStateSelector {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(value)
    }
}

/// Parameter payload of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parms {
    None,
    Int([i32; 4]),
    Double([f64; 4]),
    /// At most `SPARM_LEN - 1` bytes.
    Str(String),
}

impl Parms {
    /// Single-letter tag used on the wire and in text form.
    pub fn type_char(&self) -> char {
        match self {
            Parms::None => ' ',
            Parms::Int(_) => 'I',
            Parms::Double(_) => 'D',
            Parms::Str(_) => 'S',
        }
    }
}

/// A single control message.
///
/// Commands are plain values: every subscriber of a mailbox sees the same
/// immutable command, and nobody mutates one after it is posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Process-wide sequence number, increasing with construction order.
    pub id: u64,
    pub cmd: CmdType,
    pub target: CmdTarget,
    pub parms: Parms,
    pub tag: u32,
}

impl Command {
    pub fn new(cmd: CmdType, target: CmdTarget) -> Self {
        Self::with_parms(cmd, target, Parms::None)
    }

    pub fn with_parms(cmd: CmdType, target: CmdTarget, parms: Parms) -> Self {
        Self {
            id: next_id(),
            cmd,
            target,
            parms,
            tag: 0,
        }
    }

    pub fn with_int(cmd: CmdType, target: CmdTarget, value: i32) -> Self {
        Self::with_ints(cmd, target, [value, 0, 0, 0])
    }

    pub fn with_ints(cmd: CmdType, target: CmdTarget, values: [i32; 4]) -> Self {
        Self::with_parms(cmd, target, Parms::Int(values))
    }

    pub fn with_double(cmd: CmdType, target: CmdTarget, value: f64) -> Self {
        Self::with_doubles(cmd, target, [value, 0.0, 0.0, 0.0])
    }

    pub fn with_doubles(cmd: CmdType, target: CmdTarget, values: [f64; 4]) -> Self {
        Self::with_parms(cmd, target, Parms::Double(values))
    }

    /// String command; text beyond `SPARM_LEN - 1` bytes is cut at a char
    /// boundary.
    pub fn with_str(cmd: CmdType, target: CmdTarget, value: &str) -> Self {
        Self::with_parms(cmd, target, Parms::Str(truncate_sparm(value).to_string()))
    }

    pub fn set(target: CmdTarget) -> Self {
        Self::new(CmdType::Set, target)
    }

    /// The command that shuts the whole pipeline down.
    pub fn stop() -> Self {
        Self::new(CmdType::Set, CmdTarget::Stop)
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn is_stop(&self) -> bool {
        self.cmd == CmdType::Set && self.target == CmdTarget::Stop
    }

    /// Integer parameter `idx`, or 0 when the payload is not integral.
    pub fn iparm(&self, idx: usize) -> i32 {
        match &self.parms {
            Parms::Int(v) => v.get(idx).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Double parameter `idx`, or 0.0 when the payload is not a double.
    pub fn dparm(&self, idx: usize) -> f64 {
        match &self.parms {
            Parms::Double(v) => v.get(idx).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn sparm(&self) -> &str {
        match &self.parms {
            Parms::Str(s) => s,
            _ => "",
        }
    }
}

pub(crate) fn truncate_sparm(value: &str) -> &str {
    let max = SPARM_LEN - 1;
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cmd.as_str(), self.target.as_str())?;
        match &self.parms {
            Parms::None => {}
            Parms::Int(v) => write!(f, " I[{} {} {} {}]", v[0], v[1], v[2], v[3])?,
            Parms::Double(v) => write!(f, " D[{} {} {} {}]", v[0], v[1], v[2], v[3])?,
            Parms::Str(s) => write!(f, " S \"{}\"", s)?,
        }
        write!(f, " tag={} id={}", self.tag, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let a = Command::set(CmdTarget::RxMode);
        let b = Command::set(CmdTarget::RxMode);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_target_codes_are_dense() {
        for (idx, target) in CmdTarget::ALL.iter().enumerate() {
            assert_eq!(target.code() as usize, idx);
            assert_eq!(CmdTarget::from_code(idx as u16), Some(*target));
        }
        assert_eq!(CmdTarget::from_code(CmdTarget::ALL.len() as u16), None);
        assert_eq!(CmdTarget::Stop.as_str(), "STOP");
    }

    #[test]
    fn test_modulation_try_from() {
        assert_eq!(ModulationType::try_from(1), Ok(ModulationType::Usb));
        assert_eq!(ModulationType::try_from(6), Ok(ModulationType::Nbfm));
        assert_eq!(ModulationType::try_from(7), Err(7));
        assert_eq!(ModulationType::try_from(-1), Err(-1));
        assert_eq!(i32::from(ModulationType::CwL), 3);
        assert!(ModulationType::CwL.is_lower_sideband());
        assert!(!ModulationType::CwU.is_lower_sideband());
    }

    #[test]
    fn test_filter_and_tx_state_try_from() {
        assert_eq!(AudioFilterBw::try_from(3), Ok(AudioFilterBw::Bw6000));
        assert_eq!(AudioFilterBw::try_from(42), Err(42));
        assert_eq!(TxStateSelector::try_from(2), Ok(TxStateSelector::RxOn));
        assert_eq!(i32::from(TxStateSelector::TxReady), 1);
    }

    #[test]
    fn test_parameter_accessors() {
        let cmd = Command::with_ints(CmdType::Set, CmdTarget::TxState, [1, 1, 0, 0]);
        assert_eq!(cmd.iparm(0), 1);
        assert_eq!(cmd.iparm(1), 1);
        assert_eq!(cmd.iparm(9), 0);
        assert_eq!(cmd.dparm(0), 0.0);
        assert_eq!(cmd.sparm(), "");

        let cmd = Command::with_double(CmdType::Set, CmdTarget::RxAfGain, 55.5);
        assert_eq!(cmd.dparm(0), 55.5);
        assert_eq!(cmd.iparm(0), 0);
        assert_eq!(cmd.parms.type_char(), 'D');
    }

    #[test]
    fn test_string_parameter_is_bounded() {
        let long = "é".repeat(40);
        let cmd = Command::with_str(CmdType::Rep, CmdTarget::StatusMessage, &long);
        assert!(cmd.sparm().len() < SPARM_LEN);
        assert!(cmd.sparm().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_display() {
        let cmd = Command::with_int(CmdType::Set, CmdTarget::RxMode, 1).with_tag(7);
        let text = cmd.to_string();
        assert!(text.starts_with("SET RX_MODE I[1 0 0 0] tag=7 id="));

        let cmd = Command::with_str(CmdType::Rep, CmdTarget::SdrVersion, "1.0");
        assert!(cmd.to_string().starts_with("REP SDR_VERSION S \"1.0\""));
        assert!(Command::stop().is_stop());
    }

    #[test]
    fn test_modes_deserialize_from_names() {
        #[derive(Deserialize)]
        struct Holder {
            mode: ModulationType,
            filter: AudioFilterBw,
        }
        let holder: Holder = toml::from_str("mode = \"CW_U\"\nfilter = \"BW_2000\"\n")
            .expect("parse holder");
        assert_eq!(holder.mode, ModulationType::CwU);
        assert_eq!(holder.filter, AudioFilterBw::Bw2000);
    }
}
