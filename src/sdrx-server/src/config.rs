// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for sdrx-server.
//!
//! Config is loaded from the `[sdrx-server]` section of `sdrx.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./sdrx.toml`
//! 3. `~/.config/sdrx/sdrx.toml`
//! 4. `/etc/sdrx/sdrx.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sdrx_app::{ConfigError, ConfigFile};
use sdrx_rx::{RxSettings, SourceKind, SourceSettings, SpectrumSettings};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Text commands posted once every stage is running,
    /// e.g. `"SET RX_AF_FILTER I BW_2000"`
    pub startup_commands: Vec<String>,
    /// General settings
    pub general: GeneralConfig,
    /// Receiver chain: rates, buffer sizes, initial mode and gains
    pub rx: RxSettings,
    /// Where IF samples come from
    pub source: SourceSettings,
    /// Where demodulated audio goes
    pub audio: AudioConfig,
    /// Spectrum display feed
    pub spectrum: SpectrumSettings,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSink {
    /// Discard audio, paced like a real sound card
    #[default]
    Null,
    /// Raw f32 little-endian samples written to `path`
    File,
}

/// Audio output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sink: AudioSink,
    pub path: Option<PathBuf>,
    /// Device-side queue depth in audio buffers (null sink only)
    pub device_buffers: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sink: AudioSink::Null,
            path: None,
            device_buffers: 8,
        }
    }
}

impl ServerConfig {
    /// Example as it would appear in a combined `sdrx.toml`.
    pub fn example_combined_toml() -> Result<String, ConfigError> {
        Self::example().to_combined_toml()
    }

    fn example() -> Self {
        ServerConfig {
            startup_commands: vec![
                "SET RX_AF_FILTER I BW_2000".to_string(),
                "GET SPEC_DIMS".to_string(),
            ],
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            rx: RxSettings::default(),
            source: SourceSettings {
                kind: SourceKind::Tone,
                ..Default::default()
            },
            audio: AudioConfig::default(),
            spectrum: SpectrumSettings::default(),
        }
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "sdrx-server"
    }

    fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        let rx = &self.rx;
        if rx.rf_sample_rate == 0 {
            return Err("[rx].rf_sample_rate must be > 0".to_string());
        }
        if rx.audio_sample_rate == 0 {
            return Err("[rx].audio_sample_rate must be > 0".to_string());
        }
        if rx.audio_sample_rate > rx.rf_sample_rate {
            return Err(format!(
                "[rx].audio_sample_rate ({}) must not exceed [rx].rf_sample_rate ({})",
                rx.audio_sample_rate, rx.rf_sample_rate
            ));
        }
        if rx.rf_buffer_size == 0 {
            return Err("[rx].rf_buffer_size must be > 0".to_string());
        }
        if rx.audio_buffer_size == 0 {
            return Err("[rx].audio_buffer_size must be > 0".to_string());
        }
        if rx.catchup_low_buffers > rx.catchup_high_buffers {
            return Err(
                "[rx].catchup_low_buffers must not exceed [rx].catchup_high_buffers".to_string(),
            );
        }

        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err("[source].path must be set when [source].kind = \"file\"".to_string());
        }

        if self.audio.sink == AudioSink::File && self.audio.path.is_none() {
            return Err("[audio].path must be set when [audio].sink = \"file\"".to_string());
        }
        if self.audio.device_buffers == 0 {
            return Err("[audio].device_buffers must be > 0".to_string());
        }

        let spectrum = &self.spectrum;
        if spectrum.enabled {
            if spectrum.segment_length < 2 {
                return Err("[spectrum].segment_length must be >= 2".to_string());
            }
            if !(0.0..=1.0).contains(&spectrum.alpha) {
                return Err("[spectrum].alpha must be in range 0..=1".to_string());
            }
            if spectrum.update_rate == 0 {
                return Err("[spectrum].update_rate must be > 0".to_string());
            }
        }

        if self.startup_commands.iter().any(|c| c.trim().is_empty()) {
            return Err("startup_commands must not contain empty entries".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::{AudioFilterBw, ModulationType};

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.rx.rf_sample_rate, 480_000);
        assert_eq!(config.rx.audio_sample_rate, 48_000);
        assert_eq!(config.rx.mode, ModulationType::Usb);
        assert_eq!(config.rx.filter, AudioFilterBw::Bw6000);
        assert_eq!(config.source.kind, SourceKind::Silence);
        assert_eq!(config.audio.sink, AudioSink::Null);
        assert!(config.spectrum.enabled);
        assert!(config.startup_commands.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
startup_commands = ["SET NBFM_SQUELCH D 3.5"]

[general]
log_level = "debug"

[rx]
rf_sample_rate = 240000
audio_sample_rate = 24000
rf_buffer_size = 12000
mode = "NBFM"
filter = "BW_2000"
af_gain = 54.0
squelch = 3.0

[source]
kind = "file"
path = "/tmp/capture.cf32"
loop = false

[audio]
sink = "file"
path = "/tmp/audio.f32"

[spectrum]
segment_length = 1024
alpha = 0.25
window = "blackman"
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.rx.rf_sample_rate, 240_000);
        assert_eq!(config.rx.mode, ModulationType::Nbfm);
        assert_eq!(config.rx.filter, AudioFilterBw::Bw2000);
        assert_eq!(config.rx.squelch, Some(3.0));
        assert_eq!(config.rx.audio_buffer_size, 2400);
        assert_eq!(config.source.kind, SourceKind::File);
        assert!(!config.source.looped);
        assert_eq!(config.audio.sink, AudioSink::File);
        assert_eq!(config.spectrum.segment_length, 1024);
        assert_eq!(config.spectrum.window, sdrx_rx::SpectrumWindow::Blackman);
        assert_eq!(config.startup_commands.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("chatty".to_string());
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.rx.rf_sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.rx.audio_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.audio.sink = AudioSink::File;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.source.kind = SourceKind::File;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.spectrum.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.startup_commands = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_section() {
        let path = std::env::temp_dir().join(format!(
            "sdrx-server-invalid-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[sdrx-server.rx]\nrf_sample_rate = 0\n").unwrap();
        assert!(matches!(
            ServerConfig::load(Some(&path)),
            Err(ConfigError::Invalid("sdrx-server", _))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_example_combined_toml_round_trips() {
        let text = ServerConfig::example_combined_toml().unwrap();
        assert!(text.contains("[sdrx-server.rx]"));
        let table: toml::Table = toml::from_str(&text).unwrap();
        let section = toml::to_string(&table["sdrx-server"]).unwrap();
        let config: ServerConfig = toml::from_str(&section).unwrap();
        assert_eq!(config.source.kind, SourceKind::Tone);
        assert!(config.validate().is_ok());
    }
}
