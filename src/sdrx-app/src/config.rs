// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Loader for the sections of `sdrx.toml`.
//!
//! Every binary owns one top-level table (`[sdrx-server]`, ...). A section
//! is parsed on its own so serde defaults fill the gaps, then checked with
//! [`ConfigFile::validate`] before the caller sees it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "sdrx.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid [{0}] configuration: {1}")]
    Invalid(&'static str, String),

    #[error("Failed to render [{0}] as TOML: {1}")]
    RenderError(&'static str, String),
}

/// Default search paths for `sdrx.toml`
/// (current directory → XDG config → /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("sdrx").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/sdrx").join(CONFIG_FILE_NAME));
    paths
}

/// Pull one `[section]` out of a TOML document.
///
/// `Ok(None)` when the section is absent. The section is re-serialized and
/// parsed on its own so that serde defaults fill anything left out.
pub fn parse_section<T: DeserializeOwned>(
    content: &str,
    key: &str,
    origin: &Path,
) -> Result<Option<T>, ConfigError> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;

    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    let section_toml = toml::to_string(section)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;
    let cfg = toml::from_str::<T>(&section_toml)
        .map_err(|e| ConfigError::ParseError(origin.to_path_buf(), e.to_string()))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(&content, key, path)
}

/// A struct loaded from one `[<section_key>]` table of `sdrx.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned + Serialize {
    fn section_key() -> &'static str;

    /// Cross-field checks serde cannot express. Runs on every load,
    /// including when no file was found and defaults are used.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load the section from a specific file path; a missing section is an
    /// error here.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// First file in `paths` that has the section, or
    /// `(Default::default(), None)`.
    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                    return Ok((cfg, Some(path.clone())));
                }
            }
        }
        Ok((Self::default(), None))
    }

    /// Explicit path if given, otherwise [`config_search_paths`]. The
    /// result has passed [`ConfigFile::validate`].
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let (cfg, path) = match explicit {
            Some(path) => (Self::load_from_file(path)?, Some(path.to_path_buf())),
            None => Self::load_from_paths(&config_search_paths())?,
        };
        cfg.check()?;
        Ok((cfg, path))
    }

    /// [`ConfigFile::validate`] wrapped in a [`ConfigError`].
    fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Invalid(Self::section_key(), e))
    }

    /// `self` nested under its section key, the way it sits in a combined
    /// `sdrx.toml`.
    fn to_combined_toml(&self) -> Result<String, ConfigError> {
        let key = Self::section_key();
        let section =
            toml::Value::try_from(self).map_err(|e| ConfigError::RenderError(key, e.to_string()))?;
        let mut root = toml::Table::new();
        root.insert(key.to_string(), section);
        toml::to_string_pretty(&root).map_err(|e| ConfigError::RenderError(key, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(default)]
    struct Section {
        rate: u32,
        name: String,
    }

    impl ConfigFile for Section {
        fn section_key() -> &'static str {
            "unit"
        }

        fn validate(&self) -> Result<(), String> {
            if self.rate > 1_000_000 {
                return Err(format!("rate {} is too high", self.rate));
            }
            Ok(())
        }
    }

    fn temp_file(tag: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "sdrx-app-{}-{}.toml",
            tag,
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_search_paths_end_in_etc() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("sdrx.toml"));
        assert_eq!(paths.last(), Some(&PathBuf::from("/etc/sdrx/sdrx.toml")));
    }

    #[test]
    fn test_section_defaults_fill_gaps() {
        let cfg: Option<Section> =
            parse_section("[unit]\nrate = 48000\n", "unit", Path::new("x")).unwrap();
        assert_eq!(
            cfg,
            Some(Section {
                rate: 48000,
                name: String::new()
            })
        );
        let missing: Option<Section> = parse_section("[other]\n", "unit", Path::new("x")).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_load_from_file_requires_section() {
        let path = temp_file("nosection", "[other]\nrate = 1\n");
        assert!(matches!(
            Section::load_from_file(&path),
            Err(ConfigError::ParseError(_, _))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_paths_skips_files_without_section() {
        let first = temp_file("first", "[other]\n");
        let second = temp_file("second", "[unit]\nname = \"rx\"\n");
        let (cfg, found) =
            Section::load_from_paths(&[PathBuf::from("/nonexistent/sdrx.toml"), first.clone(), second.clone()])
                .unwrap();
        assert_eq!(cfg.name, "rx");
        assert_eq!(found, Some(second.clone()));
        std::fs::remove_file(&first).ok();
        std::fs::remove_file(&second).ok();
    }

    #[test]
    fn test_load_runs_validate() {
        let path = temp_file("invalid", "[unit]\nrate = 2000000\n");
        assert!(matches!(
            Section::load(Some(&path)),
            Err(ConfigError::Invalid("unit", _))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_combined_toml_nests_under_section_key() {
        let cfg = Section {
            rate: 48000,
            name: "rx".to_string(),
        };
        let text = cfg.to_combined_toml().unwrap();
        assert!(text.contains("[unit]"));
        let back: Option<Section> = parse_section(&text, "unit", Path::new("x")).unwrap();
        assert_eq!(back, Some(cfg));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let path = temp_file("bad", "[unit\n");
        assert!(matches!(
            Section::load(Some(&path)),
            Err(ConfigError::ParseError(_, _))
        ));
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            Section::load(Some(Path::new("/nonexistent/sdrx.toml"))),
            Err(ConfigError::ReadError(_, _))
        ));
    }
}
