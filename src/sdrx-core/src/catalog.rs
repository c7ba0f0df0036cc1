// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Text form of commands, for config files, logs and consoles.
//!
//! Grammar: `SET|GET|REP TARGET [I|D|S VALUE...]`. Integer values may be
//! given symbolically for targets that carry an enum (`SET RX_MODE I USB`).

use std::collections::HashMap;

use thiserror::Error;

use crate::command::{
    AudioFilterBw, CmdTarget, CmdType, Command, ModulationType, Parms, TxStateSelector,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command type '{0}'")]
    UnknownType(String),
    #[error("unknown command target '{0}'")]
    UnknownTarget(String),
    #[error("missing parameter type after {0}")]
    MissingParmType(String),
    #[error("unknown parameter type '{0}'")]
    UnknownParmType(String),
    #[error("bad value '{value}' for {target}")]
    BadValue { target: String, value: String },
    #[error("too many values for {0}, at most 4 are allowed")]
    TooManyValues(String),
}

/// Name tables for command types, targets and enumerated values.
///
/// Built once at start-up and handed to whoever needs to parse or
/// print commands.
pub struct CommandCatalog {
    types: HashMap<&'static str, CmdType>,
    targets: HashMap<&'static str, CmdTarget>,
    symbols: HashMap<CmdTarget, HashMap<&'static str, i32>>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandCatalog {
    pub fn new() -> Self {
        let types = [CmdType::Set, CmdType::Get, CmdType::Rep]
            .into_iter()
            .map(|t| (t.as_str(), t))
            .collect();
        let targets = CmdTarget::ALL.iter().map(|t| (t.as_str(), *t)).collect();

        let modes: HashMap<&'static str, i32> = ModulationType::ALL
            .iter()
            .map(|m| (m.as_str(), i32::from(*m)))
            .collect();
        let filters: HashMap<&'static str, i32> = AudioFilterBw::ALL
            .iter()
            .map(|f| (f.as_str(), i32::from(*f)))
            .collect();
        let tx_states: HashMap<&'static str, i32> = TxStateSelector::ALL
            .iter()
            .map(|s| (s.as_str(), i32::from(*s)))
            .collect();

        let mut symbols = HashMap::new();
        symbols.insert(CmdTarget::RxMode, modes.clone());
        symbols.insert(CmdTarget::TxMode, modes);
        symbols.insert(CmdTarget::RxAfFilter, filters);
        symbols.insert(CmdTarget::TxState, tx_states);

        Self {
            types,
            targets,
            symbols,
        }
    }

    pub fn target(&self, name: &str) -> Option<CmdTarget> {
        self.targets.get(name.to_uppercase().as_str()).copied()
    }

    pub fn cmd_type(&self, name: &str) -> Option<CmdType> {
        self.types.get(name.to_uppercase().as_str()).copied()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn parse(&self, line: &str) -> Result<Command, CommandParseError> {
        let mut tokens = line.split_whitespace();
        let type_tok = tokens.next().ok_or(CommandParseError::Empty)?;
        let cmd = self
            .cmd_type(type_tok)
            .ok_or_else(|| CommandParseError::UnknownType(type_tok.to_string()))?;

        let target_tok = tokens
            .next()
            .ok_or_else(|| CommandParseError::UnknownTarget(String::new()))?;
        let target = self
            .target(target_tok)
            .ok_or_else(|| CommandParseError::UnknownTarget(target_tok.to_string()))?;

        let parm_tok = match tokens.next() {
            Some(tok) => tok,
            None if cmd == CmdType::Set && !takes_no_value(target) => {
                return Err(CommandParseError::MissingParmType(target.as_str().to_string()))
            }
            None => return Ok(Command::new(cmd, target)),
        };

        let values: Vec<&str> = tokens.collect();
        let parms = match parm_tok.to_uppercase().as_str() {
            "I" => Parms::Int(self.parse_values(target, &values, |v| self.parse_int(target, v))?),
            "D" => Parms::Double(self.parse_values(target, &values, |v| v.parse::<f64>().ok())?),
            // Strings take the rest of the line verbatim.
            "S" => {
                let text = values.join(" ");
                let text = text.trim_matches('"');
                return Ok(Command::with_str(cmd, target, text));
            }
            _ => return Err(CommandParseError::UnknownParmType(parm_tok.to_string())),
        };
        Ok(Command::with_parms(cmd, target, parms))
    }

    fn parse_int(&self, target: CmdTarget, value: &str) -> Option<i32> {
        value.parse::<i32>().ok().or_else(|| {
            self.symbols
                .get(&target)
                .and_then(|table| table.get(value.to_uppercase().as_str()))
                .copied()
        })
    }

    fn parse_values<T: Copy + Default>(
        &self,
        target: CmdTarget,
        values: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<[T; 4], CommandParseError> {
        if values.len() > 4 {
            return Err(CommandParseError::TooManyValues(target.as_str().to_string()));
        }
        if values.is_empty() {
            return Err(CommandParseError::BadValue {
                target: target.as_str().to_string(),
                value: String::new(),
            });
        }
        let mut out = [T::default(); 4];
        for (slot, raw) in out.iter_mut().zip(values.iter()) {
            *slot = parse(raw).ok_or_else(|| CommandParseError::BadValue {
                target: target.as_str().to_string(),
                value: raw.to_string(),
            })?;
        }
        Ok(out)
    }
}

/// `SET` targets that act on their own and carry no parameters.
fn takes_no_value(target: CmdTarget) -> bool {
    matches!(target, CmdTarget::Stop | CmdTarget::RfRecordStop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_target_has_a_name() {
        let catalog = CommandCatalog::new();
        assert_eq!(catalog.target_count(), CmdTarget::ALL.len());
        assert_eq!(catalog.target("nbfm_squelch"), Some(CmdTarget::NbfmSquelch));
    }

    #[test]
    fn test_parse_symbolic_mode() {
        let catalog = CommandCatalog::new();
        let cmd = catalog.parse("SET RX_MODE I USB").unwrap();
        assert_eq!(cmd.cmd, CmdType::Set);
        assert_eq!(cmd.target, CmdTarget::RxMode);
        assert_eq!(cmd.iparm(0), i32::from(ModulationType::Usb));

        let cmd = catalog.parse("set rx_af_filter i bw_2000").unwrap();
        assert_eq!(cmd.iparm(0), i32::from(AudioFilterBw::Bw2000));

        let cmd = catalog.parse("SET TX_STATE I TX_READY 1").unwrap();
        assert_eq!(cmd.iparm(0), 1);
        assert_eq!(cmd.iparm(1), 1);
    }

    #[test]
    fn test_parse_numeric_and_string_values() {
        let catalog = CommandCatalog::new();
        let cmd = catalog.parse("SET RX_AF_GAIN D 55.5").unwrap();
        assert_eq!(cmd.dparm(0), 55.5);

        let cmd = catalog.parse("SET TX_CW_TEXT S \"CQ CQ DE K1ABC\"").unwrap();
        assert_eq!(cmd.sparm(), "CQ CQ DE K1ABC");

        let cmd = catalog.parse("GET SPEC_DIMS").unwrap();
        assert_eq!(cmd.cmd, CmdType::Get);
        assert_eq!(cmd.parms, Parms::None);
    }

    #[test]
    fn test_parse_bare_set_stop() {
        let catalog = CommandCatalog::new();
        let cmd = catalog.parse("SET STOP").unwrap();
        let stop = Command::stop();
        assert_eq!(cmd.cmd, stop.cmd);
        assert_eq!(cmd.target, stop.target);
        assert_eq!(cmd.parms, Parms::None);
        assert!(cmd.is_stop());

        let cmd = catalog.parse("set rf_record_stop").unwrap();
        assert_eq!(cmd.target, CmdTarget::RfRecordStop);
        assert_eq!(cmd.parms, Parms::None);
    }

    #[test]
    fn test_parse_errors() {
        let catalog = CommandCatalog::new();
        assert_eq!(catalog.parse("   "), Err(CommandParseError::Empty));
        assert_eq!(
            catalog.parse("FROB RX_MODE I 1"),
            Err(CommandParseError::UnknownType("FROB".into()))
        );
        assert_eq!(
            catalog.parse("SET NOT_A_TARGET I 1"),
            Err(CommandParseError::UnknownTarget("NOT_A_TARGET".into()))
        );
        assert!(matches!(
            catalog.parse("SET RX_MODE"),
            Err(CommandParseError::MissingParmType(_))
        ));
        assert!(matches!(
            catalog.parse("SET RX_MODE Q 1"),
            Err(CommandParseError::UnknownParmType(_))
        ));
        assert!(matches!(
            catalog.parse("SET RX_MODE I SSTV"),
            Err(CommandParseError::BadValue { .. })
        ));
        assert!(matches!(
            catalog.parse("SET RX_AF_GAIN D 1 2 3 4 5"),
            Err(CommandParseError::TooManyValues(_))
        ));
    }
}
