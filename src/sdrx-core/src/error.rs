// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use sdrx_dsp::DspError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("mailbox '{0}' is already registered")]
    Exists(String),
    #[error("mailbox '{0}' is not registered")]
    Missing(String),
    #[error("mailbox '{0}' carries a different message type")]
    WrongType(String),
}

/// Errors a pipeline stage can stop on.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error(transparent)]
    Dsp(#[from] DspError),

    #[error("{component}: {reason}")]
    Runtime { component: String, reason: String },

    #[error("{component}: unsupported modulation mode {mode}")]
    UnsupportedMode { component: String, mode: String },

    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error("audio: {0}")]
    Audio(String),
}

impl RadioError {
    pub fn runtime(component: impl Into<String>, reason: impl Into<String>) -> Self {
        RadioError::Runtime {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

pub type RadioResult<T> = Result<T, RadioError>;
