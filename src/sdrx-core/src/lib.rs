// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod buffer;
pub mod catalog;
pub mod codec;
pub mod command;
pub mod error;
pub mod mailbox;
pub mod registry;
pub mod stage;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use buffer::{BufferPool, ComplexBuf, ComplexPooledBuf, PooledBuf, RealBuf, RealPooledBuf, SampleBuf};
pub use catalog::{CommandCatalog, CommandParseError};
pub use codec::{CodecError, WIRE_SIZE};
pub use command::{
    AudioFilterBw, CmdTarget, CmdType, Command, ModulationType, Parms, TxStateSelector, SPARM_LEN,
};
pub use error::{MailboxError, RadioError, RadioResult};
pub use mailbox::{Mailbox, MailboxRegistry, Subscriber, SubscriberId};
pub use registry::ThreadRegistry;
pub use stage::{run_stage, Stage, StageOutcome, StageState, CMD_MAILBOX, POLL_INTERVAL};
