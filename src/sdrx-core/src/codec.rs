// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-size binary framing for [`Command`].
//!
//! Wire format, little endian, 80 bytes:
//! `[8 id][1 cmd][1 parm type][2 target][64 payload][4 tag]`
//!
//! The payload holds four `i32`, four `f64` or a NUL-padded string,
//! zero-filled to 64 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::command::{truncate_sparm, CmdTarget, CmdType, Command, Parms, SPARM_LEN};

pub const WIRE_SIZE: usize = 8 + 1 + 1 + 2 + PAYLOAD_SIZE + 4;
const PAYLOAD_SIZE: usize = SPARM_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("command frame is {0} bytes, expected {WIRE_SIZE}")]
    BadLength(usize),
    #[error("unknown command type code {0}")]
    BadCmdType(u8),
    #[error("unknown command target code {0}")]
    BadTarget(u16),
    #[error("unknown parameter type '{0}'")]
    BadParmType(char),
    #[error("string parameter is not valid UTF-8")]
    BadString,
}

impl Command {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WIRE_SIZE);
        buf.put_u64_le(self.id);
        buf.put_u8(self.cmd.code());
        buf.put_u8(self.parms.type_char() as u8);
        buf.put_u16_le(self.target.code());

        let payload_start = buf.len();
        match &self.parms {
            Parms::None => {}
            Parms::Int(values) => values.iter().for_each(|v| buf.put_i32_le(*v)),
            Parms::Double(values) => values.iter().for_each(|v| buf.put_f64_le(*v)),
            Parms::Str(s) => buf.put_slice(truncate_sparm(s).as_bytes()),
        }
        let used = buf.len() - payload_start;
        buf.put_bytes(0, PAYLOAD_SIZE - used);

        buf.put_u32_le(self.tag);
        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() != WIRE_SIZE {
            return Err(CodecError::BadLength(frame.len()));
        }
        let mut buf = frame;
        let id = buf.get_u64_le();
        let cmd_code = buf.get_u8();
        let parm_type = buf.get_u8() as char;
        let target_code = buf.get_u16_le();

        let cmd = CmdType::from_code(cmd_code).ok_or(CodecError::BadCmdType(cmd_code))?;
        let target = CmdTarget::from_code(target_code).ok_or(CodecError::BadTarget(target_code))?;

        let mut payload = &buf[..PAYLOAD_SIZE];
        let parms = match parm_type {
            ' ' | '\0' => Parms::None,
            'I' => {
                let mut v = [0i32; 4];
                v.iter_mut().for_each(|slot| *slot = payload.get_i32_le());
                Parms::Int(v)
            }
            'D' => {
                let mut v = [0f64; 4];
                v.iter_mut().for_each(|slot| *slot = payload.get_f64_le());
                Parms::Double(v)
            }
            'S' => {
                let end = payload.iter().position(|&b| b == 0).unwrap_or(SPARM_LEN - 1);
                let text =
                    std::str::from_utf8(&payload[..end]).map_err(|_| CodecError::BadString)?;
                Parms::Str(text.to_string())
            }
            other => return Err(CodecError::BadParmType(other)),
        };
        buf.advance(PAYLOAD_SIZE);
        let tag = buf.get_u32_le();

        Ok(Self {
            id,
            cmd,
            target,
            parms,
            tag,
        })
    }
}
