// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of relp-appender.
//
// relp-appender is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// relp-appender is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with relp-appender.  If
// not, see <http://www.gnu.org/licenses/>.

//! RELP framing.
//!
//! Every RELP message, in either direction, is a single frame:
//!
//! ```text
//! TXNR SP COMMAND SP DATALEN [SP DATA] LF
//! ```
//!
//! where DATA is present iff DATALEN is non-zero. Responses use the command `rsp` & begin their
//! data with a three-digit status code.

use crate::error::{Error, Result};

use bytes::{BufMut, Bytes, BytesMut};

use std::io::{BufRead, Read};

/// Transaction numbers wrap back to one after this
pub const MAX_TXNR: u64 = 999_999_999;
/// Refuse to buffer frames larger than this
pub const MAX_DATALEN: usize = 128 * 1024 * 1024;

const MAX_TOKEN: usize = 32;

/// One RELP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelpFrame {
    pub txnr: u64,
    pub command: String,
    pub data: Bytes,
}

impl RelpFrame {
    pub fn new<C: Into<String>, D: Into<Bytes>>(txnr: u64, command: C, data: D) -> RelpFrame {
        RelpFrame {
            txnr,
            command: command.into(),
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let header = format!("{} {} {}", self.txnr, self.command, self.data.len());
        let mut buf = BytesMut::with_capacity(header.len() + self.data.len() + 2);
        buf.put_slice(header.as_bytes());
        if !self.data.is_empty() {
            buf.put_u8(b' ');
            buf.put_slice(&self.data);
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }

    /// Read exactly one frame from `reader`.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<RelpFrame> {
        let (txnr, term) = read_token(reader)?;
        if term != b' ' {
            return Err(Error::protocol("frame ended after the transaction number"));
        }
        let txnr = parse_number(&txnr, "transaction number")?;

        let (command, term) = read_token(reader)?;
        if term != b' ' || command.is_empty() {
            return Err(Error::protocol("frame ended after the command"));
        }
        let command = String::from_utf8(command)
            .map_err(|_| Error::protocol("command is not valid UTF-8"))?;

        let (datalen, term) = read_token(reader)?;
        let datalen = parse_number(&datalen, "data length")? as usize;
        if datalen > MAX_DATALEN {
            return Err(Error::protocol(format!(
                "data length {} exceeds {}",
                datalen, MAX_DATALEN
            )));
        }

        let data = match (datalen, term) {
            (0, b'\n') => Bytes::new(),
            (0, _) => return Err(Error::protocol("zero-length frame not terminated by LF")),
            (_, b'\n') => return Err(Error::protocol("frame is missing its data")),
            (n, _) => {
                let mut data = vec![0u8; n];
                reader.read_exact(&mut data).map_err(Error::transport)?;
                let mut trailer = [0u8; 1];
                reader.read_exact(&mut trailer).map_err(Error::transport)?;
                if trailer[0] != b'\n' {
                    return Err(Error::protocol("frame not terminated by LF"));
                }
                Bytes::from(data)
            }
        };

        Ok(RelpFrame {
            txnr,
            command,
            data,
        })
    }

    /// The status code of an `rsp` frame, if this is one.
    pub fn response_code(&self) -> Option<u16> {
        if self.command != "rsp" || self.data.len() < 3 {
            return None;
        }
        std::str::from_utf8(&self.data[..3]).ok()?.parse().ok()
    }
}

/// The transaction number following `txnr`.
pub fn next_txnr(txnr: u64) -> u64 {
    if txnr >= MAX_TXNR {
        1
    } else {
        txnr + 1
    }
}

/// Read bytes up to (and consuming) the next SP or LF, returning them along with the terminator.
fn read_token<R: BufRead>(reader: &mut R) -> Result<(Vec<u8>, u8)> {
    let mut token = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).map_err(Error::transport)?;
        match byte[0] {
            b' ' | b'\n' => return Ok((token, byte[0])),
            b => {
                if token.len() >= MAX_TOKEN {
                    return Err(Error::protocol("header token too long"));
                }
                token.push(b);
            }
        }
    }
}

fn parse_number(token: &[u8], what: &str) -> Result<u64> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return Err(Error::protocol(format!("bad {}", what)));
    }
    // All ASCII digits, so valid UTF-8; may still overflow.
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::protocol(format!("{} out of range", what)))
}
