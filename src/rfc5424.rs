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

//! RFC [5424]-compliant syslog message formatting
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! This module owns the syslog side of the wire: the validated identity fields that go into the
//! message header, the structured-data element type, and [`format`], which lays out a
//! [`Record`] as a single RFC 5424 line ready to be framed by the RELP transport.

use crate::{
    error::{Error, Result},
    facility::priority,
    record::Record,
};

use backtrace::Backtrace;
use bytes::BufMut;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

type StdResult<T, E> = std::result::Result<T, E>;

/// RFC 5424 PRINTUSASCII: %d33-126
fn is_print_us_ascii(s: &str) -> bool {
    s.bytes().all(|b| (33..=126).contains(&b))
}

/// A [`String`] with the additional constraint that it be between one & 255 bytes of printable
/// US-ASCII.
///
/// This is the _configured_ hostname: the logical sender identity that appears in the message
/// header. It is deliberately distinct from the OS hostname that is reported in the origin &
/// event-id structured data (see [`resolve_hostname`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Hostname(String);

impl Hostname {
    pub fn new<S: Into<String>>(name: S) -> Result<Hostname> {
        let name = name.into();
        if !name.is_empty() && name.len() < 256 && is_print_us_ascii(&name) {
            Ok(Hostname(name))
        } else {
            Err(Error::BadHostname {
                name,
                back: Backtrace::new(),
            })
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::convert::TryFrom<String> for Hostname {
    type Error = Error;
    fn try_from(x: String) -> StdResult<Self, Self::Error> {
        Hostname::new(x)
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A [`String`] with the additional constraint that it be between one & forty-eight bytes of
/// printable US-ASCII.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new<S: Into<String>>(name: S) -> Result<AppName> {
        let name = name.into();
        if !name.is_empty() && name.len() < 49 && is_print_us_ascii(&name) {
            Ok(AppName(name))
        } else {
            Err(Error::BadAppName {
                name,
                back: Backtrace::new(),
            })
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::convert::TryFrom<String> for AppName {
    type Error = Error;
    fn try_from(x: String) -> StdResult<Self, Self::Error> {
        AppName::new(x)
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ask the operating system for this host's name, falling back to `default` if it can't say.
///
/// The result is only ever used inside structured data, where any UTF-8 is legal, so unlike
/// [`Hostname`] it isn't validated.
pub fn resolve_hostname(default: &str) -> String {
    match hostname::get() {
        Ok(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        Ok(_) => {
            warn!(default, "The OS reported an empty hostname; using the default");
            default.to_owned()
        }
        Err(err) => {
            warn!(default, %err, "Could not determine hostname; using the default");
            default.to_owned()
        }
    }
}

/// One RFC 5424 structured data element: an SD-ID & its parameters, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdElement {
    pub id: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl SdElement {
    pub fn new(id: &'static str) -> SdElement {
        SdElement {
            id,
            params: Vec::new(),
        }
    }
    pub fn param<S: Into<String>>(mut self, name: &'static str, value: S) -> SdElement {
        self.params.push((name, value.into()));
        self
    }
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'[');
        buf.put_slice(self.id.as_bytes());
        for (name, value) in &self.params {
            buf.put_u8(b' ');
            buf.put_slice(name.as_bytes());
            buf.put_slice(b"=\"");
            // PARAM-VALUE must escape '"', '\' & ']' (RFC 5424 sec. 6.3.3)
            for c in value.chars() {
                if matches!(c, '"' | '\\' | ']') {
                    buf.put_u8(b'\\');
                }
                let mut utf8 = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
            buf.put_u8(b'"');
        }
        buf.put_u8(b']');
    }
}

fn format_timestamp(timestamp: Option<&DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => "-".to_owned(),
    }
}

/// Lay out `record` as an RFC 5424 syslog message.
///
/// ```text
/// <PRI>1 TIMESTAMP HOSTNAME APP-NAME - - STRUCTURED-DATA MSG
/// ```
///
/// PROCID & MSGID are always the NILVALUE. The payload is written verbatim, without a BOM.
pub fn format(record: &Record) -> Vec<u8> {
    let mut buf = format!(
        "<{}>1 {} {} {} - - ",
        priority(record.facility(), record.severity()),
        format_timestamp(record.timestamp()),
        record.hostname(),
        record.app_name()
    )
    .into_bytes();

    let elements = record.structured_data();
    if elements.is_empty() {
        buf.put_u8(b'-');
    } else {
        for element in &elements {
            element.write_to(&mut buf);
        }
    }
    buf.put_u8(b' ');
    buf.put_slice(record.payload().as_bytes());
    buf
}
