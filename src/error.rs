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

//! [relp-appender](crate) errors

use backtrace::Backtrace;

/// [relp-appender](crate) error type
///
/// Like its sibling crates, [relp-appender](crate) eschews libraries like [thiserror] & [anyhow]
/// in favor of a straightforward enumeration whose arms are chosen on the basis of what the caller
/// will need to do in response. Broadly, there are three families:
///
/// - configuration errors ([`Error::BadHostname`], [`Error::BadAppName`], [`Error::BadConfig`] &
///   [`Error::Tls`]), which are fatal & are only ever returned at construction time
/// - transient delivery errors ([`Error::Transport`], [`Error::Protocol`] &
///   [`Error::NotAcknowledged`]), which are retried inside the managed connection & never reach
///   the caller of [`append`](crate::appender::LogAppender::append)
/// - shutdown signals ([`Error::Cancelled`] & [`Error::PoolClosed`])
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
#[non_exhaustive]
pub enum Error {
    /// The configured hostname is not RFC 5424 compliant
    BadHostname { name: String, back: Backtrace },
    /// The configured application name is not RFC 5424 compliant
    BadAppName { name: String, back: Backtrace },
    /// Some other configuration value is out of range
    BadConfig { reason: String, back: Backtrace },
    /// The TLS material could not be loaded
    Tls {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// General transport layer error
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// The peer sent something that isn't RELP
    Protocol { reason: String, back: Backtrace },
    /// The peer answered a transaction with a status other than 200
    NotAcknowledged { code: u16, back: Backtrace },
    /// A retry loop was interrupted by shutdown
    Cancelled,
    /// The connection pool has been closed
    PoolClosed,
}

impl Error {
    pub(crate) fn transport<E>(err: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn protocol<S: Into<String>>(reason: S) -> Error {
        Error::Protocol {
            reason: reason.into(),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn bad_config<S: Into<String>>(reason: S) -> Error {
        Error::BadConfig {
            reason: reason.into(),
            back: Backtrace::new(),
        }
    }
    /// True if this error belongs to the "retry it" family
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Protocol { .. } | Error::NotAcknowledged { .. }
        )
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadHostname { name, .. } => {
                write!(f, "The hostname '{}' is not compliant with RFC 5424", name)
            }
            Error::BadAppName { name, .. } => write!(
                f,
                "The application name '{}' is not compliant with RFC 5424",
                name
            ),
            Error::BadConfig { reason, .. } => write!(f, "Bad configuration: {}", reason),
            Error::Tls { source, .. } => write!(f, "While loading TLS material, got {}", source),
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            Error::Protocol { reason, .. } => write!(f, "RELP protocol error: {}", reason),
            Error::NotAcknowledged { code, .. } => {
                write!(f, "The RELP peer answered with status {}", code)
            }
            Error::Cancelled => write!(f, "Delivery was cancelled by shutdown"),
            Error::PoolClosed => write!(f, "The connection pool has been closed"),
            _ => write!(f, "Other relp-appender error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadHostname { back, .. }
            | Error::BadAppName { back, .. }
            | Error::BadConfig { back, .. }
            | Error::Tls { back, .. }
            | Error::Transport { back, .. }
            | Error::Protocol { back, .. }
            | Error::NotAcknowledged { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "relp-appender error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Tls { source, .. } | Error::Transport { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
