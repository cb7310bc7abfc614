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

//! syslog facility & severity definitions.
//!
//! Every record this crate ships carries a fixed facility & severity (the RELP endpoint cares
//! about delivery, not priority), but both are modelled in full so that a [`Record`] can be built
//! with any legal PRI value.
//!
//! [`Record`]: crate::record::Record

type StdResult<T, E> = std::result::Result<T, E>;

/// The twenty-four RFC [5424] facilities. As in `<syslog.h>`, each value is pre-multiplied by
/// eight so that it may be or-ed directly with a [`Severity`] to form the PRI field.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Facility {
    Kern = 0 << 3,
    #[default]
    User = 1 << 3,
    Mail = 2 << 3,
    Daemon = 3 << 3,
    Auth = 4 << 3,
    Syslog = 5 << 3,
    Lpr = 6 << 3,
    News = 7 << 3,
    Uucp = 8 << 3,
    Cron = 9 << 3,
    AuthPriv = 10 << 3,
    Ftp = 11 << 3,
    Ntp = 12 << 3,
    Audit = 13 << 3,
    Alert = 14 << 3,
    Clock = 15 << 3,
    Local0 = 16 << 3,
    Local1 = 17 << 3,
    Local2 = 18 << 3,
    Local3 = 19 << 3,
    Local4 = 20 << 3,
    Local5 = 21 << 3,
    Local6 = 22 << 3,
    Local7 = 23 << 3,
}

/// The eight RFC [5424] severities.
///
/// Records default to [`Severity::Warning`]; the RELP collectors this crate was written for
/// classify by structured data rather than by severity.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    #[default]
    Warning,
    Notice,
    Informational,
    Debug,
}

/// Compute the RFC 5424 PRI value
pub fn priority(facility: Facility, severity: Severity) -> u8 {
    facility as u8 | severity as u8
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        let name = match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Informational => "info",
            Severity::Debug => "debug",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod facility_severity_tests {
    use super::*;

    #[test]
    fn test_pri() {
        assert_eq!(12, priority(Facility::User, Severity::Warning));
        assert_eq!(14, priority(Facility::User, Severity::Informational));
        assert_eq!(191, priority(Facility::Local7, Severity::Debug));
        assert_eq!(Facility::default(), Facility::User);
        assert_eq!(format!("{}", Severity::default()), "warning");
    }
}
