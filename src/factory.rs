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

//! Turning raw payloads into [`Record`]s.

use crate::{
    config::RecordConfig,
    record::{EventId, Record},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Builds a fully-enriched [`Record`] for every outgoing event.
///
/// The enrichment chain is:
///
/// 1. the configured identity, default severity & facility
/// 2. the current time
/// 3. if structured data is in use, the origin block then the event-id block (both naming the
///    OS-resolved hostname, _not_ the configured one)
/// 4. if the system id is enabled, the system-id block
/// 5. the payload, last, so that it serializes as the message body
///
/// Creation does no I/O & cannot fail.
#[derive(Clone, Debug)]
pub struct RecordFactory {
    config: RecordConfig,
}

impl RecordFactory {
    pub fn new(config: RecordConfig) -> RecordFactory {
        RecordFactory { config }
    }

    pub fn create(&self, payload: &str) -> Record {
        self.create_at(payload, Utc::now(), Uuid::new_v4())
    }

    /// [`create`](RecordFactory::create) with the clock reading & event identifier supplied by
    /// the caller.
    pub fn create_at(&self, payload: &str, now: DateTime<Utc>, uuid: Uuid) -> Record {
        let config = &self.config;
        let mut builder =
            Record::builder(config.hostname.clone(), config.app_name.clone()).with_timestamp(now);

        if config.use_structured_data {
            builder = builder
                .with_origin(config.origin_hostname.as_str())
                .with_event_id(EventId::new(config.origin_hostname.as_str(), uuid, now));
        }
        if config.enable_system_id {
            builder = builder.with_system_id(config.system_id.as_str());
        }

        builder.with_payload(payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::record::{EVENT_ID_SD_ID, ORIGIN_SD_ID, SYSTEM_ID_SD_ID};
    use crate::rfc5424::{AppName, Hostname};

    fn config(use_structured_data: bool, enable_system_id: bool) -> RecordConfig {
        RecordConfig {
            hostname: Hostname::new("testhost").unwrap(),
            app_name: AppName::new("testapp").unwrap(),
            origin_hostname: "os-host".to_owned(),
            use_structured_data,
            enable_system_id,
            system_id: "testhost-ci".to_owned(),
        }
    }

    fn parse(record: &Record) -> syslog_rfc5424::SyslogMessage {
        let text = String::from_utf8(record.to_rfc5424()).unwrap();
        syslog_rfc5424::parse_message(text).unwrap()
    }

    #[test]
    fn no_extra_fields() {
        let record = RecordFactory::new(config(false, false)).create("Example Payload");
        assert!(record.structured_data().is_empty());

        let message = parse(&record);
        assert_eq!(message.hostname.as_deref(), Some("testhost"));
        assert_eq!(message.appname.as_deref(), Some("testapp"));
        assert_eq!(message.msg, "Example Payload");
        assert!(message.sd.find_sdid(ORIGIN_SD_ID).is_none());
        assert!(message.sd.find_sdid(EVENT_ID_SD_ID).is_none());
        assert!(message.sd.find_sdid(SYSTEM_ID_SD_ID).is_none());
    }

    #[test]
    fn all_fields() {
        let record = RecordFactory::new(config(true, true)).create("Example Payload");
        let message = parse(&record);
        assert_eq!(message.hostname.as_deref(), Some("testhost"));
        assert_eq!(message.appname.as_deref(), Some("testapp"));
        assert_eq!(message.msg, "Example Payload");
        assert_eq!(
            message
                .sd
                .find_tuple(SYSTEM_ID_SD_ID, "systemId")
                .map(String::as_str),
            Some("testhost-ci")
        );
        assert_eq!(
            message
                .sd
                .find_tuple(ORIGIN_SD_ID, "hostname")
                .map(String::as_str),
            Some("os-host")
        );
        assert_eq!(
            message
                .sd
                .find_tuple(EVENT_ID_SD_ID, "hostname")
                .map(String::as_str),
            Some("os-host")
        );
        assert_eq!(
            message
                .sd
                .find_tuple(EVENT_ID_SD_ID, "source")
                .map(String::as_str),
            Some("source")
        );
    }

    #[test]
    fn system_id_without_structured_data() {
        let record = RecordFactory::new(config(false, true)).create("p");
        let message = parse(&record);
        assert_eq!(
            message
                .sd
                .find_tuple(SYSTEM_ID_SD_ID, "systemId")
                .map(String::as_str),
            Some("testhost-ci")
        );
        assert!(message.sd.find_sdid(ORIGIN_SD_ID).is_none());
        assert!(message.sd.find_sdid(EVENT_ID_SD_ID).is_none());
    }

    #[test]
    fn event_ids_are_unique() {
        let factory = RecordFactory::new(config(true, false));
        let first = parse(&factory.create("same"));
        let second = parse(&factory.create("same"));
        let uuid = |m: &syslog_rfc5424::SyslogMessage| {
            m.sd.find_tuple(EVENT_ID_SD_ID, "uuid").cloned().unwrap()
        };
        assert_ne!(uuid(&first), uuid(&second));
    }

    #[test]
    fn identical_inputs_give_equal_records() {
        let factory = RecordFactory::new(config(true, true));
        let now = Utc::now();
        let uuid = Uuid::new_v4();
        let a = factory.create_at("payload", now, uuid);
        let b = factory.create_at("payload", now, uuid);
        assert_eq!(a, b);
        assert_eq!(a.to_rfc5424(), b.to_rfc5424());
        assert_ne!(a, factory.create_at("other", now, uuid));
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let record = RecordFactory::new(config(false, false)).create("p");
        let text = String::from_utf8(record.to_rfc5424()).unwrap();
        let timestamp = text.split(' ').nth(1).unwrap();
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert_eq!(timestamp.len(), 24);
        assert!(timestamp.ends_with('Z'));
        assert_eq!(&timestamp[19..20], ".");
    }
}
