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

//! The outgoing message model.
//!
//! A [`Record`] is one fully-enriched message, immutable once built. It is assembled by a
//! [`RecordBuilder`], each of whose steps consumes the builder & returns a new one carrying one
//! more concern (timestamp, origin, event id, system id). The set of enrichment kinds is closed,
//! and each occupies a fixed slot, so the order in which they appear on the wire (origin, then
//! event id, then system id, then the payload) holds regardless of the order the steps were
//! applied in. Supplying the payload is the final step & is what produces the [`Record`]; there is
//! no way to obtain one without it.
//!
//! Equality is structural & derived: two records are equal iff every field is.

use crate::{
    facility::{Facility, Severity},
    rfc5424::{self, AppName, Hostname, SdElement},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// SD-ID of the origin block
pub const ORIGIN_SD_ID: &str = "origin@48577";
/// SD-ID of the event identifier block
pub const EVENT_ID_SD_ID: &str = "event_id@48577";
/// SD-ID of the system identifier block
pub const SYSTEM_ID_SD_ID: &str = "businessSystem@48577";
/// The literal written to the `source` parameter of the event identifier block
pub const EVENT_ID_SOURCE: &str = "source";

/// Where the message came from, as the operating system names this host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    pub hostname: String,
}

impl Origin {
    fn sd_element(&self) -> SdElement {
        SdElement::new(ORIGIN_SD_ID).param("hostname", self.hostname.as_str())
    }
}

/// A unique identifier for this event, along with when & where it was captured.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId {
    pub hostname: String,
    pub uuid: Uuid,
    pub captured: DateTime<Utc>,
}

impl EventId {
    pub fn new<S: Into<String>>(hostname: S, uuid: Uuid, captured: DateTime<Utc>) -> EventId {
        EventId {
            hostname: hostname.into(),
            uuid,
            captured,
        }
    }
    fn sd_element(&self) -> SdElement {
        SdElement::new(EVENT_ID_SD_ID)
            .param("hostname", self.hostname.as_str())
            .param("uuid", self.uuid.to_string())
            .param("source", EVENT_ID_SOURCE)
            .param("unixtime", self.captured.timestamp_millis().to_string())
    }
}

/// The business system this application belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemId {
    pub system_id: String,
}

impl SystemId {
    fn sd_element(&self) -> SdElement {
        SdElement::new(SYSTEM_ID_SD_ID).param("systemId", self.system_id.as_str())
    }
}

/// The mandatory header fields plus whichever enrichments have been applied so far.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Fields {
    hostname: Hostname,
    app_name: AppName,
    severity: Severity,
    facility: Facility,
    timestamp: Option<DateTime<Utc>>,
    origin: Option<Origin>,
    event_id: Option<EventId>,
    system_id: Option<SystemId>,
}

/// Assembles a [`Record`] one enrichment at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordBuilder {
    fields: Fields,
}

impl RecordBuilder {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.fields.severity = severity;
        self
    }
    pub fn with_facility(mut self, facility: Facility) -> Self {
        self.fields.facility = facility;
        self
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.fields.timestamp = Some(timestamp);
        self
    }
    pub fn with_origin<S: Into<String>>(mut self, hostname: S) -> Self {
        self.fields.origin = Some(Origin {
            hostname: hostname.into(),
        });
        self
    }
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.fields.event_id = Some(event_id);
        self
    }
    pub fn with_system_id<S: Into<String>>(mut self, system_id: S) -> Self {
        self.fields.system_id = Some(SystemId {
            system_id: system_id.into(),
        });
        self
    }
    /// The final step: attach the message body.
    pub fn with_payload<S: Into<String>>(self, payload: S) -> Record {
        Record {
            fields: self.fields,
            payload: payload.into(),
        }
    }
}

/// One outgoing message, fully enriched & ready for serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    fields: Fields,
    payload: String,
}

impl Record {
    /// Begin a record with the mandatory identity, the default severity (warning) & the default
    /// facility (user).
    pub fn builder(hostname: Hostname, app_name: AppName) -> RecordBuilder {
        RecordBuilder {
            fields: Fields {
                hostname,
                app_name,
                severity: Severity::default(),
                facility: Facility::default(),
                timestamp: None,
                origin: None,
                event_id: None,
                system_id: None,
            },
        }
    }
    pub fn hostname(&self) -> &Hostname {
        &self.fields.hostname
    }
    pub fn app_name(&self) -> &AppName {
        &self.fields.app_name
    }
    pub fn severity(&self) -> Severity {
        self.fields.severity
    }
    pub fn facility(&self) -> Facility {
        self.fields.facility
    }
    pub fn timestamp(&self) -> Option<&DateTime<Utc>> {
        self.fields.timestamp.as_ref()
    }
    pub fn origin(&self) -> Option<&Origin> {
        self.fields.origin.as_ref()
    }
    pub fn event_id(&self) -> Option<&EventId> {
        self.fields.event_id.as_ref()
    }
    pub fn system_id(&self) -> Option<&SystemId> {
        self.fields.system_id.as_ref()
    }
    pub fn payload(&self) -> &str {
        &self.payload
    }
    /// The structured data elements this record carries, in wire order.
    pub fn structured_data(&self) -> Vec<SdElement> {
        let origin = self.fields.origin.iter().map(Origin::sd_element);
        let event_id = self.fields.event_id.iter().map(EventId::sd_element);
        let system_id = self.fields.system_id.iter().map(SystemId::sd_element);
        origin.chain(event_id).chain(system_id).collect()
    }
    /// Serialize this record as an RFC 5424 message.
    pub fn to_rfc5424(&self) -> Vec<u8> {
        rfc5424::format(self)
    }
}
