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

//! Reliable delivery of log events to a [RELP] endpoint.
//!
//! [RELP]: https://www.rsyslog.com/doc/relp.html
//!
//! # Introduction
//!
//! Plain syslog over UDP (or even TCP) is fire-and-forget: if the daemon is down, or restarts
//! mid-stream, messages are silently lost. RELP, the "Reliable Event Logging Protocol", fixes that
//! by making every message a transaction that the receiver must acknowledge. This crate is a RELP
//! client built for that guarantee:
//!
//! - every payload handed to a [`LogAppender`] is enriched into an RFC 5424 [`Record`] (with
//!   optional origin, event-id & system-id structured data) by a [`RecordFactory`]
//! - the record is sent over a [`ManagedConnection`] taken from an unbounded [`ConnectionPool`]
//! - the managed connection retries, reconnects & resubmits until the endpoint acknowledges the
//!   transaction; it gives up only when the appender is stopped
//!
//! [`LogAppender`]: crate::appender::LogAppender
//! [`Record`]: crate::record::Record
//! [`RecordFactory`]: crate::factory::RecordFactory
//! [`ManagedConnection`]: crate::connection::ManagedConnection
//! [`ConnectionPool`]: crate::pool::ConnectionPool
//!
//! The flip side of "never drop a message" is back-pressure: while the endpoint is unreachable,
//! calls to [`append`] block. Size your logging threads accordingly.
//!
//! [`append`]: crate::appender::LogAppender::append
//!
//! Connections may optionally be secured with TLS (via [rustls]), and may be periodically
//! "rebound" (torn down & re-established) either after a given number of messages or after
//! sitting idle for too long, so as to spread load across a fleet of receivers.
//!
//! [rustls]: https://docs.rs/rustls
//!
//! # Usage
//!
//! The simplest way in is through [`tracing`]: [`layer::Layer`] is a [`tracing-subscriber`]
//! [`Layer`] that forwards each [`Event`] to an appender:
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! ```no_run
//! use relp_appender::{config::AppenderConfig, layer::Layer};
//! use tracing::info;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//! use tracing_subscriber::registry::Registry;
//!
//! let config = AppenderConfig::builder()
//!     .hostname("bree.local")
//!     .app_name("prototyping")
//!     .relp_address("logs.example.com")
//!     .relp_port(2514)
//!     .build()
//!     .unwrap();
//! let layer = Layer::from_config(config).unwrap();
//! let appender = layer.appender();
//! let _guard = tracing::subscriber::set_default(Registry::default().with(layer));
//!
//! info!("Hello, world!");
//!
//! // At shutdown:
//! appender.stop();
//! ```
//!
//! Appenders may also be used directly:
//!
//! ```no_run
//! use relp_appender::{appender, config::AppenderConfig};
//!
//! let appender = appender::from_config(AppenderConfig::builder().build().unwrap()).unwrap();
//! appender.append("Hello, world!");
//! appender.stop();
//! ```

pub mod appender;
pub mod channel;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod facility;
pub mod factory;
pub mod frame;
pub mod layer;
pub mod pool;
pub mod record;
pub mod rfc5424;
pub mod transport;

#[cfg(test)]
mod testing;
