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

//! Log appenders: the entry point for formatted payloads.
//!
//! A [`LogAppender`] takes one formatted payload per event & sees it delivered. Three flavors are
//! provided:
//!
//! - [`RelpLogAppender`]: callers may append concurrently; each in-flight append gets a
//!   connection of its own from the pool
//! - [`SynchronizedLogAppender`]: wraps another appender behind a mutex, so that appends are
//!   delivered one at a time, in call order
//! - [`StubLogAppender`]: does nothing
//!
//! [`from_config`] picks between the first two based on [`AppenderConfig::synchronized`].
//!
//! Appending never fails from the caller's point of view: if the endpoint is down, [`append`]
//! blocks until it comes back (or until the appender is stopped).
//!
//! [`append`]: LogAppender::append

use crate::{
    channel::ChannelProvider,
    clock::{Cancellation, Clock, SystemClock},
    config::AppenderConfig,
    connection::ManagedConnection,
    error::Result,
    factory::RecordFactory,
    pool::ConnectionPool,
    transport::{RelpTransport, Transport},
};

use tracing::{debug, warn};

use std::sync::{Arc, Mutex, PoisonError};

/// Something that can deliver formatted log payloads.
pub trait LogAppender: Send + Sync {
    /// Deliver one payload. Blocks until it has been acknowledged, or the appender is stopped.
    fn append(&self, payload: &str);
    /// Release every connection & refuse further appends. Idempotent.
    fn stop(&self);
    fn is_stub(&self) -> bool {
        false
    }
}

impl<A: LogAppender + ?Sized> LogAppender for Arc<A> {
    fn append(&self, payload: &str) {
        (**self).append(payload)
    }
    fn stop(&self) {
        (**self).stop()
    }
    fn is_stub(&self) -> bool {
        (**self).is_stub()
    }
}

impl<A: LogAppender + ?Sized> LogAppender for Box<A> {
    fn append(&self, payload: &str) {
        (**self).append(payload)
    }
    fn stop(&self) {
        (**self).stop()
    }
    fn is_stub(&self) -> bool {
        (**self).is_stub()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         RelpLogAppender                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Builds a record per payload & sends it over a pooled connection.
pub struct RelpLogAppender<T: Transport> {
    factory: RecordFactory,
    pool: ConnectionPool<T>,
}

impl<T: Transport> RelpLogAppender<T> {
    pub fn new(factory: RecordFactory, pool: ConnectionPool<T>) -> RelpLogAppender<T> {
        RelpLogAppender { factory, pool }
    }
    pub fn pool(&self) -> &ConnectionPool<T> {
        &self.pool
    }
}

impl<T: Transport> LogAppender for RelpLogAppender<T> {
    fn append(&self, payload: &str) {
        let bytes = self.factory.create(payload).to_rfc5424();
        match self
            .pool
            .with_connection(|conn| conn.ensure_sent(&bytes))
            .and_then(|sent| sent)
        {
            Ok(()) => (),
            Err(err) => warn!(%err, "Dropping a log record: the appender is stopped"),
        }
    }
    fn stop(&self) {
        self.pool.close();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     SynchronizedLogAppender                                    //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Serializes appends to an inner appender.
///
/// Only [`append`](LogAppender::append) goes through the gate: [`stop`](LogAppender::stop) must
/// be able to interrupt an append that is blocked waiting on the endpoint.
pub struct SynchronizedLogAppender<A: LogAppender> {
    inner: A,
    gate: Mutex<()>,
}

impl<A: LogAppender> SynchronizedLogAppender<A> {
    pub fn new(inner: A) -> SynchronizedLogAppender<A> {
        SynchronizedLogAppender {
            inner,
            gate: Mutex::new(()),
        }
    }
    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: LogAppender> LogAppender for SynchronizedLogAppender<A> {
    fn append(&self, payload: &str) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.append(payload);
    }
    fn stop(&self) {
        self.inner.stop();
    }
    fn is_stub(&self) -> bool {
        self.inner.is_stub()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         StubLogAppender                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An appender that discards everything; useful before the real one has been configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubLogAppender;

impl LogAppender for StubLogAppender {
    fn append(&self, _payload: &str) {}
    fn stop(&self) {}
    fn is_stub(&self) -> bool {
        true
    }
}

/// Build a RELP appender from `config`.
///
/// Any problem with the TLS material is reported here; the appender never falls back to a plain
/// channel when TLS was asked for. No connection is made until the first append.
pub fn from_config(config: AppenderConfig) -> Result<Box<dyn LogAppender>> {
    // The fields are public, so `config` need not have come from the builder.
    config.connection.validate()?;
    let channel = ChannelProvider::new(config.connection.tls.as_ref())?;
    debug!(
        address = %config.connection.address,
        port = config.connection.port,
        secure = channel.is_secure(),
        synchronized = config.synchronized,
        "Configuring a RELP appender"
    );

    let connection = Arc::new(config.connection);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pool = ConnectionPool::new(move |cancel: &Cancellation| {
        ManagedConnection::new(
            RelpTransport::new(connection.clone(), channel.clone()),
            connection.clone(),
            clock.clone(),
            cancel.clone(),
        )
    });
    let appender = RelpLogAppender::new(RecordFactory::new(config.record), pool);

    Ok(if config.synchronized {
        Box::new(SynchronizedLogAppender::new(appender))
    } else {
        Box::new(appender)
    })
}
