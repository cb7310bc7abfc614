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

//! Lifecycle-managed connections.
//!
//! A [`ManagedConnection`] owns exactly one [`Transport`] & is the only thing that ever connects,
//! disconnects or tears it down. Its one external promise is [`ensure_sent`]: the payload _will_ be
//! acknowledged by the endpoint, however many reconnects that takes. The only way out of that loop
//! short of success is shutdown, signalled through the connection's [`Cancellation`].
//!
//! [`ensure_sent`]: ManagedConnection::ensure_sent
//!
//! ```text
//!                  connect() ok
//!  Disconnected ──► Connecting ──► Connected
//!       ▲               │              │
//!       └───────────────┴──────────────┘
//!        connect failed   send failed / rebind / disconnect / tear_down
//! ```

use crate::{
    clock::{Cancellation, Clock},
    config::ConnectionConfig,
    error::{Error, Result},
    transport::Transport,
};

use tracing::{debug, warn};

use std::{sync::Arc, time::Instant};

/// Where a [`ManagedConnection`] is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One physical connection to the RELP endpoint, with retry, reconnect & rebind built in.
pub struct ManagedConnection<T: Transport> {
    transport: T,
    config: Arc<ConnectionConfig>,
    clock: Arc<dyn Clock>,
    cancel: Cancellation,
    state: ConnectionState,
    sends_since_bind: usize,
    last_activity: Instant,
}

impl<T: Transport> ManagedConnection<T> {
    /// Create a connection in the [`Disconnected`](ConnectionState::Disconnected) state; it
    /// will connect lazily, on first use.
    pub fn new(
        transport: T,
        config: Arc<ConnectionConfig>,
        clock: Arc<dyn Clock>,
        cancel: Cancellation,
    ) -> ManagedConnection<T> {
        let last_activity = clock.now();
        ManagedConnection {
            transport,
            config,
            clock,
            cancel,
            state: ConnectionState::Disconnected,
            sends_since_bind: 0,
            last_activity,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The number of successful sends since this connection was last (re)established
    pub fn sends_since_bind(&self) -> usize {
        self.sends_since_bind
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make one attempt to establish the session.
    ///
    /// Failure leaves the connection [`Disconnected`](ConnectionState::Disconnected) & is
    /// retryable.
    pub fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        match self.transport.connect() {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.sends_since_bind = 0;
                self.last_activity = self.clock.now();
                Ok(())
            }
            Err(err) => {
                self.tear_down();
                Err(err)
            }
        }
    }

    /// Deliver `payload` as a single, acknowledged transaction.
    ///
    /// This never gives up: every failure leads to a teardown & a reconnect (with the configured
    /// reconnect interval between failed attempts) followed by a resubmission. Cancellation only
    /// cuts short the recovery from a failure: a send over a healthy connection (or one that
    /// connects at the first attempt) completes even after the connection's [`Cancellation`]
    /// has been raised. The only error this returns is [`Error::Cancelled`], when a failure
    /// occurs after cancellation; the connection is torn down in that case.
    pub fn ensure_sent(&mut self, payload: &[u8]) -> Result<()> {
        if self.state == ConnectionState::Connected
            && !self.cancel.is_cancelled()
            && self.rebind_due()
        {
            debug!(
                sends = self.sends_since_bind,
                "Rebinding the RELP connection before sending"
            );
            self.disconnect();
        }

        loop {
            if self.state != ConnectionState::Connected {
                self.connect_until_connected()?;
            }
            match self.transport.commit(payload) {
                Ok(()) => {
                    self.sends_since_bind += 1;
                    self.last_activity = self.clock.now();
                    return Ok(());
                }
                Err(err) => {
                    self.tear_down();
                    if self.cancel.is_cancelled() {
                        warn!(%err, "RELP transaction failed during shutdown; giving up");
                        return Err(Error::Cancelled);
                    }
                    warn!(%err, "RELP transaction failed; reconnecting & resubmitting");
                }
            }
        }
    }

    /// Close gracefully if connected, then release everything. Graceful-close failures are
    /// logged & otherwise ignored.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected {
            if let Err(err) = self.transport.disconnect() {
                warn!(%err, "Failed to close the RELP session gracefully");
            }
        }
        self.tear_down();
    }

    /// Release the underlying session unconditionally.
    pub fn tear_down(&mut self) {
        self.transport.tear_down();
        self.state = ConnectionState::Disconnected;
    }

    fn rebind_due(&self) -> bool {
        let config = &self.config;
        let by_count =
            config.rebind_enabled && self.sends_since_bind >= config.rebind_request_amount;
        let by_idle = config.idle_rebind_enabled()
            && self.clock.now().saturating_duration_since(self.last_activity) > config.max_idle;
        by_count || by_idle
    }

    fn connect_until_connected(&mut self) -> Result<()> {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        address = %self.config.address,
                        port = self.config.port,
                        attempts,
                        %err,
                        "Failed to connect to the RELP endpoint"
                    );
                    if self
                        .clock
                        .sleep(self.config.reconnect_interval, &self.cancel)
                    {
                        return Err(Error::Cancelled);
                    }
                }
            }
        }
    }
}
