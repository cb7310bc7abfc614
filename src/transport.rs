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

//! The RELP transport layer.
//!
//! This module defines the [`Transport`] trait that the [managed connection] drives, as well as
//! [`RelpTransport`], a synchronous RELP client speaking over a plain or TLS [channel].
//!
//! [managed connection]: crate::connection::ManagedConnection
//! [channel]: crate::channel::ChannelProvider
//!
//! A [`Transport`] is a single physical session & is deliberately dumb: it reports failure & leaves
//! every decision about retrying, reconnecting & rebinding to its owner.

use crate::{
    channel::{ChannelProvider, Stream},
    config::ConnectionConfig,
    error::{Error, Result},
    frame::{next_txnr, RelpFrame},
};

use backtrace::Backtrace;
use bytes::Bytes;
use tracing::debug;

use std::{
    io::{BufReader, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations every RELP session must support.
pub trait Transport: Send {
    /// Establish the session. On failure the transport is left disconnected.
    fn connect(&mut self) -> Result<()>;
    /// Submit `payload` as one transaction, returning once the peer has acknowledged it.
    fn commit(&mut self, payload: &[u8]) -> Result<()>;
    /// Close the session gracefully.
    fn disconnect(&mut self) -> Result<()>;
    /// Release the underlying resources unconditionally. Never fails.
    fn tear_down(&mut self);
}

const OFFERS: &str = concat!(
    "relp_version=0\nrelp_software=relp-appender,",
    env!("CARGO_PKG_VERSION"),
    "\ncommands=syslog"
);

struct Session {
    reader: BufReader<Stream>,
    txnr: u64,
}

impl Session {
    /// Send one command & wait for its response.
    fn transact(&mut self, command: &str, data: Bytes) -> Result<RelpFrame> {
        let txnr = self.txnr;
        self.txnr = next_txnr(txnr);

        let frame = RelpFrame::new(txnr, command, data);
        let stream = self.reader.get_mut();
        stream
            .write_all(&frame.encode())
            .map_err(Error::transport)?;
        stream.flush().map_err(Error::transport)?;

        let rsp = RelpFrame::read_from(&mut self.reader)?;
        if rsp.command == "serverclose" {
            return Err(Error::protocol("the server closed the session"));
        }
        if rsp.command != "rsp" || rsp.txnr != txnr {
            return Err(Error::protocol(format!(
                "expected a response to transaction {}, got '{} {}'",
                txnr, rsp.txnr, rsp.command
            )));
        }
        Ok(rsp)
    }
    fn expect_ok(rsp: &RelpFrame) -> Result<()> {
        match rsp.response_code() {
            Some(200) => Ok(()),
            Some(code) => Err(Error::NotAcknowledged {
                code,
                back: Backtrace::new(),
            }),
            None => Err(Error::protocol("response carried no status code")),
        }
    }
}

/// Sending syslog messages to a RELP endpoint over TCP (optionally wrapped in TLS)
pub struct RelpTransport {
    config: Arc<ConnectionConfig>,
    channel: ChannelProvider,
    session: Option<Session>,
}

impl RelpTransport {
    pub fn new(config: Arc<ConnectionConfig>, channel: ChannelProvider) -> RelpTransport {
        RelpTransport {
            config,
            channel,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn open_socket(&self) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.config.address.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(Error::transport)?
            .collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(socket) => return Ok(socket),
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => Error::transport(err),
            None => Error::protocol(format!(
                "{} resolved to no addresses",
                self.config.address
            )),
        })
    }
}

impl Transport for RelpTransport {
    fn connect(&mut self) -> Result<()> {
        self.tear_down();

        let socket = self.open_socket()?;
        socket
            .set_read_timeout(Some(self.config.read_timeout))
            .map_err(Error::transport)?;
        socket
            .set_write_timeout(Some(self.config.write_timeout))
            .map_err(Error::transport)?;
        socket.set_nodelay(true).map_err(Error::transport)?;

        let stream = self.channel.open(&self.config.address, socket)?;
        let mut session = Session {
            reader: BufReader::new(stream),
            txnr: 1,
        };
        let opened = session
            .transact("open", Bytes::from_static(OFFERS.as_bytes()))
            .and_then(|rsp| Session::expect_ok(&rsp));
        if let Err(err) = opened {
            session.reader.get_mut().shutdown();
            return Err(err);
        }

        debug!(
            address = %self.config.address,
            port = self.config.port,
            secure = self.channel.is_secure(),
            "RELP session opened"
        );
        self.session = Some(session);
        Ok(())
    }

    fn commit(&mut self, payload: &[u8]) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::protocol("commit on a closed session"))?;
        let rsp = session.transact("syslog", Bytes::copy_from_slice(payload))?;
        Session::expect_ok(&rsp)
    }

    fn disconnect(&mut self) -> Result<()> {
        let result = match self.session.as_mut() {
            Some(session) => session.transact("close", Bytes::new()).map(|_| ()),
            None => Ok(()),
        };
        self.tear_down();
        result
    }

    fn tear_down(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.reader.get_mut().shutdown();
        }
    }
}

impl Drop for RelpTransport {
    fn drop(&mut self) {
        self.tear_down();
    }
}
