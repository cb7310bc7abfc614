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

//! Plain & secure channels.
//!
//! A [`ChannelProvider`] turns a connected [`TcpStream`] into a [`Stream`], either by using it
//! as-is or by running a TLS handshake over it. The provider is built once, from the
//! [`TlsConfig`], at startup; any problem with the TLS material is reported then, as an
//! [`Error::Tls`], and never results in a quiet fallback to plain text.

use crate::{
    config::TlsConfig,
    error::{Error, Result},
};

use backtrace::Backtrace;
use rustls::{pki_types::ServerName, ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::debug;

use std::{
    fs::File,
    io::{BufReader, Read, Write},
    net::{Shutdown, TcpStream},
    sync::Arc,
};

/// Establishes the channel RELP will be spoken over.
#[derive(Clone, Debug)]
pub enum ChannelProvider {
    Plain,
    Tls(Arc<ClientConfig>),
}

fn tls_error<E>(err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Tls {
        source: Box::new(err),
        back: Backtrace::new(),
    }
}

fn protocol_versions(
    protocol: &str,
) -> Result<&'static [&'static rustls::SupportedProtocolVersion]> {
    static TLS12: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS12];
    static TLS13: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];
    static ANY: &[&rustls::SupportedProtocolVersion] =
        &[&rustls::version::TLS13, &rustls::version::TLS12];
    match protocol {
        "TLSv1.2" => Ok(TLS12),
        "TLSv1.3" => Ok(TLS13),
        "TLS" | "" => Ok(ANY),
        other => Err(Error::bad_config(format!(
            "unsupported TLS protocol '{}'",
            other
        ))),
    }
}

impl ChannelProvider {
    /// Select a provider: TLS if `tls` is given, plain otherwise.
    pub fn new(tls: Option<&TlsConfig>) -> Result<ChannelProvider> {
        match tls {
            Some(tls) => ChannelProvider::tls(tls),
            None => Ok(ChannelProvider::Plain),
        }
    }

    /// Build a TLS provider trusting the certificates in the keystore.
    ///
    /// The keystore is a PEM bundle; its certificates become the trust anchors for the
    /// endpoint's certificate chain. PEM material is unencrypted, so the keystore password is not
    /// needed to read it.
    pub fn tls(tls: &TlsConfig) -> Result<ChannelProvider> {
        let versions = protocol_versions(&tls.protocol)?;

        let file = File::open(&tls.keystore_path).map_err(tls_error)?;
        let mut reader = BufReader::new(file);
        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert.map_err(tls_error)?).map_err(tls_error)?;
        }
        if roots.is_empty() {
            return Err(Error::Tls {
                source: format!("no certificates found in {}", tls.keystore_path.display()).into(),
                back: Backtrace::new(),
            });
        }
        if !tls.keystore_password.is_empty() {
            debug!("The keystore password is not used for PEM trust stores");
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(versions)
            .map_err(tls_error)?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(ChannelProvider::Tls(Arc::new(config)))
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, ChannelProvider::Tls(_))
    }

    /// Wrap `socket`, which is connected to `host`.
    ///
    /// For TLS, the handshake is completed before returning so that a bad peer surfaces as a
    /// failed connect rather than as a failed first send.
    pub fn open(&self, host: &str, mut socket: TcpStream) -> Result<Stream> {
        match self {
            ChannelProvider::Plain => Ok(Stream::Plain(socket)),
            ChannelProvider::Tls(config) => {
                let name = ServerName::try_from(host.to_owned()).map_err(tls_error)?;
                let mut conn = ClientConnection::new(config.clone(), name).map_err(tls_error)?;
                while conn.is_handshaking() {
                    conn.complete_io(&mut socket).map_err(Error::transport)?;
                }
                Ok(Stream::Tls(Box::new(StreamOwned::new(conn, socket))))
            }
        }
    }
}

/// A connected channel.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Stream {
    fn socket(&self) -> &TcpStream {
        match self {
            Stream::Plain(socket) => socket,
            Stream::Tls(stream) => &stream.sock,
        }
    }
    /// Say goodbye (where the channel has a way of doing so) & shut the socket down. Errors are
    /// irrelevant at this point & are ignored.
    pub fn shutdown(&mut self) {
        if let Stream::Tls(stream) = self {
            stream.conn.send_close_notify();
            let _ = stream.flush();
        }
        let _ = self.socket().shutdown(Shutdown::Both);
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(socket) => socket.read(buf),
            Stream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(socket) => socket.write(buf),
            Stream::Tls(stream) => stream.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(socket) => socket.flush(),
            Stream::Tls(stream) => stream.flush(),
        }
    }
}
