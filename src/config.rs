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

//! Appender configuration.
//!
//! Configuration is built once, at startup, and is immutable thereafter. [`AppenderConfig`] is
//! assembled through [`AppenderConfigBuilder`], whose setters take the units a host framework's
//! configuration surface naturally deals in (strings, booleans & milliseconds); [`build`]
//! validates everything up-front so that a bad value is a startup failure rather than a surprise
//! on the first log event.
//!
//! [`build`]: AppenderConfigBuilder::build
//!
//! ```rust
//! use relp_appender::config::AppenderConfig;
//!
//! let config = AppenderConfig::builder()
//!     .hostname("web-01")
//!     .app_name("storefront")
//!     .relp_address("logs.example.com")
//!     .relp_port(2514)
//!     .rebind_request_amount(1000)
//!     .rebind_enabled(true)
//!     .build()
//!     .unwrap();
//! assert!(config.connection.rebind_enabled);
//! assert!(!config.connection.idle_rebind_enabled());
//! ```

use crate::{
    error::{Error, Result},
    rfc5424::{resolve_hostname, AppName, Hostname},
};

use std::{path::PathBuf, time::Duration};

/// Everything the [`RecordFactory`](crate::factory::RecordFactory) needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordConfig {
    /// The logical sender identity, written to the message header
    pub hostname: Hostname,
    pub app_name: AppName,
    /// The OS-resolved hostname, written only to the origin & event-id blocks
    pub origin_hostname: String,
    pub use_structured_data: bool,
    pub enable_system_id: bool,
    pub system_id: String,
}

/// Parameters for the optional TLS channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM bundle of trust anchors
    pub keystore_path: PathBuf,
    pub keystore_password: String,
    /// One of "TLSv1.2", "TLSv1.3" or "TLS"
    pub protocol: String,
}

/// Everything a managed connection needs. Shared read-only by every connection in the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub address: String,
    pub port: u16,
    /// Bounds every wait for an acknowledgement; must be positive
    pub read_timeout: Duration,
    /// Must be positive
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    /// Delay between failed connection attempts
    pub reconnect_interval: Duration,
    /// Force a fresh connection after this many successful sends (if `rebind_enabled`)
    pub rebind_request_amount: usize,
    pub rebind_enabled: bool,
    /// Rebind before sending on a connection idle longer than this; zero disables
    pub max_idle: Duration,
    pub tls: Option<TlsConfig>,
}

impl ConnectionConfig {
    pub fn idle_rebind_enabled(&self) -> bool {
        !self.max_idle.is_zero()
    }
    /// Check that these parameters describe a usable connection.
    ///
    /// Every socket operation must be bounded in time: an unbounded read on a silent endpoint
    /// could never be interrupted by shutdown.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::bad_config("the RELP address may not be empty"));
        }
        if self.port == 0 {
            return Err(Error::bad_config("the RELP port may not be zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::bad_config("the connection timeout may not be zero"));
        }
        if self.read_timeout.is_zero() {
            return Err(Error::bad_config("the read timeout may not be zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::bad_config("the write timeout may not be zero"));
        }
        if self.rebind_enabled && self.rebind_request_amount == 0 {
            return Err(Error::bad_config(
                "the rebind request amount must be positive when rebind is enabled",
            ));
        }
        Ok(())
    }
}

impl std::default::Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            address: "127.0.0.1".to_owned(),
            port: 601,
            read_timeout: Duration::from_millis(5000),
            write_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
            reconnect_interval: Duration::from_millis(500),
            rebind_request_amount: 100_000,
            rebind_enabled: false,
            max_idle: Duration::ZERO,
            tls: None,
        }
    }
}

/// The complete appender configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppenderConfig {
    pub record: RecordConfig,
    pub connection: ConnectionConfig,
    /// Serialize all appends behind a single gate
    pub synchronized: bool,
}

impl AppenderConfig {
    pub fn builder() -> AppenderConfigBuilder {
        AppenderConfigBuilder::default()
    }
}

/// Builder for [`AppenderConfig`]
#[derive(Clone, Debug)]
pub struct AppenderConfigBuilder {
    hostname: String,
    app_name: String,
    origin_hostname: Option<String>,
    default_origin_hostname: String,
    use_structured_data: bool,
    enable_system_id: bool,
    system_id: String,
    connection: ConnectionConfig,
    tls_enabled: bool,
    keystore_path: PathBuf,
    keystore_password: String,
    tls_protocol: String,
    synchronized: bool,
}

impl std::default::Default for AppenderConfigBuilder {
    fn default() -> Self {
        AppenderConfigBuilder {
            hostname: "localhost".to_owned(),
            app_name: "relp-appender".to_owned(),
            origin_hostname: None,
            default_origin_hostname: "localhost".to_owned(),
            use_structured_data: true,
            enable_system_id: false,
            system_id: String::new(),
            connection: ConnectionConfig::default(),
            tls_enabled: false,
            keystore_path: PathBuf::new(),
            keystore_password: String::new(),
            tls_protocol: "TLSv1.3".to_owned(),
            synchronized: false,
        }
    }
}

impl AppenderConfigBuilder {
    pub fn hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.hostname = hostname.into();
        self
    }
    pub fn app_name<S: Into<String>>(mut self, app_name: S) -> Self {
        self.app_name = app_name.into();
        self
    }
    /// Pin the origin hostname rather than asking the OS for it
    pub fn origin_hostname<S: Into<String>>(mut self, origin_hostname: S) -> Self {
        self.origin_hostname = Some(origin_hostname.into());
        self
    }
    /// What to report as the origin hostname should the OS be unable to say
    pub fn default_origin_hostname<S: Into<String>>(mut self, default: S) -> Self {
        self.default_origin_hostname = default.into();
        self
    }
    pub fn use_structured_data(mut self, use_structured_data: bool) -> Self {
        self.use_structured_data = use_structured_data;
        self
    }
    pub fn enable_system_id(mut self, enable_system_id: bool) -> Self {
        self.enable_system_id = enable_system_id;
        self
    }
    pub fn system_id<S: Into<String>>(mut self, system_id: S) -> Self {
        self.system_id = system_id.into();
        self
    }
    pub fn relp_address<S: Into<String>>(mut self, address: S) -> Self {
        self.connection.address = address.into();
        self
    }
    pub fn relp_port(mut self, port: u16) -> Self {
        self.connection.port = port;
        self
    }
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.connection.read_timeout = Duration::from_millis(ms);
        self
    }
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.connection.write_timeout = Duration::from_millis(ms);
        self
    }
    pub fn connection_timeout_ms(mut self, ms: u64) -> Self {
        self.connection.connect_timeout = Duration::from_millis(ms);
        self
    }
    pub fn reconnect_interval_ms(mut self, ms: u64) -> Self {
        self.connection.reconnect_interval = Duration::from_millis(ms);
        self
    }
    pub fn rebind_request_amount(mut self, amount: usize) -> Self {
        self.connection.rebind_request_amount = amount;
        self
    }
    pub fn rebind_enabled(mut self, enabled: bool) -> Self {
        self.connection.rebind_enabled = enabled;
        self
    }
    /// Zero disables idle rebinding
    pub fn reconnect_if_idle_ms(mut self, ms: u64) -> Self {
        self.connection.max_idle = Duration::from_millis(ms);
        self
    }
    pub fn use_tls(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }
    pub fn keystore_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.keystore_path = path.into();
        self
    }
    pub fn keystore_password<S: Into<String>>(mut self, password: S) -> Self {
        self.keystore_password = password.into();
        self
    }
    pub fn tls_protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.tls_protocol = protocol.into();
        self
    }
    pub fn synchronized(mut self, synchronized: bool) -> Self {
        self.synchronized = synchronized;
        self
    }
    pub fn build(self) -> Result<AppenderConfig> {
        let hostname = Hostname::new(self.hostname)?;
        let app_name = AppName::new(self.app_name)?;

        let mut connection = self.connection;
        connection.validate()?;
        if self.tls_enabled {
            if self.keystore_path.as_os_str().is_empty() {
                return Err(Error::bad_config("TLS is enabled but no keystore was given"));
            }
            connection.tls = Some(TlsConfig {
                keystore_path: self.keystore_path,
                keystore_password: self.keystore_password,
                protocol: self.tls_protocol,
            });
        }

        let origin_hostname = self
            .origin_hostname
            .unwrap_or_else(|| resolve_hostname(&self.default_origin_hostname));

        Ok(AppenderConfig {
            record: RecordConfig {
                hostname,
                app_name,
                origin_hostname,
                use_structured_data: self.use_structured_data,
                enable_system_id: self.enable_system_id,
                system_id: self.system_id,
            },
            connection,
            synchronized: self.synchronized,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppenderConfig::builder()
            .origin_hostname("os-host")
            .build()
            .unwrap();
        assert_eq!(config.record.hostname.as_str(), "localhost");
        assert_eq!(config.record.origin_hostname, "os-host");
        assert!(config.record.use_structured_data);
        assert!(!config.record.enable_system_id);
        assert_eq!(config.connection, ConnectionConfig::default());
        assert!(!config.connection.idle_rebind_enabled());
        assert!(!config.synchronized);
    }

    #[test]
    fn millisecond_setters() {
        let config = AppenderConfig::builder()
            .read_timeout_ms(100)
            .write_timeout_ms(200)
            .connection_timeout_ms(300)
            .reconnect_interval_ms(400)
            .reconnect_if_idle_ms(500)
            .build()
            .unwrap();
        assert_eq!(config.connection.read_timeout, Duration::from_millis(100));
        assert_eq!(config.connection.write_timeout, Duration::from_millis(200));
        assert_eq!(config.connection.connect_timeout, Duration::from_millis(300));
        assert_eq!(
            config.connection.reconnect_interval,
            Duration::from_millis(400)
        );
        assert!(config.connection.idle_rebind_enabled());
    }

    #[test]
    fn validation() {
        assert!(matches!(
            AppenderConfig::builder().hostname("bad host").build(),
            Err(Error::BadHostname { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().app_name("").build(),
            Err(Error::BadAppName { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().relp_port(0).build(),
            Err(Error::BadConfig { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder()
                .rebind_enabled(true)
                .rebind_request_amount(0)
                .build(),
            Err(Error::BadConfig { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().read_timeout_ms(0).build(),
            Err(Error::BadConfig { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().write_timeout_ms(0).build(),
            Err(Error::BadConfig { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().connection_timeout_ms(0).build(),
            Err(Error::BadConfig { .. })
        ));
        assert!(matches!(
            AppenderConfig::builder().use_tls(true).build(),
            Err(Error::BadConfig { .. })
        ));
    }

    #[test]
    fn system_id_may_be_empty() {
        let config = AppenderConfig::builder()
            .origin_hostname("os-host")
            .enable_system_id(true)
            .build()
            .unwrap();
        assert!(config.record.enable_system_id);
        assert_eq!(config.record.system_id, "");
    }

    #[test]
    fn hand_built_connection_config_is_checked() {
        let config = ConnectionConfig {
            read_timeout: Duration::ZERO,
            ..ConnectionConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::BadConfig { .. })));
        assert!(ConnectionConfig::default().validate().is_ok());
    }

    #[test]
    fn tls_parameters_are_carried() {
        let config = AppenderConfig::builder()
            .use_tls(true)
            .keystore_path("/etc/ssl/relp.pem")
            .keystore_password("changeit")
            .tls_protocol("TLSv1.2")
            .build()
            .unwrap();
        let tls = config.connection.tls.unwrap();
        assert_eq!(tls.keystore_path, PathBuf::from("/etc/ssl/relp.pem"));
        assert_eq!(tls.protocol, "TLSv1.2");
    }
}
