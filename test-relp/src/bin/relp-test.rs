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

//! Test writing to a RELP endpoint (port 601 on the local host, by default).
//!
//! Usage: `relp-test [HOST [PORT [KEYSTORE]]]`; giving a keystore (a PEM bundle of trusted
//! certificates) turns on TLS.

use relp_appender::{config::AppenderConfig, layer::Layer};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

pub fn main() {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = args
        .next()
        .map(|s| s.parse::<u16>().expect("PORT must be a number"))
        .unwrap_or(601);

    let mut builder = AppenderConfig::builder()
        .app_name("relp-test")
        .relp_address(host)
        .relp_port(port)
        .enable_system_id(true)
        .system_id("relp-test");
    if let Some(keystore) = args.next() {
        builder = builder.use_tls(true).keystore_path(keystore);
    }

    let layer = Layer::from_config(builder.build().unwrap()).unwrap();
    let appender = layer.appender();
    // Setup the real subscriber...
    let subscriber = Registry::default().with(layer);
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    trace!("你好, RELP.");
    debug!("你好, RELP.");
    info!("你好, RELP.");
    warn!(attempt = 1, "你好, RELP.");
    error!("你好, RELP.");

    appender.stop();
}
