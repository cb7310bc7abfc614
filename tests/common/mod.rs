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

//! An in-process RELP endpoint for integration tests.

#![allow(dead_code)]

use relp_appender::frame::RelpFrame;

use std::{
    io::{BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

#[derive(Default)]
struct Shared {
    opens: AtomicUsize,
    closes: AtomicUsize,
    messages: Mutex<Vec<String>>,
    stop: AtomicBool,
    silent: AtomicBool,
}

/// Accepts any number of RELP sessions & acknowledges every transaction (unless
/// [`silent`](TestServer::silent)).
///
/// Counters are bumped _before_ the corresponding response goes out, so once a client has seen
/// its acknowledgement the server's view is up-to-date.
pub struct TestServer {
    port: u16,
    shared: Arc<Shared>,
}

impl TestServer {
    pub fn start() -> TestServer {
        TestServer::listen(TcpListener::bind("127.0.0.1:0").unwrap())
    }

    pub fn on_port(port: u16) -> TestServer {
        TestServer::listen(TcpListener::bind(("127.0.0.1", port)).unwrap())
    }

    /// A server that accepts sessions but never acknowledges a `syslog` transaction. Messages
    /// are still recorded as they arrive.
    pub fn silent() -> TestServer {
        let server = TestServer::start();
        server.shared.silent.store(true, Ordering::SeqCst);
        server
    }

    fn listen(listener: TcpListener) -> TestServer {
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());
        {
            let shared = shared.clone();
            thread::spawn(move || {
                for socket in listener.incoming() {
                    if shared.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Ok(socket) = socket {
                        let shared = shared.clone();
                        thread::spawn(move || serve(socket, shared));
                    }
                }
            });
        }
        TestServer { port, shared }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
    pub fn messages(&self) -> Vec<String> {
        self.shared.messages.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        // Wake the accept loop
        let _ = TcpStream::connect(("127.0.0.1", self.port));
    }
}

fn serve(socket: TcpStream, shared: Arc<Shared>) {
    let mut writer = match socket.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(socket);
    while let Ok(frame) = RelpFrame::read_from(&mut reader) {
        let (data, done): (&'static [u8], bool) = match frame.command.as_str() {
            "open" => {
                shared.opens.fetch_add(1, Ordering::SeqCst);
                (b"200 OK\nrelp_version=0\ncommands=syslog", false)
            }
            "syslog" => {
                shared
                    .messages
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&frame.data).into_owned());
                if shared.silent.load(Ordering::SeqCst) {
                    continue;
                }
                (b"200 OK", false)
            }
            "close" => {
                shared.closes.fetch_add(1, Ordering::SeqCst);
                (b"", true)
            }
            _ => (b"500 unknown command", false),
        };
        let rsp = RelpFrame::new(frame.txnr, "rsp", data);
        if writer.write_all(&rsp.encode()).is_err() || done {
            break;
        }
    }
}

/// Poll `cond` until it holds, or panic after `timeout`.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, what: &str, cond: F) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        thread::sleep(Duration::from_millis(10));
    }
}
