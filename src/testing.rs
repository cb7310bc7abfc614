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

//! Scriptable [`Transport`] & [`Clock`] implementations for unit tests.

use crate::{
    clock::{Cancellation, Clock},
    error::{Error, Result},
    transport::Transport,
};

use std::{
    io,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
struct Counters {
    connects: usize,
    commit_attempts: usize,
    committed: Vec<Vec<u8>>,
    disconnects: usize,
    tear_downs: usize,
}

/// A shared view onto everything a [`MockTransport`] (& its clones) have been asked to do.
#[derive(Clone, Debug, Default)]
pub struct TransportLog(Arc<Mutex<Counters>>);

impl TransportLog {
    fn with<R>(&self, f: impl FnOnce(&mut Counters) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
    pub fn connects(&self) -> usize {
        self.with(|c| c.connects)
    }
    pub fn commit_attempts(&self) -> usize {
        self.with(|c| c.commit_attempts)
    }
    pub fn committed(&self) -> Vec<Vec<u8>> {
        self.with(|c| c.committed.clone())
    }
    pub fn disconnects(&self) -> usize {
        self.with(|c| c.disconnects)
    }
    pub fn tear_downs(&self) -> usize {
        self.with(|c| c.tear_downs)
    }
}

fn refused() -> Error {
    Error::transport(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

/// A [`Transport`] that records calls & fails on demand.
#[derive(Clone, Debug)]
pub struct MockTransport {
    log: TransportLog,
    refuse_connects: usize,
    fail_commits: usize,
    fail_disconnects: bool,
    cancel_on_connect: Option<(usize, Cancellation)>,
}

impl MockTransport {
    pub fn new() -> (MockTransport, TransportLog) {
        let log = TransportLog::default();
        (
            MockTransport {
                log: log.clone(),
                refuse_connects: 0,
                fail_commits: 0,
                fail_disconnects: false,
                cancel_on_connect: None,
            },
            log,
        )
    }
    /// Refuse the first `n` connection attempts.
    pub fn refuse_connects(mut self, n: usize) -> MockTransport {
        self.refuse_connects = n;
        self
    }
    /// Fail the first `n` commits.
    pub fn fail_commits(mut self, n: usize) -> MockTransport {
        self.fail_commits = n;
        self
    }
    pub fn fail_disconnects(mut self) -> MockTransport {
        self.fail_disconnects = true;
        self
    }
    /// Raise `cancel` during the `n`th connection attempt.
    pub fn cancel_on_connect(mut self, n: usize, cancel: Cancellation) -> MockTransport {
        self.cancel_on_connect = Some((n, cancel));
        self
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<()> {
        let attempt = self.log.with(|c| {
            c.connects += 1;
            c.connects
        });
        if let Some((n, cancel)) = &self.cancel_on_connect {
            if attempt == *n {
                cancel.cancel();
            }
        }
        if attempt <= self.refuse_connects {
            Err(refused())
        } else {
            Ok(())
        }
    }
    fn commit(&mut self, payload: &[u8]) -> Result<()> {
        let attempt = self.log.with(|c| {
            c.commit_attempts += 1;
            c.commit_attempts
        });
        if attempt <= self.fail_commits {
            return Err(Error::transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        self.log.with(|c| c.committed.push(payload.to_vec()));
        Ok(())
    }
    fn disconnect(&mut self) -> Result<()> {
        self.log.with(|c| c.disconnects += 1);
        if self.fail_disconnects {
            Err(Error::protocol("the server closed the session"))
        } else {
            Ok(())
        }
    }
    fn tear_down(&mut self) {
        self.log.with(|c| c.tear_downs += 1);
    }
}

/// A [`Clock`] that only moves when told to (or when slept upon).
#[derive(Debug)]
pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
    slept: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> FakeClock {
        FakeClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            slept: Mutex::new(Duration::ZERO),
        }
    }
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }
    /// Total time spent "sleeping"
    pub fn slept(&self) -> Duration {
        *self.slept.lock().unwrap()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
    fn sleep(&self, duration: Duration, cancel: &Cancellation) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        self.advance(duration);
        *self.slept.lock().unwrap() += duration;
        cancel.is_cancelled()
    }
}
