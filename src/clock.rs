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

//! Time & cancellation for the retry loops.
//!
//! The managed connection never reads the wall clock or sleeps directly; it goes through a
//! [`Clock`], so that tests can drive rebind & reconnect timing without actually waiting. Every
//! sleep is also interruptible by a [`Cancellation`], which is how shutdown gets a connection out
//! of an otherwise unbounded reconnect loop.

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};

/// A one-way shutdown flag that sleepers can wait on.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }
    /// Raise the flag & wake every sleeper.
    pub fn cancel(&self) {
        let (flag, cond) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cond.notify_all();
    }
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Block for up to `timeout`, returning early if the flag is raised. Returns true iff
    /// cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cond
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// A source of time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    /// Sleep for `duration` or until `cancel` is raised, whichever comes first. Returns true iff
    /// cancelled.
    fn sleep(&self, duration: Duration, cancel: &Cancellation) -> bool;
}

/// The real thing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
    fn sleep(&self, duration: Duration, cancel: &Cancellation) -> bool {
        cancel.wait_timeout(duration)
    }
}
