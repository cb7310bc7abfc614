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

//! An unbounded pool of [`ManagedConnection`]s.
//!
//! The pool hands each caller a connection nobody else is using, creating a new one when none are
//! idle. It never makes a caller wait for a slot: under load it simply grows to the number of
//! concurrently in-flight sends.
//!
//! Every connection the pool creates shares the pool's [`Cancellation`]; [`close`] raises it,
//! which is what gets an in-flight [`ensure_sent`] out of its reconnect loop.
//!
//! [`close`]: ConnectionPool::close
//! [`ensure_sent`]: ManagedConnection::ensure_sent

use crate::{
    clock::Cancellation,
    connection::ManagedConnection,
    error::{Error, Result},
    transport::Transport,
};

use tracing::debug;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

type ConnectionFactory<T> = Box<dyn Fn(&Cancellation) -> ManagedConnection<T> + Send + Sync>;

struct PoolState<T: Transport> {
    idle: Vec<ManagedConnection<T>>,
    in_use: usize,
    created: usize,
    closed: bool,
}

/// A connection on loan from the pool; forfeited if dropped while still holding it.
struct Lease<'a, T: Transport> {
    pool: &'a ConnectionPool<T>,
    conn: Option<ManagedConnection<T>>,
}

impl<T: Transport> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.forfeit(conn);
        }
    }
}

pub struct ConnectionPool<T: Transport> {
    factory: ConnectionFactory<T>,
    state: Mutex<PoolState<T>>,
    drained: Condvar,
    cancel: Cancellation,
}

impl<T: Transport> ConnectionPool<T> {
    /// Create an empty pool; `factory` will be called (with the pool's [`Cancellation`]) each
    /// time a new connection is needed.
    pub fn new<F>(factory: F) -> ConnectionPool<T>
    where
        F: Fn(&Cancellation) -> ManagedConnection<T> + Send + Sync + 'static,
    {
        ConnectionPool {
            factory: Box::new(factory),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: 0,
                created: 0,
                closed: false,
            }),
            drained: Condvar::new(),
            cancel: Cancellation::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle connection, or create one. Never blocks.
    ///
    /// The connection belongs to the caller until handed back through [`release`]; every
    /// connection acquired must be released.
    ///
    /// [`release`]: ConnectionPool::release
    pub fn acquire(&self) -> Result<ManagedConnection<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::PoolClosed);
        }
        let conn = match state.idle.pop() {
            Some(conn) => conn,
            None => {
                state.created += 1;
                debug!(created = state.created, "Growing the RELP connection pool");
                (self.factory)(&self.cancel)
            }
        };
        state.in_use += 1;
        Ok(conn)
    }

    /// Return a connection to the idle set. If the pool has been closed in the meantime, the
    /// connection is disconnected instead.
    pub fn release(&self, mut conn: ManagedConnection<T>) {
        {
            let mut state = self.lock();
            if !state.closed {
                state.idle.push(conn);
                state.in_use -= 1;
                return;
            }
        }
        conn.disconnect();
        let mut state = self.lock();
        state.in_use -= 1;
        self.drained.notify_all();
    }

    /// Acquire a connection, hand it to `f`, and release it again.
    ///
    /// Should `f` panic, the connection is torn down & written off rather than returned to the
    /// idle set.
    pub fn with_connection<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ManagedConnection<T>) -> R,
    {
        let mut lease = Lease {
            pool: self,
            conn: Some(self.acquire()?),
        };
        let result = lease.conn.as_mut().map(f);
        if let Some(conn) = lease.conn.take() {
            self.release(conn);
        }
        result.ok_or(Error::PoolClosed)
    }

    /// Account for a connection that will never be released.
    fn forfeit(&self, mut conn: ManagedConnection<T>) {
        conn.tear_down();
        let mut state = self.lock();
        state.in_use -= 1;
        self.drained.notify_all();
    }

    /// Mark the pool closed, interrupt any reconnect loops & disconnect the idle connections.
    /// Returns false if the pool had already been shut.
    fn shut(&self) -> bool {
        let idle = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.cancel.cancel();
        debug!(idle = idle.len(), "Closing the RELP connection pool");
        for mut conn in idle {
            conn.disconnect();
        }
        true
    }

    /// Close the pool: refuse further acquisitions, disconnect every idle connection, and wait
    /// for every in-use connection to be released (& thereby disconnected). Idempotent.
    pub fn close(&self) {
        self.shut();
        let state = self.lock();
        let _state = self
            .drained
            .wait_while(state, |state| state.in_use > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
    /// The number of connections currently handed out
    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }
    /// The number of connections waiting to be handed out
    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }
    /// The number of connections created over the life of the pool
    pub fn created(&self) -> usize {
        self.lock().created
    }
}

impl<T: Transport> Drop for ConnectionPool<T> {
    fn drop(&mut self) {
        self.shut();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{
        clock::{Clock, SystemClock},
        config::ConnectionConfig,
        testing::{FakeClock, MockTransport, TransportLog},
    };

    use std::{
        panic::{self, AssertUnwindSafe},
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    fn pool_of(transport: MockTransport, clock: Arc<dyn Clock>) -> ConnectionPool<MockTransport> {
        let config = Arc::new(ConnectionConfig {
            reconnect_interval: Duration::from_millis(10),
            ..ConnectionConfig::default()
        });
        ConnectionPool::new(move |cancel: &Cancellation| {
            ManagedConnection::new(
                transport.clone(),
                config.clone(),
                clock.clone(),
                cancel.clone(),
            )
        })
    }

    fn healthy() -> (ConnectionPool<MockTransport>, TransportLog) {
        let (transport, log) = MockTransport::new();
        (pool_of(transport, Arc::new(FakeClock::new())), log)
    }

    #[test]
    fn reuses_idle_connections() {
        let (pool, log) = healthy();
        for _ in 0..3 {
            pool.with_connection(|conn| conn.ensure_sent(b"payload"))
                .unwrap()
                .unwrap();
            assert_eq!(pool.in_use(), 0);
        }
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.idle(), 1);
        assert_eq!(log.connects(), 1);
        assert_eq!(log.committed().len(), 3);
    }

    #[test]
    fn grows_on_demand() {
        let (pool, _) = healthy();
        let held: Vec<_> = (0..5).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.created(), 5);
        assert_eq!(pool.in_use(), 5);
        assert_eq!(pool.idle(), 0);
        for conn in held {
            pool.release(conn);
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 5);
    }

    #[test]
    fn close_disconnects_and_rejects() {
        let (pool, log) = healthy();
        pool.with_connection(|conn| conn.ensure_sent(b"payload"))
            .unwrap()
            .unwrap();
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.idle(), 0);
        assert_eq!(log.disconnects(), 1);
        assert!(matches!(pool.acquire(), Err(Error::PoolClosed)));
        // again
        pool.close();
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn close_waits_for_in_flight_connections() {
        let (pool, log) = healthy();
        let pool = Arc::new(pool);
        let mut conn = pool.acquire().unwrap();
        conn.ensure_sent(b"payload").unwrap();

        let (tx, rx) = mpsc::channel();
        let closer = {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.close();
                tx.send(()).unwrap();
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(log.disconnects(), 0);

        pool.release(conn);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        closer.join().unwrap();
        assert_eq!(log.disconnects(), 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn close_interrupts_reconnect_loops() {
        let (transport, log) = MockTransport::new();
        let pool = Arc::new(pool_of(
            transport.refuse_connects(usize::MAX),
            Arc::new(SystemClock),
        ));

        let sender = {
            let pool = pool.clone();
            thread::spawn(move || pool.with_connection(|conn| conn.ensure_sent(b"payload")))
        };
        while log.connects() < 2 {
            thread::sleep(Duration::from_millis(5));
        }
        pool.close();

        let result = sender.join().unwrap();
        assert!(matches!(result, Ok(Err(Error::Cancelled))));
        assert!(log.committed().is_empty());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn close_lets_a_healthy_send_finish() {
        let (pool, log) = healthy();
        let pool = Arc::new(pool);
        let mut conn = pool.acquire().unwrap();
        conn.ensure_sent(b"first").unwrap();

        let closer = {
            let pool = pool.clone();
            thread::spawn(move || pool.close())
        };
        while !pool.is_closed() {
            thread::sleep(Duration::from_millis(1));
        }
        // The pool is shutting down, but this connection is still good.
        conn.ensure_sent(b"second").unwrap();
        pool.release(conn);
        closer.join().unwrap();

        assert_eq!(log.committed(), vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(log.disconnects(), 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn panicking_borrower_does_not_wedge_close() {
        let (pool, log) = healthy();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.with_connection(|conn| {
                conn.ensure_sent(b"payload").unwrap();
                panic!("borrower blew up");
            })
        }));
        assert!(result.is_err());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 0);
        assert!(log.tear_downs() >= 1);

        // Would block forever were the connection still counted as in use.
        pool.close();
        assert!(pool.is_closed());
    }
}
