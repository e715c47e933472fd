// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A bounded pool of database connections with scoped leases.
//!
//! The pool holds a fixed set of connections behind a mutex and a condvar
//! with counting-semaphore semantics: [`Pool::lease`] blocks while every
//! connection is out, and the returned [`Lease`] guard hands the connection
//! back on drop on every exit path. At all times
//! `idle + outstanding == capacity`.
//!
//! [`connect`] instantiates the pool over [`postgres::Client`], eagerly
//! opening every connection at startup so that a misconfigured database
//! fails fast instead of at first request.

#[macro_use]
extern crate log;

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

use postgres::NoTls;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("invalid pool size: {0}")]
    InvalidSize(usize),
}

/// The pool as instantiated by [`connect`].
pub type DbPool = Pool<postgres::Client>;

/// A fixed-capacity pool of connections.
pub struct Pool<C> {
    idle: Mutex<VecDeque<C>>,
    available: Condvar,
    capacity: usize,
}

impl<C> Pool<C> {
    /// Build a pool from pre-opened connections.
    pub fn new(connections: Vec<C>) -> Result<Self, PoolError> {
        if connections.is_empty() {
            return Err(PoolError::InvalidSize(0));
        }
        let capacity = connections.len();
        Ok(Self {
            idle: Mutex::new(connections.into()),
            available: Condvar::new(),
            capacity,
        })
    }

    /// Take a connection, blocking until one is idle.
    pub fn lease(&self) -> Lease<'_, C> {
        let mut idle = self.idle.lock().unwrap();
        loop {
            if let Some(conn) = idle.pop_front() {
                return Lease {
                    pool: self,
                    conn: Some(conn),
                };
            }
            idle = self.available.wait(idle).unwrap();
        }
    }

    /// Number of connections currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, conn: C) {
        self.idle.lock().unwrap().push_back(conn);
        self.available.notify_one();
    }
}

/// Scoped lease of a pooled connection. The connection returns to the pool
/// when the lease is dropped.
pub struct Lease<'a, C> {
    pool: &'a Pool<C>,
    conn: Option<C>,
}

impl<C> Deref for Lease<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().unwrap()
    }
}

impl<C> DerefMut for Lease<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().unwrap()
    }
}

impl<C> Drop for Lease<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Open `max_conn` connections to the configured PostgreSQL server and wrap
/// them in a pool. The users table is created if it does not exist yet.
pub fn connect(config: &config::Database) -> Result<Pool<postgres::Client>, PoolError> {
    let mut connections = Vec::with_capacity(config.max_conn());
    for _ in 0..config.max_conn() {
        let client = postgres::Config::new()
            .host(config.host())
            .port(config.port())
            .user(config.user())
            .password(config.password())
            .dbname(config.database())
            .connect(NoTls)?;
        connections.push(client);
    }
    debug!(
        "opened {} connections to {}:{}/{}",
        config.max_conn(),
        config.host(),
        config.port(),
        config.database()
    );

    connections[0].execute(
        "CREATE TABLE IF NOT EXISTS users ( \
            username TEXT PRIMARY KEY, \
            password TEXT NOT NULL \
        )",
        &[],
    )?;

    Pool::new(connections)
}

/// Read every stored user for seeding the in-memory credentials map.
pub fn fetch_users(
    client: &mut postgres::Client,
) -> Result<Vec<(String, String)>, postgres::Error> {
    let rows = client.query("SELECT username, password FROM users", &[])?;
    Ok(rows
        .iter()
        .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct FakeConn(usize);

    #[test]
    fn lease_and_return() {
        let pool = Pool::new(vec![FakeConn(0), FakeConn(1)]).unwrap();
        assert_eq!(pool.capacity(), 2);
        {
            let _a = pool.lease();
            let _b = pool.lease();
            assert_eq!(pool.idle(), 0);
        }
        // both guards dropped
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(Pool::<FakeConn>::new(vec![]).is_err());
    }

    #[test]
    fn lease_blocks_until_release() {
        let pool = Arc::new(Pool::new(vec![FakeConn(0)]).unwrap());
        let held = pool.lease();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let lease = pool.lease();
                lease.0
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        drop(held);
        assert_eq!(waiter.join().unwrap(), 0);
    }

    #[test]
    fn balanced_across_threads() {
        let pool = Arc::new(Pool::new((0..4).map(FakeConn).collect()).unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let lease = pool.lease();
                    // idle + outstanding never exceeds capacity
                    assert!(pool.idle() < pool.capacity());
                    drop(lease);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.idle(), pool.capacity());
    }
}
