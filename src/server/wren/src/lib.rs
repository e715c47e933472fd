// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A multi-threaded HTTP/1.1 server.
//!
//! One listener thread owns the poller, the listen socket, the signal
//! self-pipe, every client connection, and the idle-timer heap. A fixed
//! pool of worker threads parses requests and executes them: static files
//! are served from memory maps, login and registration are checked against
//! an in-memory credentials map backed by PostgreSQL. All components log
//! through the `log` facade; the backend is set up by the binary.

#[macro_use]
extern crate log;

use std::sync::Arc;
use std::thread::JoinHandle;

use config::{DatabaseConfig, HttpdConfig, WorkerConfig};
use crossbeam_channel::Sender;
use mio::Waker;
use queues::BlockingQueue;

mod common;
mod listener;
pub mod protocol;
mod request_processor;
mod session;
mod signals;
mod workers;

use crate::common::Signal;
use crate::listener::Listener;
use crate::request_processor::Context;
use crate::workers::Worker;

const THREAD_PREFIX: &str = "wren";

/// A server that has been wired up but not started.
pub struct HttpdBuilder {
    listener: Listener,
    workers: Vec<Worker>,
}

impl HttpdBuilder {
    /// Construct every component in dependency order.
    ///
    /// This function terminates the process if any component fails to
    /// initialize: a server that cannot bind, reach its database, or
    /// install its signal handlers has nothing useful left to do.
    pub fn new(config: Arc<HttpdConfig>) -> Self {
        let db = config.database().map(|section| {
            dbpool::connect(section).unwrap_or_else(|e| {
                error!("{}", e);
                std::process::exit(1);
            })
        });

        let context = Context::new(config.clone(), db);
        if let Some(pool) = &context.db {
            let mut client = pool.lease();
            match dbpool::fetch_users(&mut client) {
                Ok(rows) => {
                    info!("loaded {} stored users", rows.len());
                    context.users.lock().unwrap().extend(rows);
                }
                Err(e) => {
                    error!("failed to load stored users: {}", e);
                    std::process::exit(1);
                }
            }
        }
        let context = Arc::new(context);

        let tasks = Arc::new(BlockingQueue::new(config.worker().max_requests()));
        let (completion_sender, completion_receiver) = crossbeam_channel::unbounded();

        let signal_pipe = signals::install().unwrap_or_else(|e| {
            error!("failed to install signal handlers: {}", e);
            std::process::exit(1);
        });

        let listener = Listener::new(config.clone(), signal_pipe, tasks.clone(), completion_receiver)
            .unwrap_or_else(|e| {
                error!("{}", e);
                std::process::exit(1);
            });
        let waker = listener.waker();

        let workers = (0..config.worker().threads())
            .map(|id| {
                Worker::new(
                    id,
                    tasks.clone(),
                    completion_sender.clone(),
                    waker.clone(),
                    context.clone(),
                )
            })
            .collect();

        HttpdBuilder { listener, workers }
    }

    /// Launch the threads and return a running [`Httpd`].
    pub fn spawn(self) -> Httpd {
        let message_sender = self.listener.message_sender();
        let waker = self.listener.waker();

        let mut listener = self.listener;
        let mut threads = vec![std::thread::Builder::new()
            .name(format!("{}_listener", THREAD_PREFIX))
            .spawn(move || listener.run())
            .unwrap()];
        for (id, mut worker) in self.workers.into_iter().enumerate() {
            threads.push(
                std::thread::Builder::new()
                    .name(format!("{}_worker{}", THREAD_PREFIX, id))
                    .spawn(move || worker.run())
                    .unwrap(),
            );
        }

        Httpd {
            threads,
            message_sender,
            waker,
        }
    }
}

/// A running server.
///
/// For a long-running daemon call [`wait`](Httpd::wait) to block until the
/// threads terminate; within tests call [`shutdown`](Httpd::shutdown) to
/// stop the threads and block until they have exited.
pub struct Httpd {
    threads: Vec<JoinHandle<()>>,
    message_sender: Sender<Signal>,
    waker: Arc<Waker>,
}

impl Httpd {
    /// Ask the listener to stop, then join every thread.
    pub fn shutdown(self) {
        if self.message_sender.send(Signal::Shutdown).is_err() {
            warn!("listener already stopped");
        }
        let _ = self.waker.wake();
        self.wait()
    }

    /// Block until all threads terminate.
    pub fn wait(self) {
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}
