// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A logging backend for the `log` facade with time/size based rotation.
//!
//! The backend is constructed with a [`LogBuilder`] and registered as the
//! global logger with [`AsyncLog::start`], which hands back a [`LogHandle`]
//! used to flush and to shut the backend down.
//!
//! Messages are rendered at the call site as
//! `"YYYY-MM-DD HH:MM:SS.uuuuuu [LEVEL]: message"`. With a queue depth of
//! zero the rendered line is written directly under a mutex. With a nonzero
//! queue depth the line is pushed onto a bounded blocking queue and one
//! dedicated writer thread drains it; a full queue blocks the logging
//! thread rather than dropping the message.
//!
//! The live log file is `WebServer_<YYYY-MM-DD_HH:MM:SS>.log` inside the
//! configured directory. A new file is started whenever the calendar day
//! changes or the line counter reaches the configured maximum.

pub use log::*;

mod file;
mod format;

pub(crate) use crate::file::RotatingFile;
pub(crate) use crate::format::format_line;

use queues::BlockingQueue;

use std::io::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

enum Mode {
    Sync,
    Async(Arc<BlockingQueue<String>>),
}

/// The `log::Log` implementation handed to the facade.
struct Logger {
    level: Level,
    file: Arc<Mutex<RotatingFile>>,
    mode: Mode,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(chrono::Local::now(), record);
        match &self.mode {
            Mode::Sync => {
                self.file
                    .lock()
                    .unwrap()
                    .write_line(&line)
                    .expect("failed to write log file");
            }
            Mode::Async(queue) => {
                // fails only after shutdown closed the queue
                let _ = queue.push(line);
            }
        }
    }

    fn flush(&self) {
        let _ = self.file.lock().unwrap().flush();
    }
}

/// A configured logging backend that has not been registered yet.
pub struct AsyncLog {
    logger: Logger,
    handle: LogHandle,
}

impl AsyncLog {
    /// Register the backend as the global logger and return the handle used
    /// for flushing and shutdown. May be called at most once per process.
    pub fn start(self) -> LogHandle {
        let level = self.logger.level;
        log::set_boxed_logger(Box::new(self.logger))
            .map(|()| log::set_max_level(level.to_level_filter()))
            .expect("failed to start logger");
        self.handle
    }
}

/// Handle to a running logging backend.
pub struct LogHandle {
    file: Arc<Mutex<RotatingFile>>,
    queue: Option<Arc<BlockingQueue<String>>>,
    writer: Option<JoinHandle<()>>,
}

impl LogHandle {
    /// Flush the live log file.
    pub fn flush(&self) {
        let _ = self.file.lock().unwrap().flush();
    }

    /// Stop the writer thread (if any) and flush. Queued but unwritten
    /// lines are discarded.
    pub fn shutdown(mut self) {
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        self.flush();
    }
}

/// Builder for the logging backend.
pub struct LogBuilder {
    dir: PathBuf,
    max_lines: usize,
    queue_depth: usize,
    level: Level,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./"),
            max_lines: 800_000,
            queue_depth: 8,
            level: Level::Info,
        }
    }
}

impl LogBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Directory that receives the `WebServer_<timestamp>.log` files.
    pub fn directory<T: Into<PathBuf>>(mut self, dir: T) -> Self {
        self.dir = dir.into();
        self
    }

    /// Lines per file before rotation.
    pub fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = lines;
        self
    }

    /// Capacity of the line queue; zero selects synchronous writes.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Open the initial log file and, in asynchronous mode, spawn the
    /// writer thread.
    pub fn build(self) -> Result<AsyncLog, Error> {
        let file = Arc::new(Mutex::new(RotatingFile::open(&self.dir, self.max_lines)?));

        let (mode, queue, writer) = if self.queue_depth > 0 {
            let queue: Arc<BlockingQueue<String>> = Arc::new(BlockingQueue::new(self.queue_depth));
            let writer = {
                let queue = queue.clone();
                let file = file.clone();
                std::thread::Builder::new()
                    .name("wren_log".to_string())
                    .spawn(move || {
                        while let Some(line) = queue.pop() {
                            file.lock()
                                .unwrap()
                                .write_line(&line)
                                .expect("failed to write log file");
                        }
                        let _ = file.lock().unwrap().flush();
                    })?
            };
            (Mode::Async(queue.clone()), Some(queue), Some(writer))
        } else {
            (Mode::Sync, None, None)
        };

        Ok(AsyncLog {
            logger: Logger {
                level: self.level,
                file: file.clone(),
                mode,
            },
            handle: LogHandle {
                file,
                queue,
                writer,
            },
        })
    }
}
