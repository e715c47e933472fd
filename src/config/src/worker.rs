// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

// constants to define default values
const WORKER_THREADS: usize = 8;
const WORKER_MAX_REQUESTS: usize = 10000;

// helper functions
fn threads() -> usize {
    WORKER_THREADS
}

fn max_requests() -> usize {
    WORKER_MAX_REQUESTS
}

// struct definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Worker {
    #[serde(default = "threads")]
    threads: usize,
    #[serde(default = "max_requests")]
    max_requests: usize,
}

// implementation
impl Worker {
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Capacity of the shared task queue. Submitting beyond this blocks the
    /// listener until a worker drains an entry.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

// trait implementations
impl Default for Worker {
    fn default() -> Self {
        Self {
            threads: threads(),
            max_requests: max_requests(),
        }
    }
}

// trait definitions
pub trait WorkerConfig {
    fn worker(&self) -> &Worker;
}
