// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Bounded blocking queue for moving work between threads.
//!
//! Unlike a lock-free queue, producers *block* when the queue is full and
//! consumers block when it is empty, which gives natural back-pressure: a
//! fast producer is throttled to the rate of its consumers instead of
//! growing a backlog without bound.
//!
//! The queue can be closed. Closing empties the queue, wakes every blocked
//! producer and consumer, and makes all subsequent operations fail fast:
//! `push` returns the rejected item and `pop` returns `None`. Closing is
//! idempotent.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Shared<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/// A bounded FIFO queue with blocking push/pop and a close signal.
pub struct BlockingQueue<T> {
    shared: Mutex<Shared<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            shared: Mutex::new(Shared {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append an item, blocking while the queue is full.
    ///
    /// Returns the item back to the caller if the queue is closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut shared = self.shared.lock().unwrap();
        while shared.items.len() >= shared.capacity && !shared.closed {
            shared = self.not_full.wait(shared).unwrap();
        }
        if shared.closed {
            return Err(item);
        }
        shared.items.push_back(item);
        drop(shared);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the front item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn pop(&self) -> Option<T> {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if let Some(item) = shared.items.pop_front() {
                drop(shared);
                self.not_full.notify_one();
                return Some(item);
            }
            if shared.closed {
                return None;
            }
            shared = self.not_empty.wait(shared).unwrap();
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`, returning
    /// `None` on timeout or close.
    pub fn pop_timed(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.shared.lock().unwrap();
        loop {
            if let Some(item) = shared.items.pop_front() {
                drop(shared);
                self.not_full.notify_one();
                return Some(item);
            }
            if shared.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.not_empty.wait_timeout(shared, deadline - now).unwrap();
            shared = guard;
            if result.timed_out() && shared.items.is_empty() {
                return None;
            }
        }
    }

    /// Close the queue: discard queued items, wake all blocked producers and
    /// consumers, and make subsequent pushes fail and pops return `None`.
    /// Closing an already closed queue has no effect.
    pub fn close(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.items.clear();
        shared.closed = true;
        drop(shared);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.shared.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().unwrap().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let shared = self.shared.lock().unwrap();
        shared.items.len() >= shared.capacity
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().unwrap().capacity
    }
}

impl<T: Clone> BlockingQueue<T> {
    /// A copy of the front item, if any.
    pub fn front(&self) -> Option<T> {
        self.shared.lock().unwrap().items.front().cloned()
    }

    /// A copy of the back item, if any.
    pub fn back(&self) -> Option<T> {
        self.shared.lock().unwrap().items.back().cloned()
    }
}
