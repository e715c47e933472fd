// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A min-heap of absolute deadlines with stable handles.
//!
//! Entries are ordered by their [`Instant`] deadline. Every entry is
//! addressed through an opaque [`TimerHandle`] that stays valid while the
//! heap rearranges itself: the heap records each entry's current position in
//! a side table and updates it on every swap. This makes `remove` and
//! `reschedule` O(log n) without the caller ever seeing an index.
//!
//! [`tick`](TimerHeap::tick) pops each expired entry *before* invoking the
//! caller's function on it, so an entry that has been removed can never
//! fire, and the function cannot observe the entry it is being called for.

use std::time::Instant;

use slab::Slab;

/// Stable reference to an entry in a [`TimerHeap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerHandle(usize);

struct Entry<T> {
    deadline: Instant,
    key: usize,
    data: T,
}

/// Min-heap over `(deadline, data)` entries.
pub struct TimerHeap<T> {
    heap: Vec<Entry<T>>,
    // key -> current position in `heap`
    positions: Slab<usize>,
}

impl<T> Default for TimerHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerHeap<T> {
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            positions: Slab::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert an entry, returning a handle that survives heap rearrangement.
    pub fn push(&mut self, deadline: Instant, data: T) -> TimerHandle {
        let pos = self.heap.len();
        let key = self.positions.insert(pos);
        self.heap.push(Entry {
            deadline,
            key,
            data,
        });
        self.sift_up(pos);
        TimerHandle(key)
    }

    /// The earliest deadline, if any entry is live.
    pub fn peek(&self) -> Option<Instant> {
        self.heap.first().map(|e| e.deadline)
    }

    /// Remove and return the entry with the earliest deadline.
    pub fn pop(&mut self) -> Option<(Instant, T)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let entry = self.heap.pop().unwrap();
        self.positions.remove(entry.key);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((entry.deadline, entry.data))
    }

    /// Remove the entry behind `handle`, wherever it sits in the heap.
    ///
    /// Returns `None` if the handle no longer refers to a live entry.
    pub fn remove(&mut self, handle: TimerHandle) -> Option<T> {
        let pos = *self.positions.get(handle.0)?;
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        let entry = self.heap.pop().unwrap();
        self.positions.remove(entry.key);
        if pos < self.heap.len() && !self.sift_up(pos) {
            self.sift_down(pos);
        }
        Some(entry.data)
    }

    /// Move the entry behind `handle` to a new deadline.
    ///
    /// This is the idle-extension path: the common case is a later deadline,
    /// so the entry is sifted down first and sifted up only if it did not
    /// move. Returns false if the handle is stale.
    pub fn reschedule(&mut self, handle: TimerHandle, deadline: Instant) -> bool {
        let Some(&pos) = self.positions.get(handle.0) else {
            return false;
        };
        self.heap[pos].deadline = deadline;
        if !self.sift_down(pos) {
            self.sift_up(pos);
        }
        true
    }

    /// Pop every entry whose deadline is at or before `now`, invoking `f` on
    /// its data after it has left the heap.
    pub fn tick<F: FnMut(T)>(&mut self, now: Instant, mut f: F) {
        while self.peek().map(|deadline| deadline <= now).unwrap_or(false) {
            if let Some((_, data)) = self.pop() {
                f(data);
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.positions[self.heap[a].key] = a;
        self.positions[self.heap[b].key] = b;
    }

    // both sifts report whether the entry moved, so callers can try the
    // other direction
    fn sift_up(&mut self, mut pos: usize) -> bool {
        let start = pos;
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[parent].deadline <= self.heap[pos].deadline {
                break;
            }
            self.swap(parent, pos);
            pos = parent;
        }
        pos != start
    }

    fn sift_down(&mut self, mut pos: usize) -> bool {
        let start = pos;
        loop {
            let mut child = pos * 2 + 1;
            if child >= self.heap.len() {
                break;
            }
            if child + 1 < self.heap.len()
                && self.heap[child + 1].deadline < self.heap[child].deadline
            {
                child += 1;
            }
            if self.heap[pos].deadline <= self.heap[child].deadline {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
        pos != start
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for i in 1..self.heap.len() {
            let parent = (i - 1) / 2;
            assert!(
                self.heap[parent].deadline <= self.heap[i].deadline,
                "heap order violated at {}",
                i
            );
        }
        assert_eq!(self.positions.len(), self.heap.len());
        for (i, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.positions[entry.key], i, "stale position for {}", i);
        }
    }
}
