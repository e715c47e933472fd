// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Shared structs and constants.

/// Control messages delivered to the listener thread.
#[derive(Clone)]
pub enum Signal {
    Shutdown,
}

/// Per-connection receive buffer size in bytes.
pub const READ_BUFFER_SIZE: usize = 2048;

/// Response head buffer size in bytes.
pub const WRITE_BUFFER_SIZE: usize = 1024;

/// Upper bound on a resolved filesystem path.
pub const FILE_NAME_SIZE: usize = 200;

/// A connection is closed after this many timeslots without traffic.
pub const IDLE_TIMESLOTS: u64 = 3;

/// Message written to a connection that is turned away at capacity.
pub const BUSY_MESSAGE: &[u8] = b"Internal server busy";
