// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Self-pipe signal plumbing.
//!
//! Signal handlers must not touch locks or allocate, so the handlers here
//! do exactly one thing: write the signal number as a single byte to a
//! non-blocking pipe. The listener registers the read end with its poller
//! and sees signals as ordinary readiness events. SIGALRM fires every
//! timeslot to drive the idle-timer tick; SIGTERM requests a graceful stop;
//! SIGPIPE is ignored so that writes to dead sockets surface as errors.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{sigaction, signal, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{alarm, pipe2};

static PIPE_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn forward_signal(sig: libc::c_int) {
    let fd = PIPE_WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = sig as u8;
        // single-byte write; async-signal-safe, short writes impossible
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

/// Signals observed since the last drain.
#[derive(Default)]
pub struct Pending {
    pub timeout: bool,
    pub stop: bool,
}

/// The read end of the signal pipe.
pub struct SignalPipe {
    read_fd: RawFd,
}

impl SignalPipe {
    pub fn raw_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Read everything out of the pipe and report which signals arrived.
    pub fn drain(&self) -> Pending {
        let mut pending = Pending::default();
        let mut buf = [0u8; 64];
        loop {
            match nix::unistd::read(self.read_fd, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if byte == Signal::SIGALRM as u8 {
                            pending.timeout = true;
                        } else if byte == Signal::SIGTERM as u8 {
                            pending.stop = true;
                        }
                    }
                }
                Err(Errno::EAGAIN) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("error draining signal pipe: {}", e);
                    break;
                }
            }
        }
        pending
    }
}

/// Create the pipe and install the handlers. Called once at startup,
/// before any thread is spawned.
pub fn install() -> Result<SignalPipe, nix::Error> {
    let (read_fd, write_fd) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)?;
    PIPE_WRITE_FD.store(write_fd, Ordering::Relaxed);

    unsafe {
        signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
        let action = SigAction::new(
            SigHandler::Handler(forward_signal),
            SaFlags::empty(),
            SigSet::all(),
        );
        sigaction(Signal::SIGALRM, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }

    Ok(SignalPipe { read_fd })
}

/// Arm (or re-arm) the periodic tick.
pub fn arm_alarm(secs: u64) {
    let _ = alarm::set(secs as u32);
}
