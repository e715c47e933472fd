// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Per-connection state.
//!
//! A [`Session`] stays with the listener thread for its whole life; what
//! travels is its [`Exchange`] — the receive buffer and the resumable
//! parser — which is moved into a worker task and moved back with the
//! outcome. While the exchange is away exactly one worker can touch it, so
//! a connection is only ever handled by one thread at a time.

use std::io::{ErrorKind, IoSlice, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::{Interest, Poll, Token};
use timer::TimerHandle;

use crate::common::READ_BUFFER_SIZE;
use crate::protocol::{Reply, RequestParser};

/// Receive buffer plus parser state; the movable half of a connection.
pub struct Exchange {
    pub buf: [u8; READ_BUFFER_SIZE],
    pub read_idx: usize,
    pub parser: RequestParser,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            buf: [0; READ_BUFFER_SIZE],
            read_idx: 0,
            parser: RequestParser::new(),
        }
    }

    pub fn reset(&mut self) {
        self.buf = [0; READ_BUFFER_SIZE];
        self.read_idx = 0;
        self.parser.reset();
    }

    pub fn is_full(&self) -> bool {
        self.read_idx >= READ_BUFFER_SIZE
    }
}

/// What a connection is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Waiting for request bytes.
    Reading,
    /// The exchange is with a worker; socket events are ignored.
    Parsing,
    /// A reply is being sent.
    Writing,
}

/// Outcome of a flush attempt.
pub enum FlushStatus {
    /// The socket would block; write interest must stay armed.
    Pending,
    /// The reply went out completely.
    Done { linger: bool },
}

pub struct Session {
    token: Token,
    serial: u64,
    addr: SocketAddr,
    stream: TcpStream,
    state: State,
    pub timer: Option<TimerHandle>,
    exchange: Option<Box<Exchange>>,
    reply: Option<Reply>,
    bytes_sent: usize,
}

impl Session {
    pub fn new(addr: SocketAddr, stream: TcpStream, serial: u64) -> Self {
        Self {
            token: Token(0),
            serial,
            addr,
            stream,
            state: State::Reading,
            timer: None,
            exchange: Some(Box::new(Exchange::new())),
            reply: None,
            bytes_sent: 0,
        }
    }

    pub fn set_token(&mut self, token: Token) {
        self.token = token;
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn readiness(&self) -> Interest {
        match self.state {
            State::Reading | State::Parsing => Interest::READABLE,
            State::Writing => Interest::WRITABLE,
        }
    }

    /// Register the session with the event loop
    pub fn register(&mut self, poll: &Poll) -> Result<(), std::io::Error> {
        let interest = self.readiness();
        poll.registry().register(&mut self.stream, self.token, interest)
    }

    /// Reregister the session with the event loop
    pub fn reregister(&mut self, poll: &Poll) -> Result<(), std::io::Error> {
        let interest = self.readiness();
        poll.registry()
            .reregister(&mut self.stream, self.token, interest)
    }

    /// Deregister the session from the event loop
    pub fn deregister(&mut self, poll: &Poll) -> Result<(), std::io::Error> {
        poll.registry().deregister(&mut self.stream)
    }

    /// Read from the stream into the exchange buffer until the socket would
    /// block or the buffer is full.
    ///
    /// Returns `Ok(Some(0))` on a clean peer close before any data,
    /// `Ok(None)` on a spurious wakeup, and `Ok(Some(n))` when bytes landed.
    /// A full buffer at entry is an error: the peer sent more than one
    /// request's worth of bytes without completing a request.
    pub fn read(&mut self) -> Result<Option<usize>, std::io::Error> {
        let Some(exchange) = self.exchange.as_mut() else {
            return Ok(None);
        };
        if exchange.is_full() {
            return Err(std::io::Error::new(
                ErrorKind::Other,
                "receive buffer exhausted",
            ));
        }

        let mut total = 0;
        while exchange.read_idx < READ_BUFFER_SIZE {
            match self.stream.read(&mut exchange.buf[exchange.read_idx..]) {
                Ok(0) => {
                    if total == 0 {
                        return Ok(Some(0));
                    }
                    // deliver what we have; the hangup shows up on the next
                    // event
                    break;
                }
                Ok(n) => {
                    exchange.read_idx += n;
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if total == 0 {
                        return Ok(None);
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Some(total))
    }

    /// Hand the exchange to a worker task.
    pub fn take_exchange(&mut self) -> Option<Box<Exchange>> {
        let exchange = self.exchange.take();
        if exchange.is_some() {
            self.state = State::Parsing;
        }
        exchange
    }

    /// Put the exchange back after the worker asked for more bytes.
    pub fn restore_exchange(&mut self, exchange: Box<Exchange>) {
        self.exchange = Some(exchange);
        self.state = State::Reading;
    }

    /// Install a composed reply and start the send.
    pub fn begin_reply(&mut self, exchange: Box<Exchange>, reply: Reply) {
        self.exchange = Some(exchange);
        self.reply = Some(reply);
        self.bytes_sent = 0;
        self.state = State::Writing;
    }

    /// Push reply bytes to the socket with vectored writes over the
    /// remaining head and the remaining file body.
    ///
    /// On a terminal error the file mapping has already been released when
    /// this returns.
    pub fn flush(&mut self) -> Result<FlushStatus, std::io::Error> {
        let Some(reply) = self.reply.as_ref() else {
            // nothing pending; treat as an already-finished send
            return Ok(FlushStatus::Done { linger: true });
        };
        let linger = reply.linger;
        let total = reply.total_len();

        while self.bytes_sent < total {
            let Some(reply) = self.reply.as_ref() else {
                break;
            };
            let head = &reply.head[..];
            let file: &[u8] = reply.file.as_ref().map(|f| &f[..]).unwrap_or(&[]);

            let result = if self.bytes_sent < head.len() {
                let iov = [IoSlice::new(&head[self.bytes_sent..]), IoSlice::new(file)];
                self.stream.write_vectored(&iov)
            } else {
                let offset = self.bytes_sent - head.len();
                let iov = [IoSlice::new(&file[offset..])];
                self.stream.write_vectored(&iov)
            };

            match result {
                Ok(0) => {
                    self.reply = None;
                    return Err(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "connection closed during send",
                    ));
                }
                Ok(n) => self.bytes_sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(FlushStatus::Pending);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // release the mapping before reporting the failure
                    self.reply = None;
                    return Err(e);
                }
            }
        }

        // complete: the mapping is released here
        self.reply = None;
        self.bytes_sent = 0;
        Ok(FlushStatus::Done { linger })
    }

    /// Reset for the next request on a kept-alive connection.
    pub fn finish_keepalive(&mut self) {
        if let Some(exchange) = self.exchange.as_mut() {
            exchange.reset();
        } else {
            self.exchange = Some(Box::new(Exchange::new()));
        }
        self.reply = None;
        self.bytes_sent = 0;
        self.state = State::Reading;
    }

    /// Shut down the underlying stream.
    pub fn close(&mut self) {
        trace!("closing session: {}", self.addr);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
