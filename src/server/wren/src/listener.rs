// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The listener thread: one poller multiplexing the listen socket, the
//! signal pipe, worker completions, and every client connection.
//!
//! Client sockets never leave this thread. When a readable connection has
//! bytes buffered, its exchange is moved into a task for the worker pool
//! and the connection ignores socket events until the completion comes
//! back; submission blocks when the task queue is full, which is the
//! server's back-pressure against accepting faster than it can parse.
//!
//! Idle connections are closed by the timer heap. The heap is driven by
//! SIGALRM: the signal handler writes a byte to the self-pipe, the poller
//! wakes, and the tick runs after the event batch, closing every
//! connection whose deadline passed and re-arming the alarm.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use mio::net::TcpListener;
use mio::unix::SourceFd;
use mio::{event::Event, Events, Interest, Poll, Token, Waker};
use queues::BlockingQueue;
use slab::Slab;
use timer::TimerHeap;

use config::{HttpdConfig, ServerConfig};

use crate::common::{Signal, BUSY_MESSAGE, IDLE_TIMESLOTS};
use crate::session::{FlushStatus, Session, State};
use crate::signals::{self, SignalPipe};
use crate::workers::{Completion, Outcome, Task};

pub const LISTENER_TOKEN: Token = Token(usize::MAX);
pub const WAKER_TOKEN: Token = Token(usize::MAX - 1);
pub const SIGNAL_TOKEN: Token = Token(usize::MAX - 2);

/// The `Listener` accepts new connections and drives their I/O, handing
/// parse work to the worker pool.
pub struct Listener {
    config: Arc<HttpdConfig>,
    addr: std::net::SocketAddr,
    poll: Poll,
    listener: TcpListener,
    signal_pipe: SignalPipe,
    sessions: Slab<Session>,
    timers: TimerHeap<Token>,
    tasks: Arc<BlockingQueue<Task>>,
    completions: Receiver<Completion>,
    message_receiver: Receiver<Signal>,
    message_sender: Sender<Signal>,
    waker: Arc<Waker>,
    next_serial: u64,
    timeout: bool,
    stop: bool,
}

impl Listener {
    pub fn new(
        config: Arc<HttpdConfig>,
        signal_pipe: SignalPipe,
        tasks: Arc<BlockingQueue<Task>>,
        completions: Receiver<Completion>,
    ) -> Result<Self, std::io::Error> {
        let addr = config.server().socket_addr().map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Bad listen address")
        })?;
        let mut listener = TcpListener::bind(addr).map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Failed to start tcp listener")
        })?;
        let poll = Poll::new().map_err(|e| {
            error!("{}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Failed to create epoll instance")
        })?;

        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|e| {
                error!("{}", e);
                std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "Failed to register listener with epoll",
                )
            })?;
        poll.registry().register(
            &mut SourceFd(&signal_pipe.raw_fd()),
            SIGNAL_TOKEN,
            Interest::READABLE,
        )?;

        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let (message_sender, message_receiver) = crossbeam_channel::bounded(128);

        Ok(Self {
            config,
            addr,
            poll,
            listener,
            signal_pipe,
            sessions: Slab::new(),
            timers: TimerHeap::new(),
            tasks,
            completions,
            message_receiver,
            message_sender,
            waker,
            next_serial: 0,
            timeout: false,
            stop: false,
        })
    }

    /// Waker for the completion channel; workers hold a clone.
    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn message_sender(&self) -> Sender<Signal> {
        self.message_sender.clone()
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server().timeslot() * IDLE_TIMESLOTS)
    }

    /// Run the event loop until a stop is requested.
    pub fn run(&mut self) {
        info!("running server on: {}", self.addr);

        let mut events = Events::with_capacity(self.config.server().nevent());
        signals::arm_alarm(self.config.server().timeslot());

        loop {
            match self.poll.poll(&mut events, None) {
                Ok(()) => {}
                // the alarm interrupts the wait; the byte in the pipe
                // carries the actual signal
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("error polling: {}", e);
                }
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.do_accept(),
                    SIGNAL_TOKEN => {
                        let pending = self.signal_pipe.drain();
                        self.timeout |= pending.timeout;
                        self.stop |= pending.stop;
                    }
                    // completions are drained after the event batch
                    WAKER_TOKEN => {}
                    token => self.handle_session_event(token, event),
                }
            }

            self.handle_completions();

            while let Ok(message) = self.message_receiver.try_recv() {
                match message {
                    Signal::Shutdown => {
                        self.stop = true;
                    }
                }
            }

            if self.timeout {
                self.handle_tick();
            }
            if self.stop {
                break;
            }
        }

        // ends the worker threads once the queue drains
        self.tasks.close();
        info!("server stopped");
    }

    /// Repeatedly call accept on the listener
    fn do_accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if self.sessions.len() >= self.config.server().max_connections() {
                        let _ = stream.write(BUSY_MESSAGE);
                        error!("turning away connection from {}: at capacity", addr);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    self.add_session(addr, stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn add_session(&mut self, addr: std::net::SocketAddr, stream: mio::net::TcpStream) {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        let deadline = Instant::now() + self.idle_timeout();

        let mut session = Session::new(addr, stream, serial);
        let entry = self.sessions.vacant_entry();
        let token = Token(entry.key());
        session.set_token(token);
        if session.register(&self.poll).is_ok() {
            session.timer = Some(self.timers.push(deadline, token));
            entry.insert(session);
            trace!("accepted new session: {}", addr);
        } else {
            error!("error registering new socket");
        }
    }

    fn handle_session_event(&mut self, token: Token, event: &Event) {
        let Some(session) = self.sessions.get(token.0) else {
            trace!("got event for non-existent session: {}", token.0);
            return;
        };
        trace!("got event for session: {}", token.0);

        if event.is_error() || event.is_read_closed() {
            self.close_session(token);
            return;
        }

        match session.state() {
            State::Writing if event.is_writable() => self.do_write(token),
            State::Reading if event.is_readable() => self.do_read(token),
            // a worker holds the exchange; the readable edge is picked up
            // again once the completion restores it
            _ => {}
        }
    }

    /// Handle a read event for the session given its token
    fn do_read(&mut self, token: Token) {
        let Some(session) = self.sessions.get_mut(token.0) else {
            return;
        };
        let addr = session.addr();
        match session.read() {
            Ok(Some(0)) => {
                debug!("session closed by client: {}", addr);
                self.close_session(token);
            }
            Ok(Some(bytes)) => {
                trace!("read {} bytes from {}", bytes, addr);
                self.submit(token);
            }
            Ok(None) => {
                // spurious wakeup
            }
            Err(e) => {
                debug!("read error from {}: {}", addr, e);
                self.close_session(token);
            }
        }
    }

    /// Move the exchange to the worker pool and extend the idle deadline.
    fn submit(&mut self, token: Token) {
        let deadline = Instant::now() + self.idle_timeout();
        let Some(session) = self.sessions.get_mut(token.0) else {
            return;
        };
        let Some(exchange) = session.take_exchange() else {
            return;
        };
        let serial = session.serial();
        if let Some(handle) = session.timer {
            self.timers.reschedule(handle, deadline);
        }
        if self
            .tasks
            .push(Task {
                token,
                serial,
                exchange,
            })
            .is_err()
        {
            // the queue only closes during shutdown
            self.close_session(token);
        }
    }

    /// Handle a write event for a session given its token
    fn do_write(&mut self, token: Token) {
        let deadline = Instant::now() + self.idle_timeout();
        let Some(session) = self.sessions.get_mut(token.0) else {
            return;
        };
        let addr = session.addr();
        match session.flush() {
            Ok(FlushStatus::Pending) => {
                if let Some(handle) = session.timer {
                    self.timers.reschedule(handle, deadline);
                }
                if session.reregister(&self.poll).is_err() {
                    error!("failed to reregister");
                    self.close_session(token);
                }
            }
            Ok(FlushStatus::Done { linger }) => {
                if linger {
                    session.finish_keepalive();
                    if let Some(handle) = session.timer {
                        self.timers.reschedule(handle, deadline);
                    }
                    if session.reregister(&self.poll).is_err() {
                        error!("failed to reregister");
                        self.close_session(token);
                        return;
                    }
                    // pick up bytes that arrived while the reply was being
                    // sent; the readable edge for them has already fired
                    self.do_read(token);
                } else {
                    debug!("closing connection to {}", addr);
                    self.close_session(token);
                }
            }
            Err(e) => {
                debug!("write error to {}: {}", addr, e);
                self.close_session(token);
            }
        }
    }

    fn handle_completions(&mut self) {
        while let Ok(completion) = self.completions.try_recv() {
            let token = completion.token;
            let live = self
                .sessions
                .get(token.0)
                .map(|s| s.serial() == completion.serial)
                .unwrap_or(false);
            if !live {
                // the connection was closed (or replaced) while the worker
                // held its exchange; dropping the completion releases any
                // file mapping in the reply
                trace!("dropping completion for stale session: {}", token.0);
                continue;
            }

            match completion.outcome {
                Outcome::NeedMore(exchange) => {
                    if exchange.is_full() {
                        debug!("request overflowed receive buffer");
                        self.close_session(token);
                        continue;
                    }
                    let Some(session) = self.sessions.get_mut(token.0) else {
                        continue;
                    };
                    session.restore_exchange(exchange);
                    if session.reregister(&self.poll).is_err() {
                        error!("failed to reregister");
                        self.close_session(token);
                        continue;
                    }
                    // bytes may have arrived while the worker held the
                    // exchange; their readable edge has already fired
                    self.do_read(token);
                }
                Outcome::Respond { exchange, reply } => {
                    let Some(session) = self.sessions.get_mut(token.0) else {
                        continue;
                    };
                    session.begin_reply(exchange, reply);
                    self.do_write(token);
                }
            }
        }
    }

    /// Close every connection whose idle deadline has passed, then re-arm
    /// the alarm.
    fn handle_tick(&mut self) {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.timers.tick(now, |token| expired.push(token));
        for token in expired {
            if let Some(session) = self.sessions.get_mut(token.0) {
                info!("closing idle connection: {}", session.addr());
                // the heap already dropped this entry
                session.timer = None;
                self.close_session(token);
            }
        }
        signals::arm_alarm(self.config.server().timeslot());
        self.timeout = false;
    }

    /// Close a session given its token
    fn close_session(&mut self, token: Token) {
        if !self.sessions.contains(token.0) {
            trace!("attempted to close non-existent session: {}", token.0);
            return;
        }
        let mut session = self.sessions.remove(token.0);
        if let Some(handle) = session.timer.take() {
            self.timers.remove(handle);
        }
        if session.deregister(&self.poll).is_err() {
            debug!("error deregistering");
        }
        session.close();
    }
}
