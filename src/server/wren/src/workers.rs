// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The worker pool.
//!
//! Workers pull tasks from one shared bounded queue. A task carries a
//! connection's exchange; the worker drives the parser and, for a complete
//! request, executes it and composes the reply. The outcome travels back to
//! the listener over a channel, followed by a poll wakeup.
//!
//! A panic inside request handling is caught and answered with a 500 so a
//! broken handler can never take a worker thread down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Sender;
use mio::{Token, Waker};
use queues::BlockingQueue;

use crate::protocol::{error_reply, ParseError, Status};
use crate::request_processor::{self, Context};
use crate::session::Exchange;

/// One unit of work: a connection's exchange, ready for parsing.
pub struct Task {
    pub token: Token,
    pub serial: u64,
    pub exchange: Box<Exchange>,
}

/// The result of a task, addressed back to the owning connection.
pub struct Completion {
    pub token: Token,
    pub serial: u64,
    pub outcome: Outcome,
}

pub enum Outcome {
    /// The request is not complete yet; the exchange comes back so the
    /// listener can read more bytes into it.
    NeedMore(Box<Exchange>),
    /// A reply is ready to send.
    Respond {
        exchange: Box<Exchange>,
        reply: crate::protocol::Reply,
    },
}

/// A `Worker` executes parse/respond tasks pulled from the shared queue.
pub struct Worker {
    id: usize,
    tasks: Arc<BlockingQueue<Task>>,
    sender: Sender<Completion>,
    waker: Arc<Waker>,
    context: Arc<Context>,
}

impl Worker {
    pub fn new(
        id: usize,
        tasks: Arc<BlockingQueue<Task>>,
        sender: Sender<Completion>,
        waker: Arc<Waker>,
        context: Arc<Context>,
    ) -> Self {
        Self {
            id,
            tasks,
            sender,
            waker,
            context,
        }
    }

    /// Pull and execute tasks until the queue is closed.
    pub fn run(&mut self) {
        while let Some(task) = self.tasks.pop() {
            let completion = self.process(task);
            if self.sender.send(completion).is_err() {
                // listener is gone
                break;
            }
            if let Err(e) = self.waker.wake() {
                error!("failed to wake listener: {}", e);
            }
        }
        debug!("worker {} exiting", self.id);
    }

    fn process(&self, task: Task) -> Completion {
        let Task {
            token,
            serial,
            mut exchange,
        } = task;

        let outcome = match catch_unwind(AssertUnwindSafe(|| {
            let parsed = {
                let exchange = &mut *exchange;
                exchange.parser.parse(&mut exchange.buf, exchange.read_idx)
            };
            match parsed {
                Ok(()) => {
                    let reply = request_processor::process(&exchange, &self.context);
                    Outcome::Respond { exchange, reply }
                }
                Err(ParseError::Incomplete) => Outcome::NeedMore(exchange),
                Err(ParseError::BadRequest) => {
                    // syntactically bad requests are answered with the 404
                    // page and the connection is not kept alive
                    Outcome::Respond {
                        exchange,
                        reply: error_reply(Status::NotFound, false),
                    }
                }
            }
        })) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("worker {} caught panic while handling request", self.id);
                Outcome::Respond {
                    exchange: Box::new(Exchange::new()),
                    reply: error_reply(Status::InternalError, false),
                }
            }
        };

        Completion {
            token,
            serial,
            outcome,
        }
    }
}
