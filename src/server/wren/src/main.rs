// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#[macro_use]
extern crate log;

use std::sync::Arc;

use backtrace::Backtrace;
use config::{DebugConfig, HttpdConfig, ServerConfig};
use logger::LogBuilder;
use wren::HttpdBuilder;

fn main() {
    // custom panic hook to terminate the whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        error!("{}", s);
        println!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "wren".to_string());
    let port: u16 = match args.next().and_then(|arg| arg.parse().ok()) {
        Some(port) => port,
        None => {
            eprintln!("usage: {} <port> [config.toml]", program);
            std::process::exit(1);
        }
    };
    let mut config = match args.next() {
        Some(file) => HttpdConfig::load(&file).unwrap_or_else(|e| {
            eprintln!("failed to load config {}: {}", file, e);
            std::process::exit(1);
        }),
        None => Default::default(),
    };
    config.server_mut().set_port(port);

    // initialize logging
    let log_handle = LogBuilder::new()
        .directory(config.debug().log_dir())
        .max_lines(config.debug().log_max_lines())
        .queue_depth(config.debug().log_queue_depth())
        .level(config.debug().log_level())
        .build()
        .expect("failed to initialize logging")
        .start();

    // launch the server and block until it stops
    HttpdBuilder::new(Arc::new(config)).spawn().wait();

    log_handle.shutdown();
}
