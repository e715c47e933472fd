// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

use std::net::{AddrParseError, SocketAddr};

// constants to define default values
const SERVER_HOST: &str = "0.0.0.0";
const SERVER_PORT: u16 = 8080;
const SERVER_DOCUMENT_ROOT: &str = "./root";
const SERVER_MAX_CONNECTIONS: usize = 65536;
const SERVER_NEVENT: usize = 1024;
const SERVER_TIMESLOT: u64 = 5;

// helper functions
fn host() -> String {
    SERVER_HOST.to_string()
}

fn port() -> u16 {
    SERVER_PORT
}

fn document_root() -> String {
    SERVER_DOCUMENT_ROOT.to_string()
}

fn max_connections() -> usize {
    SERVER_MAX_CONNECTIONS
}

fn nevent() -> usize {
    SERVER_NEVENT
}

fn timeslot() -> u64 {
    SERVER_TIMESLOT
}

// struct definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Server {
    #[serde(default = "host")]
    host: String,
    #[serde(default = "port")]
    port: u16,
    #[serde(default = "document_root")]
    document_root: String,
    #[serde(default = "max_connections")]
    max_connections: usize,
    #[serde(default = "nevent")]
    nevent: usize,
    #[serde(default = "timeslot")]
    timeslot: u64,
}

// implementation
impl Server {
    pub fn host(&self) -> String {
        self.host.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn document_root(&self) -> &str {
        &self.document_root
    }

    /// Maximum number of concurrently connected clients. A connection that
    /// arrives while the table is full is turned away with a busy message.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn nevent(&self) -> usize {
        self.nevent
    }

    /// Coarse idle-timing unit in seconds. A connection is closed after
    /// three timeslots without traffic.
    pub fn timeslot(&self) -> u64 {
        self.timeslot
    }

    /// Return the result of parsing the host and port
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host(), self.port()).parse()
    }
}

// trait implementations
impl Default for Server {
    fn default() -> Self {
        Self {
            host: host(),
            port: port(),
            document_root: document_root(),
            max_connections: max_connections(),
            nevent: nevent(),
            timeslot: timeslot(),
        }
    }
}

// trait definitions
pub trait ServerConfig {
    fn server(&self) -> &Server;

    fn server_mut(&mut self) -> &mut Server;
}
