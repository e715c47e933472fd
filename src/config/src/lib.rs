// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#[macro_use]
extern crate log;

mod database;
mod debug;
mod server;
mod worker;

pub use database::{Database, DatabaseConfig};
pub use debug::{Debug, DebugConfig};
pub use server::{Server, ServerConfig};
pub use worker::{Worker, WorkerConfig};

use serde::{Deserialize, Serialize};

use std::io::Read;

// struct definitions
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct HttpdConfig {
    #[serde(default)]
    server: Server,
    #[serde(default)]
    worker: Worker,
    #[serde(default)]
    debug: debug::Debug,
    // the database section is optional; without it the server runs with an
    // empty user table and registration always fails
    #[serde(default)]
    database: Option<Database>,
}

// implementation
impl HttpdConfig {
    pub fn load(file: &str) -> Result<HttpdConfig, std::io::Error> {
        let mut file = std::fs::File::open(file)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        match toml::from_str(&content) {
            Ok(t) => Ok(t),
            Err(e) => {
                error!("{}", e);
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "Error parsing config",
                ))
            }
        }
    }
}

// trait implementations
impl ServerConfig for HttpdConfig {
    fn server(&self) -> &Server {
        &self.server
    }

    fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }
}

impl WorkerConfig for HttpdConfig {
    fn worker(&self) -> &Worker {
        &self.worker
    }
}

impl DebugConfig for HttpdConfig {
    fn debug(&self) -> &debug::Debug {
        &self.debug
    }
}

impl DatabaseConfig for HttpdConfig {
    fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HttpdConfig::default();
        assert_eq!(config.server().port(), 8080);
        assert_eq!(config.server().timeslot(), 5);
        assert_eq!(config.worker().threads(), 8);
        assert_eq!(config.worker().max_requests(), 10000);
        assert!(config.database().is_none());
    }

    #[test]
    fn partial_sections_fill_in() {
        let config: HttpdConfig = toml::from_str(
            r#"
            [server]
            port = 9090
            document_root = "/srv/www"

            [database]
            password = "hunter2"
            "#,
        )
        .unwrap();
        assert_eq!(config.server().port(), 9090);
        assert_eq!(config.server().document_root(), "/srv/www");
        assert_eq!(config.server().max_connections(), 65536);
        let db = config.database().unwrap();
        assert_eq!(db.password(), "hunter2");
        assert_eq!(db.max_conn(), 8);
    }

    #[test]
    fn socket_addr_parses() {
        let config = HttpdConfig::default();
        assert!(config.server().socket_addr().is_ok());
    }
}
