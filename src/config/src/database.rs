// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

// constants to define default values
const DATABASE_HOST: &str = "localhost";
const DATABASE_USER: &str = "postgres";
const DATABASE_PORT: u16 = 5432;
const DATABASE_PASSWORD: &str = "";
const DATABASE_NAME: &str = "web_server";
const DATABASE_MAX_CONN: usize = 8;

// helper functions
fn host() -> String {
    DATABASE_HOST.to_string()
}

fn user() -> String {
    DATABASE_USER.to_string()
}

fn port() -> u16 {
    DATABASE_PORT
}

fn password() -> String {
    DATABASE_PASSWORD.to_string()
}

fn database() -> String {
    DATABASE_NAME.to_string()
}

fn max_conn() -> usize {
    DATABASE_MAX_CONN
}

// struct definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Database {
    #[serde(default = "host")]
    host: String,
    #[serde(default = "user")]
    user: String,
    #[serde(default = "port")]
    port: u16,
    #[serde(default = "password")]
    password: String,
    #[serde(default = "database")]
    database: String,
    #[serde(default = "max_conn")]
    max_conn: usize,
}

// implementation
impl Database {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Number of connections opened at startup. This is also the bound on
    /// concurrent leases.
    pub fn max_conn(&self) -> usize {
        self.max_conn
    }
}

// trait implementations
impl Default for Database {
    fn default() -> Self {
        Self {
            host: host(),
            user: user(),
            port: port(),
            password: password(),
            database: database(),
            max_conn: max_conn(),
        }
    }
}

// trait definitions
pub trait DatabaseConfig {
    fn database(&self) -> Option<&Database>;
}
