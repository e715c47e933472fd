// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use log::Level;
use serde::{Deserialize, Serialize};

// constants to define default values
const LOG_LEVEL: Level = Level::Info;
const LOG_DIR: &str = "./";
const LOG_MAX_LINES: usize = 800_000;
const LOG_QUEUE_DEPTH: usize = 8;

// helper functions
fn log_level() -> Level {
    LOG_LEVEL
}

fn log_dir() -> String {
    LOG_DIR.to_string()
}

fn log_max_lines() -> usize {
    LOG_MAX_LINES
}

fn log_queue_depth() -> usize {
    LOG_QUEUE_DEPTH
}

// struct definitions
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Debug {
    #[serde(with = "LevelDef")]
    #[serde(default = "log_level")]
    log_level: Level,
    #[serde(default = "log_dir")]
    log_dir: String,
    #[serde(default = "log_max_lines")]
    log_max_lines: usize,
    // 0 selects synchronous logging
    #[serde(default = "log_queue_depth")]
    log_queue_depth: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[serde(remote = "Level")]
#[serde(deny_unknown_fields)]
enum LevelDef {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// implementation
impl Debug {
    pub fn log_level(&self) -> Level {
        self.log_level
    }

    pub fn log_dir(&self) -> String {
        self.log_dir.clone()
    }

    pub fn log_max_lines(&self) -> usize {
        self.log_max_lines
    }

    pub fn log_queue_depth(&self) -> usize {
        self.log_queue_depth
    }
}

// trait implementations
impl Default for Debug {
    fn default() -> Self {
        Self {
            log_level: log_level(),
            log_dir: log_dir(),
            log_max_lines: log_max_lines(),
            log_queue_depth: log_queue_depth(),
        }
    }
}

// trait definitions
pub trait DebugConfig {
    fn debug(&self) -> &Debug;
}
