// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! HTTP/1.1 request parsing and response composition.

mod parser;
mod response;

pub use parser::{Method, ParseError, RequestParser};
pub use response::{empty_file_reply, error_reply, file_reply, Reply, Status};
