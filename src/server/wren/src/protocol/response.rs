// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Response composition.
//!
//! A [`Reply`] is a composed response head (status line, `Content-Length`,
//! `Connection`, blank line, plus any inline body) and an optional memory
//! mapping for a file body. The head and the mapping become the two entries
//! of the vectored send.
//!
//! Syntactically bad requests are *served* with status 404 and the 404 body;
//! this mirrors the behavior this server has always had on the wire.

use bytes::BytesMut;
use memmap2::Mmap;

use crate::common::WRITE_BUFFER_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Forbidden,
    NotFound,
    InternalError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalError => "Internal Error",
        }
    }

    fn canned_body(self) -> &'static str {
        match self {
            Status::Ok => "",
            Status::Forbidden => "You do not have permission to get file form this server.\n",
            Status::NotFound => "The requested file was not found on this server.\n",
            Status::InternalError => "There was an unusual problem serving the request file.\n",
        }
    }
}

/// Body served for a zero-length file.
const EMPTY_FILE_BODY: &str = "<html><body></body></html>";

/// A fully composed response.
#[derive(Debug)]
pub struct Reply {
    pub head: BytesMut,
    pub file: Option<Mmap>,
    pub linger: bool,
}

impl Reply {
    /// Total bytes left to put on the wire when sending starts.
    pub fn total_len(&self) -> usize {
        self.head.len() + self.file.as_ref().map(|f| f.len()).unwrap_or(0)
    }
}

fn compose_head(status: Status, content_length: usize, linger: bool) -> BytesMut {
    let mut head = BytesMut::with_capacity(WRITE_BUFFER_SIZE);
    head.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", status.code(), status.reason()).as_bytes(),
    );
    head.extend_from_slice(format!("Content-Length:{}\r\n", content_length).as_bytes());
    head.extend_from_slice(
        format!(
            "Connection:{}\r\n",
            if linger { "keep-alive" } else { "close" }
        )
        .as_bytes(),
    );
    head.extend_from_slice(b"\r\n");
    head
}

/// A response whose body is the canned text for `status`.
pub fn error_reply(status: Status, linger: bool) -> Reply {
    let body = status.canned_body();
    let mut head = compose_head(status, body.len(), linger);
    head.extend_from_slice(body.as_bytes());
    Reply {
        head,
        file: None,
        linger,
    }
}

/// A 200 response whose body is a mapped file.
pub fn file_reply(file: Mmap, linger: bool) -> Reply {
    let head = compose_head(Status::Ok, file.len(), linger);
    Reply {
        head,
        file: Some(file),
        linger,
    }
}

/// A 200 response for a zero-length file.
pub fn empty_file_reply(linger: bool) -> Reply {
    let mut head = compose_head(Status::Ok, EMPTY_FILE_BODY.len(), linger);
    head.extend_from_slice(EMPTY_FILE_BODY.as_bytes());
    Reply {
        head,
        file: None,
        linger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_wire_format() {
        let head = compose_head(Status::Ok, 42, true);
        assert_eq!(
            &head[..],
            b"HTTP/1.1 200 OK\r\nContent-Length:42\r\nConnection:keep-alive\r\n\r\n"
        );

        let head = compose_head(Status::NotFound, 0, false);
        assert_eq!(
            &head[..],
            b"HTTP/1.1 404 Not Found\r\nContent-Length:0\r\nConnection:close\r\n\r\n"
        );
    }

    #[test]
    fn error_reply_length_matches_body() {
        for status in [Status::Forbidden, Status::NotFound, Status::InternalError] {
            let reply = error_reply(status, false);
            let text = String::from_utf8(reply.head.to_vec()).unwrap();
            let body = status.canned_body();
            assert!(text.ends_with(body));
            assert!(text.contains(&format!("Content-Length:{}\r\n", body.len())));
            assert!(text.contains("Connection:close\r\n"));
            assert!(reply.file.is_none());
        }
    }

    #[test]
    fn empty_file_serves_placeholder() {
        let reply = empty_file_reply(true);
        let text = String::from_utf8(reply.head.to_vec()).unwrap();
        assert!(text.ends_with("<html><body></body></html>"));
        assert!(text.contains("Content-Length:26\r\n"));
        assert!(text.contains("Connection:keep-alive\r\n"));
    }

    #[test]
    fn status_lines() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::Forbidden.code(), 403);
        assert_eq!(Status::NotFound.code(), 404);
        assert_eq!(Status::InternalError.code(), 500);
        assert_eq!(Status::InternalError.reason(), "Internal Error");
    }
}
