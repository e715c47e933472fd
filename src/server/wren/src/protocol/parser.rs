// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Incremental HTTP/1.1 request parser.
//!
//! Two state machines cooperate over the connection's receive buffer. The
//! inner line scanner walks bytes between `start_line` and the read cursor,
//! normalizing each `\r\n` terminator to `\0\0` in place; because a
//! terminator can be split across reads it also accepts a `\n` whose
//! predecessor was already consumed as `\r`. The outer machine consumes
//! scanned lines through the request-line and header states and then counts
//! raw bytes in the body state, since a body has no terminator.
//!
//! The parser is resumable: on [`ParseError::Incomplete`] the caller reads
//! more bytes into the buffer and calls [`RequestParser::parse`] again; all
//! cursors and parsed fields carry over. Parsed fields are stored as index
//! ranges into the buffer, so the parser itself stays free of lifetimes.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// More bytes are needed before a decision can be made.
    Incomplete,
    /// The request violates the expected syntax or uses an unsupported
    /// method or version.
    BadRequest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CheckState {
    RequestLine,
    Header,
    Body,
}

enum LineStatus {
    Ok,
    Open,
    Bad,
}

pub struct RequestParser {
    state: CheckState,
    checked_idx: usize,
    start_line: usize,
    method: Method,
    cgi: bool,
    url: (usize, usize),
    url_override: Option<&'static str>,
    host: Option<(usize, usize)>,
    content_length: usize,
    linger: bool,
    body: Option<(usize, usize)>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: CheckState::RequestLine,
            checked_idx: 0,
            start_line: 0,
            method: Method::Get,
            cgi: false,
            url: (0, 0),
            url_override: None,
            host: None,
            content_length: 0,
            linger: false,
            body: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Drive the parser over `buf[..read_idx]`. Returns `Ok(())` once a
    /// complete request has been parsed.
    pub fn parse(&mut self, buf: &mut [u8], read_idx: usize) -> Result<(), ParseError> {
        loop {
            if self.state == CheckState::Body {
                return self.parse_body(buf, read_idx);
            }
            match self.parse_line(buf, read_idx) {
                LineStatus::Open => return Err(ParseError::Incomplete),
                LineStatus::Bad => return Err(ParseError::BadRequest),
                LineStatus::Ok => {}
            }
            // the scanned line ends where its (rewritten) terminator begins
            let line = (self.start_line, self.checked_idx - 2);
            self.start_line = self.checked_idx;
            match self.state {
                CheckState::RequestLine => self.parse_request_line(buf, line)?,
                CheckState::Header => {
                    if line.0 == line.1 {
                        // blank line: headers are done
                        if self.content_length > 0 {
                            self.state = CheckState::Body;
                            continue;
                        }
                        return Ok(());
                    }
                    self.parse_header(buf, line);
                }
                CheckState::Body => unreachable!(),
            }
        }
    }

    fn parse_line(&mut self, buf: &mut [u8], read_idx: usize) -> LineStatus {
        while self.checked_idx < read_idx {
            match buf[self.checked_idx] {
                b'\r' => {
                    if self.checked_idx + 1 == read_idx {
                        return LineStatus::Open;
                    }
                    if buf[self.checked_idx + 1] == b'\n' {
                        buf[self.checked_idx] = 0;
                        buf[self.checked_idx + 1] = 0;
                        self.checked_idx += 2;
                        return LineStatus::Ok;
                    }
                    return LineStatus::Bad;
                }
                b'\n' => {
                    // the matching carriage return was the last byte of a
                    // previous read
                    if self.checked_idx > 1 && buf[self.checked_idx - 1] == b'\r' {
                        buf[self.checked_idx - 1] = 0;
                        buf[self.checked_idx] = 0;
                        self.checked_idx += 1;
                        return LineStatus::Ok;
                    }
                    return LineStatus::Bad;
                }
                _ => self.checked_idx += 1,
            }
        }
        LineStatus::Open
    }

    fn parse_request_line(&mut self, buf: &[u8], line: (usize, usize)) -> Result<(), ParseError> {
        let (lo, hi) = line;
        let text = &buf[lo..hi];
        let is_sep = |b: u8| b == b' ' || b == b'\t';

        let method_end = text
            .iter()
            .position(|&b| is_sep(b))
            .ok_or(ParseError::BadRequest)?;
        let method = &text[..method_end];
        if method.eq_ignore_ascii_case(b"GET") {
            self.method = Method::Get;
        } else if method.eq_ignore_ascii_case(b"POST") {
            self.method = Method::Post;
            self.cgi = true;
        } else {
            return Err(ParseError::BadRequest);
        }

        let mut url_start = method_end;
        while url_start < text.len() && is_sep(text[url_start]) {
            url_start += 1;
        }
        let url_end = text[url_start..]
            .iter()
            .position(|&b| is_sep(b))
            .map(|p| p + url_start)
            .ok_or(ParseError::BadRequest)?;

        let mut version_start = url_end;
        while version_start < text.len() && is_sep(text[version_start]) {
            version_start += 1;
        }
        if !text[version_start..].eq_ignore_ascii_case(b"HTTP/1.1") {
            return Err(ParseError::BadRequest);
        }

        let mut url_lo = lo + url_start;
        let url_hi = lo + url_end;
        let url = &buf[url_lo..url_hi];
        if url.len() >= 7 && url[..7].eq_ignore_ascii_case(b"http://") {
            let slash = url[7..]
                .iter()
                .position(|&b| b == b'/')
                .ok_or(ParseError::BadRequest)?;
            url_lo += 7 + slash;
        } else if url.len() >= 8 && url[..8].eq_ignore_ascii_case(b"https://") {
            let slash = url[8..]
                .iter()
                .position(|&b| b == b'/')
                .ok_or(ParseError::BadRequest)?;
            url_lo += 8 + slash;
        }
        if url_lo >= url_hi || buf[url_lo] != b'/' {
            return Err(ParseError::BadRequest);
        }
        if std::str::from_utf8(&buf[url_lo..url_hi]).is_err() {
            return Err(ParseError::BadRequest);
        }
        if url_hi - url_lo == 1 {
            self.url_override = Some("/judge.html");
        }
        self.url = (url_lo, url_hi);

        self.state = CheckState::Header;
        Ok(())
    }

    fn parse_header(&mut self, buf: &[u8], line: (usize, usize)) {
        let (lo, hi) = line;
        let text = &buf[lo..hi];
        let Some(colon) = text.iter().position(|&b| b == b':') else {
            debug!(
                "ignoring malformed header: {}",
                String::from_utf8_lossy(text)
            );
            return;
        };
        let name = &text[..colon];
        let mut value_start = colon + 1;
        while value_start < text.len() && (text[value_start] == b' ' || text[value_start] == b'\t')
        {
            value_start += 1;
        }
        let value = &text[value_start..];

        if name.eq_ignore_ascii_case(b"connection") {
            if value.eq_ignore_ascii_case(b"keep-alive") {
                self.linger = true;
            } else if value.eq_ignore_ascii_case(b"close") {
                self.linger = false;
            }
        } else if name.eq_ignore_ascii_case(b"content-length") {
            self.content_length = std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
        } else if name.eq_ignore_ascii_case(b"host") {
            self.host = Some((lo + value_start, hi));
        } else {
            debug!("ignoring unknown header: {}", String::from_utf8_lossy(text));
        }
    }

    fn parse_body(&mut self, buf: &mut [u8], read_idx: usize) -> Result<(), ParseError> {
        if read_idx >= self.content_length + self.checked_idx {
            let start = self.checked_idx;
            let end = start + self.content_length;
            if end < buf.len() {
                buf[end] = 0;
            }
            self.body = Some((start, end));
            Ok(())
        } else {
            Err(ParseError::Incomplete)
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn cgi(&self) -> bool {
        self.cgi
    }

    pub fn linger(&self) -> bool {
        self.linger
    }

    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn url<'a>(&self, buf: &'a [u8]) -> &'a str {
        match self.url_override {
            Some(url) => url,
            None => std::str::from_utf8(&buf[self.url.0..self.url.1]).unwrap_or("/"),
        }
    }

    pub fn host<'a>(&self, buf: &'a [u8]) -> Option<&'a str> {
        self.host
            .map(|(lo, hi)| std::str::from_utf8(&buf[lo..hi]).unwrap_or(""))
    }

    pub fn body<'a>(&self, buf: &'a [u8]) -> Option<&'a str> {
        self.body
            .map(|(lo, hi)| std::str::from_utf8(&buf[lo..hi]).unwrap_or(""))
    }
}
