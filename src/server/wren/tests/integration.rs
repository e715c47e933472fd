// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! End-to-end tests against a running server on a loopback port.
//!
//! One server is spawned for the whole test binary with a scratch document
//! root, a one second timeslot (so idle connections drop after ~3s), and a
//! deliberately tiny connection table so the busy path can be exercised.
//! The periodic alarm interrupts blocking syscalls across the process, so
//! every client read/write retries on `Interrupted`.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use config::HttpdConfig;
use wren::HttpdBuilder;

const PORT: u16 = 18321;

/// Time for the server to reap client-closed connections before the next
/// test fills the two-entry connection table.
const SETTLE: Duration = Duration::from_millis(100);

const LOG_PAGE: &str = "<html><body>log in</body></html>";
const JUDGE_PAGE: &str = "<html><body>judge</body></html>";
const LOG_ERROR_PAGE: &str = "<html><body>bad credentials</body></html>";
const REGISTER_ERROR_PAGE: &str = "<html><body>registration failed</body></html>";

static SERVER: OnceLock<Mutex<()>> = OnceLock::new();

/// Spawn the server once and return the lock that serializes the tests
/// (the connection table is only two entries deep).
fn server() -> &'static Mutex<()> {
    SERVER.get_or_init(|| {
        let root = scratch_dir("docroot");
        write_page(&root, "log.html", LOG_PAGE);
        write_page(&root, "judge.html", JUDGE_PAGE);
        write_page(&root, "logError.html", LOG_ERROR_PAGE);
        write_page(&root, "registerError.html", REGISTER_ERROR_PAGE);

        let logs = scratch_dir("logs");
        let config: HttpdConfig = toml::from_str(&format!(
            r#"
            [server]
            host = "127.0.0.1"
            port = {}
            document_root = {:?}
            max_connections = 2
            timeslot = 1

            [worker]
            threads = 2
            max_requests = 64

            [debug]
            log_dir = {:?}
            log_queue_depth = 0
            "#,
            PORT,
            root.to_str().unwrap(),
            logs.to_str().unwrap(),
        ))
        .expect("bad test config");

        // the handle is intentionally leaked; the server lives for the
        // whole test process
        std::mem::forget(HttpdBuilder::new(std::sync::Arc::new(config)).spawn());
        std::thread::sleep(Duration::from_millis(200));
        Mutex::new(())
    })
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wren-integration-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_page(root: &PathBuf, name: &str, content: &str) {
    std::fs::write(root.join(name), content).unwrap();
}

fn connect() -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", PORT)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
        .set_write_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
}

fn send(stream: &mut TcpStream, data: &[u8]) {
    let mut written = 0;
    while written < data.len() {
        match stream.write(&data[written..]) {
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => panic!("write failed: {}", e),
        }
    }
}

fn read_some(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Read one complete response: the head through `\r\n\r\n`, then exactly
/// `Content-Length` body bytes.
fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = find_blank_line(&buf) {
            break pos;
        }
        match read_some(stream, &mut tmp) {
            Ok(0) => panic!("connection closed before response head"),
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(e) => panic!("read failed: {}", e),
        }
    };

    let head = String::from_utf8(buf[..head_end + 4].to_vec()).unwrap();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length:"))
        .map(|v| v.trim().parse::<usize>().unwrap())
        .expect("response has no Content-Length");

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        match read_some(stream, &mut tmp) {
            Ok(0) => panic!("connection closed mid body"),
            Ok(n) => body.extend_from_slice(&tmp[..n]),
            Err(e) => panic!("read failed: {}", e),
        }
    }
    body.truncate(content_length);
    (head, body)
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn expect_eof(stream: &mut TcpStream) {
    let mut tmp = [0u8; 64];
    match read_some(stream, &mut tmp) {
        Ok(0) => {}
        Ok(n) => panic!("expected close, got {} bytes", n),
        Err(e) => panic!("expected close, got error: {}", e),
    }
}

#[test]
fn static_get_keep_alive() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();

    send(
        &mut stream,
        b"GET /log.html HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n",
    );
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "head: {}", head);
    assert!(head.contains("Connection:keep-alive\r\n"));
    assert_eq!(body, LOG_PAGE.as_bytes());

    // the connection stayed open: a second request works
    send(
        &mut stream,
        b"GET /log.html HTTP/1.1\r\nConnection: keep-alive\r\n\r\n",
    );
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, LOG_PAGE.as_bytes());

    drop(stream);
    std::thread::sleep(SETTLE);
}

#[test]
fn root_serves_judge_page() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    send(&mut stream, b"GET / HTTP/1.1\r\n\r\n");
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, JUDGE_PAGE.as_bytes());

    drop(stream);
    std::thread::sleep(SETTLE);
}

#[test]
fn missing_file_is_not_found_and_closes() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    send(&mut stream, b"GET /nope.html HTTP/1.1\r\nHost: x\r\n\r\n");
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"), "head: {}", head);
    assert!(head.contains("Connection:close\r\n"));
    assert_eq!(
        body,
        b"The requested file was not found on this server.\n"
    );
    expect_eof(&mut stream);
}

#[test]
fn bad_method_served_as_not_found() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    send(&mut stream, b"BREW /log.html HTTP/1.1\r\n\r\n");
    let (head, _) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"), "head: {}", head);
    assert!(head.contains("Connection:close\r\n"));
    expect_eof(&mut stream);
}

#[test]
fn login_with_unknown_user_serves_error_page() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    let body = "user=alice&password=whatever";
    send(
        &mut stream,
        format!(
            "POST /2CGISQL.cgi HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .as_bytes(),
    );
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, LOG_ERROR_PAGE.as_bytes());

    drop(stream);
    std::thread::sleep(SETTLE);
}

#[test]
fn register_without_database_serves_error_page() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    let body = "user=bob&password=pw";
    send(
        &mut stream,
        format!(
            "POST /3CGISQL.cgi HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .as_bytes(),
    );
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, REGISTER_ERROR_PAGE.as_bytes());

    drop(stream);
    std::thread::sleep(SETTLE);
}

#[test]
fn fragmented_request_is_reassembled() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    send(&mut stream, b"GET /log.h");
    std::thread::sleep(Duration::from_millis(50));
    send(&mut stream, b"tml HTTP/1.1\r\nHost: x\r");
    std::thread::sleep(Duration::from_millis(50));
    send(&mut stream, b"\n\r\n");
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, LOG_PAGE.as_bytes());

    drop(stream);
    std::thread::sleep(SETTLE);
}

#[test]
fn connections_beyond_capacity_are_turned_away() {
    let _guard = server().lock().unwrap();
    let first = connect();
    let second = connect();
    std::thread::sleep(Duration::from_millis(100));

    let mut third = connect();
    let mut buf = [0u8; 64];
    let n = read_some(&mut third, &mut buf).expect("expected busy message");
    assert_eq!(&buf[..n], b"Internal server busy");

    drop(first);
    drop(second);
    drop(third);
    std::thread::sleep(SETTLE);
}

#[test]
fn idle_connections_time_out() {
    let _guard = server().lock().unwrap();
    let mut stream = connect();
    stream
        .set_read_timeout(Some(Duration::from_secs(8)))
        .unwrap();

    // timeslot is 1s, so the 3-timeslot idle deadline plus alarm jitter
    // closes the connection within a few seconds
    let start = Instant::now();
    let mut tmp = [0u8; 16];
    match read_some(&mut stream, &mut tmp) {
        Ok(0) => {}
        other => panic!("expected idle close, got {:?}", other),
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "closed too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "closed too late: {:?}", elapsed);
}
