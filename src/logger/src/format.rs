// Copyright 2026 the wren authors
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use chrono::{DateTime, Local};
use log::Record;

/// Render one log line: timestamp with microseconds, bracketed level,
/// message, trailing newline.
pub(crate) fn format_line(now: DateTime<Local>, record: &Record<'_>) -> String {
    format!(
        "{} [{}]: {}\n",
        now.format("%Y-%m-%d %H:%M:%S%.6f"),
        record.level(),
        record.args()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn render(args: std::fmt::Arguments, level: Level) -> String {
        let record = Record::builder().args(args).level(level).build();
        format_line(Local::now(), &record)
    }

    #[test]
    fn line_shape() {
        let line = render(format_args!("hello {}", "world"), Level::Warn);
        // 2026-01-02 03:04:05.123456 [WARN]: hello world\n
        assert!(line.ends_with(" [WARN]: hello world\n"));
        let ts = &line[..26];
        let bytes = ts.as_bytes();
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[7], b'-');
        assert_eq!(bytes[10], b' ');
        assert_eq!(bytes[13], b':');
        assert_eq!(bytes[16], b':');
        assert_eq!(bytes[19], b'.');
        assert!(ts[20..26].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn level_names() {
        assert!(render(format_args!("x"), Level::Error).contains("[ERROR]:"));
        assert!(render(format_args!("x"), Level::Debug).contains("[DEBUG]:"));
        assert!(render(format_args!("x"), Level::Info).contains("[INFO]:"));
    }
}
