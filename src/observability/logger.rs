//! Structured JSON logger
//!
//! - One log line = one event
//! - `event` first, `severity` second, `ts`, then fields in key order
//! - ERROR lines go to stderr, everything else to stdout

use std::fmt::{self, Write as _};
use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};

/// Strings longer than this are shortened by [`log_value`]
const LOG_VALUE_MAX_LEN: usize = 80;
const LOG_VALUE_HEAD_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    /// Query or request failure
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shortens long argument values before they are logged.
///
/// `"abc…"` longer than 80 chars becomes `first 50 chars… [total length]`.
pub fn log_value(value: &str) -> String {
    let len = value.chars().count();
    if len <= LOG_VALUE_MAX_LEN {
        return value.to_string();
    }
    let head: String = value.chars().take(LOG_VALUE_HEAD_LEN).collect();
    format!("{}… [{}]", head, len)
}

/// One rendered log line
///
/// `event`, `severity` and `ts` lead; caller fields follow sorted by key so
/// identical events always render identically.
struct LogLine {
    buf: String,
}

impl LogLine {
    fn new(severity: Severity, event: &str, ts: &str) -> Self {
        let mut line = Self {
            buf: String::with_capacity(192),
        };
        line.buf.push('{');
        line.push_pair("event", event);
        line.push_pair("severity", severity.as_str());
        line.push_pair("ts", ts);
        line
    }

    fn push_pair(&mut self, key: &str, value: &str) {
        if self.buf.len() > 1 {
            self.buf.push(',');
        }
        push_quoted(&mut self.buf, key);
        self.buf.push(':');
        push_quoted(&mut self.buf, value);
    }

    fn finish(mut self) -> String {
        self.buf.push_str("}\n");
        self.buf
    }
}

fn push_quoted(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

fn render(severity: Severity, event: &str, ts: &str, fields: &[(&str, &str)]) -> String {
    let mut line = LogLine::new(severity, event, ts);
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in sorted {
        line.push_pair(key, value);
    }
    line.finish()
}

/// JSON-lines logger
pub struct Logger;

impl Logger {
    /// Writes one event line with the current UTC timestamp.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = render(severity, event, &ts, fields);
        // one write per line; a closed pipe must not fail the query
        let _ = if severity.to_stderr() {
            io::stderr().lock().write_all(line.as_bytes())
        } else {
            io::stdout().lock().write_all(line.as_bytes())
        };
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Renders a line with a fixed timestamp
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    render(severity, event, "2024-01-01T00:00:00.000Z", fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_errors_go_to_stderr() {
        assert!(Severity::Info < Severity::Error);
        assert!(Severity::Error.to_stderr());
        assert!(!Severity::Warn.to_stderr());
    }

    #[test]
    fn test_log_json_format() {
        let output = capture_log(Severity::Info, "QUERY", &[("collection", "accounts")]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "QUERY");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["ts"], "2024-01-01T00:00:00.000Z");
        assert_eq!(parsed["collection"], "accounts");
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let output1 = capture_log(Severity::Info, "T", &[("zebra", "1"), ("apple", "2")]);
        let output2 = capture_log(Severity::Info, "T", &[("apple", "2"), ("zebra", "1")]);
        assert_eq!(output1, output2);

        let event_pos = output1.find("\"event\"").unwrap();
        let severity_pos = output1.find("\"severity\"").unwrap();
        let apple_pos = output1.find("apple").unwrap();
        let zebra_pos = output1.find("zebra").unwrap();
        assert!(event_pos < severity_pos);
        assert!(apple_pos < zebra_pos);
    }

    #[test]
    fn test_log_escapes_special_chars() {
        let output = capture_log(Severity::Warn, "T", &[("filter", "a \"b\"\nc")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["filter"], "a \"b\"\nc");
        assert_eq!(output.matches('\n').count(), 1);
    }

    #[test]
    fn test_log_value_truncation() {
        assert_eq!(log_value("short"), "short");
        let exact = "x".repeat(80);
        assert_eq!(log_value(&exact), exact);

        let long = "y".repeat(120);
        let shortened = log_value(&long);
        assert!(shortened.starts_with(&"y".repeat(50)));
        assert!(shortened.ends_with("… [120]"));
        assert_eq!(shortened.chars().count(), 50 + "… [120]".chars().count());
    }
}
