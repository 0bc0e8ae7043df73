//! JSON I/O for CLI commands
//!
//! - Input: one JSON object on one stdin line
//! - Output: one JSON envelope on stdout, `{"status":"ok","data":…}` or
//!   `{"status":"error","code":…,"message":…}`

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a JSON request from stdin
pub fn read_request() -> CliResult<Value> {
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    parse_request(&line)
}

fn parse_request(line: &str) -> CliResult<Value> {
    if line.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    let value: Value = serde_json::from_str(line)?;
    if !value.is_object() {
        return Err(CliError::invalid_request("Request must be a JSON object"));
    }
    Ok(value)
}

fn ok_envelope(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

fn error_envelope(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &ok_envelope(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&mut io::stdout(), &error_envelope(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("{\"collection\":\"blocks\"}\n").unwrap()["collection"], "blocks");
        assert!(parse_request("  \n").is_err());
        assert!(parse_request("[1]").is_err());
        assert!(parse_request("{oops").is_err());
    }

    #[test]
    fn test_envelopes_are_single_lines() {
        let mut out = Vec::new();
        write_line(&mut out, &ok_envelope(json!({"limit": 50}))).unwrap();
        write_line(&mut out, &error_envelope("E", "boom")).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<Value>(lines[0]).unwrap(),
            json!({"status": "ok", "data": {"limit": 50}})
        );
        assert_eq!(
            serde_json::from_str::<Value>(lines[1]).unwrap(),
            json!({"status": "error", "code": "E", "message": "boom"})
        );
    }
}
