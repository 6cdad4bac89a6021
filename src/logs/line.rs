// src/logs/line.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    /// Events written by herd itself (restarts, rebuilds).
    Herd,
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
            LogStream::Herd => "herd",
        })
    }
}

/// One line of service output. Stored one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    pub service: String,
    pub stream: LogStream,
    pub message: String,
}

impl LogLine {
    pub fn now(service: &str, stream: LogStream, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            service: service.to_string(),
            stream,
            message: message.into(),
        }
    }

    /// Decode a stored line. Anything that is not one of our JSON records is
    /// taken as raw stdout text stamped with `fallback_time`.
    pub fn parse(raw: &str, service: &str, fallback_time: DateTime<Utc>) -> Self {
        match serde_json::from_str::<LogLine>(raw) {
            Ok(line) => line,
            Err(_) => Self {
                time: fallback_time,
                service: service.to_string(),
                stream: LogStream::Stdout,
                message: raw.trim_end_matches('\r').to_string(),
            },
        }
    }

    /// Output written by the service itself rather than by herd.
    pub fn is_service_output(&self) -> bool {
        matches!(self.stream, LogStream::Stdout | LogStream::Stderr)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Human-readable rendering, optionally prefixed with the service name.
    pub fn render(&self, with_service: bool) -> String {
        let body = match self.stream {
            LogStream::Herd => format!("(herd) {}", self.message),
            _ => self.message.clone(),
        };
        if with_service {
            format!("[{}] {}", self.service, body)
        } else {
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_keep_their_fields() {
        let line = LogLine::now("api", LogStream::Stderr, "oops");
        let parsed = LogLine::parse(&line.to_json().unwrap(), "ignored", Utc::now());
        assert_eq!(parsed, line);
    }

    #[test]
    fn raw_text_falls_back_to_stdout() {
        let when = Utc::now();
        let parsed = LogLine::parse("plain output\r", "api", when);
        assert_eq!(parsed.stream, LogStream::Stdout);
        assert_eq!(parsed.service, "api");
        assert_eq!(parsed.message, "plain output");
        assert_eq!(parsed.time, when);
    }

    #[test]
    fn render_prefixes_only_when_asked() {
        let line = LogLine::now("api", LogStream::Herd, "restarting");
        assert_eq!(line.render(false), "(herd) restarting");
        assert_eq!(line.render(true), "[api] (herd) restarting");
    }
}
