// src/runner/writer.rs

//! Appends captured output to a service log file, one JSON [`LogLine`] per
//! line.

use std::path::Path;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::logs::{LogLine, LogStream};

/// Cloneable handle feeding the writer task.
#[derive(Debug, Clone)]
pub struct LogWriter {
    service: String,
    tx: mpsc::Sender<LogLine>,
}

impl LogWriter {
    /// Open `path` for appending and start the writer task. The task ends
    /// once every handle has been dropped.
    pub async fn open(service: &str, path: &Path) -> Result<(Self, JoinHandle<()>)> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating log dir {:?}", parent))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening log file {:?}", path))?;

        let (tx, rx) = mpsc::channel(1024);
        let handle = tokio::spawn(write_lines(file, rx));
        Ok((
            Self {
                service: service.to_string(),
                tx,
            },
            handle,
        ))
    }

    pub async fn write(&self, stream: LogStream, message: impl Into<String>) {
        let line = LogLine::now(&self.service, stream, message);
        if self.tx.send(line).await.is_err() {
            debug!(service = %self.service, "log writer closed; dropping line");
        }
    }

    /// A line on the `herd` stream.
    pub async fn herd(&self, message: impl Into<String>) {
        self.write(LogStream::Herd, message).await;
    }

    /// Copy every line of `reader` to the log until EOF.
    pub fn pump<R>(&self, reader: R, stream: LogStream) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let log = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&buf);
                        let text = text.trim_end_matches(['\n', '\r']);
                        log.write(stream, text).await;
                    }
                    Err(err) => {
                        debug!(service = %log.service, %stream, error = %err, "output stream closed");
                        break;
                    }
                }
            }
        })
    }
}

async fn write_lines(mut file: tokio::fs::File, mut rx: mpsc::Receiver<LogLine>) {
    while let Some(line) = rx.recv().await {
        let mut json = match line.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "could not encode log line");
                continue;
            }
        };
        json.push('\n');
        if let Err(err) = file.write_all(json.as_bytes()).await {
            warn!(error = %err, "could not write log line");
            continue;
        }
        // Readiness checks read the file while the service is starting.
        let _ = file.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn pumped_lines_are_stored_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/api.log");
        let (log, handle) = LogWriter::open("api", &path).await.unwrap();

        log.herd("starting").await;
        let pump = log.pump(&b"one\r\ntwo\nthree"[..], LogStream::Stderr);
        pump.await.unwrap();
        drop(log);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<LogLine> = contents
            .lines()
            .map(|raw| LogLine::parse(raw, "api", Utc::now()))
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].stream, LogStream::Herd);
        assert_eq!(lines[0].message, "starting");
        let messages: Vec<&str> = lines[1..].iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
        assert!(lines[1..].iter().all(|l| l.stream == LogStream::Stderr));
    }
}
