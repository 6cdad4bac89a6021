// src/logs/mod.rs

//! Service log capture format and the multi-service log follower.
//!
//! Runners write one JSON [`LogLine`] per line to
//! `<home>/logs/<service>.<instance>.log`. Following several services first
//! prints the merged history (sorted by time), then streams new lines from
//! every file as they arrive.

pub mod line;
pub mod reader;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::Result;

pub use line::{LogLine, LogStream};
pub use reader::LogFileReader;

/// Poll interval for live tails.
pub const FOLLOW_INTERVAL: Duration = Duration::from_millis(100);

/// A log file to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub service: String,
    pub path: PathBuf,
}

/// Per-stream line counts shown in the status table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub stdout: usize,
    pub stderr: usize,
}

/// Count stdout and stderr lines of one log file.
pub async fn count_lines(source: &LogSource) -> LineCounts {
    let mut reader = LogFileReader::new(&source.service, &source.path);
    let lines = match reader.read_new().await {
        Ok(lines) => lines,
        Err(err) => {
            debug!(path = ?source.path, error = %err, "could not read log for counting");
            return LineCounts::default();
        }
    };
    lines
        .iter()
        .fold(LineCounts::default(), |mut acc, line| {
            match line.stream {
                LogStream::Stdout => acc.stdout += 1,
                LogStream::Stderr => acc.stderr += 1,
                LogStream::Herd => {}
            }
            acc
        })
}

/// Read everything currently in `readers` and merge it by timestamp.
///
/// The sort is stable, so lines sharing a timestamp keep their per-file
/// order.
pub async fn read_backlog(readers: &mut [LogFileReader]) -> Vec<LogLine> {
    let mut all = Vec::new();
    for reader in readers.iter_mut() {
        match reader.read_new().await {
            Ok(lines) => all.extend(lines),
            Err(err) => warn!(path = ?reader.path(), error = %err, "could not read log file"),
        }
    }
    all.sort_by_key(|line| line.time);
    all
}

/// Print the merged backlog of `sources` to `out`, then every new line as
/// it arrives, until `cancel` fires.
///
/// Lines are prefixed with `[service]` when more than one source is
/// followed.
pub async fn follow<W>(sources: Vec<LogSource>, mut out: W, cancel: CancellationToken) -> Result<()>
where
    W: Write + Send,
{
    let prefix = sources.len() > 1;
    let mut readers: Vec<LogFileReader> = sources
        .into_iter()
        .map(|s| LogFileReader::new(s.service, s.path))
        .collect();

    for line in read_backlog(&mut readers).await {
        writeln!(out, "{}", line.render(prefix))?;
    }
    out.flush()?;

    let (tx, mut rx) = mpsc::channel::<LogLine>(256);
    let mut tails = Vec::with_capacity(readers.len());
    for reader in readers {
        tails.push(tokio::spawn(tail_file(reader, tx.clone(), cancel.clone())));
    }
    drop(tx);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(line) => {
                    writeln!(out, "{}", line.render(prefix))?;
                    out.flush()?;
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    for tail in tails {
        let _ = tail.await;
    }
    Ok(())
}

async fn tail_file(mut reader: LogFileReader, tx: mpsc::Sender<LogLine>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(FOLLOW_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match reader.read_new().await {
            Ok(lines) => {
                for line in lines {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                debug!(path = ?reader.path(), error = %err, "log tail read failed");
            }
        }
    }
}
