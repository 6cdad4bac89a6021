// src/logs/reader.rs

use std::io::SeekFrom;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::logs::line::LogLine;

/// Incremental reader over one service log file.
///
/// Each call to [`read_new`](Self::read_new) returns the complete lines
/// appended since the previous call. A file that does not exist yet reads
/// as empty. A file that was replaced (new inode, as on every launch) or
/// that shrank is read again from the start.
#[derive(Debug)]
pub struct LogFileReader {
    service: String,
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
    /// `(dev, ino)` of the file the offset refers to.
    file_id: Option<(u64, u64)>,
}

impl LogFileReader {
    pub fn new(service: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            offset: 0,
            partial: Vec::new(),
            file_id: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_new(&mut self) -> std::io::Result<Vec<LogLine>> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let metadata = file.metadata().await?;
        let file_id = Some((metadata.dev(), metadata.ino()));
        if file_id != self.file_id || metadata.len() < self.offset {
            self.offset = 0;
            self.partial.clear();
            self.file_id = file_id;
        }
        if metadata.len() == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::new();
        let read = file.read_to_end(&mut buf).await?;
        self.offset += read as u64;

        let fallback: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        self.partial.extend_from_slice(&buf);
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete: Vec<u8> = self.partial.drain(..=last_newline).collect();

        Ok(String::from_utf8_lossy(&complete)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| LogLine::parse(l, &self.service, fallback))
            .collect())
    }
}
