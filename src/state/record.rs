// src/state/record.rs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::process::{self, ProcessInfo};

/// Stable id of a service instance: the same service from the same config
/// file always maps to the same record and log file.
pub fn instance_id(config_file: &Path, service: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_file.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(service.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// One running service instance, as persisted in `<home>/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningServiceRecord {
    pub instance_id: String,
    /// Snapshot of the definition the service was launched with.
    pub service: ServiceConfig,
    pub config_file: PathBuf,
    pub pid: u32,
    pub command_line: Vec<String>,
    pub start_time: DateTime<Utc>,
    /// OS start time of `pid` when the record was written. A record without
    /// one is never trusted.
    #[serde(default)]
    pub process_start_time: Option<u64>,
    /// Program name of `pid` when the record was written. Informational
    /// only: the launch shell may `exec` into another binary.
    #[serde(default)]
    pub program: Option<String>,
    pub log_file: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunningServiceRecord {
    pub fn new(
        service: ServiceConfig,
        pid: u32,
        command_line: Vec<String>,
        identity: ProcessInfo,
        log_file: PathBuf,
        tags: Vec<String>,
    ) -> Self {
        let config_file = service.config_file.clone();
        Self {
            instance_id: instance_id(&config_file, &service.name),
            service,
            config_file,
            pid,
            command_line,
            start_time: Utc::now(),
            process_start_time: Some(identity.start_time),
            program: Some(identity.program),
            log_file,
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.service.name
    }

    /// Whether `pid` is alive, not a zombie, and still the launched process.
    ///
    /// Identity is the OS start time, which survives `exec`.
    pub fn is_live(&self) -> bool {
        let Some(recorded) = self.process_start_time else {
            debug!(service = %self.name(), pid = self.pid, "record has no process identity");
            return false;
        };
        let Some(info) = process::inspect(self.pid) else {
            return false;
        };
        if recorded != info.start_time {
            return false;
        }
        if self.program.as_deref().is_some_and(|p| p != info.program) {
            debug!(
                service = %self.name(),
                pid = self.pid,
                recorded = ?self.program,
                current = %info.program,
                "program changed since launch"
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_is_stable_and_distinct() {
        let a = instance_id(Path::new("/a/herd.toml"), "api");
        assert_eq!(a.len(), 16);
        assert_eq!(a, instance_id(Path::new("/a/herd.toml"), "api"));
        assert_ne!(a, instance_id(Path::new("/b/herd.toml"), "api"));
        assert_ne!(a, instance_id(Path::new("/a/herd.toml"), "web"));
    }

    #[test]
    fn identity_follows_start_time_not_program() {
        let me = process::inspect(std::process::id()).unwrap();
        let mut record = RunningServiceRecord::new(
            ServiceConfig {
                name: "api".into(),
                ..Default::default()
            },
            me.pid,
            vec![],
            me,
            PathBuf::new(),
            vec![],
        );
        assert!(record.is_live());

        // `sh -c '... exec server'` changes the program but not the process.
        record.program = Some("sh".into());
        assert!(record.is_live());

        record.process_start_time = record.process_start_time.map(|t| t + 1000);
        assert!(!record.is_live());
    }

    #[test]
    fn record_without_identity_is_not_trusted() {
        let me = process::inspect(std::process::id()).unwrap();
        let mut record = RunningServiceRecord::new(
            ServiceConfig {
                name: "api".into(),
                ..Default::default()
            },
            me.pid,
            vec![],
            me,
            PathBuf::new(),
            vec![],
        );
        record.process_start_time = None;
        record.program = None;
        assert!(!record.is_live());
    }
}
