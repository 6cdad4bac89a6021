// src/types.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Settings for one orchestrator call, shared read-only by every job the
/// call spawns.
#[derive(Debug, Clone, Default)]
pub struct OperationConfig {
    /// Directory the command was invoked from.
    pub working_dir: PathBuf,
    /// Services and groups to leave out.
    pub exclusions: BTreeSet<String>,
    /// Tags recorded with launched instances.
    pub tags: Vec<String>,
    pub skip_build: bool,
    /// Launch without restarting on source changes.
    pub no_watch: bool,
    /// herd binary to launch services through. Without it the launch command
    /// is spawned directly.
    pub executable: Option<PathBuf>,
    /// Log file handed to runner processes.
    pub log_file: Option<PathBuf>,
    /// Upper bound on waiting for a service to become ready.
    pub launch_timeout: Option<Duration>,
}

impl OperationConfig {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.contains(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Stopped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "Running",
            RunStatus::Stopped => "Stopped",
        })
    }
}

/// One row of `herd status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub name: String,
    pub config_file: PathBuf,
    pub status: RunStatus,
    pub pid: Option<u32>,
    pub ports: Vec<u16>,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
    pub start_time: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    pub fn stopped(name: &str, config_file: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            config_file,
            status: RunStatus::Stopped,
            pid: None,
            ports: Vec::new(),
            stdout_lines: 0,
            stderr_lines: 0,
            start_time: None,
        }
    }
}
