// src/home.rs

//! Per-installation directory layout.
//!
//! ```text
//! <home>/
//!   state/       running-service records (one JSON file per instance)
//!   logs/        captured service output
//!   herd_logs/   herd's own logs (runner processes write here)
//!   pidFiles/    legacy markers left by older installs
//!   herd.toml    optional fallback configuration
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::errors::{HerdError, Result};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "HERD_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeDirs {
    root: PathBuf,
}

impl HomeDirs {
    /// Use `root` as the home directory, creating the layout if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let home = Self { root: root.into() };
        for dir in [
            home.root.clone(),
            home.state_dir(),
            home.log_dir(),
            home.herd_log_dir(),
            home.legacy_pid_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating home directory {:?}", dir))?;
        }
        Ok(home)
    }

    /// Resolve the home directory from an explicit override, `HERD_HOME`, or
    /// `~/.herd`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Self::new(dir);
        }
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::new(PathBuf::from(dir));
        }
        let user_home = dirs::home_dir().ok_or_else(|| {
            HerdError::ConfigError("could not determine the user's home directory".to_string())
        })?;
        Self::new(user_home.join(".herd"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn herd_log_dir(&self) -> PathBuf {
        self.root.join("herd_logs")
    }

    pub fn legacy_pid_dir(&self) -> PathBuf {
        self.root.join("pidFiles")
    }

    /// Default log file for herd's own tracing output.
    pub fn herd_log_file(&self) -> PathBuf {
        self.herd_log_dir().join("herd.log")
    }

    /// Captured output of one service instance.
    pub fn service_log_file(&self, service: &str, instance_id: &str) -> PathBuf {
        self.log_dir().join(format!("{service}.{instance_id}.log"))
    }

    /// Marker written by older installs; its presence blocks `stop`.
    pub fn legacy_pid_file(&self, service: &str) -> PathBuf {
        self.legacy_pid_dir().join(format!("{service}.pid"))
    }

    /// Fallback configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("herd.toml")
    }
}
