// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Resolution and elevation errors abort an operation before any process is
//! touched. Per-service errors (`BuildFailed`, `PrematureExit`, `StopFailed`,
//! ...) are recorded on that service's task and folded into
//! `ServicesFailed` once every sibling has run.

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HerdError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cycle detected in groups: {0}")]
    GroupCycle(String),

    #[error("Service or group not found: {0}")]
    NotFound(String),

    #[error("At least one service or group must be specified")]
    NoServicesSpecified,

    #[error(
        "one or more services were started with an older version of herd ({}); stop them with that version first",
        .0.join(", ")
    )]
    LegacyStateConflict(Vec<String>),

    #[error("service '{service}' terminated prematurely ({status})")]
    PrematureExit { service: String, status: String },

    #[error("elevated privileges are required for '{0}'")]
    ElevationRequired(String),

    #[error("could not obtain elevated privileges: {0}")]
    ElevationFailed(String),

    #[error("build failed for '{service}': {reason}")]
    BuildFailed { service: String, reason: String },

    #[error("launch failed for '{service}': {reason}")]
    LaunchFailed { service: String, reason: String },

    #[error("stop failed for '{service}': {reason}")]
    StopFailed { service: String, reason: String },

    #[error("{operation} failed for: {}", .services.join(", "))]
    ServicesFailed {
        operation: &'static str,
        services: Vec<String>,
    },

    #[error("job submitted to a stopped worker pool")]
    PoolStopped,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HerdError {
    pub fn premature_exit(service: &str, status: Option<ExitStatus>) -> Self {
        let status = match status {
            Some(s) => s.to_string(),
            None => "exit status unknown".to_string(),
        };
        HerdError::PrematureExit {
            service: service.to_string(),
            status,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HerdError>;
