// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [service.api]
/// path = "api"
/// env = { PORT = "8080" }
///
/// [service.api.commands]
/// build = "make"
/// launch = "./api"
///
/// [service.api.launch_checks]
/// ports = [8080]
///
/// [group.backend]
/// children = ["api", "worker"]
/// ```
///
/// This is the raw, unvalidated shape. [`ConfigFile`] is only obtainable
/// through validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfigFile {
    /// All services from `[service.<name>]`, keyed by service name.
    #[serde(default)]
    pub service: BTreeMap<String, ServiceConfig>,

    /// All groups from `[group.<name>]`, keyed by group name.
    #[serde(default)]
    pub group: BTreeMap<String, GroupSpec>,
}

/// A validated configuration.
///
/// Every service has its `name` and `config_file` filled in, every group
/// child refers to an existing service or group, and groups are acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config_file: PathBuf,
    pub service: BTreeMap<String, ServiceConfig>,
    pub group: BTreeMap<String, GroupSpec>,
    /// Group names ordered so that nested groups come before their parents.
    pub group_order: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config_file: PathBuf,
        mut service: BTreeMap<String, ServiceConfig>,
        group: BTreeMap<String, GroupSpec>,
        group_order: Vec<String>,
    ) -> Self {
        for (name, svc) in service.iter_mut() {
            svc.name = name.clone();
            svc.config_file = config_file.clone();
        }
        Self {
            config_file,
            service,
            group,
            group_order,
        }
    }
}

/// `[service.<name>]` section.
///
/// Also persisted inside running-state records so that `stop --all` and
/// `status --all` work without the original configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Filled from the table key on load.
    #[serde(default)]
    pub name: String,

    /// Base path, relative to the configuration file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Whether the launch command must run under `sudo`.
    #[serde(default)]
    pub requires_sudo: bool,

    /// Absolute path of the configuration file that defined this service.
    #[serde(default)]
    pub config_file: PathBuf,

    /// Free-form tag metadata.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Glob patterns (relative to the base path) that trigger a rebuild and
    /// restart when the service runs under the supervising runner.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Extra environment variables for build, launch and stop commands.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub commands: ServiceCommands,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_checks: Option<LaunchChecks>,
}

impl ServiceConfig {
    /// Directory commands run in.
    pub fn base_dir(&self) -> PathBuf {
        let config_dir = self
            .config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        match &self.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => config_dir.join(p),
            None => config_dir,
        }
    }

    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// `[service.<name>.commands]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch: Option<String>,

    /// If set, run before signalling the process group on stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
}

/// `[service.<name>.launch_checks]` section.
///
/// Only one policy applies, in priority order: `log_text`/`log_pattern`,
/// then `ports`, then `wait_ms`. With none of them set, the service is
/// considered up once it listens on any port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchChecks {
    /// Literal text to look for in the service's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_text: Option<String>,

    /// Regex to look for in the service's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_pattern: Option<String>,

    /// All of these ports must be listening.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Fixed delay in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Ordered child service or group names.
    #[serde(default)]
    pub children: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
