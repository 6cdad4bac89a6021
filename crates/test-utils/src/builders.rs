#![allow(dead_code)]

use std::path::{Path, PathBuf};

use herd::config::{
    ConfigFile, GroupSpec, LaunchChecks, RawConfigFile, ServiceCommands, ServiceConfig,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_service(mut self, name: &str, service: ServiceConfig) -> Self {
        self.config.service.insert(name.to_string(), service);
        self
    }

    pub fn with_group(mut self, name: &str, children: &[&str]) -> Self {
        self.config.group.insert(
            name.to_string(),
            GroupSpec {
                children: children.iter().map(|c| c.to_string()).collect(),
                description: None,
            },
        );
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    /// Validate as if loaded from `path`.
    pub fn build_at(self, path: impl Into<PathBuf>) -> ConfigFile {
        ConfigFile::from_raw(self.config, path)
            .expect("Failed to build valid config from builder")
    }

    /// Write `herd.toml` into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(herd::config::CONFIG_FILE_NAME);
        let toml = toml::to_string(&self.config).expect("config serialises");
        std::fs::write(&path, toml).expect("config written");
        path
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ServiceConfig`.
pub struct ServiceConfigBuilder {
    service: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new(launch: &str) -> Self {
        Self {
            service: ServiceConfig {
                commands: ServiceCommands {
                    launch: Some(launch.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn build_command(mut self, cmd: &str) -> Self {
        self.service.commands.build = Some(cmd.to_string());
        self
    }

    pub fn stop_command(mut self, cmd: &str) -> Self {
        self.service.commands.stop = Some(cmd.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.service.path = Some(PathBuf::from(path));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.service.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.service.watch.push(pattern.to_string());
        self
    }

    pub fn wait_ms(mut self, ms: u64) -> Self {
        self.checks().wait_ms = Some(ms);
        self
    }

    pub fn log_text(mut self, text: &str) -> Self {
        self.checks().log_text = Some(text.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.checks().ports.push(port);
        self
    }

    fn checks(&mut self) -> &mut LaunchChecks {
        self.service
            .launch_checks
            .get_or_insert_with(LaunchChecks::default)
    }

    pub fn build(self) -> ServiceConfig {
        self.service
    }
}
