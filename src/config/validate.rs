// src/config/validate.rs

use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HerdError, Result};

impl ConfigFile {
    /// Validate a raw config read from `config_file`.
    pub fn from_raw(raw: RawConfigFile, config_file: impl Into<PathBuf>) -> Result<Self> {
        validate_config(&raw)?;
        let group_order = group_order(&raw)?;
        Ok(ConfigFile::new_unchecked(
            config_file.into(),
            raw.service,
            raw.group,
            group_order,
        ))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_services(cfg)?;
    validate_names(cfg)?;
    validate_commands(cfg)?;
    validate_group_children(cfg)?;
    Ok(())
}

fn ensure_has_services(cfg: &RawConfigFile) -> Result<()> {
    if cfg.service.is_empty() {
        return Err(HerdError::ConfigError(
            "config must contain at least one [service.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.service.keys().chain(cfg.group.keys()) {
        // Names end up in file names and on runner command lines.
        if name.is_empty()
            || name.starts_with('-')
            || name.contains(|c: char| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(HerdError::ConfigError(format!(
                "invalid service or group name '{}'",
                name
            )));
        }
    }
    for name in cfg.group.keys() {
        if cfg.service.contains_key(name) {
            return Err(HerdError::ConfigError(format!(
                "'{}' is defined as both a service and a group",
                name
            )));
        }
    }
    Ok(())
}

fn validate_commands(cfg: &RawConfigFile) -> Result<()> {
    for (name, svc) in cfg.service.iter() {
        let launch = svc.commands.launch.as_deref().unwrap_or("").trim();
        if launch.is_empty() {
            return Err(HerdError::ConfigError(format!(
                "service '{}' has no launch command",
                name
            )));
        }
        if let Some(checks) = &svc.launch_checks {
            if let Some(pattern) = &checks.log_pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    HerdError::ConfigError(format!(
                        "service '{}' has an invalid log_pattern: {}",
                        name, e
                    ))
                })?;
            }
        }
    }
    Ok(())
}

fn validate_group_children(cfg: &RawConfigFile) -> Result<()> {
    for (name, group) in cfg.group.iter() {
        for child in group.children.iter() {
            if child == name {
                return Err(HerdError::ConfigError(format!(
                    "group '{}' cannot contain itself",
                    name
                )));
            }
            if !cfg.service.contains_key(child) && !cfg.group.contains_key(child) {
                return Err(HerdError::ConfigError(format!(
                    "group '{}' has unknown child '{}'",
                    name, child
                )));
            }
        }
    }
    Ok(())
}

/// Order groups so that every nested group precedes the groups containing it.
///
/// Edge direction: child group -> parent group. For
///   [group.all]
///   children = ["backend"]
/// we add edge backend -> all.
fn group_order(cfg: &RawConfigFile) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.group.keys() {
        graph.add_node(name.as_str());
    }

    for (name, group) in cfg.group.iter() {
        for child in group.children.iter() {
            if cfg.group.contains_key(child) {
                graph.add_edge(child.as_str(), name.as_str(), ());
            }
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(HerdError::GroupCycle(format!(
            "cycle detected in groups involving '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{GroupSpec, ServiceCommands, ServiceConfig};

    fn service(launch: &str) -> ServiceConfig {
        ServiceConfig {
            commands: ServiceCommands {
                launch: Some(launch.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn group(children: &[&str]) -> GroupSpec {
        GroupSpec {
            children: children.iter().map(|c| c.to_string()).collect(),
            description: None,
        }
    }

    #[test]
    fn fills_names_and_config_path() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), service("./api"));
        let cfg = ConfigFile::from_raw(raw, "/work/herd.toml").unwrap();
        let api = &cfg.service["api"];
        assert_eq!(api.name, "api");
        assert_eq!(api.config_file, PathBuf::from("/work/herd.toml"));
        assert_eq!(api.base_dir(), PathBuf::from("/work"));
    }

    #[test]
    fn rejects_missing_launch_command() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), ServiceConfig::default());
        let err = ConfigFile::from_raw(raw, "herd.toml").unwrap_err();
        assert!(matches!(err, HerdError::ConfigError(_)));
    }

    #[test]
    fn rejects_unknown_group_child() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), service("./api"));
        raw.group.insert("backend".into(), group(&["api", "db"]));
        let err = ConfigFile::from_raw(raw, "herd.toml").unwrap_err();
        assert!(err.to_string().contains("unknown child 'db'"));
    }

    #[test]
    fn rejects_name_shared_by_service_and_group() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), service("./api"));
        raw.group.insert("api".into(), group(&[]));
        assert!(ConfigFile::from_raw(raw, "herd.toml").is_err());
    }

    #[test]
    fn rejects_group_cycles() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), service("./api"));
        raw.group.insert("a".into(), group(&["b", "api"]));
        raw.group.insert("b".into(), group(&["a"]));
        let err = ConfigFile::from_raw(raw, "herd.toml").unwrap_err();
        assert!(matches!(err, HerdError::GroupCycle(_)));
    }

    #[test]
    fn nested_groups_are_ordered_before_parents() {
        let mut raw = RawConfigFile::default();
        raw.service.insert("api".into(), service("./api"));
        raw.group.insert("all".into(), group(&["backend"]));
        raw.group.insert("backend".into(), group(&["api"]));
        let cfg = ConfigFile::from_raw(raw, "herd.toml").unwrap();
        let pos = |n: &str| cfg.group_order.iter().position(|g| g == n).unwrap();
        assert!(pos("backend") < pos("all"));
    }
}
