// src/sudo.rs

//! Elevation checks run before any service is touched.
//!
//! herd itself never runs as root. When a service needs `sudo`, the user is
//! asked for their password once (`sudo -v`) and herd re-executes itself
//! with [`CHILD_ENV`] set, so later `sudo -n` calls find cached credentials.

use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::{debug, info};

use crate::errors::{HerdError, Result};
use crate::services::ServiceOrGroup;
use crate::types::OperationConfig;

/// Set in the environment of a re-executed, sudo-ready herd process.
pub const CHILD_ENV: &str = "HERD_CHILD";

/// Whether this process is a re-executed child.
pub fn is_child() -> bool {
    std::env::var_os(CHILD_ENV).is_some_and(|v| !v.is_empty())
}

/// Pre-flight check over the services an operation will touch.
pub trait ServiceChecks: Send + Sync {
    fn check(&self, targets: &[ServiceOrGroup], cfg: &OperationConfig) -> Result<()>;
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChecks;

impl ServiceChecks for NoChecks {
    fn check(&self, _targets: &[ServiceOrGroup], _cfg: &OperationConfig) -> Result<()> {
        Ok(())
    }
}

/// Obtains sudo credentials when any target requires them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SudoCheck;

impl ServiceChecks for SudoCheck {
    fn check(&self, targets: &[ServiceOrGroup], cfg: &OperationConfig) -> Result<()> {
        let Some(target) = targets.iter().find(|t| t.is_sudo(cfg)) else {
            debug!("no service requires sudo");
            return Ok(());
        };
        debug!(name = %target.name(), "sudo required");

        #[allow(unsafe_code)]
        let euid = unsafe { libc::geteuid() };
        if euid == 0 {
            return Err(HerdError::ElevationFailed(
                "herd should not be run as root".to_string(),
            ));
        }
        if is_child() {
            return ensure_cached_credentials(target.name());
        }
        reexec_with_sudo()
    }
}

/// In a re-executed child, `sudo -n` must succeed without a prompt.
fn ensure_cached_credentials(target: &str) -> Result<()> {
    let cached = Command::new("sudo")
        .args(["-n", "true"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if cached {
        debug!("sudo credentials cached");
        Ok(())
    } else {
        Err(HerdError::ElevationRequired(target.to_string()))
    }
}

fn reexec_with_sudo() -> Result<()> {
    println!("One or more services use sudo. You may be prompted for your password.");
    let status = Command::new("sudo")
        .arg("-v")
        .status()
        .map_err(|e| HerdError::ElevationFailed(format!("could not run sudo: {e}")))?;
    if !status.success() {
        return Err(HerdError::ElevationFailed(format!("sudo -v exited with {status}")));
    }

    let exe = std::env::current_exe()?;
    info!(exe = ?exe, "re-executing with sudo credentials cached");
    let err = Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .env(CHILD_ENV, "1")
        .exec();
    // `exec` only returns on failure.
    Err(HerdError::ElevationFailed(format!(
        "could not re-execute {:?}: {err}",
        exe
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use std::sync::Arc;

    #[test]
    fn no_sudo_services_pass_without_side_effects() {
        let svc = ServiceConfig {
            name: "api".into(),
            ..Default::default()
        };
        let targets = vec![ServiceOrGroup::Service(Arc::new(svc))];
        SudoCheck
            .check(&targets, &OperationConfig::default())
            .unwrap();
    }

    #[test]
    fn excluded_sudo_service_is_ignored() {
        let svc = ServiceConfig {
            name: "proxy".into(),
            requires_sudo: true,
            ..Default::default()
        };
        let targets = vec![ServiceOrGroup::Service(Arc::new(svc))];
        let mut cfg = OperationConfig::default();
        cfg.exclusions.insert("proxy".into());
        SudoCheck.check(&targets, &cfg).unwrap();
    }
}
