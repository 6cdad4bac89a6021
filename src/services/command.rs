// src/services/command.rs

//! Shell commands run on behalf of a service.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::errors::{HerdError, Result};

/// Number of output lines kept when a build fails.
const BUILD_OUTPUT_TAIL: usize = 20;

/// `sh -c <script>` in the service's base directory with its environment.
///
/// With `sudo`, the shell is run through `sudo -n` so a missing credential
/// fails fast instead of prompting.
pub fn shell(svc: &ServiceConfig, script: &str, sudo: bool) -> Command {
    let mut cmd = if sudo {
        let mut cmd = Command::new("sudo");
        cmd.arg("-n").arg("-E").arg("sh");
        cmd
    } else {
        Command::new("sh")
    };
    cmd.arg("-c")
        .arg(script)
        .current_dir(svc.base_dir())
        .envs(svc.env_pairs())
        .stdin(Stdio::null());
    cmd
}

/// Outcome of a failed build: the error plus the tail of its output.
#[derive(Debug)]
pub struct BuildFailure {
    pub error: HerdError,
    pub output_tail: Vec<String>,
}

/// Run the service's build command, if it has one.
pub async fn run_build(svc: &ServiceConfig) -> std::result::Result<(), BuildFailure> {
    let Some(script) = svc.commands.build.as_deref().filter(|s| !s.trim().is_empty()) else {
        debug!(service = %svc.name, "no build command");
        return Ok(());
    };

    debug!(service = %svc.name, command = %script, "building");
    let output = shell(svc, script, false)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BuildFailure {
            error: HerdError::BuildFailed {
                service: svc.name.clone(),
                reason: format!("could not run build command: {e}"),
            },
            output_tail: Vec::new(),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let lines: Vec<String> = combined.lines().map(str::to_string).collect();
    let skip = lines.len().saturating_sub(BUILD_OUTPUT_TAIL);

    Err(BuildFailure {
        error: HerdError::BuildFailed {
            service: svc.name.clone(),
            reason: output.status.to_string(),
        },
        output_tail: lines.into_iter().skip(skip).collect(),
    })
}

/// Run the service's stop command, if it has one. Failures are reported
/// but do not prevent the process group from being signalled.
pub async fn run_stop_command(svc: &ServiceConfig) -> Result<()> {
    let Some(script) = svc.commands.stop.as_deref().filter(|s| !s.trim().is_empty()) else {
        return Ok(());
    };
    let status = shell(svc, script, svc.requires_sudo)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        return Err(HerdError::StopFailed {
            service: svc.name.clone(),
            reason: format!("stop command exited with {status}"),
        });
    }
    Ok(())
}
