// src/liveness/mod.rs

//! Deciding when a freshly launched service is up.
//!
//! The readiness check and the process-exit watcher race each other. The
//! check runs as its own task and shares a [`CancellationToken`] with the
//! waiter: whichever side resolves first wins, the token is cancelled, and
//! the losing check is awaited before returning.

pub mod policy;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{HerdError, Result};
use crate::logs::LogFileReader;
use crate::process;

pub use policy::ReadinessPolicy;

/// Poll interval for port and log checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wait until the service running as `pid` satisfies `policy`.
///
/// `exited` resolves when the process exits; if it does so before the
/// service is ready the result is [`HerdError::PrematureExit`]. `timeout`
/// bounds the wait; `None` waits for as long as it takes.
pub async fn wait_until_live<F>(
    service: &str,
    pid: u32,
    log_file: &Path,
    policy: &ReadinessPolicy,
    exited: F,
    timeout: Option<Duration>,
) -> Result<()>
where
    F: Future<Output = std::io::Result<ExitStatus>>,
{
    let cancel = CancellationToken::new();
    let mut check = tokio::spawn(run_check(
        policy.clone(),
        pid,
        service.to_string(),
        log_file.to_path_buf(),
        cancel.clone(),
    ));
    debug!(service = %service, pid, policy = %policy, "waiting for service to become ready");

    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let result = tokio::select! {
        joined = &mut check => match joined {
            Ok(true) => Ok(()),
            Ok(false) => Err(HerdError::LaunchFailed {
                service: service.to_string(),
                reason: "readiness check stopped early".to_string(),
            }),
            Err(err) => Err(HerdError::LaunchFailed {
                service: service.to_string(),
                reason: format!("readiness check failed: {err}"),
            }),
        },
        status = exited => {
            let status = status.ok();
            Err(HerdError::premature_exit(service, status))
        }
        _ = deadline => Err(HerdError::LaunchFailed {
            service: service.to_string(),
            reason: format!("not ready after {:?}", timeout.unwrap_or_default()),
        }),
    };

    cancel.cancel();
    if !check.is_finished() {
        let _ = check.await;
    }

    if result.is_ok() {
        info!(service = %service, pid, "service is ready");
    }
    result
}

async fn run_check(
    policy: ReadinessPolicy,
    pid: u32,
    service: String,
    log_file: PathBuf,
    cancel: CancellationToken,
) -> bool {
    match policy {
        ReadinessPolicy::Delay(delay) => {
            tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        ReadinessPolicy::LogText(_) | ReadinessPolicy::LogPattern(_) => {
            let mut reader = LogFileReader::new(service, log_file);
            loop {
                match reader.read_new().await {
                    Ok(lines) => {
                        if lines
                            .iter()
                            .filter(|l| l.is_service_output())
                            .any(|l| policy.matches_output(&l.message))
                        {
                            return true;
                        }
                    }
                    Err(err) => debug!(error = %err, "readiness log read failed"),
                }
                if !pause(&cancel).await {
                    return false;
                }
            }
        }
        ReadinessPolicy::Ports(wanted) => loop {
            let open = ports_of_tree(pid).await;
            if wanted.iter().all(|p| open.contains(p)) {
                return true;
            }
            if !pause(&cancel).await {
                return false;
            }
        },
        ReadinessPolicy::AnyPort => loop {
            if !ports_of_tree(pid).await.is_empty() {
                return true;
            }
            if !pause(&cancel).await {
                return false;
            }
        },
    }
}

/// Sleep for one [`POLL_INTERVAL`]. Returns `false` if cancelled meanwhile.
async fn pause(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(POLL_INTERVAL) => true,
    }
}

/// Listening ports of `pid` and all of its descendants.
pub async fn ports_of_tree(pid: u32) -> Vec<u16> {
    tokio::task::spawn_blocking(move || process::listening_ports(&process::with_descendants(pid)))
        .await
        .unwrap_or_default()
}
