// src/runner/mod.rs

//! The supervising runner behind `herd run <service>`.
//!
//! `start` launches this in a detached session instead of the service
//! itself. The runner spawns the launch command, captures its output into
//! the service log, rebuilds and restarts it when watched files change, and
//! exits with the service's own exit code. SIGTERM and SIGINT stop the
//! service and end the runner with status 0.

pub mod watch;
pub mod writer;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Child;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ConfigFile, ServiceConfig};
use crate::errors::{HerdError, Result};
use crate::home::HomeDirs;
use crate::logs::LogStream;
use crate::process;
use crate::services::command::{run_build, shell};
use crate::services::service::STOP_GRACE;
use crate::state::instance_id;

use self::watch::{WatchPatterns, spawn_watcher};
use self::writer::LogWriter;

/// How long to wait for output pipes to drain after the service exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub service: String,
    pub no_watch: bool,
    pub tags: Vec<String>,
}

/// Supervise one service until it exits or the runner is signalled.
///
/// Returns the exit code the runner should exit with.
pub async fn run_service(config: &ConfigFile, home: &HomeDirs, opts: RunOptions) -> Result<i32> {
    let svc = config
        .service
        .get(&opts.service)
        .cloned()
        .ok_or_else(|| HerdError::NotFound(opts.service.clone()))?;
    let log_file = home.service_log_file(&svc.name, &instance_id(&svc.config_file, &svc.name));
    info!(service = %svc.name, log = ?log_file, tags = ?opts.tags, "runner starting");

    let (log, writer) = LogWriter::open(&svc.name, &log_file).await?;
    let runner = Runner { svc, log };
    let code = runner.supervise(!opts.no_watch).await;
    drop(runner);
    let _ = writer.await;
    code
}

struct Runner {
    svc: ServiceConfig,
    log: LogWriter,
}

/// A spawned launch command and the tasks copying its output.
struct Running {
    child: Child,
    pumps: Vec<JoinHandle<()>>,
}

impl Runner {
    async fn supervise(&self, watch: bool) -> Result<i32> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let (_watcher, mut changes) = if watch && !self.svc.watch.is_empty() {
            let patterns = WatchPatterns::new(self.svc.base_dir(), &self.svc.watch)?;
            let (handle, rx) = spawn_watcher(patterns)?;
            (Some(handle), Some(rx))
        } else {
            (None, None)
        };

        let mut running = self.spawn().await?;
        loop {
            tokio::select! {
                status = running.child.wait() => {
                    let status = status?;
                    self.drain(&mut running).await;
                    info!(service = %self.svc.name, %status, "service exited");
                    self.log.herd(format!("service exited ({status})")).await;
                    return Ok(status.code().unwrap_or(1));
                }
                _ = sigterm.recv() => {
                    self.log.herd("received SIGTERM, stopping").await;
                    self.stop(&mut running).await;
                    return Ok(0);
                }
                _ = sigint.recv() => {
                    self.log.herd("received SIGINT, stopping").await;
                    self.stop(&mut running).await;
                    return Ok(0);
                }
                batch = next_change(&mut changes) => {
                    let Some(paths) = batch else {
                        debug!("file watcher stopped");
                        changes = None;
                        continue;
                    };
                    if let Some(next) = self.rebuild_and_restart(&mut running, paths).await? {
                        running = next;
                    }
                }
            }
        }
    }

    async fn spawn(&self) -> Result<Running> {
        let script = self.svc.commands.launch.as_deref().unwrap_or_default();
        let mut cmd = shell(&self.svc, script, self.svc.requires_sudo);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| HerdError::LaunchFailed {
            service: self.svc.name.clone(),
            reason: format!("could not spawn launch command: {e}"),
        })?;
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(self.log.pump(stdout, LogStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(self.log.pump(stderr, LogStream::Stderr));
        }
        info!(service = %self.svc.name, pid = ?child.id(), "service process spawned");
        Ok(Running { child, pumps })
    }

    /// Returns the replacement process, or `None` if the build failed and
    /// the old process was kept.
    async fn rebuild_and_restart(
        &self,
        running: &mut Running,
        paths: Vec<PathBuf>,
    ) -> Result<Option<Running>> {
        info!(service = %self.svc.name, changed = paths.len(), "watched files changed");
        self.log
            .herd(format!("{} watched file(s) changed, rebuilding", paths.len()))
            .await;

        if let Err(failure) = run_build(&self.svc).await {
            warn!(service = %self.svc.name, error = %failure.error, "rebuild failed");
            self.log
                .herd(format!("rebuild failed, keeping the current process: {}", failure.error))
                .await;
            for line in failure.output_tail {
                self.log.herd(line).await;
            }
            return Ok(None);
        }

        self.stop(running).await;
        let next = self.spawn().await?;
        self.log.herd("restarted").await;
        Ok(Some(next))
    }

    /// Terminate the launch command and everything it started.
    async fn stop(&self, running: &mut Running) {
        let Some(pid) = running.child.id() else {
            self.drain(running).await;
            return;
        };
        let tree = process::with_descendants(pid);
        debug!(service = %self.svc.name, pids = ?tree, "terminating process tree");
        signal_all(&tree, libc::SIGTERM);

        if tokio::time::timeout(STOP_GRACE, running.child.wait())
            .await
            .is_err()
        {
            warn!(service = %self.svc.name, pid, "service ignored SIGTERM; killing");
            signal_all(&process::with_descendants(pid), libc::SIGKILL);
            let _ = running.child.wait().await;
        }
        // Descendants may outlive the leader.
        let leftovers: Vec<u32> = tree
            .into_iter()
            .filter(|&p| p != pid && process::is_alive(p))
            .collect();
        signal_all(&leftovers, libc::SIGKILL);
        self.drain(running).await;
    }

    async fn drain(&self, running: &mut Running) {
        for mut pump in running.pumps.drain(..) {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
                debug!(service = %self.svc.name, "output still open after exit");
                pump.abort();
            }
        }
    }
}

fn signal_all(pids: &[u32], sig: libc::c_int) {
    for &pid in pids {
        if let Err(err) = process::signal(pid, sig) {
            warn!(pid, error = %err, "could not signal process");
        }
    }
}

async fn next_change(changes: &mut Option<mpsc::Receiver<Vec<PathBuf>>>) -> Option<Vec<PathBuf>> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
