// src/services/service.rs

//! Lifecycle of a single service: build, launch, stop and status.
//!
//! Each function reports through the task it is handed and also returns the
//! error, so callers can either fold failures from the task tree or react
//! directly.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::errors::{HerdError, Result};
use crate::liveness::{self, ReadinessPolicy};
use crate::logs::{self, LogSource};
use crate::process;
use crate::services::ServiceContext;
use crate::services::command::{self, shell};
use crate::state::{RunningServiceRecord, instance_id};
use crate::tracker::{Task, TaskState};
use crate::types::{OperationConfig, RunStatus, ServiceStatus};

/// Time a stopping service gets between SIGTERM and SIGKILL.
pub const STOP_GRACE: Duration = Duration::from_secs(3);

/// Time allowed for the process to disappear after SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Build (unless disabled) then launch `svc`, reporting under `task`.
pub async fn start_service(
    svc: &ServiceConfig,
    task: &Task,
    cfg: &OperationConfig,
    ctx: &ServiceContext,
    build: bool,
) -> Result<()> {
    task.set_state(TaskState::InProgress);
    let result = async {
        if build {
            build_service(svc, task).await?;
        }
        launch_service(svc, task, cfg, ctx).await
    }
    .await;
    task.settle();
    result
}

/// Run the build command under a `Build` child task.
///
/// A service without a build command still gets a successful `Build` task.
pub async fn build_service(svc: &ServiceConfig, task: &Task) -> Result<()> {
    let build = task.child("Build");
    build.set_state(TaskState::InProgress);
    match command::run_build(svc).await {
        Ok(()) => {
            build.set_state(TaskState::Success);
            Ok(())
        }
        Err(failure) => {
            for line in failure.output_tail.iter() {
                build.add_message(line.clone());
            }
            build.fail(&failure.error);
            Err(failure.error)
        }
    }
}

/// Launch `svc` under a `Start` child task and wait until it is ready.
pub async fn launch_service(
    svc: &ServiceConfig,
    task: &Task,
    cfg: &OperationConfig,
    ctx: &ServiceContext,
) -> Result<()> {
    let start = task.child("Start");
    start.set_state(TaskState::InProgress);

    if let Some(existing) = ctx.store.find(&svc.config_file, &svc.name) {
        info!(service = %svc.name, pid = existing.pid, "service already running");
        start.add_message(format!("already running (pid {})", existing.pid));
        start.set_state(TaskState::Warning);
        return Ok(());
    }

    match launch_and_wait(svc, cfg, ctx).await {
        Ok(record) => {
            info!(service = %svc.name, pid = record.pid, "service started");
            start.set_state(TaskState::Success);
            Ok(())
        }
        Err(err) => {
            warn!(service = %svc.name, error = %err, "service failed to start");
            start.fail(&err);
            Err(err)
        }
    }
}

async fn launch_and_wait(
    svc: &ServiceConfig,
    cfg: &OperationConfig,
    ctx: &ServiceContext,
) -> Result<RunningServiceRecord> {
    let policy = ReadinessPolicy::from_checks(svc.launch_checks.as_ref())?;
    let id = instance_id(&svc.config_file, &svc.name);
    let log_file = ctx.home.service_log_file(&svc.name, &id);
    match std::fs::remove_file(&log_file) {
        Ok(()) => debug!(log = ?log_file, "removed previous log"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let (mut cmd, command_line) = match &cfg.executable {
        Some(exe) => runner_command(exe, svc, cfg, ctx),
        None => direct_command(svc, &log_file)?,
    };
    process::detach(&mut cmd);

    let mut child = cmd.spawn().map_err(|e| HerdError::LaunchFailed {
        service: svc.name.clone(),
        reason: format!("could not spawn {:?}: {e}", command_line.first()),
    })?;
    let pid = child.id().ok_or_else(|| HerdError::LaunchFailed {
        service: svc.name.clone(),
        reason: "process exited before its pid was known".to_string(),
    })?;
    debug!(service = %svc.name, pid, "spawned");

    let waited = liveness::wait_until_live(
        &svc.name,
        pid,
        &log_file,
        &policy,
        child.wait(),
        cfg.launch_timeout,
    )
    .await;
    if let Err(err) = waited {
        abandon(pid, &mut child).await;
        return Err(err);
    }

    let Some(identity) = process::inspect(pid) else {
        abandon(pid, &mut child).await;
        return Err(HerdError::LaunchFailed {
            service: svc.name.clone(),
            reason: format!("could not read the identity of pid {pid}"),
        });
    };
    let record = RunningServiceRecord::new(
        svc.clone(),
        pid,
        command_line,
        identity,
        log_file,
        cfg.tags.clone(),
    );
    if let Err(err) = ctx.store.write(&record) {
        abandon(pid, &mut child).await;
        return Err(err);
    }

    // Reap the process if it exits while we are still around.
    tokio::spawn(async move {
        let _ = child.wait().await;
    });
    Ok(record)
}

/// Spawn `herd run <service>` as the supervising runner.
fn runner_command(
    exe: &Path,
    svc: &ServiceConfig,
    cfg: &OperationConfig,
    ctx: &ServiceContext,
) -> (Command, Vec<String>) {
    let mut args: Vec<String> = vec![
        exe.to_string_lossy().into_owned(),
        "--config".into(),
        svc.config_file.to_string_lossy().into_owned(),
        "--home".into(),
        ctx.home.root().to_string_lossy().into_owned(),
        "run".into(),
        svc.name.clone(),
    ];
    if cfg.no_watch {
        args.push("--no-watch".into());
    }
    if !cfg.working_dir.as_os_str().is_empty() {
        args.push("--directory".into());
        args.push(cfg.working_dir.to_string_lossy().into_owned());
    }
    for tag in cfg.tags.iter() {
        args.push("--tag".into());
        args.push(tag.clone());
    }
    if let Some(log_file) = &cfg.log_file {
        args.push("--log-file".into());
        args.push(log_file.to_string_lossy().into_owned());
    }

    let mut cmd = Command::new(exe);
    cmd.args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    (cmd, args)
}

/// Spawn the launch command itself, output appended to `log_file`.
fn direct_command(svc: &ServiceConfig, log_file: &Path) -> Result<(Command, Vec<String>)> {
    let script = svc.commands.launch.as_deref().unwrap_or_default();
    let out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {:?}", log_file))?;
    let err = out.try_clone()?;

    let mut cmd = shell(svc, script, svc.requires_sudo);
    cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));

    let mut command_line = Vec::new();
    if svc.requires_sudo {
        command_line.extend(["sudo".to_string(), "-n".into(), "-E".into()]);
    }
    command_line.extend(["sh".to_string(), "-c".into(), script.to_string()]);
    Ok((cmd, command_line))
}

/// Kill a process group that failed to come up and reap its leader.
async fn abandon(pid: u32, child: &mut Child) {
    if let Err(err) = process::signal_group(pid, libc::SIGKILL) {
        warn!(pid, error = %err, "could not kill process group");
    }
    let _ = child.wait().await;
}

/// Stop the running instance of `svc`, if any, under a `Stop` child task.
///
/// Returns `Ok(false)` without creating any task when nothing is running.
pub async fn stop_service(svc: &ServiceConfig, parent: &Task, ctx: &ServiceContext) -> Result<bool> {
    let Some(record) = ctx.store.find(&svc.config_file, &svc.name) else {
        debug!(service = %svc.name, "not running; nothing to stop");
        return Ok(false);
    };
    stop_record(&record, parent, ctx).await.map(|()| true)
}

/// Stop the instance described by `record`.
pub async fn stop_record(
    record: &RunningServiceRecord,
    parent: &Task,
    ctx: &ServiceContext,
) -> Result<()> {
    let task = parent.child(record.name());
    task.set_state(TaskState::InProgress);
    let stop = task.child("Stop");
    stop.set_state(TaskState::InProgress);

    let result = terminate(record).await.and_then(|()| ctx.store.remove(&record.instance_id));
    match &result {
        Ok(()) => {
            info!(service = %record.name(), pid = record.pid, "service stopped");
            stop.set_state(TaskState::Success);
        }
        Err(err) => {
            warn!(service = %record.name(), error = %err, "service failed to stop");
            stop.fail(err);
        }
    }
    task.settle();
    result
}

async fn terminate(record: &RunningServiceRecord) -> Result<()> {
    let name = record.name().to_string();
    let stop_failed = |reason: String| HerdError::StopFailed {
        service: name.clone(),
        reason,
    };

    if let Err(err) = command::run_stop_command(&record.service).await {
        warn!(service = %name, error = %err, "stop command failed; signalling anyway");
    }

    process::signal_group(record.pid, libc::SIGTERM)
        .map_err(|e| stop_failed(format!("could not send SIGTERM: {e}")))?;
    if process::wait_for_exit(record.pid, STOP_GRACE).await {
        return Ok(());
    }

    debug!(service = %name, pid = record.pid, "grace period over; sending SIGKILL");
    process::signal_group(record.pid, libc::SIGKILL)
        .map_err(|e| stop_failed(format!("could not send SIGKILL: {e}")))?;
    if process::wait_for_exit(record.pid, KILL_WAIT).await {
        return Ok(());
    }
    Err(stop_failed(format!("process {} is still running", record.pid)))
}

/// Status row for `svc` from its record, or `Stopped` without one.
pub async fn service_status(svc: &ServiceConfig, ctx: &ServiceContext) -> ServiceStatus {
    match ctx.store.find(&svc.config_file, &svc.name) {
        Some(record) => record_status(&record).await,
        None => ServiceStatus::stopped(&svc.name, svc.config_file.clone()),
    }
}

/// Status row for a live record.
pub async fn record_status(record: &RunningServiceRecord) -> ServiceStatus {
    let ports = liveness::ports_of_tree(record.pid).await;
    let counts = logs::count_lines(&LogSource {
        service: record.name().to_string(),
        path: record.log_file.clone(),
    })
    .await;
    ServiceStatus {
        name: record.name().to_string(),
        config_file: record.config_file.clone(),
        status: RunStatus::Running,
        pid: Some(record.pid),
        ports,
        stdout_lines: counts.stdout,
        stderr_lines: counts.stderr,
        start_time: Some(record.start_time),
    }
}

/// Log file the running (or most recent) instance of `svc` writes to.
pub fn log_source(svc: &ServiceConfig, ctx: &ServiceContext) -> LogSource {
    let path: PathBuf = match ctx.store.find(&svc.config_file, &svc.name) {
        Some(record) => record.log_file,
        None => ctx
            .home
            .service_log_file(&svc.name, &instance_id(&svc.config_file, &svc.name)),
    };
    LogSource {
        service: svc.name.clone(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LaunchChecks, ServiceCommands};
    use crate::home::HomeDirs;
    use crate::state::RunningStateStore;
    use crate::tracker::TaskSnapshot;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    fn ctx(dir: &Path) -> ServiceContext {
        let home = HomeDirs::new(dir.join("home")).unwrap();
        let store = RunningStateStore::new(&home);
        ServiceContext { home, store }
    }

    fn svc(dir: &Path, launch: &str, checks: LaunchChecks) -> ServiceConfig {
        ServiceConfig {
            name: "svc".into(),
            config_file: dir.join("herd.toml"),
            commands: ServiceCommands {
                launch: Some(launch.into()),
                ..Default::default()
            },
            launch_checks: Some(checks),
            ..Default::default()
        }
    }

    fn delay(ms: u64) -> LaunchChecks {
        LaunchChecks {
            wait_ms: Some(ms),
            ..Default::default()
        }
    }

    fn recording_root() -> (Task, Arc<Mutex<BTreeMap<String, TaskState>>>) {
        let states = Arc::new(Mutex::new(BTreeMap::new()));
        let sink = Arc::clone(&states);
        let root = Task::root(move |s: &TaskSnapshot| {
            sink.lock().unwrap().insert(s.qualified_name(), s.state);
        });
        (root, states)
    }

    #[tokio::test]
    async fn direct_launch_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let svc = svc(dir.path(), "echo hello; sleep 30", delay(200));
        let cfg = OperationConfig::default();
        let (root, states) = recording_root();

        let task = root.child("svc");
        start_service(&svc, &task, &cfg, &ctx, true).await.unwrap();
        {
            let states = states.lock().unwrap();
            assert_eq!(states["svc"], TaskState::Success);
            assert_eq!(states["svc > Build"], TaskState::Success);
            assert_eq!(states["svc > Start"], TaskState::Success);
        }

        let status = service_status(&svc, &ctx).await;
        assert_eq!(status.status, RunStatus::Running);
        assert_eq!(status.stdout_lines, 1);

        // Second start is a warning, not a failure.
        let again = root.child("svc");
        start_service(&svc, &again, &cfg, &ctx, false).await.unwrap();
        assert_eq!(again.state(), TaskState::Warning);

        let stop_root = Task::root(|_: &TaskSnapshot| {});
        assert!(stop_service(&svc, &stop_root, &ctx).await.unwrap());
        assert_eq!(service_status(&svc, &ctx).await.status, RunStatus::Stopped);
        assert!(ctx.store.list().is_empty());

        // Stopping again is a no-op.
        assert!(!stop_service(&svc, &stop_root, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn premature_exit_fails_and_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let svc = svc(dir.path(), "exit 3", delay(5_000));
        let (root, states) = recording_root();

        let task = root.child("svc");
        let err = start_service(&svc, &task, &OperationConfig::default(), &ctx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::PrematureExit { .. }));
        assert_eq!(states.lock().unwrap()["svc > Start"], TaskState::Failed);
        assert_eq!(task.state(), TaskState::Failed);
        assert_eq!(service_status(&svc, &ctx).await.status, RunStatus::Stopped);
    }

    #[tokio::test]
    async fn failed_build_skips_launch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let mut svc = svc(dir.path(), "sleep 30", delay(10));
        svc.commands.build = Some("exit 1".into());
        let (root, states) = recording_root();

        let task = root.child("svc");
        let err = start_service(&svc, &task, &OperationConfig::default(), &ctx, true)
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::BuildFailed { .. }));
        let states = states.lock().unwrap();
        assert_eq!(states["svc > Build"], TaskState::Failed);
        assert!(!states.contains_key("svc > Start"));
    }
}
