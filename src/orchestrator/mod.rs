// src/orchestrator/mod.rs

//! Entry points for `start`, `stop`, `restart`, `status` and `log`.
//!
//! Every lifecycle operation follows the same shape: resolve names against
//! the service tree, run the elevation check, queue per-service jobs on a
//! [`WorkerPool`] under one root [`Task`], drain the pool, then fold the
//! failed service tasks into a single [`HerdError::ServicesFailed`].

pub mod table;

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{HerdError, Result};
use crate::logs::{self, LogSource};
use crate::pool::WorkerPool;
use crate::services::service::{self, record_status, stop_record};
use crate::services::{ServiceContext, ServiceOrGroup, ServiceTree};
use crate::state::{RunningServiceRecord, legacy_markers};
use crate::sudo::{self, NoChecks, ServiceChecks};
use crate::tracker::{Task, TaskFollower, TaskSnapshot};
use crate::types::{OperationConfig, RunStatus, ServiceStatus};

/// Worker pool sizes per phase. `0` runs the phase sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency {
    pub start: usize,
    pub stop: usize,
}

impl Default for Concurrency {
    fn default() -> Self {
        Self { start: 1, stop: 3 }
    }
}

impl Concurrency {
    pub fn sequential() -> Self {
        Self { start: 0, stop: 0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub skip_build: bool,
    pub tail: bool,
    pub no_watch: bool,
    pub exclude: Vec<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    pub force: bool,
    pub exclude: Vec<String>,
    pub all: bool,
}

type Input = Box<dyn BufRead + Send>;
type Output = Box<dyn Write + Send>;

pub struct Orchestrator {
    tree: Option<ServiceTree>,
    ctx: Arc<ServiceContext>,
    settings: OperationConfig,
    follower: Arc<dyn TaskFollower>,
    checks: Box<dyn ServiceChecks>,
    concurrency: Concurrency,
    input: Arc<Mutex<Input>>,
    output: Mutex<Output>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("home", &self.ctx.home)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// `tree` is `None` when no configuration file was found; only
    /// `stop --all` and `status --all` work then.
    ///
    /// `settings` carries the per-invocation defaults (working directory,
    /// executable, runner log file) that every operation starts from.
    pub fn new(
        tree: Option<ServiceTree>,
        ctx: ServiceContext,
        settings: OperationConfig,
        follower: Arc<dyn TaskFollower>,
    ) -> Self {
        Self {
            tree,
            ctx: Arc::new(ctx),
            settings,
            follower,
            checks: Box::new(NoChecks),
            concurrency: Concurrency::default(),
            input: Arc::new(Mutex::new(Box::new(std::io::BufReader::new(std::io::stdin())))),
            output: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    pub fn with_checks(mut self, checks: impl ServiceChecks + 'static) -> Self {
        self.checks = Box::new(checks);
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replace the terminal used for confirmations, tables and tailed logs.
    pub fn with_io(mut self, input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        self.input = Arc::new(Mutex::new(Box::new(input)));
        self.output = Mutex::new(Box::new(output));
        self
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Build and launch `names`, optionally tailing their logs afterwards.
    pub async fn start(&self, names: &[String], opts: &StartOptions) -> Result<()> {
        if names.is_empty() {
            return Err(HerdError::NoServicesSpecified);
        }
        let targets = self.tree()?.resolve(names)?;
        let cfg = Arc::new(self.start_config(opts));
        self.checks.check(&targets, &cfg)?;

        let root = self.root_task();
        let result = self.start_targets(&root, &targets, &cfg).await;
        self.follower.done();
        result?;

        if opts.tail {
            self.log(names).await?;
        }
        Ok(())
    }

    /// Stop `names`, or everything running when `names` is empty.
    pub async fn stop(&self, names: &[String], opts: &StopOptions) -> Result<()> {
        let cfg = Arc::new(self.stop_config(&opts.exclude));

        if names.is_empty() {
            let records = self.running_records(opts.all, &cfg)?;
            if records.is_empty() {
                info!("nothing is running");
                return Ok(());
            }
            if !opts.force && !sudo::is_child() && !self.confirm_stop_all().await? {
                return Ok(());
            }
            self.reject_legacy(records.iter().map(|r| r.name()))?;
            let targets: Vec<ServiceOrGroup> = records
                .iter()
                .map(|r| ServiceOrGroup::Service(Arc::new(r.service.clone())))
                .collect();
            self.checks.check(&targets, &cfg)?;

            let root = self.root_task();
            let result = self.stop_records(&root, &records).await;
            self.follower.done();
            return result;
        }

        let targets = self.tree()?.resolve(names)?;
        let services = service_names(&targets, &cfg);
        self.reject_legacy(services.iter().map(String::as_str))?;
        self.checks.check(&targets, &cfg)?;

        let root = self.root_task();
        let result = self.stop_targets(&root, &targets, &cfg).await;
        self.follower.done();
        result
    }

    /// Stop then start `names` under one root task.
    ///
    /// Start runs even if stopping failed; its error takes precedence.
    pub async fn restart(&self, names: &[String], opts: &StartOptions) -> Result<()> {
        if names.is_empty() {
            return Err(HerdError::NoServicesSpecified);
        }
        let targets = self.tree()?.resolve(names)?;
        let start_cfg = Arc::new(self.start_config(opts));
        let stop_cfg = Arc::new(self.stop_config(&opts.exclude));
        let services = service_names(&targets, &stop_cfg);
        self.reject_legacy(services.iter().map(String::as_str))?;
        self.checks.check(&targets, &start_cfg)?;

        let root = self.root_task();
        let stopped = self.stop_targets(&root, &targets, &stop_cfg).await;
        let started = self.start_targets(&root, &targets, &start_cfg).await;
        self.follower.done();
        started?;
        stopped?;

        if opts.tail {
            self.log(names).await?;
        }
        Ok(())
    }

    /// Status rows for `names` (or the configured services) or, with `all`,
    /// for every instance in the running-state store.
    pub async fn status(&self, names: &[String], all: bool) -> Result<Vec<ServiceStatus>> {
        if all {
            let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
            let mut rows = Vec::new();
            for record in self.ctx.store.list() {
                if wanted.is_empty() || wanted.contains(record.name()) {
                    rows.push(record_status(&record).await);
                }
            }
            return Ok(rows);
        }

        let tree = self.tree()?;
        let cfg = self.stop_config(&[]);
        let targets = if names.is_empty() {
            tree.all_services()
        } else {
            tree.resolve(names)?
        };
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        for target in targets.iter() {
            for row in target.status(&cfg, &self.ctx).await {
                if seen.insert(row.name.clone()) {
                    rows.push(row);
                }
            }
        }
        if names.is_empty() {
            rows.retain(|r| r.status == RunStatus::Running);
        }
        Ok(rows)
    }

    /// Print the status table for `names`.
    pub async fn print_status(&self, names: &[String], all: bool) -> Result<()> {
        let rows = self.status(names, all).await?;
        let mut out = self.output.lock().unwrap_or_else(|p| p.into_inner());
        write!(out, "{}", table::render_status(&rows, all))?;
        out.flush()?;
        Ok(())
    }

    /// Follow the logs of `names` until Ctrl-C.
    pub async fn log(&self, names: &[String]) -> Result<()> {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        let result = self.log_until(names, cancel).await;
        watcher.abort();
        result
    }

    /// Follow the logs of `names` until `cancel` fires.
    pub async fn log_until(&self, names: &[String], cancel: CancellationToken) -> Result<()> {
        if names.is_empty() {
            return Err(HerdError::NoServicesSpecified);
        }
        let targets = self.tree()?.resolve(names)?;
        let cfg = self.stop_config(&[]);
        let mut sources: Vec<LogSource> = Vec::new();
        for svc in targets.iter().flat_map(|t| t.services(&cfg)) {
            if sources.iter().any(|s| s.service == svc.name) {
                continue;
            }
            sources.push(service::log_source(&svc, &self.ctx));
        }
        debug!(sources = sources.len(), "following logs");
        logs::follow(sources, SharedOutput(&self.output), cancel).await
    }

    fn tree(&self) -> Result<&ServiceTree> {
        self.tree.as_ref().ok_or_else(|| {
            HerdError::ConfigError("no configuration file found; pass --config".to_string())
        })
    }

    fn root_task(&self) -> Task {
        let follower = Arc::clone(&self.follower);
        Task::root(move |update: &TaskSnapshot| follower.handle(update))
    }

    fn start_config(&self, opts: &StartOptions) -> OperationConfig {
        OperationConfig {
            exclusions: opts.exclude.iter().cloned().collect(),
            skip_build: opts.skip_build,
            no_watch: opts.no_watch,
            launch_timeout: opts.timeout,
            ..self.settings.clone()
        }
    }

    fn stop_config(&self, exclude: &[String]) -> OperationConfig {
        OperationConfig {
            exclusions: exclude.iter().cloned().collect(),
            ..self.settings.clone()
        }
    }

    async fn start_targets(
        &self,
        root: &Task,
        targets: &[ServiceOrGroup],
        cfg: &Arc<OperationConfig>,
    ) -> Result<()> {
        let first = root.children().len();
        let pool = WorkerPool::new(self.concurrency.start);
        pool.start();
        let mut queued = Ok(());
        for target in targets {
            let submitted = if cfg.skip_build {
                target.launch(root, cfg, &self.ctx, &pool).await
            } else {
                target.start(root, cfg, &self.ctx, &pool).await
            };
            if let Err(err) = submitted {
                queued = Err(err);
                break;
            }
        }
        pool.stop();
        pool.complete().await;
        queued?;
        fold_failures("start", root, first, &service_names(targets, cfg))
    }

    async fn stop_targets(
        &self,
        root: &Task,
        targets: &[ServiceOrGroup],
        cfg: &Arc<OperationConfig>,
    ) -> Result<()> {
        let first = root.children().len();
        let pool = WorkerPool::new(self.concurrency.stop);
        pool.start();
        let mut queued = Ok(());
        for target in targets {
            if let Err(err) = target.stop(root, cfg, &self.ctx, &pool).await {
                queued = Err(err);
                break;
            }
        }
        pool.stop();
        pool.complete().await;
        queued?;
        fold_failures("stop", root, first, &service_names(targets, cfg))
    }

    async fn stop_records(&self, root: &Task, records: &[RunningServiceRecord]) -> Result<()> {
        let pool = WorkerPool::new(self.concurrency.stop);
        pool.start();
        let mut queued = Ok(());
        for record in records.iter().cloned() {
            let parent = root.clone();
            let ctx = Arc::clone(&self.ctx);
            let job = async move {
                // Failures are recorded on the task.
                let _ = stop_record(&record, &parent, &ctx).await;
            };
            if let Err(err) = pool.submit(job).await {
                queued = Err(err);
                break;
            }
        }
        pool.stop();
        pool.complete().await;
        queued?;
        let names: Vec<String> = records.iter().map(|r| r.name().to_string()).collect();
        fold_failures("stop", root, 0, &names)
    }

    /// Valid records an unnamed stop applies to.
    fn running_records(&self, all: bool, cfg: &OperationConfig) -> Result<Vec<RunningServiceRecord>> {
        let records: Vec<RunningServiceRecord> = if all {
            self.ctx.store.list()
        } else {
            let tree = self.tree()?;
            tree.all_services()
                .iter()
                .flat_map(|t| t.services(cfg))
                .filter_map(|svc| self.ctx.store.find(&svc.config_file, &svc.name))
                .collect()
        };
        Ok(records
            .into_iter()
            .filter(|r| !cfg.is_excluded(r.name()))
            .collect())
    }

    fn reject_legacy<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let found = legacy_markers(&self.ctx.home, names);
        if found.is_empty() {
            Ok(())
        } else {
            Err(HerdError::LegacyStateConflict(found))
        }
    }

    /// Ask before stopping everything. EOF counts as "no".
    async fn confirm_stop_all(&self) -> Result<bool> {
        loop {
            self.prompt("Are you sure you want to stop all services? [y/n]: ")?;
            let Some(answer) = self.read_answer().await? else {
                self.prompt("\n")?;
                return Ok(false);
            };
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    fn prompt(&self, text: &str) -> Result<()> {
        let mut output = self.output.lock().unwrap_or_else(|p| p.into_inner());
        output.write_all(text.as_bytes())?;
        output.flush()?;
        Ok(())
    }

    /// One line from the input, read off the runtime threads. `None` on EOF.
    async fn read_answer(&self) -> Result<Option<String>> {
        let input = Arc::clone(&self.input);
        let read = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
            let mut input = input.lock().unwrap_or_else(|p| p.into_inner());
            let mut answer = String::new();
            let n = input.read_line(&mut answer)?;
            Ok((n > 0).then_some(answer))
        })
        .await
        .map_err(|e| anyhow::anyhow!("reading the confirmation failed: {e}"))?;
        Ok(read?)
    }
}

/// Names of the services reached from `targets`.
fn service_names(targets: &[ServiceOrGroup], cfg: &OperationConfig) -> Vec<String> {
    let mut names = Vec::new();
    for svc in targets.iter().flat_map(|t| t.services(cfg)) {
        if !names.contains(&svc.name) {
            names.push(svc.name.clone());
        }
    }
    names
}

/// Settle the root's children created from index `first` on and turn failed
/// service tasks among them into one error.
fn fold_failures(operation: &'static str, root: &Task, first: usize, services: &[String]) -> Result<()> {
    let mut failed: Vec<String> = Vec::new();
    for task in root.children().iter().skip(first) {
        task.settle();
        for snapshot in task.failures() {
            if services.contains(&snapshot.name) && !failed.contains(&snapshot.name) {
                failed.push(snapshot.name);
            }
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(HerdError::ServicesFailed {
            operation,
            services: failed,
        })
    }
}

/// `Write` adapter over the orchestrator's shared output.
struct SharedOutput<'a>(&'a Mutex<Output>);

impl Write for SharedOutput<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, LaunchChecks, RawConfigFile, ServiceCommands, ServiceConfig, GroupSpec};
    use crate::home::HomeDirs;
    use crate::tracker::{TaskState, PlainFollower};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        states: Mutex<BTreeMap<String, TaskState>>,
    }

    impl TaskFollower for Recorder {
        fn handle(&self, update: &TaskSnapshot) {
            self.states
                .lock()
                .unwrap()
                .insert(update.qualified_name(), update.state);
        }

        fn done(&self) {}
    }

    fn service(launch: &str) -> ServiceConfig {
        ServiceConfig {
            commands: ServiceCommands {
                launch: Some(launch.into()),
                ..Default::default()
            },
            launch_checks: Some(LaunchChecks {
                wait_ms: Some(100),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn orchestrator(dir: &Path, follower: Arc<dyn TaskFollower>, input: &'static str) -> Orchestrator {
        let mut raw = RawConfigFile::default();
        raw.service.insert("a".into(), service("sleep 30"));
        raw.service.insert("b".into(), service("sleep 30"));
        raw.service.insert("c".into(), service("exit 3"));
        raw.service.insert(
            "execs".into(),
            ServiceConfig {
                launch_checks: Some(LaunchChecks {
                    log_text: Some("ready".into()),
                    ..Default::default()
                }),
                ..service("echo ready; sleep 0.5; exec sleep 30")
            },
        );
        raw.group.insert(
            "pair".into(),
            GroupSpec {
                children: vec!["a".into(), "b".into()],
                description: None,
            },
        );
        let cfg = ConfigFile::from_raw(raw, dir.join("herd.toml")).unwrap();
        let tree = ServiceTree::from_config(&cfg).unwrap();
        let home = HomeDirs::new(dir.join("home")).unwrap();
        Orchestrator::new(
            Some(tree),
            ServiceContext::new(home),
            OperationConfig::default(),
            follower,
        )
        .with_io(input.as_bytes(), Vec::<u8>::new())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn start_requires_names() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "");
        let err = orch.start(&[], &StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, HerdError::NoServicesSpecified));
    }

    #[tokio::test]
    async fn unknown_name_fails_before_anything_runs() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(dir.path(), recorder.clone(), "");
        let err = orch
            .start(&names(&["a", "nope"]), &StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::NotFound(_)));
        assert!(recorder.states.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_start_then_stop_everything() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(dir.path(), recorder.clone(), "");

        orch.start(&names(&["pair"]), &StartOptions::default())
            .await
            .unwrap();
        {
            let states = recorder.states.lock().unwrap();
            assert_eq!(states["pair"], TaskState::Success);
            assert_eq!(states["pair > a > Start"], TaskState::Success);
            assert_eq!(states["pair > b > Start"], TaskState::Success);
        }
        let rows = orch.status(&[], false).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == RunStatus::Running));

        orch.stop(
            &[],
            &StopOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(orch.status(&[], false).await.unwrap().is_empty());
        assert!(orch.context().store.list().is_empty());
    }

    #[tokio::test]
    async fn premature_exit_is_reported_as_failed_service() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "");
        let err = orch
            .start(&names(&["a", "c"]), &StartOptions::default())
            .await
            .unwrap_err();
        match err {
            HerdError::ServicesFailed { operation, services } => {
                assert_eq!(operation, "start");
                assert_eq!(services, vec!["c".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        let rows = orch.status(&names(&["a", "c"]), false).await.unwrap();
        assert_eq!(rows[0].status, RunStatus::Running);
        assert_eq!(rows[1].status, RunStatus::Stopped);

        orch.stop(&names(&["a"]), &StopOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn declining_confirmation_stops_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "maybe\nn\n");
        orch.start(&names(&["a"]), &StartOptions::default())
            .await
            .unwrap();

        orch.stop(&[], &StopOptions::default()).await.unwrap();
        assert_eq!(orch.status(&[], false).await.unwrap().len(), 1);

        orch.stop(&names(&["a"]), &StopOptions::default()).await.unwrap();
        assert!(orch.status(&[], false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_that_execs_stays_tracked_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "");
        orch.start(&names(&["execs"]), &StartOptions::default())
            .await
            .unwrap();
        let pid = orch.status(&names(&["execs"]), false).await.unwrap()[0]
            .pid
            .expect("pid recorded");

        // Let the shell replace itself with `sleep`.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let rows = orch.status(&names(&["execs"]), false).await.unwrap();
        assert_eq!(rows[0].status, RunStatus::Running);
        assert_eq!(rows[0].pid, Some(pid));

        orch.stop(&names(&["execs"]), &StopOptions::default())
            .await
            .unwrap();
        assert!(!crate::process::is_alive(pid));
        assert_eq!(
            orch.status(&names(&["execs"]), false).await.unwrap()[0].status,
            RunStatus::Stopped
        );
    }

    /// Answers after a delay, noting how far a ticker got in the meantime.
    struct SlowAnswer {
        ticks: Arc<AtomicUsize>,
        ticks_seen: Arc<AtomicUsize>,
        answer: &'static [u8],
    }

    impl std::io::Read for SlowAnswer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.answer.is_empty() {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_millis(200));
            self.ticks_seen
                .store(self.ticks.load(Ordering::SeqCst), Ordering::SeqCst);
            let n = self.answer.len().min(buf.len());
            buf[..n].copy_from_slice(&self.answer[..n]);
            self.answer = &self.answer[n..];
            Ok(n)
        }
    }

    #[tokio::test]
    async fn confirmation_does_not_block_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_seen = Arc::new(AtomicUsize::new(0));
        let input = std::io::BufReader::new(SlowAnswer {
            ticks: Arc::clone(&ticks),
            ticks_seen: Arc::clone(&ticks_seen),
            answer: b"yes\n",
        });
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "")
            .with_io(input, Vec::<u8>::new());
        orch.start(&names(&["a"]), &StartOptions::default())
            .await
            .unwrap();

        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        orch.stop(&[], &StopOptions::default()).await.unwrap();
        ticker.abort();

        assert!(ticks_seen.load(Ordering::SeqCst) > 0);
        assert!(orch.status(&[], false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn legacy_marker_blocks_stop() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(Recorder::default()), "");
        let marker = orch.context().home.legacy_pid_file("a");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "123").unwrap();

        let err = orch
            .stop(&names(&["pair"]), &StopOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::LegacyStateConflict(ref n) if n == &vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn sequential_restart_reports_plain_progress() {
        let dir = tempfile::tempdir().unwrap();
        let follower = Arc::new(PlainFollower::new(Vec::<u8>::new()));
        let orch = orchestrator(dir.path(), follower, "")
            .with_concurrency(Concurrency::sequential());
        orch.start(&names(&["b"]), &StartOptions::default())
            .await
            .unwrap();
        let before = orch.status(&names(&["b"]), false).await.unwrap()[0].pid;

        orch.restart(&names(&["b"]), &StartOptions::default())
            .await
            .unwrap();
        let after = orch.status(&names(&["b"]), false).await.unwrap();
        assert_eq!(after[0].status, RunStatus::Running);
        assert_ne!(after[0].pid, before);

        orch.stop(&names(&["b"]), &StopOptions::default()).await.unwrap();
    }
}
