// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod home;
pub mod liveness;
pub mod logging;
pub mod logs;
pub mod orchestrator;
pub mod pool;
pub mod process;
pub mod runner;
pub mod services;
pub mod state;
pub mod sudo;
pub mod tracker;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::{discover_config_path, load_and_validate};
use crate::home::HomeDirs;
use crate::orchestrator::{Orchestrator, StartOptions, StopOptions};
use crate::runner::RunOptions;
use crate::services::{ServiceContext, ServiceTree};
use crate::sudo::SudoCheck;
use crate::tracker::PlainFollower;
use crate::types::OperationConfig;

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code. Everything but `run` exits 0 on success;
/// `run` exits with the supervised service's code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let home = HomeDirs::resolve(args.home.as_deref())?;

    match &args.command {
        Command::Version => {
            println!("herd version {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Command::Run(run) => {
            let log_file = run.log_file.clone().unwrap_or_else(|| home.herd_log_file());
            logging::init_logging(args.log_level, Some(log_file.as_path()))?;
            if let Some(dir) = &run.directory {
                std::env::set_current_dir(dir)
                    .with_context(|| format!("changing directory to {:?}", dir))?;
            }
        }
        _ => logging::init_logging(args.log_level, None)?,
    }

    let working_dir = std::env::current_dir().context("reading the working directory")?;
    let config_path = args
        .config
        .clone()
        .or_else(|| discover_config_path(&working_dir, &home));
    debug!(config = ?config_path, home = ?home.root(), "resolved paths");
    let config = match &config_path {
        Some(path) => Some(load_and_validate(path)?),
        None => None,
    };

    if let Command::Run(run) = &args.command {
        let config = config.context("no configuration file found for the runner")?;
        let code = runner::run_service(
            &config,
            &home,
            RunOptions {
                service: run.service.clone(),
                no_watch: run.no_watch,
                tags: run.tags.clone(),
            },
        )
        .await?;
        return Ok(code);
    }

    let tree = config.as_ref().map(ServiceTree::from_config).transpose()?;
    let settings = OperationConfig {
        working_dir,
        executable: Some(std::env::current_exe().context("locating the herd executable")?),
        log_file: Some(home.herd_log_file()),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(
        tree,
        ServiceContext::new(home),
        settings,
        Arc::new(PlainFollower::stdout()),
    )
    .with_checks(SudoCheck);

    match args.command {
        Command::Start(start) => {
            orchestrator
                .start(&start.names, &start_options(&start))
                .await?
        }
        Command::Restart(start) => {
            orchestrator
                .restart(&start.names, &start_options(&start))
                .await?
        }
        Command::Stop(stop) => {
            orchestrator
                .stop(
                    &stop.names,
                    &StopOptions {
                        force: stop.force,
                        exclude: stop.exclude,
                        all: stop.all,
                    },
                )
                .await?
        }
        Command::Status(status) => orchestrator.print_status(&status.names, status.all).await?,
        Command::Log(log) => orchestrator.log(&log.names).await?,
        Command::Run(_) | Command::Version => {}
    }
    Ok(0)
}

fn start_options(args: &cli::StartArgs) -> StartOptions {
    StartOptions {
        skip_build: args.skip_build,
        tail: args.tail,
        no_watch: args.no_watch,
        exclude: args.exclude.clone(),
        timeout: args.timeout.map(Duration::from_secs),
    }
}

