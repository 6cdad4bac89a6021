// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `herd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "herd",
    version,
    about = "Build, launch and manage local instances of services.",
    long_about = None
)]
pub struct CliArgs {
    /// Use service configuration file at PATH.
    ///
    /// Default: the nearest `herd.toml` from the working directory upwards,
    /// then `<home>/herd.toml`.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for state, logs and legacy markers.
    ///
    /// If omitted, `HERD_HOME` or `~/.herd` is used.
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HERD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build and launch a service or a group.
    Start(StartArgs),

    /// Stop services. With no names, stops everything that is running.
    Stop(StopArgs),

    /// Rebuild and relaunch a service or a group.
    Restart(StartArgs),

    /// Display service status.
    Status(StatusArgs),

    /// Tail the logs of services.
    #[command(alias = "tail")]
    Log(LogArgs),

    /// Run a single service in the foreground, supervising it.
    #[command(hide = true)]
    Run(RunArgs),

    /// Display the herd version.
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Services or groups to operate on.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Skip the build phase.
    #[arg(short, long)]
    pub skip_build: bool,

    /// Disable autorestart on source changes.
    #[arg(long)]
    pub no_watch: bool,

    /// After starting, tail logs for the services.
    #[arg(short, long)]
    pub tail: bool,

    /// Exclude SERVICE from this operation.
    #[arg(short, long, value_name = "SERVICE")]
    pub exclude: Vec<String>,

    /// Seconds to wait for each service to become ready (default: no limit).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct StopArgs {
    /// Services or groups to stop.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Don't ask for confirmation when stopping everything.
    #[arg(short, long)]
    pub force: bool,

    /// Exclude SERVICE from this operation.
    #[arg(short, long, value_name = "SERVICE")]
    pub exclude: Vec<String>,

    /// Include services started from any configuration file.
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Services or groups to report on.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Report on services started from any configuration file.
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Services or groups to follow.
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Service to run.
    #[arg(value_name = "SERVICE")]
    pub service: String,

    /// Disable autorestart on source changes.
    #[arg(long)]
    pub no_watch: bool,

    /// Working directory of the invoking command.
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Tags to distinguish this instance.
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Write runner logs to PATH instead of `<home>/herd_logs/herd.log`.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_flags_are_parsed() {
        let args = CliArgs::try_parse_from([
            "herd", "start", "-s", "--no-watch", "-e", "db", "backend", "web",
        ])
        .expect("valid args");
        match args.command {
            Command::Start(start) => {
                assert!(start.skip_build);
                assert!(start.no_watch);
                assert!(!start.tail);
                assert_eq!(start.exclude, vec!["db".to_string()]);
                assert_eq!(start.names, vec!["backend".to_string(), "web".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_accepts_repeated_tags_and_global_home() {
        let args = CliArgs::try_parse_from([
            "herd", "run", "api", "--tag", "a", "-t", "b", "--home", "/tmp/h",
        ])
        .expect("valid args");
        assert_eq!(args.home, Some(PathBuf::from("/tmp/h")));
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.service, "api");
                assert_eq!(run.tags, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn log_requires_a_name() {
        assert!(CliArgs::try_parse_from(["herd", "log"]).is_err());
    }
}
