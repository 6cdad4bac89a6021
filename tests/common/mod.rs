#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use herd_test_utils::builders::ConfigFileBuilder;
use tempfile::TempDir;

pub use herd_test_utils::builders::ServiceConfigBuilder;
pub use herd_test_utils::init_tracing;

/// An isolated home directory plus a project directory holding `herd.toml`.
///
/// Everything still running is stopped when the workspace is dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(config: ConfigFileBuilder) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("project")).expect("project dir");
        std::fs::create_dir_all(dir.path().join("elsewhere")).expect("second dir");
        config.write_to(&dir.path().join("project"));
        Self { dir }
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn project(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// Run `herd` from the project directory.
    pub fn herd(&self, args: &[&str]) -> Output {
        self.herd_in(&self.project(), args, "")
    }

    /// Run `herd` from the project directory, feeding `input` on stdin.
    pub fn herd_with_input(&self, args: &[&str], input: &str) -> Output {
        self.herd_in(&self.project(), args, input)
    }

    /// Run `herd` from a directory without any configuration file.
    pub fn herd_elsewhere(&self, args: &[&str]) -> Output {
        self.herd_in(&self.dir.path().join("elsewhere"), args, "")
    }

    fn herd_in(&self, cwd: &Path, args: &[&str], input: &str) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_herd"))
            .args(args)
            .current_dir(cwd)
            .env("HERD_HOME", self.home())
            .env_remove("HERD_CHILD")
            .env("HERD_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn herd");
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).expect("write stdin");
        }
        child.wait_with_output().expect("wait for herd")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = self.herd_elsewhere(&["stop", "--all", "--force"]);
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assert that `output` came from a successful run.
#[track_caller]
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "herd failed ({}):\nstdout:\n{}\nstderr:\n{}",
        output.status,
        stdout(output),
        stderr(output)
    );
}

/// Rows of a status table whose first column is `name`.
pub fn status_row(table: &str, name: &str) -> Option<String> {
    table
        .lines()
        .skip(1)
        .find(|line| line.split_whitespace().next() == Some(name))
        .map(str::to_string)
}

/// PID column of `name`'s status row.
pub fn status_pid(table: &str, name: &str) -> Option<u32> {
    status_row(table, name)?
        .split_whitespace()
        .nth(2)?
        .parse()
        .ok()
}
