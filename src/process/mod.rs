// src/process/mod.rs

//! OS process helpers: liveness and identity lookups, process-tree walks,
//! process-group signalling and detached spawning.

pub mod ports;

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use sysinfo::{Pid, ProcessStatus, System};
use tokio::process::Command;
use tokio::time::{Instant, sleep};
use tracing::debug;

pub use ports::listening_ports;

/// What we know about a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// OS start time, seconds since the epoch.
    pub start_time: u64,
    /// Base name of the executable (`argv[0]`).
    pub program: String,
}

/// Look up `pid`. Zombies and dead entries count as gone.
pub fn inspect(pid: u32) -> Option<ProcessInfo> {
    if pid == 0 {
        return None;
    }
    let mut sys = System::new();
    let spid = Pid::from_u32(pid);
    if !sys.refresh_process(spid) {
        return None;
    }
    let process = sys.process(spid)?;
    if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
        return None;
    }
    Some(ProcessInfo {
        pid,
        start_time: process.start_time(),
        program: program_name(process.cmd(), process.name()),
    })
}

pub fn is_alive(pid: u32) -> bool {
    inspect(pid).is_some()
}

/// `pid` followed by all of its live descendants.
pub fn with_descendants(pid: u32) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (child, process) in sys.processes() {
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            continue;
        }
        if let Some(parent) = process.parent() {
            children
                .entry(parent.as_u32())
                .or_default()
                .push(child.as_u32());
        }
    }

    let mut out = vec![pid];
    let mut queue = VecDeque::from([pid]);
    while let Some(next) = queue.pop_front() {
        if let Some(kids) = children.get(&next) {
            for &kid in kids {
                if !out.contains(&kid) {
                    out.push(kid);
                    queue.push_back(kid);
                }
            }
        }
    }
    out
}

/// Send `signal` to the process group led by `pgid`.
///
/// A group that no longer exists is not an error.
pub fn signal_group(pgid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| std::io::Error::other(format!("invalid process group {pgid}")))?;
    #[allow(unsafe_code)]
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            debug!(pgid, "process group already gone");
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Send `signal` to a single process. A process that is already gone is
/// not an error.
pub fn signal(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::other(format!("invalid pid {pid}")))?;
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

/// Poll until `pid` is gone or `timeout` passes. Returns whether it exited.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(50)).await;
    }
}

/// Make the spawned command the leader of a new session and process group,
/// so the whole tree can be signalled with [`signal_group`].
pub fn detach(cmd: &mut Command) {
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

fn program_name(cmd: &[String], fallback: &str) -> String {
    cmd.first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive_and_named() {
        let me = inspect(std::process::id()).expect("current process is visible");
        assert_eq!(me.pid, std::process::id());
        assert!(me.start_time > 0);
        assert!(!me.program.is_empty());
    }

    #[test]
    fn pid_zero_is_never_alive() {
        assert!(!is_alive(0));
    }

    #[test]
    fn program_name_uses_argv0_basename() {
        let cmd = vec!["/usr/local/bin/herd".to_string(), "run".to_string()];
        assert_eq!(program_name(&cmd, "other"), "herd");
        assert_eq!(program_name(&[], "other"), "other");
    }

    #[tokio::test]
    async fn descendants_include_spawned_children() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("sleep 5")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let tree = with_descendants(std::process::id());
        assert!(tree.contains(&pid));

        child.kill().await.unwrap();
    }

    #[tokio::test]
    async fn signal_group_terminates_detached_tree() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30 & wait");
        detach(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id().unwrap();

        signal_group(pid, libc::SIGKILL).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
        // Sending to a reaped group is fine.
        signal_group(pid, libc::SIGTERM).unwrap();
    }
}
