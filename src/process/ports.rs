// src/process/ports.rs

//! Listening TCP ports owned by a set of processes.
//!
//! On Linux this reads `/proc/net/tcp{,6}` and matches socket inodes against
//! each process's open file descriptors. Elsewhere it asks `lsof`.

use std::collections::BTreeSet;

/// `st` column value of a socket in the LISTEN state.
const TCP_LISTEN: &str = "0A";

/// Ports in the LISTEN state held by any of `pids`, sorted and deduplicated.
///
/// Processes we cannot inspect (exited, or owned by another user) are
/// skipped.
pub fn listening_ports(pids: &[u32]) -> Vec<u16> {
    imp::listening_ports(pids).into_iter().collect()
}

#[cfg(target_os = "linux")]
mod imp {
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::fs;

    pub(super) fn listening_ports(pids: &[u32]) -> BTreeSet<u16> {
        let inodes: HashSet<u64> = pids.iter().flat_map(|&pid| socket_inodes(pid)).collect();
        if inodes.is_empty() {
            return BTreeSet::new();
        }

        let mut listening: HashMap<u64, u16> = HashMap::new();
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            if let Ok(contents) = fs::read_to_string(table) {
                listening.extend(super::parse_proc_net_tcp(&contents));
            }
        }

        inodes
            .iter()
            .filter_map(|inode| listening.get(inode).copied())
            .collect()
    }

    fn socket_inodes(pid: u32) -> Vec<u64> {
        let Ok(entries) = fs::read_dir(format!("/proc/{pid}/fd")) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| fs::read_link(entry.path()).ok())
            .filter_map(|target| {
                let target = target.to_string_lossy();
                target
                    .strip_prefix("socket:[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|inode| inode.parse().ok())
            })
            .collect()
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use std::collections::BTreeSet;
    use std::process::Command;

    pub(super) fn listening_ports(pids: &[u32]) -> BTreeSet<u16> {
        if pids.is_empty() {
            return BTreeSet::new();
        }
        let pid_list = pids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let output = Command::new("lsof")
            .args(["-nP", "-a", "-p", &pid_list, "-iTCP", "-sTCP:LISTEN", "-Fn"])
            .output();
        match output {
            Ok(out) => super::parse_lsof(&String::from_utf8_lossy(&out.stdout)),
            Err(err) => {
                tracing::debug!(error = %err, "lsof unavailable");
                BTreeSet::new()
            }
        }
    }
}

/// Map socket inode to local port for LISTEN entries of a `/proc/net/tcp`
/// style table.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_net_tcp(contents: &str) -> Vec<(u64, u16)> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            let inode: u64 = fields[9].parse().ok()?;
            (inode != 0).then_some((inode, port))
        })
        .collect()
}

/// Ports from `lsof -Fn` output (`n*:8080`, `n127.0.0.1:3000`, `n[::1]:5432`).
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn parse_lsof(output: &str) -> BTreeSet<u16> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix('n'))
        .filter_map(|name| name.rsplit_once(':'))
        .filter_map(|(_, port)| port.parse().ok())
        .collect()
}
