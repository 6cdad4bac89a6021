// src/state/mod.rs

//! Cross-invocation record of running services.
//!
//! Each running instance owns one JSON file under `<home>/state`. Records
//! are written once the service is up and only removed by `stop` after the
//! process is confirmed gone. Readers never trust a record on its own: the
//! PID must be alive and still be the same process (same OS start time)
//! before it is reported as running.

pub mod record;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::home::HomeDirs;

pub use record::{RunningServiceRecord, instance_id};

#[derive(Debug, Clone)]
pub struct RunningStateStore {
    dir: PathBuf,
}

impl RunningStateStore {
    pub fn new(home: &HomeDirs) -> Self {
        Self::at(home.state_dir())
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, instance_id: &str) -> PathBuf {
        self.dir.join(format!("{instance_id}.json"))
    }

    /// Persist `record`, replacing any previous record for the instance.
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so concurrent readers never see a partial record.
    pub fn write(&self, record: &RunningServiceRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating state directory {:?}", self.dir))?;
        let target = self.record_path(&record.instance_id);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", record.instance_id, std::process::id()));

        let json = serde_json::to_vec_pretty(record)?;
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("creating temporary record {:?}", tmp))?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)
            .with_context(|| format!("moving record into place at {:?}", target))?;

        debug!(
            service = %record.service.name,
            pid = record.pid,
            instance = %record.instance_id,
            "wrote running-state record"
        );
        Ok(())
    }

    /// Every record whose process is still alive and still the process that
    /// was launched.
    pub fn list(&self) -> Vec<RunningServiceRecord> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = ?self.dir, error = %err, "state directory unreadable");
                return Vec::new();
            }
        };

        let mut records: Vec<RunningServiceRecord> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && !path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            })
            .filter_map(|path| read_record(&path))
            .filter(|record| {
                let live = record.is_live();
                if !live {
                    debug!(
                        service = %record.service.name,
                        pid = record.pid,
                        "ignoring stale running-state record"
                    );
                }
                live
            })
            .collect();

        records.sort_by(|a, b| {
            a.service
                .name
                .cmp(&b.service.name)
                .then_with(|| a.config_file.cmp(&b.config_file))
        });
        records
    }

    /// The live record for `service` started from `config_file`, if any.
    pub fn find(&self, config_file: &Path, service: &str) -> Option<RunningServiceRecord> {
        let id = instance_id(config_file, service);
        read_record(&self.record_path(&id)).filter(RunningServiceRecord::is_live)
    }

    /// Delete the record for `instance_id`. A missing record is fine.
    pub fn remove(&self, instance_id: &str) -> Result<()> {
        let path = self.record_path(instance_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(instance = %instance_id, "removed running-state record");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn read_record(path: &Path) -> Option<RunningServiceRecord> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            // Deleted between listing and reading, or not ours to read.
            debug!(path = ?path, error = %err, "skipping unreadable record");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(record) => Some(record),
        Err(err) => {
            debug!(path = ?path, error = %err, "skipping unparsable record");
            None
        }
    }
}

/// Services among `names` that still have a marker from an older install.
pub fn legacy_markers<'a>(
    home: &HomeDirs,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| {
            let marker = home.legacy_pid_file(name);
            let found = marker.exists();
            if found {
                warn!(service = %name, marker = ?marker, "legacy pid marker found");
            }
            found
        })
        .map(str::to_string)
        .collect()
}
