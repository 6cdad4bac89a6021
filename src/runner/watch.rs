// src/runner/watch.rs

//! Source watching for the supervising runner.
//!
//! A service's `watch` globs are evaluated relative to its base directory.
//! Matching changes are batched over a short debounce window and delivered
//! as one notification, so a burst of saves triggers a single rebuild.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Quiet period after the last matching change before notifying.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Compiled watch patterns for one service.
#[derive(Debug, Clone)]
pub struct WatchPatterns {
    root: PathBuf,
    set: GlobSet,
}

impl WatchPatterns {
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            builder.add(glob);
        }
        Ok(Self {
            root: root.into(),
            set: builder.build()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (absolute, or relative to the root) is watched.
    pub fn matches(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let rel = rel.to_string_lossy().replace('\\', "/");
        self.set.is_match(rel.as_str())
    }
}

/// Keeps the underlying `notify` watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Hand a watcher result to the debounce task. Errors go to the runner's
/// log; the runner's stderr is not attached to anything.
fn forward_event(tx: &mpsc::UnboundedSender<Event>, res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            // The receiver only goes away when the runner shuts down.
            let _ = tx.send(event);
        }
        Err(err) => warn!(error = %err, "file watch error"),
    }
}

/// Watch `patterns.root()` recursively; each message on the returned
/// channel is one debounced batch of changed, watched paths.
pub fn spawn_watcher(patterns: WatchPatterns) -> Result<(WatcherHandle, mpsc::Receiver<Vec<PathBuf>>)> {
    let root = patterns
        .root()
        .canonicalize()
        .unwrap_or_else(|_| patterns.root().to_path_buf());
    let patterns = WatchPatterns {
        root: root.clone(),
        set: patterns.set,
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| forward_event(&event_tx, res),
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let (batch_tx, batch_rx) = mpsc::channel::<Vec<PathBuf>>(4);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let mut batch = relevant_paths(&patterns, event);
            if batch.is_empty() {
                continue;
            }
            // Keep collecting until the tree has been quiet for DEBOUNCE.
            loop {
                match tokio::time::timeout(DEBOUNCE, event_rx.recv()).await {
                    Ok(Some(event)) => batch.extend(relevant_paths(&patterns, event)),
                    Ok(None) => return,
                    Err(_) => break,
                }
            }
            batch.sort();
            batch.dedup();
            debug!(paths = ?batch, "watched files changed");
            if batch_tx.send(batch).await.is_err() {
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok((WatcherHandle { _inner: watcher }, batch_rx))
}

fn relevant_paths(patterns: &WatchPatterns, event: Event) -> Vec<PathBuf> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|p| patterns.matches(p))
        .collect()
}
