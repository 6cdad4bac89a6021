// src/pool/mod.rs

//! Bounded job execution for lifecycle phases.
//!
//! A [`WorkerPool`] of size `n` runs at most `n` submitted jobs at once, each
//! worker pulling the next job off one shared FIFO queue. Size `0` is the
//! sequential mode: `submit` runs the job to completion before returning.
//!
//! Phases are ordered by draining: `stop()` then `complete()` on one pool
//! before anything is submitted to the next.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::errors::{HerdError, Result};

type Job = BoxFuture<'static, ()>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

pub struct WorkerPool {
    size: usize,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    /// `None` once the pool has been stopped.
    tx: Option<mpsc::UnboundedSender<Job>>,
    rx: SharedReceiver,
    workers: Vec<JoinHandle<()>>,
    started: bool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            size,
            inner: Mutex::new(PoolInner {
                tx: Some(tx),
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
                workers: Vec::new(),
                started: false,
            }),
        }
    }

    /// Spawn the workers. Must be called from within a tokio runtime.
    ///
    /// Calling `start` more than once has no effect.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.started {
            return;
        }
        inner.started = true;
        for id in 0..self.size {
            let rx = Arc::clone(&inner.rx);
            inner.workers.push(tokio::spawn(worker_loop(id, rx)));
        }
        debug!(workers = self.size, "worker pool started");
    }

    /// Queue `job`, or with size 0 run it right away.
    ///
    /// Fails with [`HerdError::PoolStopped`] after [`stop`](Self::stop).
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.size == 0 {
            if self.lock().tx.is_none() {
                return Err(HerdError::PoolStopped);
            }
            run_job(job.boxed()).await;
            return Ok(());
        }

        let inner = self.lock();
        let tx = inner.tx.as_ref().ok_or(HerdError::PoolStopped)?;
        tx.send(job.boxed()).map_err(|_| HerdError::PoolStopped)
    }

    /// Close submission. Queued jobs still run.
    pub fn stop(&self) {
        if self.lock().tx.take().is_some() {
            debug!("worker pool stopped accepting jobs");
        }
    }

    /// Wait for every worker to drain the queue and exit.
    ///
    /// Only returns once [`stop`](Self::stop) has been called.
    pub async fn complete(&self) {
        let workers = std::mem::take(&mut self.lock().workers);
        for handle in workers {
            if let Err(err) = handle.await {
                warn!(error = %err, "pool worker ended abnormally");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn worker_loop(id: usize, rx: SharedReceiver) {
    loop {
        // The queue lock is only held while waiting for the next job.
        let next = rx.lock().await.recv().await;
        match next {
            Some(job) => run_job(job).await,
            None => break,
        }
    }
    debug!(worker = id, "pool worker exiting");
}

async fn run_job(job: Job) {
    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
        error!("pool job panicked");
    }
}
