// src/services/mod.rs

//! The service/group tree and the operations that recurse over it.
//!
//! Services are leaves; groups hold an ordered list of services and nested
//! groups. Per-service work is submitted to a [`WorkerPool`]: the tree walk
//! itself only creates tasks and queues jobs, so callers drain the pool to
//! wait for the phase to finish.

pub mod command;
pub mod service;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::config::{ConfigFile, ServiceConfig};
use crate::errors::{HerdError, Result};
use crate::home::HomeDirs;
use crate::pool::WorkerPool;
use crate::state::RunningStateStore;
use crate::tracker::{Task, TaskState};
use crate::types::{OperationConfig, ServiceStatus};

/// Shared collaborators of lifecycle jobs.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub home: HomeDirs,
    pub store: RunningStateStore,
}

impl ServiceContext {
    pub fn new(home: HomeDirs) -> Self {
        let store = RunningStateStore::new(&home);
        Self { home, store }
    }
}

#[derive(Debug)]
pub struct GroupConfig {
    pub name: String,
    pub description: Option<String>,
    pub children: Vec<ServiceOrGroup>,
}

/// A service or a (possibly nested) group of them.
#[derive(Debug, Clone)]
pub enum ServiceOrGroup {
    Service(Arc<ServiceConfig>),
    Group(Arc<GroupConfig>),
}

impl ServiceOrGroup {
    pub fn name(&self) -> &str {
        match self {
            ServiceOrGroup::Service(svc) => &svc.name,
            ServiceOrGroup::Group(group) => &group.name,
        }
    }

    /// Whether any service reached from here, excluded ones aside, needs
    /// elevated privileges.
    pub fn is_sudo(&self, cfg: &OperationConfig) -> bool {
        self.services(cfg).iter().any(|svc| svc.requires_sudo)
    }

    /// Leaf services reached from here, in tree order, without duplicates.
    pub fn services(&self, cfg: &OperationConfig) -> Vec<Arc<ServiceConfig>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_services(cfg, &mut seen, &mut out);
        out
    }

    fn collect_services(
        &self,
        cfg: &OperationConfig,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<ServiceConfig>>,
    ) {
        if cfg.is_excluded(self.name()) {
            return;
        }
        match self {
            ServiceOrGroup::Service(svc) => {
                if seen.insert(svc.name.clone()) {
                    out.push(Arc::clone(svc));
                }
            }
            ServiceOrGroup::Group(group) => {
                for child in group.children.iter() {
                    child.collect_services(cfg, seen, out);
                }
            }
        }
    }

    /// Queue build-and-launch jobs for every service under `parent`.
    pub fn start<'a>(
        &'a self,
        parent: &'a Task,
        cfg: &'a Arc<OperationConfig>,
        ctx: &'a Arc<ServiceContext>,
        pool: &'a WorkerPool,
    ) -> BoxFuture<'a, Result<()>> {
        self.submit_launch(parent, cfg, ctx, pool, true)
    }

    /// Queue launch-only jobs for every service under `parent`.
    pub fn launch<'a>(
        &'a self,
        parent: &'a Task,
        cfg: &'a Arc<OperationConfig>,
        ctx: &'a Arc<ServiceContext>,
        pool: &'a WorkerPool,
    ) -> BoxFuture<'a, Result<()>> {
        self.submit_launch(parent, cfg, ctx, pool, false)
    }

    fn submit_launch<'a>(
        &'a self,
        parent: &'a Task,
        cfg: &'a Arc<OperationConfig>,
        ctx: &'a Arc<ServiceContext>,
        pool: &'a WorkerPool,
        build: bool,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if cfg.is_excluded(self.name()) {
                debug!(name = %self.name(), "excluded");
                return Ok(());
            }
            match self {
                ServiceOrGroup::Service(svc) => {
                    let task = parent.child(&svc.name);
                    let svc = Arc::clone(svc);
                    let cfg = Arc::clone(cfg);
                    let ctx = Arc::clone(ctx);
                    pool.submit(async move {
                        // Failures are recorded on the task.
                        let _ = service::start_service(&svc, &task, &cfg, &ctx, build).await;
                    })
                    .await
                }
                ServiceOrGroup::Group(group) => {
                    let task = parent.child(&group.name);
                    task.set_state(TaskState::InProgress);
                    for child in group.children.iter() {
                        child.submit_launch(&task, cfg, ctx, pool, build).await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Queue stop jobs for every running service under `parent`.
    ///
    /// Group members are stopped in reverse order.
    pub fn stop<'a>(
        &'a self,
        parent: &'a Task,
        cfg: &'a Arc<OperationConfig>,
        ctx: &'a Arc<ServiceContext>,
        pool: &'a WorkerPool,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if cfg.is_excluded(self.name()) {
                return Ok(());
            }
            match self {
                ServiceOrGroup::Service(svc) => {
                    let parent = parent.clone();
                    let svc = Arc::clone(svc);
                    let ctx = Arc::clone(ctx);
                    pool.submit(async move {
                        let _ = service::stop_service(&svc, &parent, &ctx).await;
                    })
                    .await
                }
                ServiceOrGroup::Group(group) => {
                    let task = parent.child(&group.name);
                    task.set_state(TaskState::InProgress);
                    for child in group.children.iter().rev() {
                        child.stop(&task, cfg, ctx, pool).await?;
                    }
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Status rows for every service under here.
    pub async fn status(&self, cfg: &OperationConfig, ctx: &ServiceContext) -> Vec<ServiceStatus> {
        let mut rows = Vec::new();
        for svc in self.services(cfg) {
            rows.push(service::service_status(&svc, ctx).await);
        }
        rows
    }
}

/// Every service and group of one configuration file, by name.
#[derive(Debug, Clone)]
pub struct ServiceTree {
    services: BTreeMap<String, Arc<ServiceConfig>>,
    groups: BTreeMap<String, Arc<GroupConfig>>,
}

impl ServiceTree {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let services: BTreeMap<String, Arc<ServiceConfig>> = cfg
            .service
            .iter()
            .map(|(name, svc)| (name.clone(), Arc::new(svc.clone())))
            .collect();

        // `group_order` lists nested groups before the groups containing them.
        let mut groups: BTreeMap<String, Arc<GroupConfig>> = BTreeMap::new();
        for name in cfg.group_order.iter() {
            let entry = cfg
                .group
                .get(name)
                .ok_or_else(|| HerdError::NotFound(name.clone()))?;
            let mut children = Vec::with_capacity(entry.children.len());
            for child in entry.children.iter() {
                let node = if let Some(svc) = services.get(child) {
                    ServiceOrGroup::Service(Arc::clone(svc))
                } else if let Some(group) = groups.get(child) {
                    ServiceOrGroup::Group(Arc::clone(group))
                } else {
                    return Err(HerdError::ConfigError(format!(
                        "group '{}' has unknown child '{}'",
                        name, child
                    )));
                };
                children.push(node);
            }
            groups.insert(
                name.clone(),
                Arc::new(GroupConfig {
                    name: name.clone(),
                    description: entry.description.clone(),
                    children,
                }),
            );
        }

        Ok(Self { services, groups })
    }

    pub fn get(&self, name: &str) -> Option<ServiceOrGroup> {
        if let Some(svc) = self.services.get(name) {
            return Some(ServiceOrGroup::Service(Arc::clone(svc)));
        }
        self.groups
            .get(name)
            .map(|g| ServiceOrGroup::Group(Arc::clone(g)))
    }

    /// Look up every name; any unknown name fails the whole lookup.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<ServiceOrGroup>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let node = self
                .get(name)
                .ok_or_else(|| HerdError::NotFound(name.clone()))?;
            out.push(node);
        }
        Ok(out)
    }

    /// Every service, by name.
    pub fn all_services(&self) -> Vec<ServiceOrGroup> {
        self.services
            .values()
            .map(|svc| ServiceOrGroup::Service(Arc::clone(svc)))
            .collect()
    }
}
