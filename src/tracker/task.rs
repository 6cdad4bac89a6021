// src/tracker/task.rs

//! Hierarchical, observable units of work.
//!
//! A [`Task`] is a cheap, clonable handle onto one node of a task tree. Every
//! accepted state change and every appended message synchronously hands an
//! immutable [`TaskSnapshot`] to the update handler registered on the root.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

/// Lifecycle of a task. `Success`, `Failed` and `Warning` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    InProgress,
    Success,
    Failed,
    Warning,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Warning
        )
    }

    fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::InProgress => 1,
            TaskState::Success | TaskState::Failed | TaskState::Warning => 2,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "Pending",
            TaskState::InProgress => "InProgress",
            TaskState::Success => "Success",
            TaskState::Failed => "Failed",
            TaskState::Warning => "Warning",
        };
        f.write_str(s)
    }
}

/// Immutable view of a task at the moment of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: String,
    pub state: TaskState,
    pub messages: Vec<String>,
    /// Names from the root down to this task (the root's name is empty).
    pub lineage: Vec<String>,
}

impl TaskSnapshot {
    /// Display name such as `group > service > Build`.
    pub fn qualified_name(&self) -> String {
        join_lineage(&self.lineage)
    }

    pub fn is_root(&self) -> bool {
        self.lineage.len() <= 1 && self.name.is_empty()
    }
}

/// Callback receiving every task update.
pub type UpdateHandler = Arc<dyn Fn(&TaskSnapshot) + Send + Sync>;

#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    name: String,
    /// Names from the root down to this task. Parents own their children, so
    /// ancestry is kept by name only.
    lineage: Vec<String>,
    handler: UpdateHandler,
    data: Mutex<TaskData>,
}

struct TaskData {
    state: TaskState,
    messages: Vec<String>,
    children: Vec<Task>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create an unnamed root task reporting to `on_update`.
    pub fn root<F>(on_update: F) -> Task
    where
        F: Fn(&TaskSnapshot) + Send + Sync + 'static,
    {
        Task::with_handler(String::new(), Vec::new(), Arc::new(on_update))
    }

    fn with_handler(name: String, mut lineage: Vec<String>, handler: UpdateHandler) -> Task {
        lineage.push(name.clone());
        Task {
            inner: Arc::new(TaskInner {
                name,
                lineage,
                handler,
                data: Mutex::new(TaskData {
                    state: TaskState::Pending,
                    messages: Vec::new(),
                    children: Vec::new(),
                }),
            }),
        }
    }

    /// Create a named child task in the `Pending` state.
    pub fn child(&self, name: impl Into<String>) -> Task {
        let child = Task::with_handler(
            name.into(),
            self.inner.lineage.clone(),
            Arc::clone(&self.inner.handler),
        );
        self.data().children.push(child.clone());
        child.emit();
        child
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        self.data().state
    }

    pub fn children(&self) -> Vec<Task> {
        self.data().children.clone()
    }

    pub fn qualified_name(&self) -> String {
        join_lineage(&self.inner.lineage)
    }

    /// Move to `state`.
    ///
    /// Returns `false` (and leaves the task untouched) for backwards moves,
    /// repeated states, and any change out of a terminal state.
    pub fn set_state(&self, state: TaskState) -> bool {
        {
            let mut data = self.data();
            let current = data.state;
            if current.is_terminal() || state.rank() <= current.rank() {
                if current != state {
                    warn!(
                        task = %self.qualified_name(),
                        from = %current,
                        to = %state,
                        "ignoring invalid task state transition"
                    );
                }
                return false;
            }
            data.state = state;
        }
        debug!(task = %self.qualified_name(), state = %state, "task state changed");
        self.emit();
        true
    }

    pub fn add_message(&self, message: impl Into<String>) {
        self.data().messages.push(message.into());
        self.emit();
    }

    /// Record `err` as a message and mark the task failed.
    pub fn fail(&self, err: impl fmt::Display) {
        self.add_message(err.to_string());
        self.set_state(TaskState::Failed);
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let data = self.data();
        TaskSnapshot {
            name: self.inner.name.clone(),
            state: data.state,
            messages: data.messages.clone(),
            lineage: self.inner.lineage.clone(),
        }
    }

    /// Resolve composite tasks left open after their children ran elsewhere.
    ///
    /// Children settle first. A non-terminal task with children then takes
    /// `Failed` if any child failed, `Warning` if any child warned, and
    /// `Success` otherwise. Childless tasks are left alone.
    pub fn settle(&self) {
        let children = self.children();
        for child in children.iter() {
            child.settle();
        }
        if children.is_empty() || self.state().is_terminal() {
            return;
        }
        let states: Vec<TaskState> = children.iter().map(Task::state).collect();
        let outcome = if states.contains(&TaskState::Failed) {
            TaskState::Failed
        } else if states.contains(&TaskState::Warning) {
            TaskState::Warning
        } else if states.iter().all(|s| s.is_terminal()) {
            TaskState::Success
        } else {
            return;
        };
        self.set_state(outcome);
    }

    /// Snapshots of every failed task in this subtree, in tree order.
    pub fn failures(&self) -> Vec<TaskSnapshot> {
        let mut out = Vec::new();
        self.collect_failed(&mut out);
        out
    }

    fn collect_failed(&self, out: &mut Vec<TaskSnapshot>) {
        if self.state() == TaskState::Failed && !self.inner.name.is_empty() {
            out.push(self.snapshot());
        }
        for child in self.children() {
            child.collect_failed(out);
        }
    }

    fn emit(&self) {
        let snapshot = self.snapshot();
        (self.inner.handler)(&snapshot);
    }

    fn data(&self) -> MutexGuard<'_, TaskData> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn join_lineage(lineage: &[String]) -> String {
    lineage
        .iter()
        .filter(|n| !n.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" > ")
}
