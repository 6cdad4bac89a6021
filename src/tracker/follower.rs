// src/tracker/follower.rs

use std::io::Write;
use std::sync::Mutex;

use crate::tracker::task::{TaskSnapshot, TaskState};

/// Observer of task progress.
///
/// `handle` is called synchronously on every update and must not block.
pub trait TaskFollower: Send + Sync {
    fn handle(&self, update: &TaskSnapshot);

    /// Called once the operation has finished and no more updates will come.
    fn done(&self);
}

/// Line-oriented follower that prints terminal transitions.
///
/// ```text
/// api > Build: Success
/// api > Start: Failed
///     service 'api' terminated prematurely (exit status: 3)
/// ```
pub struct PlainFollower<W: Write + Send> {
    out: Mutex<W>,
}

impl PlainFollower<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> PlainFollower<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> TaskFollower for PlainFollower<W> {
    fn handle(&self, update: &TaskSnapshot) {
        if update.is_root() || !update.state.is_terminal() {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        // Output errors are not worth failing an operation over.
        let _ = writeln!(out, "{}: {}", update.qualified_name(), update.state);
        if matches!(update.state, TaskState::Failed | TaskState::Warning) {
            for message in update.messages.iter() {
                for line in message.lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
    }

    fn done(&self) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::task::Task;
    use std::sync::Arc;

    #[test]
    fn prints_terminal_states_with_messages() {
        let follower = Arc::new(PlainFollower::new(Vec::<u8>::new()));
        let sink = Arc::clone(&follower);
        let root = Task::root(move |s: &TaskSnapshot| sink.handle(s));

        let svc = root.child("api");
        svc.set_state(TaskState::InProgress);
        svc.child("Build").set_state(TaskState::Success);
        let start = svc.child("Start");
        start.add_message("already running");
        start.set_state(TaskState::Warning);
        drop(root);
        drop(svc);
        drop(start);

        let follower = Arc::try_unwrap(follower).ok().unwrap();
        let text = String::from_utf8(follower.into_inner()).unwrap();
        assert_eq!(
            text,
            "api > Build: Success\napi > Start: Warning\n    already running\n"
        );
    }
}
