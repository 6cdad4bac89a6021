use std::collections::BTreeMap;
use std::sync::Mutex;

use herd::tracker::{TaskFollower, TaskSnapshot, TaskState};

/// A follower that remembers the last state of every task, keyed by
/// qualified name (`group > service > Start`), and the order updates came in.
#[derive(Default)]
pub struct RecordingFollower {
    states: Mutex<BTreeMap<String, TaskState>>,
    updates: Mutex<Vec<(String, TaskState)>>,
    done: Mutex<usize>,
}

impl RecordingFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.lock().unwrap().get(name).copied()
    }

    pub fn states(&self) -> BTreeMap<String, TaskState> {
        self.states.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, TaskState)> {
        self.updates.lock().unwrap().clone()
    }

    /// How many times `done` was called.
    pub fn done_calls(&self) -> usize {
        *self.done.lock().unwrap()
    }
}

impl TaskFollower for RecordingFollower {
    fn handle(&self, update: &TaskSnapshot) {
        if update.is_root() {
            return;
        }
        let name = update.qualified_name();
        self.states.lock().unwrap().insert(name.clone(), update.state);
        self.updates.lock().unwrap().push((name, update.state));
    }

    fn done(&self) {
        *self.done.lock().unwrap() += 1;
    }
}
