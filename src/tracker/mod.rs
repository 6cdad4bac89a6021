// src/tracker/mod.rs

//! Progress reporting for lifecycle operations.
//!
//! Every operation builds a tree of [`Task`]s (`group > service > Build`)
//! and every change is pushed to a [`TaskFollower`].

pub mod follower;
pub mod task;

pub use follower::{PlainFollower, TaskFollower};
pub use task::{Task, TaskSnapshot, TaskState, UpdateHandler};
