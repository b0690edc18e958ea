//! Shared task model and wire protocol for the task board.

pub mod codec;
pub mod task;
pub mod transition;
