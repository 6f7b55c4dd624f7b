// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the [`Backend`] trait that receives finished batch
//!   graphs, with the in-process [`LocalBackend`] and the logging-only
//!   [`NullBackend`].
//! - [`command`] provides [`CommandNode`], a task that runs a shell command
//!   per frame.

pub mod backend;
pub mod command;

pub use backend::{Backend, LOCAL_EXECUTED, LocalBackend, NullBackend};
pub use command::CommandNode;
