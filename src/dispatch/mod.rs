// src/dispatch/mod.rs

//! Dispatch orchestration.
//!
//! - [`dispatcher`] owns the end-to-end dispatch state machine.
//! - [`frames`] resolves which frames a dispatch covers.
//! - [`job_directory`] chooses and creates the numbered per-job directories.
//! - [`hooks`] holds the pre-dispatch, dispatch and post-dispatch subscribers.
//! - [`registry`] maps backend names to factories.

pub mod dispatcher;
pub mod frames;
pub mod hooks;
pub mod job_directory;
pub mod registry;

pub use dispatcher::{DispatchState, Dispatcher, DispatcherSettings};
pub use frames::FramesMode;
pub use hooks::{DispatchHooks, DispatchInfo};
pub use job_directory::{JOB_DIRECTORY_ENTRY, JobDirectory, create_job_directory};
pub use registry::BackendRegistry;
