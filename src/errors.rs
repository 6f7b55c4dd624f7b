// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The requested dispatch was rejected before anything was built.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dispatched tasks cannot have cyclic dependencies but {task} is involved in a cycle")]
    GraphCycle { task: String },

    /// A task (or the backend running it) failed.
    #[error("Execution of '{task}' failed: {source}")]
    Execution {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DispatchError {
    /// Wrap a failure reported by a backend that is not tied to a single task.
    pub fn backend(name: &str, source: anyhow::Error) -> Self {
        DispatchError::Execution {
            task: format!("backend '{name}'"),
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DispatchError>;
