// src/config/mod.rs

//! Job file loading and validation.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a job file from disk.
//! - [`validate`] checks references and settings.
//! - [`session`] turns a validated file into dispatchable nodes.

pub mod loader;
pub mod model;
pub mod session;
pub mod validate;

pub use loader::{load_and_validate, load_from_fs, load_from_path};
pub use model::{ConfigFile, DispatchSection, NodeConfig, RawConfigFile};
pub use session::Session;
