// src/fs/mod.rs

//! Filesystem access needed by job file loading and job directories.

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Create a single directory. Returns `false` if it already existed, so
    /// callers racing for a name can move on to the next one.
    fn create_dir(&self, path: &Path) -> Result<bool>;

    /// Full paths of the entries of a directory, in no particular order.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn current_dir(&self) -> Result<PathBuf>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading job file {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating jobs directory {:?}", path))
    }

    fn create_dir(&self, path: &Path) -> Result<bool> {
        match fs::create_dir(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("creating job directory {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .with_context(|| format!("listing {:?}", path))?
            .map(|entry| -> Result<PathBuf> { Ok(entry?.path()) })
            .collect()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().context("resolving current directory")
    }
}
