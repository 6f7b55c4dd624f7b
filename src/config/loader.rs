// src/config/loader.rs

use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Load a job file and return the raw, unvalidated [`RawConfigFile`].
///
/// Use [`load_and_validate`] unless you need to inspect invalid files.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    load_from_fs(&RealFileSystem, path.as_ref())
}

/// Like [`load_from_path`], reading through `fs`.
pub fn load_from_fs(fs: &dyn FileSystem, path: &Path) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a job file and check it:
///
/// - at least one node,
/// - no unknown `pre_tasks`/`post_tasks` references,
/// - batch sizes of at least 1,
/// - frame settings that agree with `frames_mode`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}
