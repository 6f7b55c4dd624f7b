// src/dispatch/job_directory.rs

//! Numbered per-job directories.
//!
//! Each dispatch gets its own directory `<jobs_directory>/<job_name>/NNNNNN`,
//! numbered one above the highest existing entry. The chosen path is
//! published into the job context under [`JOB_DIRECTORY_ENTRY`] so tasks can
//! write next to each other.
//!
//! Choosing a path and creating it are separate steps: the dispatcher picks
//! the path, builds the batch graph against it and only then creates the
//! directory, so a dispatch that fails to build leaves nothing on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::Context;
use crate::errors::Result;
use crate::fs::FileSystem;

/// Context entry holding the job directory of the running dispatch.
pub const JOB_DIRECTORY_ENTRY: &str = "dispatcher:jobDirectory";

/// A job directory chosen for a dispatch, not necessarily on disk yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirectory {
    path: PathBuf,
    /// The directory belongs to an enclosing dispatch and already exists.
    reused: bool,
}

impl JobDirectory {
    /// Pick the job directory for a dispatch without touching the disk.
    ///
    /// If `context` already names a job directory (a dispatch nested inside
    /// another one) and the requested location is empty or is that
    /// directory's parent, the outer directory is reused. An empty
    /// `jobs_directory` means the current directory.
    pub fn choose(
        fs: &dyn FileSystem,
        jobs_directory: &Path,
        job_name: &str,
        context: &Context,
    ) -> Result<Self> {
        let mut base = jobs_directory.to_path_buf();
        if !job_name.is_empty() {
            base.push(job_name);
        }

        if let Some(outer) = context.get_str(JOB_DIRECTORY_ENTRY).filter(|s| !s.is_empty()) {
            let outer = PathBuf::from(outer);
            if base.as_os_str().is_empty() || Some(base.as_path()) == outer.parent() {
                debug!(job_directory = ?outer, "reusing job directory of enclosing dispatch");
                return Ok(Self {
                    path: outer,
                    reused: true,
                });
            }
        }

        if base.as_os_str().is_empty() {
            base = fs.current_dir()?;
        }

        // A base that is missing or unreadable has no entries; `create`
        // reports the real error.
        let entries = fs.read_dir(&base).unwrap_or_default();

        // Entries without a leading number count as 0, so the first job next
        // to unrelated files is 000001.
        let mut index: i64 = -1;
        for entry in entries {
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            index = index.max(leading_number(&name));
        }

        Ok(Self {
            path: base.join(format!("{:06}", index + 1)),
            reused: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Store the path in `context` under [`JOB_DIRECTORY_ENTRY`].
    pub fn publish(&self, context: &mut Context) {
        context.set(JOB_DIRECTORY_ENTRY, self.path.to_string_lossy().into_owned());
    }

    /// Create the directory and its parents.
    ///
    /// Returns `false` if another process created the same directory first;
    /// the caller should choose again.
    pub fn create(&self, fs: &dyn FileSystem) -> Result<bool> {
        if self.reused {
            return Ok(true);
        }
        if let Some(parent) = self.path.parent() {
            fs.create_dir_all(parent)?;
        }
        let created = fs.create_dir(&self.path)?;
        if created {
            debug!(job_directory = ?self.path, "created job directory");
        } else {
            debug!(job_directory = ?self.path, "job directory taken by another dispatch");
        }
        Ok(created)
    }
}

/// Choose, create and publish a job directory in one step.
pub fn create_job_directory(
    fs: &dyn FileSystem,
    jobs_directory: &Path,
    job_name: &str,
    context: &mut Context,
) -> Result<PathBuf> {
    // Other processes may be racing us for the same number.
    let job_directory = loop {
        let candidate = JobDirectory::choose(fs, jobs_directory, job_name, context)?;
        if candidate.create(fs)? {
            break candidate;
        }
    };
    job_directory.publish(context);
    Ok(job_directory.path)
}

fn leading_number(name: &str) -> i64 {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
