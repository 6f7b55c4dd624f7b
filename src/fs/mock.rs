// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for tests. Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    cwd: PathBuf,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            cwd: PathBuf::from("."),
        }
    }

    /// Use `cwd` as the directory reported by `current_dir`.
    pub fn with_current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        {
            let mut files = self.lock();
            Self::ensure_dir_entry(&mut files, &self.cwd);
        }
        self
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.lock();
        if let Some(parent) = Self::parent_of(&path) {
            Self::ensure_dir_entry(&mut files, &parent);
            Self::link_child(&mut files, &parent, &path);
        }
        files.insert(path, MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.lock();
        Self::ensure_dir_entry(&mut files, path.as_ref());
    }

    /// All directory paths currently known, sorted.
    pub fn dirs(&self) -> Vec<PathBuf> {
        let files = self.lock();
        let mut dirs: Vec<PathBuf> = files
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::Dir(_)))
            .map(|(p, _)| p.clone())
            .collect();
        dirs.sort();
        dirs
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn parent_of(path: &Path) -> Option<PathBuf> {
        let parent = path.parent()?;
        if parent.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(parent.to_path_buf())
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, path: &Path) {
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = Self::parent_of(path) {
            if parent != path { // Avoid infinite loop at root
                Self::ensure_dir_entry(files, &parent);
                Self::link_child(files, &parent, path);
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.lock();
        match files.get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        if let Some(MockEntry::File(_)) = files.get(path) {
            return Err(anyhow!("Is a file: {:?}", path));
        }
        Self::ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> Result<bool> {
        let mut files = self.lock();
        if files.contains_key(path) {
            return Ok(false);
        }
        let parent = Self::parent_of(path).unwrap_or_else(|| PathBuf::from("."));
        if !matches!(files.get(&parent), Some(MockEntry::Dir(_))) {
            return Err(anyhow!("Parent directory not found: {:?}", parent));
        }
        Self::ensure_dir_entry(&mut files, path);
        Ok(true)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.lock();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
