// src/store/mod.rs

use crate::error::{Error, Result};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// File store rooted at a designated data directory.
///
/// Every path that comes in from a request is resolved against the root
/// and checked lexically before any filesystem access, so traversal
/// attempts are rejected without touching disk. Writes go through a temp
/// file in the destination directory and an atomic rename, so readers
/// never observe a half-written file and a crash mid-write leaves the
/// previous contents intact.
pub struct DataStore {
    root: PathBuf,
    // One async mutex per resolved destination; serializes concurrent
    // read-merge-write cycles on the same file so the later request sees
    // the earlier one's result instead of clobbering it.
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DataStore {
    /// Construct a store at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request-supplied relative path against the root.
    ///
    /// The check is lexical (no canonicalization) so it also holds for
    /// destinations that do not exist yet: absolute paths are rejected
    /// outright, `..` components may not climb past the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        if relative.is_empty() {
            return Err(Error::Validation("empty file path".to_string()));
        }

        let candidate = Path::new(relative);
        if candidate.is_absolute() {
            return Err(Error::InvalidPath(format!(
                "absolute path not allowed: {relative}"
            )));
        }

        let mut depth: i32 = 0;
        let mut clean = PathBuf::new();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => {
                    depth += 1;
                    clean.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(Error::InvalidPath(format!(
                            "path escapes data root: {relative}"
                        )));
                    }
                    clean.pop();
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath(format!(
                        "absolute path not allowed: {relative}"
                    )));
                }
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(Error::InvalidPath(format!(
                "path resolves to the data root itself: {relative}"
            )));
        }

        Ok(self.root.join(clean))
    }

    /// Per-destination lock handle. Hold the guard across a whole
    /// read-merge-write cycle.
    pub fn lock_for(&self, resolved: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(resolved.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Read the whole file at a request-supplied relative path.
    pub fn read_to_string(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        self.read_resolved(&path)
    }

    /// Read an already-resolved path (callers that resolved early to take
    /// the per-path lock).
    pub fn read_resolved(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    /// Overwrite the file at a request-supplied relative path, creating
    /// parent directories as needed. The content lands via temp file +
    /// rename in the destination directory.
    pub fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        self.write_resolved(&path, content)
    }

    /// Same as [`DataStore::write`] but for an already-resolved path
    /// (callers that resolved early to take the per-path lock).
    pub fn write_resolved(&self, path: &Path, content: &str) -> Result<()> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        store.write("demo_data/sales.csv", "a;b\n1;2\n").unwrap();
        assert_eq!(store.read_to_string("demo_data/sales.csv").unwrap(), "a;b\n1;2\n");
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        store.write("deep/nested/file.json", "{}").unwrap();
        assert!(dir.path().join("deep/nested/file.json").is_file());
    }

    #[test]
    fn traversal_is_rejected_before_any_mutation() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path().join("public")).unwrap();
        let err = store.write("../outside.csv", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)), "got {err:?}");
        assert!(!dir.path().join("outside.csv").exists());
    }

    #[test]
    fn interior_dotdot_that_stays_inside_is_allowed() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        let resolved = store.resolve("demo_data/../other/file.csv").unwrap();
        assert_eq!(resolved, dir.path().join("other/file.csv"));
    }

    #[test]
    fn absolute_path_is_rejected() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        let err = store.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[test]
    fn empty_path_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        let err = store.resolve("").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn missing_file_read_is_io_error() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        let err = store.read_to_string("nope.csv").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn lock_for_hands_out_the_same_mutex_per_path() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path()).unwrap();
        let path = store.resolve("data.csv").unwrap();

        let a = store.lock_for(&path);
        let b = store.lock_for(&path);
        assert!(Arc::ptr_eq(&a, &b));

        let guard = a.lock().await;
        assert!(b.try_lock().is_err());
        drop(guard);
        assert!(b.try_lock().is_ok());
    }
}
