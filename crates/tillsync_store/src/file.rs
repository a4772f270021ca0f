//! File-based storage backend for persistent snapshots.

use crate::backend::StorageBackend;
use crate::error::StoreResult;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Persists the snapshot with a write-to-temp, `sync_all`, atomic-rename
/// sequence so a crash mid-write leaves the previous snapshot intact.
///
/// # Example
///
/// ```no_run
/// use tillsync_store::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("cache.tillsync"));
/// backend.persist(b"snapshot").unwrap();
/// assert!(backend.load().unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates a backend for the given snapshot path.
    ///
    /// The file is created on the first `persist`; opening a path that
    /// does not exist yet is not an error.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Creates a backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directories cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::open(path))
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, snapshot: &[u8]) -> StoreResult<()> {
        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)?;
        file.write_all(snapshot)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
