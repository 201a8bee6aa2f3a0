//! Filesystem store for `jwkit`.
//!
//! Reads inputs from disk and writes outputs atomically: the contents go to
//! a temporary file in the destination directory, which is then renamed
//! over the target. On Unix the resulting file is only readable by its owner.

#![warn(clippy::pedantic, clippy::nursery)]

use jwkit::error::StoreError;
use jwkit::store::Store;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// [`Store`] backed by the local filesystem.
///
/// Relative paths are resolved against the base directory, which defaults
/// to the process working directory.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    base_dir: Option<PathBuf>,
}

impl FileStore {
    /// Creates a store resolving paths against the working directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Creates a store resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the directory does not exist.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(StoreError::NotFound(base_dir));
        }
        Ok(Self { base_dir: Some(base_dir) })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Store for FileStore {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        let resolved = self.resolve(path);
        debug!(path = %resolved.display(), "reading file");
        std::fs::read(&resolved).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::Io { path: path.to_path_buf(), source },
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn write(&self, path: &Path, contents: &str, force: bool) -> Result<(), StoreError> {
        let resolved = self.resolve(path);
        let io_error = |source: io::Error| StoreError::Io { path: path.to_path_buf(), source };

        if !force && resolved.exists() {
            return Err(StoreError::AlreadyExists(path.to_path_buf()));
        }

        let parent = match resolved.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = NamedTempFile::new_in(&parent).map_err(io_error)?;
        file.write_all(contents.as_bytes()).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;

        // Rename into place; without force an existing target wins
        if force {
            file.persist(&resolved).map_err(|err| io_error(err.error))?;
        } else {
            file.persist_noclobber(&resolved).map_err(|err| match err.error.kind() {
                io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_path_buf()),
                _ => io_error(err.error),
            })?;
        }

        debug!(path = %resolved.display(), force, "file written");
        Ok(())
    }
}
