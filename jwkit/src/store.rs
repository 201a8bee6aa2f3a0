//! Storage abstraction for key files.

use crate::convert::CertificateContainer;
use crate::error::StoreError;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Reads inputs and writes outputs for the command pipeline.
///
/// Implementations must never replace an existing file unless `force` is set.
///
/// # Example
///
/// ```rust,ignore
/// use jwkit::store::Store;
///
/// struct MyStore;
///
/// impl Store for MyStore {
///     fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
///         // Implementation
///     }
///     // ... other methods
/// }
/// ```
pub trait Store: Send + Sync {
    /// Reads the raw contents of a file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the file does not exist.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// Returns `true` if something exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Writes `contents` to `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file
    /// * `contents` - Text to write
    /// * `force` - Replace an existing file
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the file exists and `force` is
    /// `false`.
    fn write(&self, path: &Path, contents: &str, force: bool) -> Result<(), StoreError>;

    /// Reads a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the file does not exist, or
    /// `StoreError::InvalidEncoding` if it is not UTF-8.
    fn read(&self, path: &Path) -> Result<String, StoreError> {
        String::from_utf8(self.read_bytes(path)?)
            .map_err(|_| StoreError::InvalidEncoding(path.to_path_buf()))
    }

    /// Reads a certificate, PEM certificate or PKCS#12 bundle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the file does not exist, or
    /// `StoreError::Certificate` if it cannot be read as a certificate.
    fn load_certificate(
        &self,
        path: &Path,
        password: Option<&SecretString>,
    ) -> Result<CertificateContainer, StoreError> {
        let bytes = self.read_bytes(path)?;
        Ok(CertificateContainer::from_bytes(&bytes, password)?)
    }
}

/// In-memory [`Store`], for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).insert(path.into(), contents.into());
        self
    }

    /// Returns the contents of a file as text, if present and UTF-8.
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path.as_ref()).and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    }
}

impl Store for MemoryStore {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned().ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).contains_key(path)
    }

    fn write(&self, path: &Path, contents: &str, force: bool) -> Result<(), StoreError> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if !force && files.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_path_buf()));
        }
        files.insert(path.to_path_buf(), contents.as_bytes().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_read_missing() {
        let store = MemoryStore::new();
        let result = store.read(Path::new("missing.json"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_memory_store_write_guard() {
        let store = MemoryStore::new();
        let path = Path::new("key.json");

        store.write(path, "first", false).expect("first write failed");
        assert!(matches!(store.write(path, "second", false), Err(StoreError::AlreadyExists(_))));
        assert_eq!(store.contents(path).as_deref(), Some("first"));

        store.write(path, "second", true).expect("forced write failed");
        assert_eq!(store.read(path).unwrap(), "second");
    }

    #[test]
    fn test_read_rejects_non_utf8() {
        let store = MemoryStore::new().with_file("bin", vec![0xff, 0xfe]);
        assert!(matches!(store.read(Path::new("bin")), Err(StoreError::InvalidEncoding(_))));
    }

    #[test]
    fn test_load_certificate_reports_certificate_errors() {
        let store = MemoryStore::new().with_file("cert.pfx", b"garbage".to_vec());
        let result = store.load_certificate(Path::new("cert.pfx"), None);
        assert!(matches!(result, Err(StoreError::Certificate(_))));
    }
}
