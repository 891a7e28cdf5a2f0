//! Registry store adapters.
//!
//! The engine never talks to the OS registry directly. It goes through the
//! [`RegistryStore`] capability interface, which covers exactly what a scheme
//! registration needs:
//!
//! - open or create a key path inside a hive
//! - read and write the default value and named string values
//! - create and open subkeys, list subkey names
//! - delete a key subtree
//!
//! Opened keys are handles that release themselves when dropped, so every exit
//! path of an engine operation (success, validation failure, store error)
//! gives its handles back.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - in-memory tree with fault injection, used by the tests
//! - [`FileStore`] - JSON files, one per hive, for hosts without a native registry
//! - `WindowsRegistry` - the native registry (Windows only)

mod atomic;
pub mod file;
pub mod memory;
pub mod tree;
#[cfg(windows)]
pub mod windows;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use tree::{KeyNode, TreeKey, TreeStore};
#[cfg(windows)]
pub use windows::WindowsRegistry;

use crate::scope::Hive;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Access denied to {hive}\\{path}")]
    PermissionDenied { hive: Hive, path: String },

    #[error("Key {path} is in use")]
    InUse { path: String },

    #[error("Key {path} was deleted while a handle to it was open")]
    KeyDeleted { path: String },

    #[error("Key not found: {path}")]
    KeyNotFound { path: String },

    #[error("Store IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Store data is corrupt: {message}")]
    Corrupt { message: String },

    #[error("{operation} failed with code {code}")]
    Os { operation: String, code: u32 },
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Map an IO error to a store error, keeping permission failures distinct.
    pub fn from_io(err: std::io::Error, hive: Hive, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                hive,
                path: path.display().to_string(),
            },
            _ => StoreError::Io {
                message: err.to_string(),
                path: Some(path),
                source: Some(err),
            },
        }
    }
}

/// An open key. Dropping the value releases the handle.
pub trait RegistryKey: Sized {
    /// Read a string value. An empty name reads the default value.
    ///
    /// Returns `None` when the value is not set.
    fn get_value(&self, name: &str) -> StoreResult<Option<String>>;

    /// Write a string value. An empty name writes the default value.
    fn set_value(&self, name: &str, value: &str) -> StoreResult<()>;

    /// Open or create a subkey. `path` may span several levels (`a\b\c`).
    fn create_subkey(&self, path: &str) -> StoreResult<Self>;

    /// Open an existing subkey, or `None` if it does not exist.
    fn open_subkey(&self, path: &str) -> StoreResult<Option<Self>>;

    /// Names of the direct subkeys.
    fn subkey_names(&self) -> StoreResult<Vec<String>>;
}

/// Hierarchical key-value store with two hives.
///
/// Paths are relative to the hive and use `\` as separator. Key names are
/// matched case-insensitively.
pub trait RegistryStore: Send + Sync {
    type Key: RegistryKey;

    /// Open an existing key, or `None` if it does not exist.
    fn open_key(&self, hive: Hive, path: &str) -> StoreResult<Option<Self::Key>>;

    /// Open a key, creating it and any missing parents.
    fn create_key(&self, hive: Hive, path: &str) -> StoreResult<Self::Key>;

    /// Delete a key and everything below it.
    ///
    /// Fails with [`StoreError::KeyNotFound`] when the key does not exist.
    fn delete_tree(&self, hive: Hive, path: &str) -> StoreResult<()>;
}

/// Split a key path into its non-empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(crate::config::RegistryLayout::SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        let segments: Vec<&str> = split_path("Software\\Classes\\\\demo\\").collect();
        assert_eq!(segments, vec!["Software", "Classes", "demo"]);
        assert_eq!(split_path("").count(), 0);
    }

    #[test]
    fn test_from_io_keeps_permission_failures() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            StoreError::from_io(err, Hive::LocalMachine, "/etc/urischeme/x.json"),
            StoreError::PermissionDenied {
                hive: Hive::LocalMachine,
                ..
            }
        ));

        let err = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            StoreError::from_io(err, Hive::CurrentUser, "x.json"),
            StoreError::Io { path: Some(_), .. }
        ));
    }
}
