//! JSON-file-backed store for hosts without a native registry.
//!
//! Each hive lives in its own file so the machine-wide hive can sit in a
//! location only administrators may write to. Every call takes an advisory
//! lock on `<file>.lock` (shared for reads, exclusive for writes), loads the
//! hive, applies the operation and, for writes, saves it atomically before
//! releasing the lock. A lock already held by another process is reported as
//! [`StoreError::InUse`]; the store never waits for it.

use super::atomic::{atomic_read_json, atomic_write_json};
use super::tree::{HiveBackend, KeyNode, TreeStore};
use super::{StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::platform;
use crate::scope::Hive;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store persisted as one JSON file per hive.
pub type FileStore = TreeStore<FileBackend>;

/// On-disk layout of one hive file.
#[derive(Debug, Serialize, Deserialize)]
struct HiveFile {
    format_version: u32,
    hive: Hive,
    updated_at: DateTime<Utc>,
    root: KeyNode,
}

/// Backend reading and writing hive files.
#[derive(Debug, Clone)]
pub struct FileBackend {
    user_path: PathBuf,
    machine_path: PathBuf,
}

impl FileBackend {
    pub fn hive_path(&self, hive: Hive) -> &Path {
        match hive {
            Hive::CurrentUser => &self.user_path,
            Hive::LocalMachine => &self.machine_path,
        }
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(StoreConfig::LOCK_SUFFIX);
        PathBuf::from(name)
    }

    fn acquire(&self, hive: Hive, key_path: &str, exclusive: bool) -> StoreResult<Option<File>> {
        let path = self.hive_path(hive);
        let lock_path = Self::lock_path(path);

        if exclusive {
            if let Some(parent) = lock_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, hive, parent))?;
                }
            }
        }

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
        {
            Ok(file) => file,
            // Readers without write access to the store directory read unlocked
            Err(e)
                if !exclusive
                    && matches!(
                        e.kind(),
                        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                    ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(StoreError::from_io(e, hive, &lock_path)),
        };

        let locked = if exclusive {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };

        match locked {
            Ok(()) => Ok(Some(file)),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(StoreError::InUse {
                path: key_path.to_string(),
            }),
            Err(e) => Err(StoreError::from_io(e, hive, &lock_path)),
        }
    }

    fn load(&self, hive: Hive) -> StoreResult<KeyNode> {
        let path = self.hive_path(hive);
        match atomic_read_json::<HiveFile>(hive, path)? {
            None => Ok(KeyNode::default()),
            Some(file) if file.format_version > StoreConfig::FORMAT_VERSION => {
                Err(StoreError::Corrupt {
                    message: format!(
                        "{} uses store format {}, newest supported is {}",
                        path.display(),
                        file.format_version,
                        StoreConfig::FORMAT_VERSION
                    ),
                })
            }
            Some(file) if file.hive != hive => Err(StoreError::Corrupt {
                message: format!("{} holds the {} hive, expected {}", path.display(), file.hive, hive),
            }),
            Some(file) => Ok(file.root),
        }
    }

    fn save(&self, hive: Hive, root: KeyNode) -> StoreResult<()> {
        let file = HiveFile {
            format_version: StoreConfig::FORMAT_VERSION,
            hive,
            updated_at: Utc::now(),
            root,
        };
        atomic_write_json(hive, self.hive_path(hive), &file)
    }
}

fn release(lock: Option<File>) {
    if let Some(file) = lock {
        let _ = FileExt::unlock(&file);
    }
}

impl HiveBackend for FileBackend {
    fn read<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let lock = self.acquire(hive, path, false)?;
        let result = self.load(hive).and_then(|root| f(&root));
        release(lock);
        result
    }

    fn write<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&mut KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let lock = self.acquire(hive, path, true)?;
        let result = self.load(hive).and_then(|mut root| {
            let value = f(&mut root)?;
            self.save(hive, root)?;
            Ok(value)
        });
        release(lock);
        if result.is_ok() {
            debug!("Saved {} after writing {}", hive, path);
        }
        result
    }
}

impl TreeStore<FileBackend> {
    /// Open a store with explicit hive file locations. Nothing is read until
    /// the first operation.
    pub fn open(user_path: impl Into<PathBuf>, machine_path: impl Into<PathBuf>) -> Self {
        Self::with_backend(FileBackend {
            user_path: user_path.into(),
            machine_path: machine_path.into(),
        })
    }

    /// Keep both hive files inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::open(
            dir.join(StoreConfig::USER_STORE_FILENAME),
            dir.join(StoreConfig::MACHINE_STORE_FILENAME),
        )
    }

    /// Open the store at the platform's default locations.
    pub fn at_default_locations() -> Result<Self> {
        Ok(Self::open(
            platform::user_store_path()?,
            platform::machine_store_path()?,
        ))
    }

    pub fn hive_path(&self, hive: Hive) -> &Path {
        self.backend().hive_path(hive)
    }
}
