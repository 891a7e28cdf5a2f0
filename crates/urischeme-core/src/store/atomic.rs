//! Atomic file operations for the file-backed store.
//!
//! Writes go to a temp file with a PID+TID suffix, are fsynced, then renamed
//! over the target so readers never observe a half-written hive file.

use super::{StoreError, StoreResult};
use crate::scope::Hive;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::process;
use std::thread;
use tracing::debug;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist.
pub(crate) fn atomic_read_json<T: DeserializeOwned>(hive: Hive, path: &Path) -> StoreResult<Option<T>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::from_io(e, hive, path)),
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| StoreError::from_io(e, hive, path))?;

    let data: T = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
pub(crate) fn atomic_write_json<T: Serialize>(hive: Hive, path: &Path, data: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, hive, parent))?;
        }
    }

    let temp_path = path.with_extension(format!("json.{}.{}.tmp", process::id(), thread_id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| StoreError::Corrupt {
        message: format!("Failed to serialize hive: {}", e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StoreError::from_io(e, hive, &temp_path))?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| StoreError::from_io(e, hive, &temp_path))?;
        file.sync_all()
            .map_err(|e| StoreError::from_io(e, hive, &temp_path))?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::from_io(e, hive, path));
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

fn thread_id() -> String {
    // ThreadId's Debug output is "ThreadId(N)"
    format!("{:?}", thread::current().id())
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}
