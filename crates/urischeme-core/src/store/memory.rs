//! In-memory store.
//!
//! Used as the test double for the whole engine test suite. Faults can be
//! injected per hive or per key to exercise the permission, in-use and mid-sequence
//! failure paths without touching a real registry.

use super::tree::{HiveBackend, KeyNode, TreeStore};
use super::{StoreError, StoreResult};
use crate::scope::Hive;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Store kept entirely in memory. Clones share the same tree.
pub type MemoryStore = TreeStore<MemoryBackend>;

/// Contents of both hives at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub current_user: KeyNode,
    pub local_machine: KeyNode,
}

impl MemorySnapshot {
    pub fn hive(&self, hive: Hive) -> &KeyNode {
        match hive {
            Hive::CurrentUser => &self.current_user,
            Hive::LocalMachine => &self.local_machine,
        }
    }

    fn hive_mut(&mut self, hive: Hive) -> &mut KeyNode {
        match hive {
            Hive::CurrentUser => &mut self.current_user,
            Hive::LocalMachine => &mut self.local_machine,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    denied: HashSet<Hive>,
    denied_keys: HashSet<(Hive, String)>,
    read_only: HashSet<Hive>,
    busy: bool,
    writes_before_failure: Option<usize>,
    write_count: usize,
}

impl Faults {
    /// Whether `path` is a denied key or lies below one.
    fn denies_key(&self, hive: Hive, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.denied_keys.iter().any(|(denied_hive, denied)| {
            *denied_hive == hive
                && path
                    .strip_prefix(denied.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('\\'))
        })
    }

    fn denies(&self, hive: Hive, path: &str) -> bool {
        self.denied.contains(&hive) || self.denies_key(hive, path)
    }
}

/// Backend holding both hives behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    hives: Mutex<MemorySnapshot>,
    faults: Mutex<Faults>,
}

impl MemoryBackend {
    fn lock_hives(&self) -> StoreResult<MutexGuard<'_, MemorySnapshot>> {
        self.hives.lock().map_err(|_| StoreError::Corrupt {
            message: "Failed to acquire memory store lock".to_string(),
        })
    }

    fn lock_faults(&self) -> StoreResult<MutexGuard<'_, Faults>> {
        self.faults.lock().map_err(|_| StoreError::Corrupt {
            message: "Failed to acquire memory store fault lock".to_string(),
        })
    }
}

impl HiveBackend for MemoryBackend {
    fn read<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R> {
        {
            let faults = self.lock_faults()?;
            if faults.busy {
                return Err(StoreError::InUse {
                    path: path.to_string(),
                });
            }
            if faults.denies(hive, path) {
                return Err(StoreError::PermissionDenied {
                    hive,
                    path: path.to_string(),
                });
            }
        }

        let hives = self.lock_hives()?;
        f(hives.hive(hive))
    }

    fn write<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&mut KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut faults = self.lock_faults()?;
        if faults.busy {
            return Err(StoreError::InUse {
                path: path.to_string(),
            });
        }
        if faults.denies(hive, path) || faults.read_only.contains(&hive) {
            return Err(StoreError::PermissionDenied {
                hive,
                path: path.to_string(),
            });
        }
        if let Some(remaining) = faults.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Io {
                    message: "injected write failure".to_string(),
                    path: None,
                    source: None,
                });
            }
            *remaining -= 1;
        }

        let mut hives = self.lock_hives()?;
        let result = f(hives.hive_mut(hive))?;
        faults.write_count += 1;
        Ok(result)
    }
}

impl TreeStore<MemoryBackend> {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::default())
    }

    /// Create a store pre-populated with `snapshot`.
    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        Self::with_backend(MemoryBackend {
            hives: Mutex::new(snapshot),
            faults: Mutex::new(Faults::default()),
        })
    }

    /// Copy of the current contents of both hives.
    pub fn snapshot(&self) -> MemorySnapshot {
        self.backend()
            .hives
            .lock()
            .map(|hives| hives.clone())
            .unwrap_or_default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.backend()
            .faults
            .lock()
            .map(|f| f.write_count)
            .unwrap_or_default()
    }

    /// Fail every read and write on `hive` with a permission error.
    pub fn deny_access(&self, hive: Hive) {
        self.with_faults(|f| {
            f.denied.insert(hive);
        });
    }

    /// Fail every read and write on the key at `path` and its subtree with a
    /// permission error. Listing the parent's subkeys still works.
    pub fn deny_key(&self, hive: Hive, path: &str) {
        let path = path.to_ascii_lowercase();
        self.with_faults(|f| {
            f.denied_keys.insert((hive, path));
        });
    }

    /// Fail every write on `hive` with a permission error; reads still work.
    pub fn deny_writes(&self, hive: Hive) {
        self.with_faults(|f| {
            f.read_only.insert(hive);
        });
    }

    /// Report every key as in use by another caller.
    pub fn set_busy(&self, busy: bool) {
        self.with_faults(|f| f.busy = busy);
    }

    /// Let `count` more writes succeed, then fail every write after that.
    pub fn fail_writes_after(&self, count: usize) {
        self.with_faults(|f| f.writes_before_failure = Some(count));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.with_faults(|f| {
            let write_count = f.write_count;
            *f = Faults {
                write_count,
                ..Faults::default()
            };
        });
    }

    fn with_faults(&self, apply: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.backend().faults.lock() {
            apply(&mut faults);
        }
    }
}

impl Default for TreeStore<MemoryBackend> {
    fn default() -> Self {
        Self::new()
    }
}
