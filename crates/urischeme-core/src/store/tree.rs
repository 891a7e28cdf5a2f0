//! Key tree shared by the in-memory and file-backed stores.
//!
//! A [`TreeStore`] owns a [`HiveBackend`] that hands out one root [`KeyNode`]
//! per hive for the duration of a single call. Key handles ([`TreeKey`]) only
//! remember their path, so every operation re-resolves the path under the
//! backend's lock. A handle whose key was deleted by someone else reports
//! [`StoreError::KeyDeleted`].

use super::{split_path, RegistryKey, RegistryStore, StoreError, StoreResult};
use crate::config::RegistryLayout;
use crate::scope::Hive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A named string value, stored under its lowercased name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NamedValue {
    name: String,
    data: String,
}

/// One key: its values and subkeys. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNode {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, NamedValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, KeyNode>,
}

impl KeyNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|v| v.data.as_str())
    }

    pub fn set_value(&mut self, name: &str, data: &str) {
        self.values.insert(
            name.to_ascii_lowercase(),
            NamedValue {
                name: name.to_string(),
                data: data.to_string(),
            },
        );
    }

    pub fn child(&self, name: &str) -> Option<&KeyNode> {
        self.children.get(&name.to_ascii_lowercase())
    }

    /// Names of the direct subkeys, in their original case.
    pub fn subkey_names(&self) -> Vec<String> {
        self.children.values().map(|c| c.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }

    pub fn descend<S: AsRef<str>>(&self, segments: &[S]) -> Option<&KeyNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    pub fn descend_mut<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<&mut KeyNode> {
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(&segment.as_ref().to_ascii_lowercase())?;
        }
        Some(node)
    }

    /// Walk `segments`, creating missing keys along the way.
    pub fn create_path<S: AsRef<str>>(&mut self, segments: &[S]) -> &mut KeyNode {
        let mut node = self;
        for segment in segments {
            let segment = segment.as_ref();
            node = node
                .children
                .entry(segment.to_ascii_lowercase())
                .or_insert_with(|| KeyNode::named(segment));
        }
        node
    }

    /// Detach the key at `segments` together with its subtree.
    pub fn remove_path<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<KeyNode> {
        let (last, parents) = segments.split_last()?;
        self.descend_mut(parents)?
            .children
            .remove(&last.as_ref().to_ascii_lowercase())
    }
}

/// Source of per-hive key trees for a [`TreeStore`].
///
/// Each call sees a consistent tree; writes made by `write` are published
/// before it returns. `path` is only used for error context.
pub trait HiveBackend: Send + Sync {
    fn read<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R>;

    fn write<R>(
        &self,
        hive: Hive,
        path: &str,
        f: impl FnOnce(&mut KeyNode) -> StoreResult<R>,
    ) -> StoreResult<R>;
}

/// A [`RegistryStore`] over a [`HiveBackend`].
pub struct TreeStore<B> {
    backend: Arc<B>,
    open_handles: Arc<AtomicUsize>,
}

impl<B> Clone for TreeStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            open_handles: Arc::clone(&self.open_handles),
        }
    }
}

impl<B: HiveBackend> TreeStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of key handles currently alive.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    fn handle(&self, hive: Hive, segments: Vec<String>) -> TreeKey<B> {
        TreeKey::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.open_handles),
            hive,
            segments,
        )
    }
}

fn owned_segments(path: &str) -> Vec<String> {
    split_path(path).map(str::to_string).collect()
}

impl<B: HiveBackend> RegistryStore for TreeStore<B> {
    type Key = TreeKey<B>;

    fn open_key(&self, hive: Hive, path: &str) -> StoreResult<Option<Self::Key>> {
        let segments = owned_segments(path);
        let found = self
            .backend
            .read(hive, path, |root| Ok(root.descend(&segments).is_some()))?;
        Ok(found.then(|| self.handle(hive, segments)))
    }

    fn create_key(&self, hive: Hive, path: &str) -> StoreResult<Self::Key> {
        let segments = owned_segments(path);
        self.backend.write(hive, path, |root| {
            root.create_path(&segments);
            Ok(())
        })?;
        Ok(self.handle(hive, segments))
    }

    fn delete_tree(&self, hive: Hive, path: &str) -> StoreResult<()> {
        let segments = owned_segments(path);
        self.backend.write(hive, path, |root| {
            root.remove_path(&segments)
                .map(|_| ())
                .ok_or_else(|| StoreError::KeyNotFound {
                    path: path.to_string(),
                })
        })
    }
}

/// Handle to a key of a [`TreeStore`].
pub struct TreeKey<B> {
    backend: Arc<B>,
    open_handles: Arc<AtomicUsize>,
    hive: Hive,
    segments: Vec<String>,
}

impl<B> TreeKey<B> {
    fn new(backend: Arc<B>, open_handles: Arc<AtomicUsize>, hive: Hive, segments: Vec<String>) -> Self {
        open_handles.fetch_add(1, Ordering::SeqCst);
        Self {
            backend,
            open_handles,
            hive,
            segments,
        }
    }

    pub fn hive(&self) -> Hive {
        self.hive
    }

    /// Full path of the key relative to its hive.
    pub fn path(&self) -> String {
        let separator = RegistryLayout::SEPARATOR.to_string();
        self.segments.join(separator.as_str())
    }

    fn deleted(&self) -> StoreError {
        StoreError::KeyDeleted { path: self.path() }
    }

    fn child_segments(&self, path: &str) -> Vec<String> {
        let mut segments = self.segments.clone();
        segments.extend(split_path(path).map(str::to_string));
        segments
    }
}

impl<B> Drop for TreeKey<B> {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<B: HiveBackend> RegistryKey for TreeKey<B> {
    fn get_value(&self, name: &str) -> StoreResult<Option<String>> {
        self.backend.read(self.hive, &self.path(), |root| {
            let node = root.descend(&self.segments).ok_or_else(|| self.deleted())?;
            Ok(node.value(name).map(str::to_string))
        })
    }

    fn set_value(&self, name: &str, value: &str) -> StoreResult<()> {
        self.backend.write(self.hive, &self.path(), |root| {
            let node = root
                .descend_mut(&self.segments)
                .ok_or_else(|| self.deleted())?;
            node.set_value(name, value);
            Ok(())
        })
    }

    fn create_subkey(&self, path: &str) -> StoreResult<Self> {
        let segments = self.child_segments(path);
        self.backend.write(self.hive, &self.path(), |root| {
            let node = root
                .descend_mut(&self.segments)
                .ok_or_else(|| self.deleted())?;
            node.create_path(&segments[self.segments.len()..]);
            Ok(())
        })?;
        Ok(TreeKey::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.open_handles),
            self.hive,
            segments,
        ))
    }

    fn open_subkey(&self, path: &str) -> StoreResult<Option<Self>> {
        let segments = self.child_segments(path);
        let separator = RegistryLayout::SEPARATOR.to_string();
        let child_path = segments.join(separator.as_str());
        let found = self.backend.read(self.hive, &child_path, |root| {
            let node = root.descend(&self.segments).ok_or_else(|| self.deleted())?;
            Ok(node.descend(&segments[self.segments.len()..]).is_some())
        })?;
        Ok(found.then(|| {
            TreeKey::new(
                Arc::clone(&self.backend),
                Arc::clone(&self.open_handles),
                self.hive,
                segments,
            )
        }))
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        self.backend.read(self.hive, &self.path(), |root| {
            let node = root.descend(&self.segments).ok_or_else(|| self.deleted())?;
            Ok(node.subkey_names())
        })
    }
}
