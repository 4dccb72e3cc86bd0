//! Readers for the shared key-value store.
//!
//! The store is addressed by `/`-separated paths into a JSON tree. Readers are
//! assumed eventually consistent; nothing here needs transactions.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConsoleError, Result};

#[async_trait]
pub trait StoreReader: Send + Sync {
    /// Returns the raw value at `path`, or `None` when nothing is stored there.
    async fn fetch_value(&self, path: &str) -> Result<Option<Value>>;
}

/// Walks a `/`-separated path through objects and arrays.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|value| !value.is_null())
}

/// Store backed by a JSON document on disk. The file is re-read on every
/// fetch so external edits show up on the next load cycle.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreReader for JsonFileStore {
    async fn fetch_value(&self, path: &str) -> Result<Option<Value>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConsoleError::store(path, e.to_string()))?;
        let root: Value = serde_json::from_str(&content)
            .map_err(|e| ConsoleError::store(path, e.to_string()))?;
        debug!(path, file = %self.path.display(), "Fetched value from file store");
        Ok(lookup(&root, path).cloned())
    }
}

/// In-memory store with read counting, an optional per-read delay, and
/// injectable failures.
#[derive(Default)]
pub struct MemoryStore {
    root: Mutex<Value>,
    failing: Mutex<HashSet<String>>,
    reads: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            ..Self::default()
        }
    }

    pub fn set(&self, path: &str, value: Value) {
        let mut root = self.root.lock();
        let mut node = &mut *root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !node.is_object() {
                *node = Value::Object(Default::default());
            }
            node = &mut node[segment];
        }
        *node = value;
    }

    pub fn fail_path(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn heal_path(&self, path: &str) {
        self.failing.lock().remove(path);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.reads.lock().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StoreReader for MemoryStore {
    async fn fetch_value(&self, path: &str) -> Result<Option<Value>> {
        *self.reads.lock().entry(path.to_string()).or_insert(0) += 1;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(path) {
            return Err(ConsoleError::store(path, "injected failure"));
        }
        Ok(lookup(&self.root.lock(), path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_walks_objects_and_arrays() {
        let root = json!({"a": {"b": [{"c": 1}, {"c": 2}]}, "n": null});
        assert_eq!(lookup(&root, "a/b/1/c"), Some(&json!(2)));
        assert_eq!(lookup(&root, "/a/b/0/c/"), Some(&json!(1)));
        assert_eq!(lookup(&root, "a/x"), None);
        assert_eq!(lookup(&root, "n"), None);
    }

    #[tokio::test]
    async fn test_memory_store_set_and_fail() {
        let store = MemoryStore::default();
        store.set("glAssignments/E1", json!({"g1": {"status": "staff"}}));
        let value = store.fetch_value("glAssignments/E1").await.unwrap();
        assert_eq!(value, Some(json!({"g1": {"status": "staff"}})));

        store.fail_path("glAssignments/E1");
        assert!(store.fetch_value("glAssignments/E1").await.is_err());
        store.heal_path("glAssignments/E1");
        assert!(store.fetch_value("glAssignments/E1").await.is_ok());
        assert_eq!(store.read_count("glAssignments/E1"), 3);
    }

    #[tokio::test]
    async fn test_file_store_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("store.json");
        std::fs::write(&file, r#"{"questionIntake": {"tokens": {"abc": {}}}}"#).unwrap();

        let store = JsonFileStore::new(&file);
        let tokens = store.fetch_value("questionIntake/tokens").await.unwrap();
        assert_eq!(tokens, Some(json!({"abc": {}})));
        assert_eq!(store.fetch_value("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_store_error() {
        let store = JsonFileStore::new("/nonexistent/store.json");
        let err = store.fetch_value("a").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Store { .. }));
    }
}
