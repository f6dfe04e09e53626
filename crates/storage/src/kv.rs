// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic key-value store (spec.md §6): credential secrets, Globus task
//! labels, and per-job result-folder-content caches all key off of this
//! one primitive rather than three bespoke stores.

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A string-keyed store of arbitrary JSON values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// File-backed [`KeyValueStore`]: the three §6 key-value concerns
/// (credential secrets, Globus task labels, per-job result-folder-content
/// caches) all key off this one JSON-snapshot-per-file primitive so
/// `sup-cli` and `sup-daemon`, as separate OS processes, see the same
/// values a real Redis instance would give them.
pub struct FileKeyValueStore {
    path: PathBuf,
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl FileKeyValueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &HashMap<String, serde_json::Value>) -> Result<(), StorageError> {
        persist_json(&self.path, values)
    }
}

fn persist_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        values.remove(key);
        self.persist(&values)
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
