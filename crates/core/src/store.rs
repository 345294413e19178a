// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared status store.
//!
//! Records are published whole: a writer swaps in a new `Arc<StatusRecord>`
//! and readers clone `Arc`s out, so nobody ever observes a record that is
//! half-way through an update. The lock is never held across an await.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::status::StatusRecord;

/// Concurrency-safe map from resolved path to latest published record.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    records: Arc<RwLock<HashMap<PathBuf, Arc<StatusRecord>>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `record` under `key`, replacing any previous record.
    pub fn set(&self, key: impl Into<PathBuf>, record: StatusRecord) {
        self.records.write().insert(key.into(), Arc::new(record));
    }

    pub fn get(&self, key: &Path) -> Option<Arc<StatusRecord>> {
        self.records.read().get(key).cloned()
    }

    /// Remove the record under `key`, returning whether one existed.
    pub fn delete(&self, key: &Path) -> bool {
        self.records.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &Path) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<PathBuf> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Point-in-time copy of every record, ordered by path.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Arc<StatusRecord>> {
        let records = self.records.read();
        records.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
