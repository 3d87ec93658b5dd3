// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of per-path async mutexes.
///
/// Holding the guard for a path serializes every other caller of the same
/// path. Entries are removed once no guard or waiter refers to them.
#[derive(Default)]
pub struct PathLocks {
    table: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the duration of one operation on a path
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `dir` and `dir/` share a lock
    fn key(path: &str) -> String {
        path.trim_end_matches('/').to_string()
    }

    pub async fn lock(&self, path: &str) -> PathGuard<'_> {
        // Built before waiting so a cancelled waiter still releases its entry
        let mut held = PathGuard {
            locks: self,
            key: Self::key(path),
            guard: None,
        };
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(held.key.clone()).or_default())
        };
        held.guard = Some(entry.lock_owned().await);
        held
    }

    /// Number of paths currently locked or waited on
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PathGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGuard")
            .field("key", &self.key)
            .field("held", &self.guard.is_some())
            .finish()
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self
            .locks
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            _ = table.remove(&self.key);
        }
    }
}
