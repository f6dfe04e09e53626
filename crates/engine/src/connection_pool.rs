// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide shell connection pool (spec.md §4.B).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use sup_core::hpc::HpcId;
use sup_core::job::JobId;
use sup_shell::{RemoteShell, ShellError, SshConfig};
use tokio::sync::Mutex as AsyncMutex;

/// The two indexing disciplines a pool entry may use (spec.md §4.B).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// A shared-account cluster login, ref-counted across concurrently
    /// running jobs.
    Shared(HpcId),
    /// A private-account credential, owned by exactly one job.
    Private(JobId),
}

struct PoolEntry<S> {
    shell: Arc<AsyncMutex<S>>,
    refcount: usize,
}

/// Keyed, ref-counted pool of connected shells (spec.md §4.B).
///
/// A handle returned by [`acquire`](ConnectionPool::acquire) is an
/// `Arc<tokio::sync::Mutex<S>>`: callers serialize commands through the
/// mutex, satisfying §5's requirement that a shared-account shell either
/// be safe for concurrent use or have its commands serialized.
pub struct ConnectionPool<S> {
    entries: Mutex<HashMap<PoolKey, PoolEntry<S>>>,
}

impl<S> Default for ConnectionPool<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: RemoteShell + Default> ConnectionPool<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the shell for `key`, incrementing its refcount. Connects
    /// lazily on first acquire of a key.
    pub async fn acquire(
        &self,
        key: PoolKey,
        config: &SshConfig,
    ) -> Result<Arc<AsyncMutex<S>>, ShellError> {
        if let Some(shell) = self.increment(&key) {
            return Ok(shell);
        }

        let mut shell = S::default();
        shell.connect(config).await?;
        let shell = Arc::new(AsyncMutex::new(shell));

        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            // Another acquire raced us and won; use its connection and
            // drop ours.
            Some(entry) => {
                entry.refcount += 1;
                Ok(entry.shell.clone())
            }
            None => {
                entries.insert(
                    key,
                    PoolEntry {
                        shell: shell.clone(),
                        refcount: 1,
                    },
                );
                Ok(shell)
            }
        }
    }

    fn increment(&self, key: &PoolKey) -> Option<Arc<AsyncMutex<S>>> {
        let mut entries = self.entries.lock();
        entries.get_mut(key).map(|entry| {
            entry.refcount += 1;
            entry.shell.clone()
        })
    }

    /// Release one reference to `key`. On refcount reaching zero, the
    /// entry is removed and the shell disposed.
    pub async fn release(&self, key: &PoolKey) {
        let disposed = {
            let mut entries = self.entries.lock();
            match entries.get_mut(key) {
                Some(entry) if entry.refcount > 1 => {
                    entry.refcount -= 1;
                    None
                }
                Some(_) => entries.remove(key).map(|entry| entry.shell),
                None => None,
            }
        };

        if let Some(shell) = disposed {
            shell.lock().await.dispose().await;
        }
    }

    pub fn refcount(&self, key: &PoolKey) -> usize {
        self.entries.lock().get(key).map(|e| e.refcount).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "connection_pool_tests.rs"]
mod tests;
