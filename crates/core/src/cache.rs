// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed cache entries (spec.md §3 "Cache entry", §4.C).

use crate::hpc::HpcId;
use serde::{Deserialize, Serialize};

/// A cached, previously-staged source. An entry exists iff the remote
/// zip at `hpc_path` exists (spec.md §3 invariant 5); staleness is
/// judged by comparing `updated_at_ms` to the source's authoritative
/// upstream timestamp (e.g. a Git repo's last-commit time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hpc: HpcId,
    /// Path to the cached zip: `<hpc.root_path>/cache/<fingerprint>.zip`.
    pub hpc_path: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl CacheEntry {
    pub fn new(hpc: HpcId, hpc_path: impl Into<String>, now_ms: u64) -> Self {
        Self {
            hpc,
            hpc_path: hpc_path.into(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Whether this entry must be rebuilt because the upstream source has
    /// moved on since it was cached (spec.md §4.C rule 2).
    pub fn is_stale(&self, upstream_updated_at_ms: u64) -> bool {
        self.updated_at_ms < upstream_updated_at_ms
    }
}

/// Build the cache path for a given root and fingerprint
/// (`<hpc.root_path>/cache/<fingerprint>.zip`).
pub fn cache_path(root_path: &str, fingerprint: &str) -> String {
    format!("{}/cache/{}.zip", root_path.trim_end_matches('/'), fingerprint)
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
