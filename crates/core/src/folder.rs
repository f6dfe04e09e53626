// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote workspace descriptors (spec.md §3 "Folder", §4.C).

use crate::hpc::HpcId;
use crate::owner::UserId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique id of a staged remote folder.
    pub struct FolderId;
}

/// Where a folder's content originally came from (spec.md §4.C "source").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FolderSource {
    /// A directory on the supervisor host.
    Local { path: String },
    /// A clone of a registered repository, identified by `git_id`.
    Git { git_id: String },
    /// Direct remote-to-remote transfer via Globus.
    Globus { endpoint: String, path: String },
    /// No source; create an empty directory.
    Empty,
}

impl FolderSource {
    /// The content-addressed cache fingerprint for this source
    /// (spec.md §4.C "Content-addressed cache").
    ///
    /// `Empty` sources are never cached (there is nothing to reuse), so
    /// this returns `None` for them; callers must fall back to plain
    /// `stage` rather than `cached_stage`.
    pub fn fingerprint(&self) -> Option<String> {
        match self {
            FolderSource::Git { git_id } => Some(git_id.clone()),
            FolderSource::Local { path } => std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            FolderSource::Globus { endpoint, path } => {
                Some(sanitize_for_fingerprint(&format!("{endpoint}{path}")))
            }
            FolderSource::Empty => None,
        }
    }
}

/// Replace everything but alphanumerics, `-` and `_` with `_`, so the
/// result is safe to use as a single path segment.
fn sanitize_for_fingerprint(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Remote workspace descriptor. Persists for audit even after the job
/// that created it is terminal; soft-deletable rather than removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub hpc: HpcId,
    pub user_id: UserId,
    pub hpc_path: String,
    #[serde(default)]
    pub globus_path: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl Folder {
    pub fn new(id: FolderId, hpc: HpcId, user_id: UserId, hpc_path: impl Into<String>) -> Self {
        Self {
            id,
            hpc,
            user_id,
            hpc_path: hpc_path.into(),
            globus_path: None,
            deleted: false,
        }
    }
}

#[cfg(test)]
#[path = "folder_tests.rs"]
mod tests;
