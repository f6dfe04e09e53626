// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Folder Staging Engine (spec.md §4.C): uploads a logical source into a
//! fresh remote workspace, with an optional content-addressed cache for
//! sources the upstream has an authoritative timestamp for.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use sup_adapters::{GlobusAdapter, GlobusError, TransferStatus};
use sup_core::cache::{cache_path, CacheEntry};
use sup_core::clock::Clock;
use sup_core::folder::{Folder, FolderId, FolderSource};
use sup_core::hpc::{HpcConfig, HpcId};
use sup_core::id::IdGen;
use sup_core::owner::UserId;
use sup_shell::{RemoteShell, ShellError};
use sup_storage::{CacheKey, CacheRepository, FolderRepository, StorageError};
use thiserror::Error;

use crate::local_ops;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("remote shell error: {0}")]
    Shell(#[from] ShellError),
    #[error("globus transfer error: {0}")]
    Globus(#[from] GlobusError),
    #[error("local operation failed: {0}")]
    Local(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("source has no cache fingerprint: {0:?}")]
    NotCacheable(FolderSource),
    #[error("globus source is not backed by {hpc}'s configured endpoint")]
    NoGlobusEndpoint { hpc: String },
}

/// Uploads a logical source (local directory, Git clone, or Globus
/// transfer) into a fresh remote workspace, optionally reusing a
/// content-addressed cache (spec.md §4.C).
pub struct FolderStagingEngine<G: GlobusAdapter> {
    globus: Arc<G>,
    folders: Arc<dyn FolderRepository>,
    cache: Arc<dyn CacheRepository>,
    git_mirror_root: PathBuf,
    local_work_root: PathBuf,
}

impl<G: GlobusAdapter> FolderStagingEngine<G> {
    /// The local mirror path a Git source was (or will be) synced into.
    /// Used by `sup-engine`'s community-contribution maintainer to locate
    /// the executable manifest bundled in the repository after staging.
    pub fn git_mirror_path(&self, git_id: &str) -> PathBuf {
        self.git_mirror_root.join(sanitize_path_component(git_id))
    }

    pub fn new(
        globus: Arc<G>,
        folders: Arc<dyn FolderRepository>,
        cache: Arc<dyn CacheRepository>,
        git_mirror_root: PathBuf,
        local_work_root: PathBuf,
    ) -> Self {
        Self {
            globus,
            folders,
            cache,
            git_mirror_root,
            local_work_root,
        }
    }

    /// Stage `source` into a fresh `<hpc.root_path>/<id>` workspace,
    /// unconditionally (no cache lookup). Registers and returns the
    /// resulting [`Folder`] (spec.md §4.C).
    pub async fn stage<S: RemoteShell>(
        &self,
        shell: &S,
        source: &FolderSource,
        hpc: &HpcId,
        hpc_config: &HpcConfig,
        user_id: &UserId,
        ids: &impl IdGen,
    ) -> Result<Folder, StagingError> {
        let folder_id = FolderId::new(ids.next());
        let dest = format!(
            "{}/{}",
            hpc_config.root_path.trim_end_matches('/'),
            folder_id.as_str()
        );

        match source {
            FolderSource::Local { path } => {
                self.stage_local_dir(shell, Path::new(path), &dest).await?;
            }
            FolderSource::Git { git_id } => {
                let mirror = self.git_mirror_root.join(sanitize_path_component(git_id));
                local_ops::sync_git_mirror(git_id, &mirror)
                    .await
                    .map_err(StagingError::Local)?;
                self.stage_local_dir(shell, &mirror, &dest).await?;
            }
            FolderSource::Globus { endpoint, path } => {
                let globus_config = hpc_config
                    .globus
                    .as_ref()
                    .ok_or_else(|| StagingError::NoGlobusEndpoint {
                        hpc: hpc.to_string(),
                    })?;
                self.stage_via_globus(endpoint, path, &globus_config.endpoint, &dest)
                    .await?;
            }
            FolderSource::Empty => {
                shell.mkdir(&dest, true).await?;
            }
        }

        let folder = Folder::new(folder_id, hpc.clone(), user_id.clone(), dest);
        self.folders.insert(folder.clone())?;
        Ok(folder)
    }

    /// Stage `source` into a fresh workspace, reusing a content-addressed
    /// cache when possible (spec.md §4.C "cachedStage").
    ///
    /// Per spec.md §9's resolution of the Local/Globus staleness open
    /// question, only Git sources ever reuse a cache entry: Local and
    /// Globus sources always rebuild. Globus additionally has no zip
    /// artifact to cache against, so it is staged directly into the job
    /// workspace rather than through `<root>/cache/<fingerprint>.zip`.
    pub async fn cached_stage<S: RemoteShell>(
        &self,
        shell: &S,
        source: &FolderSource,
        hpc: &HpcId,
        hpc_config: &HpcConfig,
        user_id: &UserId,
        ids: &impl IdGen,
        clock: &impl Clock,
    ) -> Result<Folder, StagingError> {
        let fingerprint = source
            .fingerprint()
            .ok_or_else(|| StagingError::NotCacheable(source.clone()))?;

        if matches!(source, FolderSource::Globus { .. }) {
            return self.stage(shell, source, hpc, hpc_config, user_id, ids).await;
        }

        let key = CacheKey {
            hpc: hpc.clone(),
            fingerprint: fingerprint.clone(),
        };
        let cache_zip_path = cache_path(&hpc_config.root_path, &fingerprint);

        let existing = self.cache.get(&key)?;
        let reusable = match (source, &existing) {
            (FolderSource::Git { git_id }, Some(entry)) => {
                let mirror = self.git_mirror_root.join(sanitize_path_component(git_id));
                local_ops::sync_git_mirror(git_id, &mirror)
                    .await
                    .map_err(StagingError::Local)?;
                let upstream_ms = local_ops::last_commit_epoch_ms(&mirror)
                    .await
                    .map_err(StagingError::Local)?;
                if entry.is_stale(upstream_ms) {
                    self.cache.remove(&key)?;
                    shell.rm(&cache_zip_path).await.ok();
                    None
                } else {
                    Some(entry.clone())
                }
            }
            // Local sources: per spec.md §9, staleness is never checked,
            // so every call is treated as a miss.
            _ => None,
        };

        if reusable.is_none() {
            self.build_cache_entry(shell, source, &cache_zip_path, clock)
                .await?;
            let now_ms = clock.epoch_ms();
            if let Err(e) = self.cache.upsert(key, CacheEntry::new(hpc.clone(), cache_zip_path.clone(), now_ms)) {
                // Cache registration is best-effort (spec.md §4.C "Errors"):
                // the workspace built below is still usable even if this
                // write fails, just never reused.
                tracing::warn!(hpc = %hpc, fingerprint, error = %e, "failed to register cache entry (best-effort)");
            }
        }

        let folder_id = FolderId::new(ids.next());
        let dest = format!(
            "{}/{}",
            hpc_config.root_path.trim_end_matches('/'),
            folder_id.as_str()
        );
        shell.unzip(&cache_zip_path, &dest).await?;

        let folder = Folder::new(folder_id, hpc.clone(), user_id.clone(), dest);
        self.folders.insert(folder.clone())?;
        Ok(folder)
    }

    async fn build_cache_entry<S: RemoteShell>(
        &self,
        shell: &S,
        source: &FolderSource,
        cache_zip_path: &str,
        _clock: &impl Clock,
    ) -> Result<(), StagingError> {
        let local_dir = match source {
            FolderSource::Local { path } => PathBuf::from(path),
            FolderSource::Git { git_id } => {
                let mirror = self.git_mirror_root.join(sanitize_path_component(git_id));
                local_ops::sync_git_mirror(git_id, &mirror)
                    .await
                    .map_err(StagingError::Local)?;
                mirror
            }
            FolderSource::Globus { .. } | FolderSource::Empty => {
                return Err(StagingError::NotCacheable(source.clone()));
            }
        };

        let local_zip = self
            .local_work_root
            .join(format!("{}.zip", uuid::Uuid::new_v4()));
        local_ops::zip_local_dir(&local_dir, &local_zip)
            .await
            .map_err(StagingError::Local)?;

        let upload_result = shell
            .upload(&local_zip, cache_zip_path, false, false)
            .await;
        tokio::fs::remove_file(&local_zip).await.ok();
        upload_result?;
        Ok(())
    }

    async fn stage_local_dir<S: RemoteShell>(
        &self,
        shell: &S,
        local_dir: &Path,
        dest: &str,
    ) -> Result<(), StagingError> {
        let local_zip = self
            .local_work_root
            .join(format!("{}.zip", uuid::Uuid::new_v4()));
        local_ops::zip_local_dir(local_dir, &local_zip)
            .await
            .map_err(StagingError::Local)?;

        let result = async {
            shell.upload(&local_zip, "stage-upload.zip", false, false).await?;
            shell.unzip("stage-upload.zip", dest).await?;
            shell.rm("stage-upload.zip").await?;
            Ok::<(), ShellError>(())
        }
        .await;

        tokio::fs::remove_file(&local_zip).await.ok();
        result?;
        Ok(())
    }

    async fn stage_via_globus(
        &self,
        path_src: &str,
        endpoint_src: &str,
        endpoint_dst: &str,
        dest: &str,
    ) -> Result<(), StagingError> {
        let transfer_id = self
            .globus
            .init_transfer(endpoint_src, path_src, endpoint_dst, dest)
            .await?;
        match self.globus.monitor_transfer(&transfer_id).await? {
            TransferStatus::Succeeded => Ok(()),
            TransferStatus::Failed => Err(StagingError::Globus(GlobusError::Protocol(format!(
                "transfer {transfer_id} reported FAILED"
            )))),
            TransferStatus::Active => Err(StagingError::Globus(GlobusError::Protocol(format!(
                "transfer {transfer_id} did not reach a terminal status"
            )))),
        }
    }
}

fn sanitize_path_component(raw: &str) -> String {
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

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;
