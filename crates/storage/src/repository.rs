// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRUD repositories over the supervisor's domain entities (spec.md §3,
//! §1 "the relational store... a simple CRUD" collaborator).

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use sup_core::cache::CacheEntry;
use sup_core::event::{Event, Log};
use sup_core::folder::{Folder, FolderId};
use sup_core::hpc::HpcId;
use sup_core::job::{Job, JobId};

/// CRUD over [`Job`] records.
pub trait JobRepository: Send + Sync {
    fn insert(&self, job: Job) -> Result<(), StorageError>;
    fn get(&self, id: &JobId) -> Result<Job, StorageError>;
    fn update(&self, job: Job) -> Result<(), StorageError>;
    fn list_by_hpc(&self, hpc: &HpcId) -> Result<Vec<Job>, StorageError>;
}

/// CRUD over [`Folder`] records. Folders are never hard-deleted (spec.md
/// §3 "Folder" — "persists for audit"); deletion is the `deleted` flag.
pub trait FolderRepository: Send + Sync {
    fn insert(&self, folder: Folder) -> Result<(), StorageError>;
    fn get(&self, id: &FolderId) -> Result<Folder, StorageError>;
    fn mark_deleted(&self, id: &FolderId) -> Result<(), StorageError>;
}

/// A cache entry is keyed by the cluster it was staged on and the
/// content fingerprint of its source (spec.md §4.C).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CacheKey {
    pub hpc: HpcId,
    pub fingerprint: String,
}

/// CRUD over [`CacheEntry`] records.
pub trait CacheRepository: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError>;
    fn upsert(&self, key: CacheKey, entry: CacheEntry) -> Result<(), StorageError>;
    fn remove(&self, key: &CacheKey) -> Result<(), StorageError>;
}

/// Append-only store over [`Event`] records.
pub trait EventRepository: Send + Sync {
    fn append(&self, event: Event) -> Result<(), StorageError>;
    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Event>, StorageError>;
}

/// Append-only store over [`Log`] records.
pub trait LogRepository: Send + Sync {
    fn append(&self, log: Log) -> Result<(), StorageError>;
    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Log>, StorageError>;
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobRepository for InMemoryJobRepository {
    fn insert(&self, job: Job) -> Result<(), StorageError> {
        self.jobs.lock().insert(job.id.clone(), job);
        Ok(())
    }

    fn get(&self, id: &JobId) -> Result<Job, StorageError> {
        self.jobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("job {id}")))
    }

    fn update(&self, job: Job) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock();
        if !jobs.contains_key(&job.id) {
            return Err(StorageError::NotFound(format!("job {}", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn list_by_hpc(&self, hpc: &HpcId) -> Result<Vec<Job>, StorageError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|job| &job.hpc == hpc)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryFolderRepository {
    folders: Mutex<HashMap<FolderId, Folder>>,
}

impl FolderRepository for InMemoryFolderRepository {
    fn insert(&self, folder: Folder) -> Result<(), StorageError> {
        self.folders.lock().insert(folder.id.clone(), folder);
        Ok(())
    }

    fn get(&self, id: &FolderId) -> Result<Folder, StorageError> {
        self.folders
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("folder {id}")))
    }

    fn mark_deleted(&self, id: &FolderId) -> Result<(), StorageError> {
        let mut folders = self.folders.lock();
        let folder = folders
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("folder {id}")))?;
        folder.deleted = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCacheRepository {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl CacheRepository for InMemoryCacheRepository {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn upsert(&self, key: CacheKey, entry: CacheEntry) -> Result<(), StorageError> {
        self.entries.lock().insert(key, entry);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<JobId, Vec<Event>>>,
}

impl EventRepository for InMemoryEventRepository {
    fn append(&self, event: Event) -> Result<(), StorageError> {
        self.events
            .lock()
            .entry(event.job_id.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Event>, StorageError> {
        Ok(self.events.lock().get(job_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryLogRepository {
    logs: Mutex<HashMap<JobId, Vec<Log>>>,
}

impl LogRepository for InMemoryLogRepository {
    fn append(&self, log: Log) -> Result<(), StorageError> {
        self.logs
            .lock()
            .entry(log.job_id.clone())
            .or_default()
            .push(log);
        Ok(())
    }

    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Log>, StorageError> {
        Ok(self.logs.lock().get(job_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
