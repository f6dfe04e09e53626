// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file-backed repositories.
//!
//! spec.md §1 treats the relational store and the credential/Globus/
//! result-listing key-value store as external collaborators reachable
//! only via simple CRUD — [`InMemoryJobRepository`](crate::InMemoryJobRepository)
//! and friends stand in for that in `sup-engine`'s unit tests. `sup-cli`
//! and `sup-daemon` are separate OS processes, though, and need that
//! same CRUD state to survive past one invocation without a real
//! database — so this module adds a file-backed variant of each
//! repository, one JSON snapshot per entity kind, rewritten wholesale on
//! every mutation. That is the one thing `sup-cli`/`sup-daemon` actually
//! need: durable CRUD, not a replayable event log (that treatment is
//! reserved for [`crate::PerClusterQueue`], the one state spec.md says
//! must survive a restart).

use crate::error::StorageError;
use crate::repository::{
    CacheKey, CacheRepository, EventRepository, FolderRepository, JobRepository, LogRepository,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use sup_core::cache::CacheEntry;
use sup_core::event::{Event, Log};
use sup_core::folder::{Folder, FolderId};
use sup_core::hpc::HpcId;
use sup_core::job::{Job, JobId};

/// Read `path` as JSON into `T`, or return `default` if it does not yet
/// exist. Any other read/parse failure is surfaced.
fn load_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Serialize `value` and write it to `path` via a temp-file-plus-rename,
/// so a crash mid-write never leaves a half-written snapshot behind.
fn persist<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// File-backed [`JobRepository`]: one JSON object of `JobId -> Job`.
pub struct FileJobRepository {
    path: PathBuf,
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl FileJobRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let jobs = load_or_default(&path)?;
        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }
}

impl JobRepository for FileJobRepository {
    fn insert(&self, job: Job) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock();
        jobs.insert(job.id.clone(), job);
        persist(&self.path, &*jobs)
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
        persist(&self.path, &*jobs)
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

/// File-backed [`FolderRepository`]: one JSON object of `FolderId -> Folder`.
pub struct FileFolderRepository {
    path: PathBuf,
    folders: Mutex<HashMap<FolderId, Folder>>,
}

impl FileFolderRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let folders = load_or_default(&path)?;
        Ok(Self {
            path,
            folders: Mutex::new(folders),
        })
    }
}

impl FolderRepository for FileFolderRepository {
    fn insert(&self, folder: Folder) -> Result<(), StorageError> {
        let mut folders = self.folders.lock();
        folders.insert(folder.id.clone(), folder);
        persist(&self.path, &*folders)
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
        persist(&self.path, &*folders)
    }
}

/// File-backed [`CacheRepository`]. `CacheKey` is a two-field struct, not
/// a bare string, so it cannot serialize directly as a JSON object key;
/// the snapshot on disk is a flat `Vec<(CacheKey, CacheEntry)>` instead,
/// rebuilt into the in-memory `HashMap` at open time.
pub struct FileCacheRepository {
    path: PathBuf,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl FileCacheRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let pairs: Vec<(CacheKey, CacheEntry)> = load_or_default(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(pairs.into_iter().collect()),
        })
    }

    fn persist_locked(&self, entries: &HashMap<CacheKey, CacheEntry>) -> Result<(), StorageError> {
        let pairs: Vec<(&CacheKey, &CacheEntry)> = entries.iter().collect();
        persist(&self.path, &pairs)
    }
}

impl CacheRepository for FileCacheRepository {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn upsert(&self, key: CacheKey, entry: CacheEntry) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key, entry);
        self.persist_locked(&entries)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.remove(key);
        self.persist_locked(&entries)
    }
}

/// File-backed [`EventRepository`]: one JSON object of `JobId -> Vec<Event>`.
pub struct FileEventRepository {
    path: PathBuf,
    events: Mutex<HashMap<JobId, Vec<Event>>>,
}

impl FileEventRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let events = load_or_default(&path)?;
        Ok(Self {
            path,
            events: Mutex::new(events),
        })
    }
}

impl EventRepository for FileEventRepository {
    fn append(&self, event: Event) -> Result<(), StorageError> {
        let mut events = self.events.lock();
        events.entry(event.job_id.clone()).or_default().push(event);
        persist(&self.path, &*events)
    }

    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Event>, StorageError> {
        Ok(self.events.lock().get(job_id).cloned().unwrap_or_default())
    }
}

/// File-backed [`LogRepository`]: one JSON object of `JobId -> Vec<Log>`.
pub struct FileLogRepository {
    path: PathBuf,
    logs: Mutex<HashMap<JobId, Vec<Log>>>,
}

impl FileLogRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let logs = load_or_default(&path)?;
        Ok(Self {
            path,
            logs: Mutex::new(logs),
        })
    }
}

impl LogRepository for FileLogRepository {
    fn append(&self, log: Log) -> Result<(), StorageError> {
        let mut logs = self.logs.lock();
        logs.entry(log.job_id.clone()).or_default().push(log);
        persist(&self.path, &*logs)
    }

    fn list_by_job(&self, job_id: &JobId) -> Result<Vec<Log>, StorageError> {
        Ok(self.logs.lock().get(job_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "file_repository_tests.rs"]
mod tests;
