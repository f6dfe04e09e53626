// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-cluster job queue (spec.md §4.E), the one piece of supervisor
//! state persisted across restarts (spec.md §1/§9). Durability is a
//! JSONL write-ahead log: every `Push`/`Pop` is appended as a line of
//! JSON and fsynced before the call returns, and the queue is rebuilt
//! by replaying the WAL at startup.

use crate::error::StorageError;
use crate::repository::JobRepository;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use sup_core::hpc::HpcId;
use sup_core::job::{Job, JobId};

/// Errors from [`QueueWal`] operations.
#[derive(Debug, Error)]
pub enum QueueWalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A queue mutation, as recorded in the WAL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueueOp {
    Push { hpc: HpcId, job_id: JobId },
    Pop { hpc: HpcId },
}

/// A single WAL entry with its assigned sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueWalEntry {
    pub seq: u64,
    pub op: QueueOp,
}

#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    #[serde(flatten)]
    op: &'a QueueOp,
}

#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    #[serde(flatten)]
    op: QueueOp,
}

/// JSONL write-ahead log of queue mutations. Every `append` is
/// immediately followed by a `flush` here: queue mutations are rare
/// relative to shell I/O, so batching writes is not worth the added
/// staleness window for a queue admission decision.
pub struct QueueWal {
    file: File,
    path: PathBuf,
    write_seq: u64,
}

impl QueueWal {
    /// Open or create the WAL at `path`, returning it with `write_seq`
    /// set to the highest sequence number found on disk.
    pub fn open(path: &Path) -> Result<Self, QueueWalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let write_seq = Self::scan_max_seq(&file, path)?;

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
        })
    }

    fn scan_max_seq(file: &File, path: &Path) -> Result<u64, QueueWalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        let mut max_seq = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => max_seq = max_seq.max(record.seq),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt queue WAL entry, stopping scan");
                    break;
                }
            }
        }
        Ok(max_seq)
    }

    /// Replay every entry from the start of the WAL, in order.
    pub fn replay(&self) -> Result<Vec<QueueWalEntry>, QueueWalError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        let mut entries = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => entries.push(QueueWalEntry {
                    seq: record.seq,
                    op: record.op,
                }),
                Err(e) => {
                    warn!(error = %e, "corrupt queue WAL entry during replay, stopping");
                    break;
                }
            }
        }
        Ok(entries)
    }

    /// Append `op`, fsync, and return its assigned sequence number.
    pub fn append(&mut self, op: &QueueOp) -> Result<u64, QueueWalError> {
        self.write_seq += 1;
        let seq = self.write_seq;
        let mut bytes = serde_json::to_vec(&WalRecordRef { seq, op })?;
        bytes.push(b'\n');
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(seq)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Per-cluster FIFO job queue, durable via [`QueueWal`] (spec.md §4.E).
pub struct PerClusterQueue {
    wal: Mutex<QueueWal>,
    queues: Mutex<HashMap<HpcId, VecDeque<JobId>>>,
    jobs: Arc<dyn JobRepository>,
}

impl PerClusterQueue {
    /// Open the WAL at `path` and replay it to rebuild every cluster's
    /// queue of job ids.
    pub fn open(path: &Path, jobs: Arc<dyn JobRepository>) -> Result<Self, QueueWalError> {
        let wal = QueueWal::open(path)?;
        let mut queues: HashMap<HpcId, VecDeque<JobId>> = HashMap::new();
        for entry in wal.replay()? {
            match entry.op {
                QueueOp::Push { hpc, job_id } => queues.entry(hpc).or_default().push_back(job_id),
                QueueOp::Pop { hpc } => {
                    queues.entry(hpc).or_default().pop_front();
                }
            }
        }
        Ok(Self {
            wal: Mutex::new(wal),
            queues: Mutex::new(queues),
            jobs,
        })
    }

    /// Enqueue `job_id` on `hpc`'s queue, durably.
    pub fn push(&self, hpc: &HpcId, job_id: JobId) -> Result<(), QueueWalError> {
        self.wal.lock().append(&QueueOp::Push {
            hpc: hpc.clone(),
            job_id: job_id.clone(),
        })?;
        self.queues
            .lock()
            .entry(hpc.clone())
            .or_default()
            .push_back(job_id);
        Ok(())
    }

    /// Pop the next job id off `hpc`'s queue and hydrate its full [`Job`]
    /// from the job repository. If the popped id is missing from the
    /// repository (spec.md §4.E), the id is logged and skipped, and the
    /// next one is tried.
    pub fn pop(&self, hpc: &HpcId) -> Result<Option<Job>, StorageError> {
        loop {
            let job_id = {
                let mut queues = self.queues.lock();
                let Some(queue) = queues.get_mut(hpc) else {
                    return Ok(None);
                };
                let Some(job_id) = queue.pop_front() else {
                    return Ok(None);
                };
                job_id
            };

            self.wal
                .lock()
                .append(&QueueOp::Pop { hpc: hpc.clone() })
                .map_err(|e| StorageError::Io(io::Error::other(e.to_string())))?;

            match self.jobs.get(&job_id) {
                Ok(job) => return Ok(Some(job)),
                Err(StorageError::NotFound(_)) => {
                    warn!(%job_id, %hpc, "queued job id missing from job repository, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The id at the front of `hpc`'s queue, without removing it.
    pub fn peek(&self, hpc: &HpcId) -> Option<JobId> {
        self.queues.lock().get(hpc).and_then(|q| q.front().cloned())
    }

    pub fn length(&self, hpc: &HpcId) -> usize {
        self.queues.lock().get(hpc).map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self, hpc: &HpcId) -> bool {
        self.length(hpc) == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
