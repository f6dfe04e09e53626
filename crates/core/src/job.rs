// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and state machine (spec.md §3 "Job", §4.D).

use crate::credential::CredentialId;
use crate::folder::{FolderId, FolderSource};
use crate::hpc::{HpcId, MaintainerKind};
use crate::owner::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a job instance.
    pub struct JobId;
}

/// The §4.D maintainer state machine. `Queued` is pre-admission (mutated
/// only by `queued_at_ms`, per spec.md §3 "Job" lifecycle); every other
/// phase is owned exclusively by the one maintainer worker driving the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Initializing,
    Submitted,
    Running,
    Collecting,
    Cancelling,
    Ended,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Terminal phases per spec.md §3 lifecycle ("terminal states are
    /// ended (possibly failed) or cancelled").
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Ended | JobPhase::Failed | JobPhase::Cancelled)
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobPhase::Queued => "queued",
            JobPhase::Initializing => "initializing",
            JobPhase::Submitted => "submitted",
            JobPhase::Running => "running",
            JobPhase::Collecting => "collecting",
            JobPhase::Cancelling => "cancelling",
            JobPhase::Ended => "ended",
            JobPhase::Failed => "failed",
            JobPhase::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Cumulative resource-usage counters, populated from Slurm accounting
/// during `maintain()`'s collect step (spec.md §3 "Job" usage counters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub nodes: u32,
    pub cpus: u32,
    pub cpu_time_secs: u64,
    pub memory_bytes: u64,
    pub memory_usage_bytes: u64,
    pub walltime_secs: u64,
}

/// Input to [`Job::new`] — everything the external HTTP layer supplies
/// when creating a job (spec.md §3 "Job" lifecycle: "created by the
/// external HTTP layer").
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub user_id: UserId,
    pub hpc: HpcId,
    pub maintainer: MaintainerKind,
    pub credential_id: Option<CredentialId>,
    pub param: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub slurm: HashMap<String, String>,
    pub local_executable_folder: Option<FolderSource>,
    pub local_data_folder: Option<FolderSource>,
}

/// A job instance (spec.md §3 "Job").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    pub hpc: HpcId,
    pub maintainer: MaintainerKind,
    /// Set only for private-account clusters (spec.md §3 "Job").
    pub credential_id: Option<CredentialId>,

    pub param: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub slurm: HashMap<String, String>,

    /// Input sources, supplied at creation, not yet staged.
    pub local_executable_folder: Option<FolderSource>,
    pub local_data_folder: Option<FolderSource>,
    /// Staged remote folders, populated during `init()`.
    pub remote_executable_folder: Option<FolderId>,
    pub remote_data_folder: Option<FolderId>,
    pub remote_result_folder: Option<FolderId>,

    pub phase: JobPhase,

    pub created_at_ms: u64,
    pub queued_at_ms: Option<u64>,
    pub initialized_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,

    pub is_failed: bool,

    pub usage: UsageCounters,

    /// A remote Slurm job has been submitted and not yet torn down
    /// (spec.md §4.D "three flags readable by the scheduler").
    pub job_on_hpc: bool,
    /// Initialization ran at least once.
    pub is_init: bool,
    /// Remote Slurm job id, once submitted.
    pub remote_job_id: Option<String>,
}

impl Job {
    pub fn new(config: JobConfig, now_ms: u64) -> Self {
        Self {
            id: config.id,
            user_id: config.user_id,
            hpc: config.hpc,
            maintainer: config.maintainer,
            credential_id: config.credential_id,
            param: config.param,
            env: config.env,
            slurm: config.slurm,
            local_executable_folder: config.local_executable_folder,
            local_data_folder: config.local_data_folder,
            remote_executable_folder: None,
            remote_data_folder: None,
            remote_result_folder: None,
            phase: JobPhase::Queued,
            created_at_ms: now_ms,
            queued_at_ms: None,
            initialized_at_ms: None,
            finished_at_ms: None,
            is_failed: false,
            usage: UsageCounters::default(),
            job_on_hpc: false,
            is_init: false,
            remote_job_id: None,
        }
    }

    /// Mark the job as accepted into its cluster queue
    /// (spec.md §3 "becomes queued when the Supervisor accepts it").
    pub fn mark_queued(&mut self, now_ms: u64) {
        self.queued_at_ms = Some(now_ms);
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True if the job is eligible for cancellation right now: it must be
    /// running (not queued — spec.md §9 "cancellation of queued jobs is
    /// disabled") and not already terminal or mid-cancellation.
    pub fn is_cancellable(&self) -> bool {
        !matches!(
            self.phase,
            JobPhase::Queued | JobPhase::Cancelling
        ) && !self.is_terminal()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
