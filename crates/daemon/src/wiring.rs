// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assembles a runnable [`Supervisor`](sup_engine::Supervisor) from a
//! loaded [`Config`] (spec.md §4.F). Both `supd` and `sup` build one of
//! these against the same `state_dir`.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use sup_adapters::GlobusTransferAdapter;
use sup_core::clock::SystemClock;
use sup_core::hpc::{HpcConfig, HpcId};
use sup_core::id::UuidIdGen;
use sup_engine::{ClusterResources, ConnectionPool, FolderStagingEngine, Supervisor, SupervisorConfig};
use sup_shell::{BackoffPolicy, SshShell};
use sup_storage::{
    FileCacheRepository, FileEventRepository, FileFolderRepository, FileJobRepository,
    FileKeyValueStore, FileLogRepository, KeyValueStore, PerClusterQueue, QueueWalError,
    StorageError,
};
use thiserror::Error;

use crate::config::Config;
use crate::sink::DaemonEventSink;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueWalError),
}

/// The concrete generic instantiation every production binary runs:
/// real SSH, real Globus, the system clock, UUID ids, and the
/// file-backed [`DaemonEventSink`].
pub type ProdSupervisor = Supervisor<SshShell, GlobusTransferAdapter, SystemClock, UuidIdGen, DaemonEventSink>;

/// Everything [`build`] assembles, handed back so callers can also reach
/// the repositories directly (`sup-cli`'s `status` subcommand reads jobs
/// without going through the supervisor at all).
pub struct Wiring {
    pub supervisor: Arc<ProdSupervisor>,
    /// Exposed alongside the supervisor so a one-shot `sup` invocation can
    /// read/insert jobs directly (`status`, `submit`) without duplicating
    /// this wiring.
    pub jobs: Arc<dyn sup_storage::JobRepository>,
}

/// Build a [`ProdSupervisor`] for every cluster named in `config.hpc`,
/// opening (or creating) the on-disk state `config`'s paths point at.
pub fn build(config: &Config) -> Result<Wiring, WiringError> {
    std::fs::create_dir_all(&config.state_dir).map_err(StorageError::Io)?;
    std::fs::create_dir_all(config.git_mirror_root()).map_err(StorageError::Io)?;
    std::fs::create_dir_all(config.local_work_root()).map_err(StorageError::Io)?;

    let jobs = Arc::new(FileJobRepository::open(config.jobs_path())?);
    let folders = Arc::new(FileFolderRepository::open(config.folders_path())?);
    let cache = Arc::new(FileCacheRepository::open(config.cache_path())?);
    let events = Arc::new(FileEventRepository::open(config.events_path())?);
    let logs = Arc::new(FileLogRepository::open(config.logs_path())?);
    let credentials: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::open(config.credentials_path())?);

    let sink = Arc::new(DaemonEventSink {
        jobs: jobs.clone(),
        events,
        logs,
    });

    let queue = Arc::new(PerClusterQueue::open(&config.queue_wal_path(), jobs.clone())?);

    let globus = Arc::new(GlobusTransferAdapter::new(
        config.globus_base_url.clone().unwrap_or_default(),
        config.globus_access_token.clone().unwrap_or_default(),
    ));

    let staging = Arc::new(FolderStagingEngine::new(
        globus,
        folders,
        cache,
        config.git_mirror_root(),
        config.local_work_root(),
    ));

    let pool = Arc::new(ConnectionPool::<SshShell>::new());

    let hpc_configs: IndexMap<HpcId, HpcConfig> = config
        .hpc
        .iter()
        .map(|(name, cfg)| (HpcId::new(name.clone()), cfg.clone()))
        .collect();

    let resources: HashMap<HpcId, ClusterResources> = hpc_configs
        .keys()
        .map(|hpc| {
            let name = hpc.as_str();
            let resources = ClusterResources {
                container: config.container.get(name).cloned(),
                kernel: config.kernel.get(name).cloned(),
                community_key_path: config.community_key_path.get(name).cloned(),
            };
            (hpc.clone(), resources)
        })
        .collect();

    let supervisor_config = SupervisorConfig {
        tick_period: config.tick_period,
        worker_poll_period: config.worker_poll_period,
        shutdown_deadline: config.shutdown_deadline,
    };

    let supervisor = Arc::new(Supervisor::new(
        queue,
        pool,
        staging,
        sink,
        credentials,
        SystemClock,
        UuidIdGen,
        BackoffPolicy::default(),
        hpc_configs,
        resources,
        supervisor_config,
    ));

    Ok(Wiring { supervisor, jobs })
}

#[cfg(test)]
#[path = "wiring_tests.rs"]
mod tests;
