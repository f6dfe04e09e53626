// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission scheduler (spec.md §4.F): one ticker draining each cluster's
//! queue up to its capacity, plus one independent worker task per
//! admitted job (spec.md §5 "Concurrency & Resource Model").
//!
//! Two decisions from spec.md §9 are load-bearing here, not cosmetic:
//! the worker loop sleeps between `maintain()` calls instead of
//! spinning (§9 "Cooperative loops"), and `running`/`cancel`/pool-count
//! state is one `Mutex<ClusterState>` per cluster rather than shared
//! global state (§9 "Shared state").

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sup_adapters::GlobusAdapter;
use sup_core::clock::Clock;
use sup_core::event::EventType;
use sup_core::hpc::{ContainerConfig, HpcConfig, HpcId, KernelConfig};
use sup_core::id::IdGen;
use sup_core::job::{Job, JobId};
use sup_shell::{BackoffPolicy, RemoteShell, SshConfig};
use sup_storage::{KeyValueStore, PerClusterQueue, StorageError};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::connection_pool::{ConnectionPool, PoolKey};
use crate::credential_guard::{load_credential, CredentialGuardError};
use crate::event_emitter::{emit_event, EventSink};
use crate::maintainer::{Maintainer, MaintainerDeps, MaintainerError, MaintainerRegistry};
use crate::staging::FolderStagingEngine;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("unconfigured cluster: {0}")]
    UnknownCluster(HpcId),
}

/// Tunables for the admission ticker and its worker loops.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often the admission loop runs (spec.md §4.F "ticks at a
    /// configured period T (default a few seconds)").
    pub tick_period: Duration,
    /// The cooperative yield between a worker's `maintain()` calls
    /// (spec.md §9 "Cooperative loops"); spec.md suggests 1-5s.
    pub worker_poll_period: Duration,
    /// How long [`Supervisor::shutdown`] waits for running workers to
    /// reach `isEnd` before aborting them (spec.md §4.F "`destroy()`...
    /// implementations SHOULD add a shutdown deadline").
    pub shutdown_deadline: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(5),
            worker_poll_period: Duration::from_secs(2),
            shutdown_deadline: Duration::from_secs(30),
        }
    }
}

/// Per-cluster admission state: the running set, the cancel set, and the
/// pool-slot counter. Bundled in one struct behind one mutex per cluster
/// so the three stay consistent with each other without a global lock
/// (spec.md §5 "all four require a per-cluster mutex").
#[derive(Default)]
struct ClusterState {
    running: HashSet<JobId>,
    cancel: HashSet<JobId>,
    pool_count: usize,
}

/// Static configuration a cluster needs beyond `HpcConfig` itself: its
/// optional container image and kernel init lines, and the SSH key a
/// community account authenticates with (private accounts instead read
/// a per-job credential out of the secret store, via `credential_id`).
#[derive(Debug, Clone, Default)]
pub struct ClusterResources {
    pub container: Option<ContainerConfig>,
    pub kernel: Option<KernelConfig>,
    pub community_key_path: Option<String>,
}

/// The §4.F admission scheduler: one ticker per process, one worker task
/// per admitted job. Generic over the shell, Globus adapter, clock,
/// id-generator, and event sink so production wiring (`SshShell`,
/// `GlobusTransferAdapter`, `SystemClock`, `UuidIdGen`) and test wiring
/// (`FakeShell`, `FakeGlobusAdapter`, `FakeClock`, `SequentialIdGen`)
/// share this one implementation.
pub struct Supervisor<S, G, C, I, Snk>
where
    S: RemoteShell + Default + 'static,
    G: GlobusAdapter + 'static,
    C: Clock,
    I: IdGen,
    Snk: EventSink + 'static,
{
    queues: Arc<PerClusterQueue>,
    pool: Arc<ConnectionPool<S>>,
    staging: Arc<FolderStagingEngine<G>>,
    sink: Arc<Snk>,
    credentials: Arc<dyn KeyValueStore>,
    clock: C,
    ids: I,
    backoff: BackoffPolicy,
    hpc_configs: IndexMap<HpcId, HpcConfig>,
    resources: HashMap<HpcId, ClusterResources>,
    clusters: HashMap<HpcId, Arc<Mutex<ClusterState>>>,
    config: SupervisorConfig,
    stopped: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, G, C, I, Snk> Supervisor<S, G, C, I, Snk>
where
    S: RemoteShell + Default + 'static,
    G: GlobusAdapter + 'static,
    C: Clock,
    I: IdGen,
    Snk: EventSink + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queues: Arc<PerClusterQueue>,
        pool: Arc<ConnectionPool<S>>,
        staging: Arc<FolderStagingEngine<G>>,
        sink: Arc<Snk>,
        credentials: Arc<dyn KeyValueStore>,
        clock: C,
        ids: I,
        backoff: BackoffPolicy,
        hpc_configs: IndexMap<HpcId, HpcConfig>,
        resources: HashMap<HpcId, ClusterResources>,
        config: SupervisorConfig,
    ) -> Self {
        let clusters = hpc_configs
            .keys()
            .map(|hpc| (hpc.clone(), Arc::new(Mutex::new(ClusterState::default()))))
            .collect();
        Self {
            queues,
            pool,
            staging,
            sink,
            credentials,
            clock,
            ids,
            backoff,
            hpc_configs,
            resources,
            clusters,
            config,
            stopped: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Enqueue `job` on its cluster's queue, durably (spec.md §6
    /// `pushJobToQueue`). The job must already exist in the job
    /// repository (the HTTP boundary's job-creation step, not the
    /// scheduler's).
    pub fn push_job_to_queue(&self, mut job: Job) -> Result<(), SupervisorError> {
        if !self.hpc_configs.contains_key(&job.hpc) {
            return Err(SupervisorError::UnknownCluster(job.hpc.clone()));
        }
        job.mark_queued(self.clock.epoch_ms());
        let hpc = job.hpc.clone();
        let job_id = job.id.clone();
        self.sink.jobs().update(job.clone())?;
        emit_event(
            &*self.sink,
            &self.clock,
            &mut job,
            EventType::JobQueued,
            "accepted into cluster queue",
        );
        self.queues
            .push(&hpc, job_id)
            .map_err(|e| SupervisorError::Storage(StorageError::Io(std::io::Error::other(e.to_string()))))
    }

    /// `cancelJob(jobId)` (spec.md §4.F): scans the running set, not the
    /// queue, of every cluster. Cancellation of a queued-but-not-yet-
    /// admitted job is a documented no-op (spec.md §9).
    pub fn cancel_job(&self, job_id: &JobId) -> Option<Job> {
        for cluster in self.clusters.values() {
            let mut state = cluster.lock();
            if state.running.contains(job_id) {
                state.cancel.insert(job_id.clone());
                drop(state);
                return self.sink.jobs().get(job_id).ok();
            }
        }
        None
    }

    /// `destroy()` (spec.md §4.F): stops the admission ticker. Running
    /// workers are left alone; call [`Supervisor::shutdown`] to also wait
    /// for (and eventually abort) them.
    pub fn destroy(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the ticker, then wait up to `config.shutdown_deadline` for
    /// every running worker to finish on its own; anything still running
    /// past the deadline is aborted (spec.md §4.F "SHOULD add a shutdown
    /// deadline after which workers are cancelled").
    pub async fn shutdown(&self) {
        self.destroy();
        let deadline = tokio::time::Instant::now() + self.config.shutdown_deadline;
        loop {
            self.handles.lock().retain(|h| !h.is_finished());
            if self.handles.lock().is_empty() || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        for handle in self.handles.lock().drain(..) {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }

    /// Running-count for `hpc`, for observability and tests (spec.md §8
    /// "running_count(c) never exceeds capacity(c)").
    pub fn running_count(&self, hpc: &HpcId) -> usize {
        self.clusters.get(hpc).map(|c| c.lock().pool_count).unwrap_or(0)
    }

    /// One admission tick across every configured cluster, in
    /// configuration order (spec.md §4.F, §5 "Ordering").
    pub async fn tick(&self) {
        if self.is_destroyed() {
            return;
        }
        let order: Vec<HpcId> = self.hpc_configs.keys().cloned().collect();
        for hpc in order {
            self.tick_cluster(&hpc).await;
        }
    }

    async fn tick_cluster(&self, hpc: &HpcId) {
        let Some(hpc_config) = self.hpc_configs.get(hpc).cloned() else {
            return;
        };
        let Some(cluster) = self.clusters.get(hpc).cloned() else {
            return;
        };

        loop {
            let room = cluster.lock().pool_count < hpc_config.job_pool_capacity;
            if !room {
                break;
            }

            let job = match self.queues.pop(hpc) {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    // System-fatal (spec.md §7 category 4): log and move
                    // on to the next cluster rather than wedging the
                    // whole tick.
                    tracing::error!(%hpc, error = %e, "queue pop failed, halting admission for this cluster this tick");
                    break;
                }
            };

            self.admit(hpc, &hpc_config, &cluster, job).await;
        }
    }

    async fn admit(&self, hpc: &HpcId, hpc_config: &HpcConfig, cluster: &Arc<Mutex<ClusterState>>, job: Job) {
        let resources = self.resources.get(hpc).cloned().unwrap_or_default();
        let deps = MaintainerDeps {
            staging: self.staging.clone(),
            sink: self.sink.clone(),
            kv: self.credentials.clone(),
            clock: self.clock.clone(),
            ids: self.ids.clone(),
            hpc: hpc.clone(),
            hpc_config: hpc_config.clone(),
            container: resources.container.clone(),
            kernel: resources.kernel.clone(),
            backoff: self.backoff,
        };

        // `worker.construct()` (spec.md §4.F) is a pure match in this
        // implementation (`MaintainerRegistry::build`) and cannot fail;
        // the fallible part of admission is resolving *this* job's SSH
        // identity and acquiring its pool slot, so that work happens
        // here, before the job is added to `running[c]`.
        let maintainer: Box<dyn Maintainer<S> + Send> =
            MaintainerRegistry::build::<S, G, C, I, Snk>(job, deps);

        let ssh_config = match self.ssh_config_for(maintainer.job(), hpc, hpc_config, &resources) {
            Ok(cfg) => cfg,
            Err(message) => {
                self.fail_admission(maintainer.job().clone(), message).await;
                return;
            }
        };
        let pool_key = pool_key_for(maintainer.job(), hpc_config);

        let shell = match self.pool.acquire(pool_key.clone(), &ssh_config).await {
            Ok(shell) => shell,
            Err(e) => {
                self.fail_admission(maintainer.job().clone(), format!("unable to acquire shell: {e}"))
                    .await;
                return;
            }
        };

        let job_id = maintainer.job().id.clone();
        {
            let mut state = cluster.lock();
            state.running.insert(job_id.clone());
            state.pool_count += 1;
        }

        let mut registered = maintainer.job().clone();
        emit_event(
            &*self.sink,
            &self.clock,
            &mut registered,
            EventType::JobRegistered,
            format!("admitted on {hpc}"),
        );

        let handle = tokio::spawn(run_worker::<S, G, C, I, Snk>(
            maintainer,
            shell,
            self.pool.clone(),
            pool_key,
            cluster.clone(),
            self.sink.clone(),
            self.clock.clone(),
            self.config.worker_poll_period,
        ));
        self.handles.lock().push(handle);
    }

    async fn fail_admission(&self, mut job: Job, message: String) {
        job.finished_at_ms = Some(self.clock.epoch_ms());
        job.is_failed = true;
        emit_event(
            &*self.sink,
            &self.clock,
            &mut job,
            EventType::JobInitError,
            message,
        );
    }

    fn ssh_config_for(
        &self,
        job: &Job,
        hpc: &HpcId,
        hpc_config: &HpcConfig,
        resources: &ClusterResources,
    ) -> Result<SshConfig, String> {
        if hpc_config.is_community_account {
            let user = hpc_config
                .community_login
                .clone()
                .ok_or_else(|| format!("{hpc} is configured as a community account with no community_login"))?;
            Ok(SshConfig {
                host: hpc_config.ip.clone(),
                port: hpc_config.port,
                user,
                password: None,
                private_key_path: resources.community_key_path.clone(),
                connect_timeout_ms: 1_000,
            })
        } else {
            let credential_id = job.credential_id.clone().ok_or_else(|| {
                format!("job {} has no credential_id on private-account cluster {hpc}", job.id)
            })?;
            let credential = load_credential(&self.credentials, &credential_id)
                .map_err(|e: CredentialGuardError| e.to_string())?
                .ok_or_else(|| format!("credential {credential_id} not found in secret store"))?;
            Ok(SshConfig {
                host: hpc_config.ip.clone(),
                port: hpc_config.port,
                user: credential.user,
                password: Some(credential.password),
                private_key_path: None,
                connect_timeout_ms: 1_000,
            })
        }
    }
}

fn pool_key_for(job: &Job, hpc_config: &HpcConfig) -> PoolKey {
    if hpc_config.is_community_account {
        PoolKey::Shared(job.hpc.clone())
    } else {
        PoolKey::Private(job.id.clone())
    }
}

/// The worker loop (spec.md §4.F "worker_loop", §9 "Cooperative loops"):
/// `init()` once, then on each cooperative tick either observes the
/// cancel flag (calling `on_cancel()`) or calls `maintain()`, sleeping
/// `poll_period` between iterations, until `isEnd`. On exit, releases
/// the pool slot and removes the job from its cluster's running and
/// cancel sets — the only signal the admission loop gets that a slot
/// freed (spec.md §4.F "must be atomic with respect to the admission
/// loop"), which sharing `cluster`'s mutex with the admission loop
/// provides.
#[allow(clippy::too_many_arguments)]
async fn run_worker<S, G, C, I, Snk>(
    mut maintainer: Box<dyn Maintainer<S> + Send>,
    shell: Arc<tokio::sync::Mutex<S>>,
    pool: Arc<ConnectionPool<S>>,
    pool_key: PoolKey,
    cluster: Arc<Mutex<ClusterState>>,
    sink: Arc<Snk>,
    clock: C,
    poll_period: Duration,
) where
    S: RemoteShell + Default + 'static,
    G: GlobusAdapter + 'static,
    C: Clock,
    I: IdGen,
    Snk: EventSink + 'static,
{
    let init_result = {
        let guard = shell.lock().await;
        maintainer.init(&guard).await
    };
    if let Err(e) = init_result {
        let mut job = maintainer.job().clone();
        job.finished_at_ms = Some(clock.epoch_ms());
        job.is_failed = true;
        emit_event(&*sink, &clock, &mut job, EventType::JobInitError, e.to_string());
        finish(&cluster, &pool, &pool_key, &job.id).await;
        return;
    }

    loop {
        if maintainer.is_end() {
            break;
        }

        let job_id = maintainer.job().id.clone();
        let cancelled = cluster.lock().cancel.contains(&job_id);

        let result: Result<(), MaintainerError> = {
            let guard = shell.lock().await;
            if cancelled {
                maintainer.on_cancel(&guard).await
            } else {
                maintainer.maintain(&guard).await
            }
        };

        if let Err(e) = result {
            let mut job = maintainer.job().clone();
            emit_event(
                &*sink,
                &clock,
                &mut job,
                EventType::JobFailed,
                format!("maintainer error: {e}"),
            );
            break;
        }

        if maintainer.is_end() {
            break;
        }
        tokio::time::sleep(poll_period).await;
    }

    let job_id = maintainer.job().id.clone();
    finish(&cluster, &pool, &pool_key, &job_id).await;
}

/// Release `job_id`'s pool slot and remove it from its cluster's running
/// and cancel sets, decrementing `pool_count` under the same lock
/// acquisition (spec.md §4.F "decrement is the *only* signal... must be
/// atomic with respect to the admission loop").
async fn finish<S: RemoteShell + Default>(
    cluster: &Mutex<ClusterState>,
    pool: &ConnectionPool<S>,
    pool_key: &PoolKey,
    job_id: &JobId,
) {
    {
        let mut state = cluster.lock();
        state.running.remove(job_id);
        state.cancel.remove(job_id);
        state.pool_count = state.pool_count.saturating_sub(1);
    }
    pool.release(pool_key).await;
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
