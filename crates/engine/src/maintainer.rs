// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job maintainer state machine (spec.md §4.D).
//!
//! A maintainer owns exactly one job from admission to a terminal state:
//! it stages the job's folders, submits a templated `sbatch` script,
//! polls for completion, and collects results. `init`/`maintain`/
//! `on_cancel` are the three entry points the scheduler drives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use sup_adapters::GlobusAdapter;
use sup_core::clock::Clock;
use sup_core::event::EventType;
use sup_core::folder::{Folder, FolderSource};
use sup_core::hpc::{ContainerConfig, HpcConfig, HpcId, KernelConfig, MaintainerKind};
use sup_core::id::IdGen;
use sup_core::job::{Job, JobPhase, UsageCounters};
use sup_core::slurm::SlurmValidationError;
use sup_shell::{with_backoff, BackoffPolicy, ExecResult, RemoteShell, ShellError};
use sup_storage::KeyValueStore;
use thiserror::Error;

use crate::event_emitter::{emit_event, emit_log, EventSink};
use crate::local_ops;
use crate::slurm_validator;
use crate::staging::{FolderStagingEngine, StagingError};

#[derive(Debug, Error)]
pub enum MaintainerError {
    #[error("shell error: {0}")]
    Shell(#[from] ShellError),
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
    #[error("slurm validation error: {0}")]
    SlurmValidation(#[from] SlurmValidationError),
    #[error("community contribution maintainer requires a Git executable source")]
    RequiresGitSource,
    #[error("cluster has no container configuration for a community contribution job")]
    MissingContainerConfig,
    #[error("executable manifest error: {0}")]
    Manifest(String),
    #[error("sbatch submission failed: {0}")]
    SubmissionFailed(String),
    #[error("maintain() called before a successful init()")]
    NotSubmitted,
}

/// A per-job descriptor bundled in a community contribution's Git source
/// (GLOSSARY "Executable manifest"): the container to run under and the
/// pre/execution/post command stages.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExecutableManifest {
    #[serde(default)]
    pub pre: Vec<String>,
    #[serde(default)]
    pub execution: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
    #[serde(default)]
    pub default_result_file: Option<String>,
}

impl ExecutableManifest {
    const FILE_NAME: &'static str = "manifest.toml";

    async fn load_from(dir: &std::path::Path) -> Result<Self, MaintainerError> {
        let path = dir.join(Self::FILE_NAME);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MaintainerError::Manifest(format!("{}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| MaintainerError::Manifest(format!("{}: {e}", path.display())))
    }
}

/// Templates an `sbatch` submission script. Shared by both maintainer
/// variants so resource-limit lines and quoting rules live in one place.
pub struct SlurmScriptBuilder;

impl SlurmScriptBuilder {
    pub fn build(
        request: &sup_core::slurm::SlurmRequest,
        kernel: Option<&KernelConfig>,
        env: &HashMap<String, String>,
        command_lines: &[String],
    ) -> String {
        let mut script = String::from("#!/bin/bash\n");
        script.push_str(&format!("#SBATCH --nodes={}\n", request.nodes.max(1)));
        script.push_str(&format!("#SBATCH --ntasks={}\n", request.tasks.max(1)));
        script.push_str(&format!(
            "#SBATCH --cpus-per-task={}\n",
            request.cpus_per_task.max(1)
        ));
        if request.memory_per_cpu_bytes > 0 {
            script.push_str(&format!(
                "#SBATCH --mem-per-cpu={}M\n",
                bytes_to_mb(request.memory_per_cpu_bytes)
            ));
        }
        if request.memory_total_bytes > 0 {
            script.push_str(&format!(
                "#SBATCH --mem={}M\n",
                bytes_to_mb(request.memory_total_bytes)
            ));
        }
        if request.gpus > 0 {
            script.push_str(&format!("#SBATCH --gpus={}\n", request.gpus));
        }
        if request.walltime_secs > 0 {
            script.push_str(&format!(
                "#SBATCH --time={}\n",
                secs_to_walltime(request.walltime_secs)
            ));
        }
        script.push('\n');

        if let Some(kernel) = kernel {
            for line in &kernel.init_lines {
                script.push_str(line);
                script.push('\n');
            }
            if !kernel.init_lines.is_empty() {
                script.push('\n');
            }
        }

        for (key, value) in env {
            script.push_str(&format!("export {key}={}\n", shell_quote(value)));
        }
        if !env.is_empty() {
            script.push('\n');
        }

        for line in command_lines {
            script.push_str(line);
            script.push('\n');
        }
        script
    }
}

fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes / (1024 * 1024)).max(1)
}

fn secs_to_walltime(secs: u64) -> String {
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let hours = rem / 3_600;
    let minutes = (rem % 3_600) / 60;
    let seconds = rem % 60;
    if days > 0 {
        format!("{days}-{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn wrap_in_container(container: &ContainerConfig, command: &str) -> String {
    if container.cvmfs {
        format!(
            "singularity exec --bind /cvmfs {} {command}",
            container.image_path
        )
    } else {
        format!("singularity exec {} {command}", container.image_path)
    }
}

/// Everything a maintainer needs beyond the job it owns: the shared
/// staging engine, the event sink, the clock/id-gen pair, the cluster's
/// configuration, and the backoff policy wrapping each remote call.
///
/// `Clone` so the scheduler can hand an independent copy to every worker
/// it spawns on a cluster; all fields are either `Arc`, `Copy`, or cheap
/// value types, so cloning is just refcount bumps plus a couple of
/// small struct copies.
#[derive(Clone)]
pub struct MaintainerDeps<G, C, I, Snk>
where
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    pub staging: Arc<FolderStagingEngine<G>>,
    pub sink: Arc<Snk>,
    pub kv: Arc<dyn KeyValueStore>,
    pub clock: C,
    pub ids: I,
    pub hpc: HpcId,
    pub hpc_config: HpcConfig,
    pub container: Option<ContainerConfig>,
    pub kernel: Option<KernelConfig>,
    pub backoff: BackoffPolicy,
}

/// The §4.D contract the scheduler drives every job through. Generic
/// over the shell type so production code and tests share one trait
/// while using `SshShell`/`FakeShell` respectively.
#[async_trait]
pub trait Maintainer<S: RemoteShell>: Send {
    /// Stage folders and submit the job. Idempotent: a second call after
    /// a successful first is a no-op.
    async fn init(&mut self, shell: &S) -> Result<(), MaintainerError>;

    /// Poll the remote job's status, collecting results and emitting the
    /// terminal event on completion or failure. A no-op once ended.
    async fn maintain(&mut self, shell: &S) -> Result<(), MaintainerError>;

    /// Best-effort `scancel` of the remote job, then mark the job ended.
    async fn on_cancel(&mut self, shell: &S) -> Result<(), MaintainerError>;

    /// Dynamic maintainer dispatch's pause/resume hooks (spec.md §9): no
    /// behavior is specified beyond the contract shape, so both are
    /// no-ops here.
    fn on_pause(&mut self) {}
    fn on_resume(&mut self) {}

    fn is_init(&self) -> bool;
    fn is_end(&self) -> bool;
    fn job_on_hpc(&self) -> bool;
    fn job(&self) -> &Job;
}

enum JobOutcome {
    Running,
    Complete,
    Failed,
}

fn classify_status(status: &str) -> JobOutcome {
    match status.trim().to_ascii_uppercase().as_str() {
        "C" | "CD" | "UNKNOWN" => JobOutcome::Complete,
        "F" | "NF" | "ERROR" => JobOutcome::Failed,
        _ => JobOutcome::Running,
    }
}

/// Stage the executable (cached), optional data (uncached), and a fresh
/// result folder, then submit `command_lines` as an `sbatch` script.
/// Returns the staged result folder so the caller can remember its path.
async fn stage_and_submit<S, G, C, I, Snk>(
    job: &mut Job,
    deps: &MaintainerDeps<G, C, I, Snk>,
    shell: &S,
    command_lines: Vec<String>,
    env: HashMap<String, String>,
) -> Result<Folder, MaintainerError>
where
    S: RemoteShell,
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    let user_id = job.user_id.clone();

    let exe_source = job
        .local_executable_folder
        .clone()
        .ok_or(MaintainerError::RequiresGitSource)?;
    let exe_folder = deps
        .staging
        .cached_stage(
            shell,
            &exe_source,
            &deps.hpc,
            &deps.hpc_config,
            &user_id,
            &deps.ids,
            &deps.clock,
        )
        .await?;
    job.remote_executable_folder = Some(exe_folder.id.clone());
    emit_event(
        &*deps.sink,
        &deps.clock,
        job,
        EventType::SlurmUploadExecutable,
        format!("staged executable at {}", exe_folder.hpc_path),
    );

    if let Some(source) = job.local_data_folder.clone() {
        let data_folder = deps
            .staging
            .stage(shell, &source, &deps.hpc, &deps.hpc_config, &user_id, &deps.ids)
            .await?;
        job.remote_data_folder = Some(data_folder.id.clone());
        emit_event(
            &*deps.sink,
            &deps.clock,
            job,
            EventType::SlurmUploadData,
            format!("staged data at {}", data_folder.hpc_path),
        );
    }

    let result_folder = deps
        .staging
        .stage(
            shell,
            &FolderSource::Empty,
            &deps.hpc,
            &deps.hpc_config,
            &user_id,
            &deps.ids,
        )
        .await?;
    job.remote_result_folder = Some(result_folder.id.clone());
    emit_event(
        &*deps.sink,
        &deps.clock,
        job,
        EventType::SlurmCreateResult,
        format!("created result folder at {}", result_folder.hpc_path),
    );

    let request = slurm_validator::validate_job_request(&job.slurm, &deps.hpc_config)?;
    let script = SlurmScriptBuilder::build(&request, deps.kernel.as_ref(), &env, &command_lines);
    let script_path = format!("{}/job.sbatch", result_folder.hpc_path);

    let local_script = std::env::temp_dir().join(format!("{}-job.sbatch", job.id.as_str()));
    tokio::fs::write(&local_script, &script)
        .await
        .map_err(ShellError::from)?;
    let upload_result = shell.upload(&local_script, &script_path, false, false).await;
    tokio::fs::remove_file(&local_script).await.ok();
    upload_result?;

    let submit_cmd = format!("sbatch --parsable {script_path}");
    let output = with_backoff(deps.backoff, || shell.exec(&submit_cmd)).await?;
    let remote_job_id = parse_submitted_job_id(&output)?;

    job.remote_job_id = Some(remote_job_id);
    job.job_on_hpc = true;
    job.is_init = true;

    Ok(result_folder)
}

fn parse_submitted_job_id(output: &ExecResult) -> Result<String, MaintainerError> {
    if !output.success() {
        return Err(MaintainerError::SubmissionFailed(output.stderr.clone()));
    }
    let first_line = output.stdout.lines().next().unwrap_or("").trim();
    let job_id = first_line.split(';').next().unwrap_or("").trim();
    if job_id.is_empty() {
        return Err(MaintainerError::SubmissionFailed(format!(
            "could not parse a job id out of sbatch output: {:?}",
            output.stdout
        )));
    }
    Ok(job_id.to_string())
}

/// Poll `remote_job_id`'s accounting state and, on a terminal status,
/// collect its usage counters and result listing. Returns whether the
/// job reached a terminal state this call.
async fn poll_and_collect<S, G, C, I, Snk>(
    job: &mut Job,
    deps: &MaintainerDeps<G, C, I, Snk>,
    shell: &S,
    result_path: Option<&str>,
) -> Result<bool, MaintainerError>
where
    S: RemoteShell,
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    let remote_job_id = job.remote_job_id.clone().ok_or(MaintainerError::NotSubmitted)?;

    let status_cmd = format!(
        "sacct -j {remote_job_id} --format=State --noheader --parsable2 | head -n1"
    );
    let output = with_backoff(deps.backoff, || shell.exec(&status_cmd)).await?;
    let status = output.stdout.trim().to_string();
    emit_log(&*deps.sink, &deps.clock, job, format!("slurm job {remote_job_id} status={status}"));

    match classify_status(&status) {
        JobOutcome::Running => {
            job.phase = JobPhase::Running;
            Ok(false)
        }
        JobOutcome::Complete => {
            job.phase = JobPhase::Collecting;
            job.usage = collect_usage(shell, deps.backoff, &remote_job_id).await?;
            if let Some(path) = result_path {
                collect_result_listing(job, deps, shell, path).await?;
            }
            job.job_on_hpc = false;
            emit_event(
                &*deps.sink,
                &deps.clock,
                job,
                EventType::JobEnded,
                format!("slurm job {remote_job_id} completed ({status})"),
            );
            Ok(true)
        }
        JobOutcome::Failed => {
            job.job_on_hpc = false;
            emit_event(
                &*deps.sink,
                &deps.clock,
                job,
                EventType::JobFailed,
                format!("slurm job {remote_job_id} failed ({status})"),
            );
            Ok(true)
        }
    }
}

async fn collect_usage<S: RemoteShell>(
    shell: &S,
    backoff: BackoffPolicy,
    remote_job_id: &str,
) -> Result<UsageCounters, MaintainerError> {
    let cmd = format!(
        "sacct -j {remote_job_id} --format=NNodes,NCPUS,CPUTimeRAW,ReqMem,MaxRSS,ElapsedRaw \
         --noheader --parsable2 | head -n1"
    );
    let output = with_backoff(backoff, || shell.exec(&cmd)).await?;
    Ok(parse_usage_line(output.stdout.trim()))
}

fn parse_usage_line(line: &str) -> UsageCounters {
    let mut fields = line.split('|');
    let nodes = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let cpus = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let cpu_time_secs = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let memory_bytes = fields
        .next()
        .and_then(|f| sup_core::slurm::parse_storage(f).ok())
        .unwrap_or(0);
    let memory_usage_bytes = fields
        .next()
        .and_then(|f| sup_core::slurm::parse_storage(f).ok())
        .unwrap_or(0);
    let walltime_secs = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    UsageCounters {
        nodes,
        cpus,
        cpu_time_secs,
        memory_bytes,
        memory_usage_bytes,
        walltime_secs,
    }
}

async fn collect_result_listing<S, G, C, I, Snk>(
    job: &Job,
    deps: &MaintainerDeps<G, C, I, Snk>,
    shell: &S,
    result_path: &str,
) -> Result<(), MaintainerError>
where
    S: RemoteShell,
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    let listing = with_backoff(deps.backoff, || shell.exec(&format!("ls -1 {result_path}"))).await?;
    let files: Vec<&str> = listing
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let key = format!("job_result_folder_content:{}", job.id);
    if let Err(e) = deps.kv.set(&key, serde_json::json!({ "files": files })) {
        tracing::warn!(job_id = %job.id, error = %e, "failed to publish result folder listing (best-effort)");
    }
    Ok(())
}

async fn cancel_remote<S: RemoteShell>(
    shell: &S,
    backoff: BackoffPolicy,
    remote_job_id: &str,
) -> Result<(), ShellError> {
    with_backoff(backoff, || shell.exec(&format!("scancel {remote_job_id}"))).await?;
    Ok(())
}

/// Unwrapped command, bare Slurm submission, no container (spec.md §4.D
/// "Variants").
pub struct PlainSlurmMaintainer<G, C, I, Snk>
where
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    job: Job,
    deps: MaintainerDeps<G, C, I, Snk>,
    result_path: Option<String>,
    ended: bool,
}

impl<G, C, I, Snk> PlainSlurmMaintainer<G, C, I, Snk>
where
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    pub fn new(job: Job, deps: MaintainerDeps<G, C, I, Snk>) -> Self {
        Self {
            job,
            deps,
            result_path: None,
            ended: false,
        }
    }
}

#[async_trait]
impl<S, G, C, I, Snk> Maintainer<S> for PlainSlurmMaintainer<G, C, I, Snk>
where
    S: RemoteShell,
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    async fn init(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.job.is_init {
            return Ok(());
        }
        let command = self
            .job
            .param
            .get("command")
            .cloned()
            .ok_or_else(|| MaintainerError::Manifest("job param \"command\" is required".to_string()))?;
        let env = self.job.env.clone();
        let result_folder =
            stage_and_submit(&mut self.job, &self.deps, shell, vec![command], env).await?;
        self.result_path = Some(result_folder.hpc_path.clone());
        emit_event(
            &*self.deps.sink,
            &self.deps.clock,
            &mut self.job,
            EventType::JobInit,
            "plain slurm job submitted",
        );
        Ok(())
    }

    async fn maintain(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.ended {
            return Ok(());
        }
        let terminal = poll_and_collect(&mut self.job, &self.deps, shell, self.result_path.as_deref())
            .await?;
        self.ended = terminal;
        Ok(())
    }

    async fn on_cancel(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.ended {
            return Ok(());
        }
        self.job.phase = JobPhase::Cancelling;
        if let Some(remote_job_id) = self.job.remote_job_id.clone() {
            cancel_remote(shell, self.deps.backoff, &remote_job_id).await.ok();
        }
        self.job.job_on_hpc = false;
        emit_event(
            &*self.deps.sink,
            &self.deps.clock,
            &mut self.job,
            EventType::JobFailed,
            "cancelled",
        );
        self.ended = true;
        Ok(())
    }

    fn is_init(&self) -> bool {
        self.job.is_init
    }

    fn is_end(&self) -> bool {
        self.ended
    }

    fn job_on_hpc(&self) -> bool {
        self.job.job_on_hpc
    }

    fn job(&self) -> &Job {
        &self.job
    }
}

/// Git source, Singularity-wrapped, executable-manifest driven (spec.md
/// §4.D "Variants").
pub struct CommunityContributionMaintainer<G, C, I, Snk>
where
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    job: Job,
    deps: MaintainerDeps<G, C, I, Snk>,
    result_path: Option<String>,
    ended: bool,
}

impl<G, C, I, Snk> CommunityContributionMaintainer<G, C, I, Snk>
where
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    pub fn new(job: Job, deps: MaintainerDeps<G, C, I, Snk>) -> Self {
        Self {
            job,
            deps,
            result_path: None,
            ended: false,
        }
    }
}

#[async_trait]
impl<S, G, C, I, Snk> Maintainer<S> for CommunityContributionMaintainer<G, C, I, Snk>
where
    S: RemoteShell,
    G: GlobusAdapter,
    C: Clock,
    I: IdGen,
    Snk: EventSink,
{
    async fn init(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.job.is_init {
            return Ok(());
        }
        let git_id = match &self.job.local_executable_folder {
            Some(FolderSource::Git { git_id }) => git_id.clone(),
            _ => return Err(MaintainerError::RequiresGitSource),
        };

        let mirror = self.deps.staging.git_mirror_path(&git_id);
        local_ops::sync_git_mirror(&git_id, &mirror)
            .await
            .map_err(MaintainerError::Manifest)?;
        let manifest = ExecutableManifest::load_from(&mirror).await?;

        let container = self
            .deps
            .container
            .as_ref()
            .ok_or(MaintainerError::MissingContainerConfig)?;

        let mut command_lines = Vec::with_capacity(
            manifest.pre.len() + manifest.execution.len() + manifest.post.len(),
        );
        command_lines.extend(manifest.pre.iter().cloned());
        command_lines.extend(
            manifest
                .execution
                .iter()
                .map(|cmd| wrap_in_container(container, cmd)),
        );
        command_lines.extend(manifest.post.iter().cloned());

        let env = self.job.env.clone();
        let result_folder =
            stage_and_submit(&mut self.job, &self.deps, shell, command_lines, env).await?;
        self.result_path = Some(result_folder.hpc_path.clone());
        emit_event(
            &*self.deps.sink,
            &self.deps.clock,
            &mut self.job,
            EventType::JobInit,
            "community contribution job submitted",
        );
        Ok(())
    }

    async fn maintain(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.ended {
            return Ok(());
        }
        let terminal = poll_and_collect(&mut self.job, &self.deps, shell, self.result_path.as_deref())
            .await?;
        self.ended = terminal;
        Ok(())
    }

    async fn on_cancel(&mut self, shell: &S) -> Result<(), MaintainerError> {
        if self.ended {
            return Ok(());
        }
        self.job.phase = JobPhase::Cancelling;
        if let Some(remote_job_id) = self.job.remote_job_id.clone() {
            cancel_remote(shell, self.deps.backoff, &remote_job_id).await.ok();
        }
        self.job.job_on_hpc = false;
        emit_event(
            &*self.deps.sink,
            &self.deps.clock,
            &mut self.job,
            EventType::JobFailed,
            "cancelled",
        );
        self.ended = true;
        Ok(())
    }

    fn is_init(&self) -> bool {
        self.job.is_init
    }

    fn is_end(&self) -> bool {
        self.ended
    }

    fn job_on_hpc(&self) -> bool {
        self.job.job_on_hpc
    }

    fn job(&self) -> &Job {
        &self.job
    }
}

/// Builds the `MaintainerKind`-appropriate variant for a job (the REDESIGN
/// FLAG in spec.md §9 replacing a dynamic plugin load with a static match).
pub struct MaintainerRegistry;

impl MaintainerRegistry {
    pub fn build<S, G, C, I, Snk>(
        job: Job,
        deps: MaintainerDeps<G, C, I, Snk>,
    ) -> Box<dyn Maintainer<S> + Send>
    where
        S: RemoteShell + 'static,
        G: GlobusAdapter + 'static,
        C: Clock + 'static,
        I: IdGen + 'static,
        Snk: EventSink + 'static,
    {
        match job.maintainer {
            MaintainerKind::CommunityContribution => {
                Box::new(CommunityContributionMaintainer::new(job, deps))
            }
            MaintainerKind::PlainSlurm => Box::new(PlainSlurmMaintainer::new(job, deps)),
        }
    }
}

#[cfg(test)]
#[path = "maintainer_tests.rs"]
mod tests;
