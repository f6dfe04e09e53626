// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sup`: a thin one-shot CLI over the supervisor's job-submission
//! boundary (spec.md §6 `pushJobToQueue`/`cancelJob`/`destroy`).
//!
//! There is no HTTP surface in this workspace (spec.md §1 treats that
//! layer as external); `sup` stands in for it by building the same
//! [`sup_daemon::Wiring`] a running `supd` uses, against the same
//! `state_dir`, and performing one operation before exiting.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use sup_core::clock::{Clock, SystemClock};
use sup_core::credential::CredentialId;
use sup_core::folder::FolderSource;
use sup_core::hpc::{HpcId, MaintainerKind};
use sup_core::id::{IdGen, UuidIdGen};
use sup_core::job::{Job, JobConfig, JobId};
use sup_core::owner::UserId;
use sup_daemon::Config;
use sup_storage::JobRepository;

#[derive(Parser)]
#[command(name = "sup", about = "Submit, inspect, and cancel supervised HPC jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a job and enqueue it on its cluster's admission queue.
    Submit {
        #[arg(long)]
        hpc: String,
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        maintainer: MaintainerArg,
        /// Local directory or `git:<id>` to stage as the executable folder.
        #[arg(long)]
        executable: Option<String>,
        /// Local directory or `git:<id>` to stage as the data folder.
        #[arg(long)]
        data: Option<String>,
        /// Secret-store credential id, required on private-account clusters.
        #[arg(long)]
        credential_id: Option<String>,
        /// Repeatable `key=value` job parameter.
        #[arg(long = "param", value_parser = parse_kv)]
        params: Vec<(String, String)>,
        /// Repeatable `key=value` environment variable.
        #[arg(long = "env", value_parser = parse_kv)]
        env: Vec<(String, String)>,
        /// Repeatable `key=value` Slurm resource request
        /// (`nodes`, `tasks`, `cpus_per_task`, `memory_per_cpu`,
        /// `memory_total`, `gpus`, `walltime`).
        #[arg(long = "slurm", value_parser = parse_kv)]
        slurm: Vec<(String, String)>,
    },
    /// Print a job's current phase, timestamps, and usage counters.
    Status {
        #[arg(long)]
        job_id: String,
    },
    /// Request cancellation of a running job. A no-op if the job is still
    /// queued or already terminal (spec.md §9).
    Cancel {
        #[arg(long)]
        job_id: String,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum MaintainerArg {
    PlainSlurm,
    CommunityContribution,
}

impl From<MaintainerArg> for MaintainerKind {
    fn from(value: MaintainerArg) -> Self {
        match value {
            MaintainerArg::PlainSlurm => MaintainerKind::PlainSlurm,
            MaintainerArg::CommunityContribution => MaintainerKind::CommunityContribution,
        }
    }
}

fn parse_kv(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

/// `--executable git:foo` stages a registered Git mirror; any other value
/// is treated as a local directory path.
fn parse_folder_source(raw: &str) -> FolderSource {
    match raw.strip_prefix("git:") {
        Some(git_id) => FolderSource::Git {
            git_id: git_id.to_string(),
        },
        None => FolderSource::Local {
            path: raw.to_string(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let wiring = sup_daemon::build(&config).context("wiring supervisor")?;

    match cli.command {
        Command::Submit {
            hpc,
            user,
            maintainer,
            executable,
            data,
            credential_id,
            params,
            env,
            slurm,
        } => {
            let ids = UuidIdGen;
            let clock = SystemClock;
            let job = Job::new(
                JobConfig {
                    id: JobId::new(ids.next()),
                    user_id: UserId::new(user),
                    hpc: HpcId::new(hpc),
                    maintainer: maintainer.into(),
                    credential_id: credential_id.map(CredentialId::new),
                    param: params.into_iter().collect::<HashMap<_, _>>(),
                    env: env.into_iter().collect::<HashMap<_, _>>(),
                    slurm: slurm.into_iter().collect::<HashMap<_, _>>(),
                    local_executable_folder: executable.as_deref().map(parse_folder_source),
                    local_data_folder: data.as_deref().map(parse_folder_source),
                },
                clock.epoch_ms(),
            );

            let job_id = job.id.clone();
            wiring.jobs.insert(job.clone()).context("persisting job record")?;
            wiring
                .supervisor
                .push_job_to_queue(job)
                .context("enqueuing job")?;
            println!("{job_id}");
        }
        Command::Status { job_id } => {
            let job = wiring
                .jobs
                .get(&JobId::new(job_id))
                .context("looking up job")?;
            println!("id:       {}", job.id);
            println!("phase:    {}", job.phase);
            println!("hpc:      {}", job.hpc);
            println!("failed:   {}", job.is_failed);
            println!("created:  {}", job.created_at_ms);
            if let Some(queued) = job.queued_at_ms {
                println!("queued:   {queued}");
            }
            if let Some(finished) = job.finished_at_ms {
                println!("finished: {finished}");
            }
        }
        Command::Cancel { job_id } => {
            let job_id = JobId::new(job_id);
            match wiring.supervisor.cancel_job(&job_id) {
                Some(job) => println!("cancellation requested for {}", job.id),
                None => bail!("job {job_id} is not currently running on any configured cluster"),
            }
        }
    }

    Ok(())
}
