// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;
use sup_adapters::FakeGlobusAdapter;
use sup_core::clock::FakeClock;
use sup_core::job::{JobConfig, JobId};
use sup_core::owner::UserId;
use sup_shell::{FakeShell, SshConfig};
use sup_storage::{
    EventRepository, InMemoryCacheRepository, InMemoryEventRepository, InMemoryFolderRepository,
    InMemoryJobRepository, InMemoryKeyValueStore, InMemoryLogRepository, JobRepository,
    LogRepository,
};
use tempfile::TempDir;

struct TestSink {
    events: Arc<dyn EventRepository>,
    logs: Arc<dyn LogRepository>,
    jobs: Arc<dyn JobRepository>,
}

impl EventSink for TestSink {
    fn events(&self) -> &Arc<dyn EventRepository> {
        &self.events
    }
    fn logs(&self) -> &Arc<dyn LogRepository> {
        &self.logs
    }
    fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }
}

fn hpc_config(root: &str) -> HpcConfig {
    HpcConfig {
        ip: "10.0.0.1".to_string(),
        port: 22,
        root_path: root.to_string(),
        job_pool_capacity: 4,
        is_community_account: true,
        community_login: Some("community".to_string()),
        globus: None,
        slurm_input_rules: sup_core::slurm::DEFAULT_CEILING,
        slurm_global_cap: sup_core::slurm::DEFAULT_CEILING,
        mount: None,
    }
}

fn new_deps(
    tmp: &TempDir,
    jobs: Arc<dyn JobRepository>,
) -> MaintainerDeps<FakeGlobusAdapter, FakeClock, sup_core::id::SequentialIdGen, TestSink> {
    MaintainerDeps {
        staging: Arc::new(FolderStagingEngine::new(
            Arc::new(FakeGlobusAdapter::new()),
            Arc::new(InMemoryFolderRepository::default()),
            Arc::new(InMemoryCacheRepository::default()),
            tmp.path().join("git-mirrors"),
            tmp.path().join("local-work"),
        )),
        sink: Arc::new(TestSink {
            events: Arc::new(InMemoryEventRepository::default()),
            logs: Arc::new(InMemoryLogRepository::default()),
            jobs,
        }),
        kv: Arc::new(InMemoryKeyValueStore::default()),
        clock: FakeClock::new(1_000),
        ids: sup_core::id::SequentialIdGen::new("folder"),
        hpc: HpcId::new("expanse"),
        hpc_config: hpc_config("/scratch/sup"),
        container: None,
        kernel: None,
        backoff: BackoffPolicy::DEFAULT,
    }
}

fn new_job(
    maintainer: MaintainerKind,
    exe: Option<FolderSource>,
    command: Option<&str>,
) -> Job {
    let mut param = HashMap::new();
    if let Some(cmd) = command {
        param.insert("command".to_string(), cmd.to_string());
    }
    Job::new(
        JobConfig {
            id: JobId::new("job-1"),
            user_id: UserId::new("alice"),
            hpc: HpcId::new("expanse"),
            maintainer,
            credential_id: None,
            param,
            env: HashMap::new(),
            slurm: HashMap::new(),
            local_executable_folder: exe,
            local_data_folder: None,
        },
        1_000,
    )
}

async fn connected_shell() -> FakeShell {
    let shell = FakeShell::new();
    let mut conn = shell.clone();
    conn.connect(&SshConfig {
        host: "expanse.sdsc.edu".to_string(),
        port: 22,
        user: "community".to_string(),
        password: Some("pw".to_string()),
        private_key_path: None,
        connect_timeout_ms: 1_000,
    })
    .await
    .expect("connect");
    shell
}

fn local_exe_dir(tmp: &TempDir) -> FolderSource {
    let dir = tmp.path().join("exe");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(dir.join("run.py"), "print('hi')\n").expect("write");
    FolderSource::Local {
        path: dir.to_string_lossy().into_owned(),
    }
}

#[tokio::test]
async fn plain_slurm_init_stages_and_submits() {
    let tmp = TempDir::new().expect("tmpdir");
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::default());
    let job = new_job(MaintainerKind::PlainSlurm, Some(local_exe_dir(&tmp)), Some("python run.py"));
    jobs.insert(job.clone()).expect("insert job");

    let deps = new_deps(&tmp, jobs.clone());
    let shell = connected_shell().await;
    shell.script_exec(
        "sbatch --parsable /scratch/sup/folder-2/job.sbatch",
        ExecResult {
            stdout: "987;expanse\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );

    let mut maintainer = PlainSlurmMaintainer::new(job, deps);
    Maintainer::<FakeShell>::init(&mut maintainer, &shell).await.expect("init");

    assert!(maintainer.is_init());
    assert!(maintainer.job_on_hpc());
    assert_eq!(maintainer.job().phase, sup_core::job::JobPhase::Submitted);
    assert_eq!(maintainer.job().remote_job_id.as_deref(), Some("987"));
    assert!(maintainer.job().remote_executable_folder.is_some());
    assert!(maintainer.job().remote_result_folder.is_some());

    let events = maintainer.deps.sink.events.list_by_job(&JobId::new("job-1")).expect("events");
    assert!(events.iter().any(|e| e.kind == EventType::SlurmUploadExecutable));
    assert!(events.iter().any(|e| e.kind == EventType::SlurmCreateResult));
    assert!(events.iter().any(|e| e.kind == EventType::JobInit));
}

#[tokio::test]
async fn plain_slurm_init_requires_command_param() {
    let tmp = TempDir::new().expect("tmpdir");
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::default());
    let job = new_job(MaintainerKind::PlainSlurm, Some(local_exe_dir(&tmp)), None);
    jobs.insert(job.clone()).expect("insert job");

    let deps = new_deps(&tmp, jobs);
    let shell = connected_shell().await;
    let mut maintainer = PlainSlurmMaintainer::new(job, deps);

    let result = Maintainer::<FakeShell>::init(&mut maintainer, &shell).await;
    assert!(matches!(result, Err(MaintainerError::Manifest(_))));
}

async fn submitted_plain_slurm_maintainer(
    tmp: &TempDir,
) -> (PlainSlurmMaintainer<FakeGlobusAdapter, FakeClock, sup_core::id::SequentialIdGen, TestSink>, FakeShell) {
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::default());
    let job = new_job(MaintainerKind::PlainSlurm, Some(local_exe_dir(tmp)), Some("python run.py"));
    jobs.insert(job.clone()).expect("insert job");

    let deps = new_deps(tmp, jobs);
    let shell = connected_shell().await;
    shell.script_exec(
        "sbatch --parsable /scratch/sup/folder-2/job.sbatch",
        ExecResult {
            stdout: "987;expanse\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );

    let mut maintainer = PlainSlurmMaintainer::new(job, deps);
    Maintainer::<FakeShell>::init(&mut maintainer, &shell).await.expect("init");
    (maintainer, shell)
}

#[tokio::test]
async fn maintain_collects_usage_and_listing_on_completion() {
    let tmp = TempDir::new().expect("tmpdir");
    let (mut maintainer, shell) = submitted_plain_slurm_maintainer(&tmp).await;

    shell.script_exec(
        "sacct -j 987 --format=State --noheader --parsable2 | head -n1",
        ExecResult {
            stdout: "CD\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );
    shell.script_exec(
        "sacct -j 987 --format=NNodes,NCPUS,CPUTimeRAW,ReqMem,MaxRSS,ElapsedRaw --noheader --parsable2 | head -n1",
        ExecResult {
            stdout: "2|8|120|10G|512000K|60\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );
    shell.script_exec(
        "ls -1 /scratch/sup/folder-2",
        ExecResult {
            stdout: "out.txt\nerr.txt\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );

    Maintainer::<FakeShell>::maintain(&mut maintainer, &shell).await.expect("maintain");

    assert!(maintainer.is_end());
    assert!(!maintainer.job_on_hpc());
    assert_eq!(maintainer.job().phase, sup_core::job::JobPhase::Ended);
    assert_eq!(maintainer.job().usage.nodes, 2);
    assert_eq!(maintainer.job().usage.cpus, 8);
    assert_eq!(maintainer.job().usage.cpu_time_secs, 120);
    assert_eq!(maintainer.job().usage.walltime_secs, 60);

    let published = maintainer
        .deps
        .kv
        .get("job_result_folder_content:job-1")
        .expect("kv get")
        .expect("present");
    assert_eq!(published["files"][0], "out.txt");

    let events = maintainer.deps.sink.events.list_by_job(&JobId::new("job-1")).expect("events");
    assert!(events.iter().any(|e| e.kind == EventType::JobEnded));
}

#[tokio::test]
async fn maintain_stays_open_while_running() {
    let tmp = TempDir::new().expect("tmpdir");
    let (mut maintainer, shell) = submitted_plain_slurm_maintainer(&tmp).await;

    shell.script_exec(
        "sacct -j 987 --format=State --noheader --parsable2 | head -n1",
        ExecResult {
            stdout: "R\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        },
    );

    Maintainer::<FakeShell>::maintain(&mut maintainer, &shell).await.expect("maintain");

    assert!(!maintainer.is_end());
    assert!(maintainer.job_on_hpc());
    assert_eq!(maintainer.job().phase, sup_core::job::JobPhase::Running);
}

#[tokio::test]
async fn on_cancel_issues_scancel_and_marks_failed() {
    let tmp = TempDir::new().expect("tmpdir");
    let (mut maintainer, shell) = submitted_plain_slurm_maintainer(&tmp).await;

    Maintainer::<FakeShell>::on_cancel(&mut maintainer, &shell).await.expect("on_cancel");

    assert!(maintainer.is_end());
    assert!(!maintainer.job_on_hpc());
    assert_eq!(maintainer.job().phase, sup_core::job::JobPhase::Failed);
    assert!(shell
        .calls()
        .iter()
        .any(|c| matches!(c, sup_shell::ShellCall::Exec { command } if command == "scancel 987")));

    let events = maintainer.deps.sink.events.list_by_job(&JobId::new("job-1")).expect("events");
    assert!(events.iter().any(|e| e.kind == EventType::JobFailed));
}

#[tokio::test]
async fn community_contribution_requires_git_source() {
    let tmp = TempDir::new().expect("tmpdir");
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::default());
    let job = new_job(
        MaintainerKind::CommunityContribution,
        Some(local_exe_dir(&tmp)),
        None,
    );
    jobs.insert(job.clone()).expect("insert job");

    let deps = new_deps(&tmp, jobs);
    let shell = connected_shell().await;
    let mut maintainer = CommunityContributionMaintainer::new(job, deps);

    let result = Maintainer::<FakeShell>::init(&mut maintainer, &shell).await;
    assert!(matches!(result, Err(MaintainerError::RequiresGitSource)));
}

#[test]
fn classify_status_recognizes_spec_strings() {
    assert!(matches!(classify_status("CD"), JobOutcome::Complete));
    assert!(matches!(classify_status("C"), JobOutcome::Complete));
    assert!(matches!(classify_status("unknown"), JobOutcome::Complete));
    assert!(matches!(classify_status("F"), JobOutcome::Failed));
    assert!(matches!(classify_status("NF"), JobOutcome::Failed));
    assert!(matches!(classify_status("ERROR"), JobOutcome::Failed));
    assert!(matches!(classify_status("RUNNING"), JobOutcome::Running));
    assert!(matches!(classify_status("PD"), JobOutcome::Running));
}

#[test]
fn parse_submitted_job_id_reads_parsable_output() {
    let ok = ExecResult {
        stdout: "4242;expanse\n".to_string(),
        stderr: String::new(),
        exit_code: 0,
    };
    assert_eq!(parse_submitted_job_id(&ok).expect("parsed"), "4242");

    let failed = ExecResult {
        stdout: String::new(),
        stderr: "error: Batch job submission failed".to_string(),
        exit_code: 1,
    };
    assert!(matches!(
        parse_submitted_job_id(&failed),
        Err(MaintainerError::SubmissionFailed(_))
    ));
}

#[test]
fn wrap_in_container_uses_cvmfs_bind_when_enabled() {
    let plain = ContainerConfig {
        image_path: "/images/app.sif".to_string(),
        cvmfs: false,
    };
    assert_eq!(
        wrap_in_container(&plain, "python run.py"),
        "singularity exec /images/app.sif python run.py"
    );

    let cvmfs = ContainerConfig {
        image_path: "/cvmfs/images/app.sif".to_string(),
        cvmfs: true,
    };
    assert_eq!(
        wrap_in_container(&cvmfs, "python run.py"),
        "singularity exec --bind /cvmfs /cvmfs/images/app.sif python run.py"
    );
}

#[test]
fn slurm_script_builder_renders_ceilings_env_and_commands() {
    let request = sup_core::slurm::SlurmRequest {
        nodes: 2,
        tasks: 4,
        cpus_per_task: 8,
        memory_per_cpu_bytes: 0,
        memory_total_bytes: 10 * 1024 * 1024 * 1024,
        gpus: 1,
        walltime_secs: 3_661,
    };
    let mut env = HashMap::new();
    env.insert("FOO".to_string(), "bar baz".to_string());
    let script = SlurmScriptBuilder::build(&request, None, &env, &["python run.py".to_string()]);

    assert!(script.contains("#SBATCH --nodes=2"));
    assert!(script.contains("#SBATCH --ntasks=4"));
    assert!(script.contains("#SBATCH --cpus-per-task=8"));
    assert!(script.contains("#SBATCH --gpus=1"));
    assert!(script.contains("#SBATCH --time=01:01:01"));
    assert!(script.contains("export FOO='bar baz'"));
    assert!(script.ends_with("python run.py\n"));
}
