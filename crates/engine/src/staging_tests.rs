// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sup_adapters::FakeGlobusAdapter;
use sup_core::hpc::GlobusConfig;
use sup_core::id::SequentialIdGen;
use sup_shell::FakeShell;
use sup_storage::{InMemoryCacheRepository, InMemoryFolderRepository};
use tempfile::TempDir;

fn hpc_config(root_path: &str) -> HpcConfig {
    HpcConfig {
        ip: "10.0.0.1".to_string(),
        port: 22,
        root_path: root_path.to_string(),
        job_pool_capacity: 4,
        is_community_account: true,
        community_login: Some("community".to_string()),
        globus: Some(GlobusConfig {
            endpoint: "dest-endpoint".to_string(),
            root_path: root_path.to_string(),
        }),
        slurm_input_rules: sup_core::slurm::DEFAULT_CEILING,
        slurm_global_cap: sup_core::slurm::DEFAULT_CEILING,
        mount: None,
    }
}

fn engine(
    tmp: &TempDir,
) -> FolderStagingEngine<FakeGlobusAdapter> {
    FolderStagingEngine::new(
        Arc::new(FakeGlobusAdapter::new()),
        Arc::new(InMemoryFolderRepository::default()),
        Arc::new(InMemoryCacheRepository::default()),
        tmp.path().join("git-mirrors"),
        tmp.path().join("local-work"),
    )
}

#[tokio::test]
async fn stage_empty_source_creates_remote_dir_without_upload() {
    let tmp = TempDir::new().expect("tmpdir");
    let eng = engine(&tmp);
    let shell = FakeShell::new();
    let mut shell_handle = shell.clone();
    shell_handle.connect(&fake_config()).await.expect("connect");

    let hpc = HpcId::new("expanse");
    let config = hpc_config("/scratch/sup");
    let ids = SequentialIdGen::new("folder");
    let user = UserId::new("alice");

    let folder = eng
        .stage(&shell, &FolderSource::Empty, &hpc, &config, &user, &ids)
        .await
        .expect("stage");

    assert_eq!(folder.hpc_path, "/scratch/sup/folder-1");
    assert!(shell
        .calls()
        .iter()
        .any(|c| matches!(c, sup_shell::ShellCall::Mkdir { path } if path == "/scratch/sup/folder-1")));
    assert!(!shell.calls().iter().any(|c| matches!(c, sup_shell::ShellCall::Upload { .. })));
}

#[tokio::test]
async fn stage_local_source_zips_uploads_unzips_and_cleans_up() {
    let tmp = TempDir::new().expect("tmpdir");
    let src_dir = tmp.path().join("my-exe");
    std::fs::create_dir_all(&src_dir).expect("mkdir src");
    std::fs::write(src_dir.join("run.sh"), "#!/bin/sh\necho hi\n").expect("write");

    let eng = engine(&tmp);
    let shell = FakeShell::new();
    let mut conn = shell.clone();
    conn.connect(&fake_config()).await.expect("connect");

    let hpc = HpcId::new("expanse");
    let config = hpc_config("/scratch/sup");
    let ids = SequentialIdGen::new("folder");
    let user = UserId::new("alice");

    let source = FolderSource::Local {
        path: src_dir.to_string_lossy().into_owned(),
    };

    let folder = eng
        .stage(&shell, &source, &hpc, &config, &user, &ids)
        .await
        .expect("stage");

    assert_eq!(folder.hpc_path, "/scratch/sup/folder-1");
    let calls = shell.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, sup_shell::ShellCall::Upload { remote, .. } if remote == "stage-upload.zip")));
    assert!(calls
        .iter()
        .any(|c| matches!(c, sup_shell::ShellCall::Unzip { dst, .. } if dst == "/scratch/sup/folder-1")));
    assert!(calls
        .iter()
        .any(|c| matches!(c, sup_shell::ShellCall::Rm { path } if path == "stage-upload.zip")));
}

#[tokio::test]
async fn cached_stage_on_empty_source_is_rejected() {
    let tmp = TempDir::new().expect("tmpdir");
    let eng = engine(&tmp);
    let shell = FakeShell::new();
    let mut conn = shell.clone();
    conn.connect(&fake_config()).await.expect("connect");

    let hpc = HpcId::new("expanse");
    let config = hpc_config("/scratch/sup");
    let ids = SequentialIdGen::new("folder");
    let user = UserId::new("alice");

    let result = eng
        .cached_stage(&shell, &FolderSource::Empty, &hpc, &config, &user, &ids)
        .await;

    assert!(matches!(result, Err(StagingError::NotCacheable(_))));
}

#[tokio::test]
async fn cached_stage_globus_bypasses_cache_machinery() {
    let tmp = TempDir::new().expect("tmpdir");
    let globus = Arc::new(FakeGlobusAdapter::new());
    let eng = FolderStagingEngine::new(
        globus.clone(),
        Arc::new(InMemoryFolderRepository::default()),
        Arc::new(InMemoryCacheRepository::default()),
        tmp.path().join("git-mirrors"),
        tmp.path().join("local-work"),
    );
    let shell = FakeShell::new();
    let mut conn = shell.clone();
    conn.connect(&fake_config()).await.expect("connect");

    let hpc = HpcId::new("expanse");
    let config = hpc_config("/scratch/sup");
    let ids = SequentialIdGen::new("folder");
    let user = UserId::new("alice");

    let source = FolderSource::Globus {
        endpoint: "src-endpoint".to_string(),
        path: "/data/set1".to_string(),
    };

    // FakeGlobusAdapter::init_transfer always seeds a fresh transfer as
    // Active and monitor_transfer takes a single, non-looping reading, so
    // this resolves to a "did not reach a terminal status" error without
    // any real polling delay -- exercising the Globus path is the point.
    let result = eng
        .cached_stage(&shell, &source, &hpc, &config, &user, &ids)
        .await;

    assert!(result.is_err());
    let calls = globus.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, sup_adapters::GlobusCall::InitTransfer { .. })));
    // No zip/unzip machinery was touched -- it went straight through the
    // Globus path, never the cache's shell unzip.
    assert!(!shell.calls().iter().any(|c| matches!(c, sup_shell::ShellCall::Unzip { .. })));
}

fn fake_config() -> sup_shell::SshConfig {
    sup_shell::SshConfig {
        host: "expanse.sdsc.edu".to_string(),
        port: 22,
        user: "community".to_string(),
        password: Some("pw".to_string()),
        private_key_path: None,
        connect_timeout_ms: 1_000,
    }
}
