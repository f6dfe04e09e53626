use super::*;
use std::collections::HashMap;
use sup_core::hpc::{HpcId, MaintainerKind};
use sup_core::job::JobConfig;
use sup_core::owner::UserId;

fn sample_job(id: &str, hpc: &str) -> Job {
    Job::new(
        JobConfig {
            id: JobId::new(id),
            user_id: UserId::new("u1"),
            hpc: HpcId::new(hpc),
            maintainer: MaintainerKind::PlainSlurm,
            credential_id: None,
            param: HashMap::new(),
            env: HashMap::new(),
            slurm: HashMap::new(),
            local_executable_folder: None,
            local_data_folder: None,
        },
        0,
    )
}

#[test]
fn job_repository_opens_empty_with_no_snapshot_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FileJobRepository::open(dir.path().join("jobs.json")).unwrap();
    let err = repo.get(&JobId::new("missing")).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn job_repository_round_trips_and_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.json");
    {
        let repo = FileJobRepository::open(&path).unwrap();
        repo.insert(sample_job("j1", "expanse")).unwrap();
        repo.insert(sample_job("j2", "anvil")).unwrap();
    }

    let reopened = FileJobRepository::open(&path).unwrap();
    let job = reopened.get(&JobId::new("j1")).unwrap();
    assert_eq!(job.id, JobId::new("j1"));
    assert_eq!(reopened.list_by_hpc(&HpcId::new("anvil")).unwrap().len(), 1);
}

#[test]
fn job_repository_update_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FileJobRepository::open(dir.path().join("jobs.json")).unwrap();
    let err = repo.update(sample_job("j1", "expanse")).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn folder_repository_mark_deleted_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folders.json");
    {
        let repo = FileFolderRepository::open(&path).unwrap();
        let folder = Folder::new(
            FolderId::new("f1"),
            HpcId::new("expanse"),
            UserId::new("u1"),
            "/scratch/u1/f1",
        );
        repo.insert(folder).unwrap();
        repo.mark_deleted(&FolderId::new("f1")).unwrap();
    }

    let reopened = FileFolderRepository::open(&path).unwrap();
    let folder = reopened.get(&FolderId::new("f1")).unwrap();
    assert!(folder.deleted);
}

#[test]
fn cache_repository_round_trips_through_vec_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let key = CacheKey {
        hpc: HpcId::new("expanse"),
        fingerprint: "abc123".to_string(),
    };
    let entry = CacheEntry::new(HpcId::new("expanse"), "/scratch/cache/abc123.zip", 1000);
    {
        let repo = FileCacheRepository::open(&path).unwrap();
        repo.upsert(key.clone(), entry.clone()).unwrap();
    }

    let reopened = FileCacheRepository::open(&path).unwrap();
    assert_eq!(reopened.get(&key).unwrap(), Some(entry));

    reopened.remove(&key).unwrap();
    assert!(reopened.get(&key).unwrap().is_none());

    let after_remove = FileCacheRepository::open(&path).unwrap();
    assert!(after_remove.get(&key).unwrap().is_none());
}

#[test]
fn event_and_log_repositories_append_and_persist_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let events_path = dir.path().join("events.json");
    let logs_path = dir.path().join("logs.json");
    let job_id = JobId::new("j1");

    {
        let events = FileEventRepository::open(&events_path).unwrap();
        events
            .append(Event::new(
                job_id.clone(),
                sup_core::event::EventType::JobQueued,
                "queued",
                10,
            ))
            .unwrap();
        let logs = FileLogRepository::open(&logs_path).unwrap();
        logs.append(Log::new(job_id.clone(), "hello", 5)).unwrap();
    }

    let events = FileEventRepository::open(&events_path).unwrap();
    assert_eq!(events.list_by_job(&job_id).unwrap().len(), 1);
    assert!(events
        .list_by_job(&JobId::new("other"))
        .unwrap()
        .is_empty());

    let logs = FileLogRepository::open(&logs_path).unwrap();
    assert_eq!(logs.list_by_job(&job_id).unwrap().len(), 1);
}
