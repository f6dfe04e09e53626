use super::*;
use std::process::Stdio;
use tokio::process::Command;

async fn init_repo(dir: &Path) {
    let status = Command::new("git")
        .arg("init")
        .arg("-q")
        .arg(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .unwrap();
    assert!(status.success());

    tokio::fs::write(dir.join("README.md"), b"hello").await.unwrap();

    for args in [
        vec!["-C", dir.to_str().unwrap(), "config", "user.email", "bot@example.com"],
        vec!["-C", dir.to_str().unwrap(), "config", "user.name", "bot"],
        vec!["-C", dir.to_str().unwrap(), "add", "."],
        vec!["-C", dir.to_str().unwrap(), "commit", "-q", "-m", "init"],
    ] {
        let status = Command::new("git").args(&args).status().await.unwrap();
        assert!(status.success());
    }
}

#[tokio::test]
async fn sync_git_mirror_clones_when_absent_then_pulls_when_present() {
    let tmp = tempfile::tempdir().unwrap();
    let upstream = tmp.path().join("upstream");
    tokio::fs::create_dir_all(&upstream).await.unwrap();
    init_repo(&upstream).await;

    let mirror = tmp.path().join("mirror");
    sync_git_mirror(upstream.to_str().unwrap(), &mirror).await.unwrap();
    assert!(mirror.join("README.md").exists());

    // second call takes the pull branch since .git now exists
    sync_git_mirror(upstream.to_str().unwrap(), &mirror).await.unwrap();
}

#[tokio::test]
async fn last_commit_epoch_ms_reads_head_commit_time() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    tokio::fs::create_dir_all(&repo).await.unwrap();
    init_repo(&repo).await;

    let epoch_ms = last_commit_epoch_ms(&repo).await.unwrap();
    assert!(epoch_ms > 0);
}

#[tokio::test]
async fn zip_local_dir_produces_a_zip_file() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("payload");
    tokio::fs::create_dir_all(&src).await.unwrap();
    tokio::fs::write(src.join("a.txt"), b"data").await.unwrap();

    let dst = tmp.path().join("payload.zip");
    zip_local_dir(&src, &dst).await.unwrap();
    assert!(dst.exists());
}

#[tokio::test]
async fn sync_git_mirror_reports_error_for_unfetchable_source() {
    let tmp = tempfile::tempdir().unwrap();
    let mirror = tmp.path().join("mirror");
    let result = sync_git_mirror("/nonexistent/upstream/path", &mirror).await;
    assert!(result.is_err());
}
