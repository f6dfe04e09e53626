// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-host subprocess helpers backing the staging engine's Git and
//! Local source handling (spec.md §4.C: "the staging engine itself
//! performs `git pull` into a local mirror path").

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for `git clone`/`git pull` against a registered repository.
pub const GIT_SYNC_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for zipping a local directory before upload.
pub const LOCAL_ZIP_TIMEOUT: Duration = Duration::from_secs(60);

/// Clone `mirror_path` from `git_id` if absent, otherwise pull it.
/// `git_id` is treated as a fetchable URL or local path, per the
/// registered-repository model (spec.md §6 `gits` table).
pub async fn sync_git_mirror(git_id: &str, mirror_path: &Path) -> Result<(), String> {
    if mirror_path.join(".git").exists() {
        let cmd = Command::new("git")
            .arg("-C")
            .arg(mirror_path)
            .arg("pull")
            .arg("--ff-only")
            .output();
        run(cmd, GIT_SYNC_TIMEOUT, "git pull").await
    } else {
        if let Some(parent) = mirror_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create mirror parent dir: {e}"))?;
        }
        let cmd = Command::new("git")
            .arg("clone")
            .arg(git_id)
            .arg(mirror_path)
            .output();
        run(cmd, GIT_SYNC_TIMEOUT, "git clone").await
    }
}

/// The mtime of the mirror's last commit, in epoch milliseconds — the
/// authoritative upstream timestamp for Git cache staleness (spec.md
/// §4.C rule 2).
pub async fn last_commit_epoch_ms(mirror_path: &Path) -> Result<u64, String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(mirror_path)
        .arg("log")
        .arg("-1")
        .arg("--format=%ct")
        .output()
        .await
        .map_err(|e| format!("git log failed: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "git log exited nonzero: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let secs: u64 = String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .map_err(|e| format!("unparseable commit timestamp: {e}"))?;
    Ok(secs * 1000)
}

/// Zip `src_dir` into `dst_zip` on the local filesystem.
pub async fn zip_local_dir(src_dir: &Path, dst_zip: &Path) -> Result<(), String> {
    let src_name = src_dir
        .file_name()
        .ok_or_else(|| format!("{} has no file name component", src_dir.display()))?;
    let parent = src_dir
        .parent()
        .ok_or_else(|| format!("{} has no parent directory", src_dir.display()))?;

    let cmd = Command::new("zip")
        .current_dir(parent)
        .arg("-r")
        .arg(dst_zip)
        .arg(src_name)
        .output();
    run(cmd, LOCAL_ZIP_TIMEOUT, "local zip").await
}

async fn run(
    cmd: impl std::future::Future<Output = std::io::Result<std::process::Output>>,
    timeout: Duration,
    description: &str,
) -> Result<(), String> {
    let output = match tokio::time::timeout(timeout, cmd).await {
        Ok(Ok(output)) => output,
        Ok(Err(io_err)) => return Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => return Err(format!("{description} timed out after {}s", timeout.as_secs())),
    };
    if !output.status.success() {
        return Err(format!(
            "{description} exited nonzero: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "local_ops_tests.rs"]
mod tests;
