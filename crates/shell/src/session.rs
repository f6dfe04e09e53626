// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `RemoteShell` trait: a stateful handle to one authenticated remote
//! account (spec.md §4.A).

use crate::error::ShellError;
use async_trait::async_trait;
use std::path::Path;

/// Connection parameters for one remote account. Password and key-based
/// auth are mutually exclusive; the adapter tries whichever is set.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub connect_timeout_ms: u64,
}

/// The outcome of a single remote command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A stateful handle to one authenticated remote account (spec.md §4.A).
///
/// No retry, pooling, or caching policy lives behind this trait — those
/// are layered on top by `sup-engine`. Implementations map every
/// underlying failure onto [`ShellError`] so callers can inspect
/// [`ShellError::is_recoverable`] uniformly regardless of transport.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Establish the underlying connection and authenticate.
    async fn connect(&mut self, config: &SshConfig) -> Result<(), ShellError>;

    /// Whether the session believes itself connected. Does not probe the
    /// transport; a stale connection can still report `true` until the
    /// next operation fails.
    fn is_connected(&self) -> bool;

    /// Run a command on the remote host and collect its full output.
    async fn exec(&self, command: &str) -> Result<ExecResult, ShellError>;

    /// Upload a local path to a remote path. `recursive` is required for
    /// directories; `follow_symlinks` controls whether symlinked children
    /// are dereferenced or skipped.
    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        recursive: bool,
        follow_symlinks: bool,
    ) -> Result<(), ShellError>;

    /// Create a remote directory, optionally creating parents.
    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), ShellError>;

    /// Test whether a remote path exists.
    async fn remote_exists(&self, path: &str) -> Result<bool, ShellError>;

    /// Remove a remote path (file or directory, recursively).
    async fn rm(&self, path: &str) -> Result<(), ShellError>;

    /// Zip a remote directory into a remote archive.
    async fn zip(&self, src_path: &str, dst_archive: &str) -> Result<(), ShellError>;

    /// Unzip a remote archive into a remote directory.
    async fn unzip(&self, src_archive: &str, dst_path: &str) -> Result<(), ShellError>;

    /// Tear down the connection. Implementations should make this
    /// idempotent; callers may invoke it on an already-disconnected shell
    /// during cleanup.
    async fn dispose(&mut self);
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
