// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH-backed [`RemoteShell`] (spec.md §4.A).

use crate::error::ShellError;
use crate::session::{ExecResult, RemoteShell, SshConfig};
use async_ssh2_tokio::client::{AuthMethod, Client, ServerCheckMethod};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// A [`RemoteShell`] backed by a single `async_ssh2_tokio` client.
///
/// Not `Clone`: one `SshShell` owns one network connection. `sup-engine`'s
/// connection pool (spec.md §4.B) holds many of these behind a keyed map.
pub struct SshShell {
    client: Option<Client>,
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SshShell {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> Result<&Client, ShellError> {
        self.client.as_ref().ok_or(ShellError::NotConnected)
    }

    /// Run a command and fail on nonzero exit, folding stderr into the
    /// error message. Used for plumbing operations (`mkdir`, `rm`, ...)
    /// where the caller only needs success or failure.
    async fn run_checked(&self, command: &str) -> Result<ExecResult, ShellError> {
        let result = self.exec(command).await?;
        if !result.success() {
            return Err(ShellError::Protocol(format!(
                "command `{command}` exited {}: {}",
                result.exit_code, result.stderr
            )));
        }
        Ok(result)
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(&mut self, config: &SshConfig) -> Result<(), ShellError> {
        let auth = if let Some(key_path) = &config.private_key_path {
            AuthMethod::with_key_file(key_path, None)
        } else if let Some(password) = &config.password {
            AuthMethod::with_password(password)
        } else {
            return Err(ShellError::Protocol(
                "neither password nor private_key_path set".to_string(),
            ));
        };

        let connect = Client::connect(
            (config.host.as_str(), config.port),
            &config.user,
            auth,
            ServerCheckMethod::NoCheck,
        );

        let client = tokio::time::timeout(
            Duration::from_millis(config.connect_timeout_ms),
            connect,
        )
        .await
        .map_err(|_| ShellError::Timeout(config.connect_timeout_ms))?
        .map_err(|e| ShellError::Transport(e.to_string()))?;

        self.client = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn exec(&self, command: &str) -> Result<ExecResult, ShellError> {
        let client = self.client()?;
        let result = client
            .execute(command)
            .await
            .map_err(|e| ShellError::Transport(e.to_string()))?;

        Ok(ExecResult {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_status as i32,
        })
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        recursive: bool,
        follow_symlinks: bool,
    ) -> Result<(), ShellError> {
        let client = self.client()?;
        if local_path.is_dir() {
            if !recursive {
                return Err(ShellError::Protocol(format!(
                    "{} is a directory but recursive=false",
                    local_path.display()
                )));
            }
            self.mkdir(remote_path, true).await?;
            let mut entries = tokio::fs::read_dir(local_path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child_local = entry.path();
                if child_local.is_symlink() && !follow_symlinks {
                    continue;
                }
                let child_remote = format!(
                    "{remote_path}/{}",
                    entry.file_name().to_string_lossy()
                );
                Box::pin(self.upload(&child_local, &child_remote, recursive, follow_symlinks))
                    .await?;
            }
            return Ok(());
        }

        client
            .upload_file(local_path, remote_path)
            .await
            .map_err(|e| ShellError::Transport(e.to_string()))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), ShellError> {
        let flag = if recursive { "-p" } else { "" };
        self.run_checked(&format!("mkdir {flag} '{path}'")).await?;
        Ok(())
    }

    async fn remote_exists(&self, path: &str) -> Result<bool, ShellError> {
        let result = self.exec(&format!("test -e '{path}'")).await?;
        Ok(result.success())
    }

    async fn rm(&self, path: &str) -> Result<(), ShellError> {
        self.run_checked(&format!("rm -rf '{path}'")).await?;
        Ok(())
    }

    async fn zip(&self, src_path: &str, dst_archive: &str) -> Result<(), ShellError> {
        self.run_checked(&format!(
            "cd \"$(dirname '{src_path}')\" && zip -r '{dst_archive}' \"$(basename '{src_path}')\""
        ))
        .await?;
        Ok(())
    }

    async fn unzip(&self, src_archive: &str, dst_path: &str) -> Result<(), ShellError> {
        self.mkdir(dst_path, true).await?;
        self.run_checked(&format!("unzip -o '{src_archive}' -d '{dst_path}'"))
            .await?;
        Ok(())
    }

    async fn dispose(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("ssh session disposed");
        }
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
