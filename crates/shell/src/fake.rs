// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake `RemoteShell` for testing `sup-engine` without a network.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::error::ShellError;
use crate::session::{ExecResult, RemoteShell, SshConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded call against a [`FakeShell`], in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    Connect { host: String },
    Exec { command: String },
    Upload { local: PathBuf, remote: String },
    Mkdir { path: String },
    RemoteExists { path: String },
    Rm { path: String },
    Zip { src: String, dst: String },
    Unzip { src: String, dst: String },
    Dispose,
}

struct FakeShellState {
    calls: Vec<ShellCall>,
    connected: bool,
    remote_paths: HashSet<String>,
    scripted_exec: Vec<(String, ExecResult)>,
    fail_connect: bool,
}

/// A `RemoteShell` that records calls and returns scripted results.
#[derive(Clone)]
pub struct FakeShell {
    inner: Arc<Mutex<FakeShellState>>,
}

impl Default for FakeShell {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeShellState {
                calls: Vec::new(),
                connected: false,
                remote_paths: HashSet::new(),
                scripted_exec: Vec::new(),
                fail_connect: false,
            })),
        }
    }
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.inner.lock().calls.clone()
    }

    /// Make the next [`RemoteShell::connect`] fail with a transport error.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_connect = true;
    }

    /// Queue a canned result for the next `exec` whose command equals
    /// `command` exactly. Unscripted commands succeed with empty output.
    pub fn script_exec(&self, command: &str, result: ExecResult) {
        self.inner
            .lock()
            .scripted_exec
            .push((command.to_string(), result));
    }

    /// Seed a path as already present on the fake remote filesystem.
    pub fn seed_remote_path(&self, path: &str) {
        self.inner.lock().remote_paths.insert(path.to_string());
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn connect(&mut self, config: &SshConfig) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ShellCall::Connect {
            host: config.host.clone(),
        });
        if inner.fail_connect {
            inner.fail_connect = false;
            return Err(ShellError::Transport("fake connect failure".to_string()));
        }
        inner.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn exec(&self, command: &str) -> Result<ExecResult, ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Exec {
            command: command.to_string(),
        });
        if let Some((_, result)) = inner.scripted_exec.iter().find(|(cmd, _)| cmd == command) {
            return Ok(result.clone());
        }
        Ok(ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        _recursive: bool,
        _follow_symlinks: bool,
    ) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Upload {
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
        });
        inner.remote_paths.insert(remote_path.to_string());
        Ok(())
    }

    async fn mkdir(&self, path: &str, _recursive: bool) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Mkdir {
            path: path.to_string(),
        });
        inner.remote_paths.insert(path.to_string());
        Ok(())
    }

    async fn remote_exists(&self, path: &str) -> Result<bool, ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::RemoteExists {
            path: path.to_string(),
        });
        Ok(inner.remote_paths.contains(path))
    }

    async fn rm(&self, path: &str) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Rm {
            path: path.to_string(),
        });
        inner.remote_paths.remove(path);
        Ok(())
    }

    async fn zip(&self, src_path: &str, dst_archive: &str) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Zip {
            src: src_path.to_string(),
            dst: dst_archive.to_string(),
        });
        inner.remote_paths.insert(dst_archive.to_string());
        Ok(())
    }

    async fn unzip(&self, src_archive: &str, dst_path: &str) -> Result<(), ShellError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(ShellError::NotConnected);
        }
        inner.calls.push(ShellCall::Unzip {
            src: src_archive.to_string(),
            dst: dst_path.to_string(),
        });
        inner.remote_paths.insert(dst_path.to_string());
        Ok(())
    }

    async fn dispose(&mut self) {
        let mut inner = self.inner.lock();
        inner.calls.push(ShellCall::Dispose);
        inner.connected = false;
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
