// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration (spec.md §6 "Configuration"): where state
//! lives on disk and which clusters a process admits jobs onto.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sup_core::hpc::{ContainerConfigMap, HpcConfigMap, KernelConfigMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} as TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk shape of the cluster topology file: `hpcConfigMap`,
/// `containerConfigMap`, `kernelConfigMap` (spec.md §6) plus this
/// process's own tunables, all in one TOML document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawConfig {
    hpc: HpcConfigMap,
    container: ContainerConfigMap,
    kernel: KernelConfigMap,
    community_key_path: HashMap<String, String>,
    queue_consume_time_period_in_seconds: u64,
    worker_poll_period_secs: u64,
    shutdown_deadline_secs: u64,
    globus_base_url: Option<String>,
    globus_access_token: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            hpc: HashMap::new(),
            container: HashMap::new(),
            kernel: HashMap::new(),
            community_key_path: HashMap::new(),
            queue_consume_time_period_in_seconds: 5,
            worker_poll_period_secs: 2,
            shutdown_deadline_secs: 30,
            globus_base_url: None,
            globus_access_token: None,
        }
    }
}

/// Resolved configuration for one supervisor process, shared by `supd`
/// and one-shot `sup` invocations against the same on-disk state.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub hpc: HpcConfigMap,
    pub container: ContainerConfigMap,
    pub kernel: KernelConfigMap,
    pub community_key_path: HashMap<String, String>,
    pub tick_period: Duration,
    pub worker_poll_period: Duration,
    pub shutdown_deadline: Duration,
    pub globus_base_url: Option<String>,
    pub globus_access_token: Option<String>,
}

impl Config {
    /// `SUP_STATE_DIR`, else `$XDG_STATE_HOME/sup`, else `~/.local/state/sup`.
    pub fn default_state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("SUP_STATE_DIR") {
            return PathBuf::from(dir);
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("sup");
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        PathBuf::from(home).join(".local").join("state").join("sup")
    }

    /// `SUP_CONFIG_PATH`, else `<state_dir>/clusters.toml`.
    pub fn default_config_path(state_dir: &Path) -> PathBuf {
        std::env::var("SUP_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| state_dir.join("clusters.toml"))
    }

    /// Resolve `state_dir`/`config_path` from the environment and load.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = Self::default_state_dir();
        let config_path = Self::default_config_path(&state_dir);
        Self::load_from(state_dir, &config_path)
    }

    /// Load the cluster topology at `config_path`, rooting derived state
    /// paths under `state_dir`. A missing `config_path` is not an error —
    /// a freshly installed daemon should start up admitting nothing until
    /// an operator writes the file, not fail to launch.
    pub fn load_from(state_dir: impl Into<PathBuf>, config_path: &Path) -> Result<Self, ConfigError> {
        let state_dir = state_dir.into();
        let raw = match std::fs::read_to_string(config_path) {
            Ok(text) => toml::from_str::<RawConfig>(&text).map_err(|source| ConfigError::Toml {
                path: config_path.to_owned(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawConfig::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: config_path.to_owned(),
                    source,
                })
            }
        };

        Ok(Self {
            state_dir,
            hpc: raw.hpc,
            container: raw.container,
            kernel: raw.kernel,
            community_key_path: raw.community_key_path,
            tick_period: Duration::from_secs(raw.queue_consume_time_period_in_seconds),
            worker_poll_period: Duration::from_secs(raw.worker_poll_period_secs),
            shutdown_deadline: Duration::from_secs(raw.shutdown_deadline_secs),
            globus_base_url: raw.globus_base_url,
            globus_access_token: raw.globus_access_token,
        })
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.state_dir.join("jobs.json")
    }

    pub fn folders_path(&self) -> PathBuf {
        self.state_dir.join("folders.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir.join("cache.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.state_dir.join("events.json")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.state_dir.join("logs.json")
    }

    /// Backing file for the credential/Globus-task key-value store
    /// (spec.md §1's "credential/Globus/result-listing" collaborator).
    pub fn credentials_path(&self) -> PathBuf {
        self.state_dir.join("credentials.json")
    }

    pub fn queue_wal_path(&self) -> PathBuf {
        self.state_dir.join("queue.wal")
    }

    pub fn git_mirror_root(&self) -> PathBuf {
        self.state_dir.join("git-mirrors")
    }

    pub fn local_work_root(&self) -> PathBuf {
        self.state_dir.join("work")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
