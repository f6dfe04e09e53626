// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only cluster configuration shapes (`hpcConfigMap`, `maintainerConfigMap`,
//! `containerConfigMap`, `kernelConfigMap` from spec.md §6). Loading these from
//! disk is `sup-daemon`'s job; this module only defines what they look like.

use crate::slurm::SlurmCeiling;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Name of a configured HPC cluster, e.g. `"expanse"` or `"anvil"`.
    pub struct HpcId;
}

/// Which maintainer variant a job uses, selected by the job's
/// `maintainer` discriminator (spec.md §3 "Job", §4.D "Variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintainerKind {
    /// Git source, Singularity-wrapped, executable-manifest driven.
    CommunityContribution,
    /// Unwrapped command, bare Slurm submission.
    PlainSlurm,
}

/// Globus endpoint configuration for a cluster, if it supports bulk
/// data staging via Globus transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobusConfig {
    pub endpoint: String,
    pub root_path: String,
}

/// `hpcConfigMap[name]` — everything the supervisor needs to know about
/// one cluster to admit and run jobs on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpcConfig {
    pub ip: String,
    pub port: u16,
    /// Remote root under which per-job workspaces and the cache live.
    pub root_path: String,
    /// Max number of jobs this cluster may run concurrently (§3 invariant 1).
    pub job_pool_capacity: usize,
    /// True if this cluster authenticates with one shared account for all
    /// jobs; false if each job supplies its own private credential.
    pub is_community_account: bool,
    /// Username for the shared account, required when `is_community_account`.
    #[serde(default)]
    pub community_login: Option<String>,
    #[serde(default)]
    pub globus: Option<GlobusConfig>,
    /// Per-cluster resource-request maxima (§4.I input (a)).
    pub slurm_input_rules: SlurmCeiling,
    /// Per-cluster global cap, independent of per-rule maxima (§4.I input (b)).
    pub slurm_global_cap: SlurmCeiling,
    /// Local filesystem mount point, if the cluster's filesystem is also
    /// locally mounted (used to short-circuit local staging).
    #[serde(default)]
    pub mount: Option<String>,
}

/// `containerConfigMap[hpc]` — container image path(s) for that cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image_path: String,
    /// Enable CVMFS-backed container execution instead of a local image copy.
    #[serde(default)]
    pub cvmfs: bool,
}

/// `kernelConfigMap[hpc]` — environment initialization lines injected before
/// the user's command in the templated Slurm script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub init_lines: Vec<String>,
}

/// `maintainerConfigMap[name]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintainerConfigEntry {
    pub maintainer: MaintainerKind,
    pub default_hpc: HpcId,
}

pub type HpcConfigMap = HashMap<String, HpcConfig>;
pub type MaintainerConfigMap = HashMap<String, MaintainerConfigEntry>;
pub type ContainerConfigMap = HashMap<String, ContainerConfig>;
pub type KernelConfigMap = HashMap<String, KernelConfig>;

#[cfg(test)]
#[path = "hpc_tests.rs"]
mod tests;
