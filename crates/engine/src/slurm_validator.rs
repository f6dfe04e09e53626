// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm resource-request validation against a cluster's configuration
//! (spec.md §4.I).
//!
//! `sup_core::slurm` does the pure unit-parsing and ceiling arithmetic;
//! this module is the thin IO-adjacent layer that looks up a cluster's
//! configured rules and combines them with the hard-coded default
//! ceiling before handing the request to `sup_core::slurm::validate`.

use std::collections::HashMap;
use sup_core::hpc::HpcConfig;
use sup_core::slurm::{self, SlurmCeiling, SlurmValidationError};

/// Where a job's applicable ceiling is drawn from, surfaced so callers
/// (and tests) can see which rule would have rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlurmCeilingSource {
    pub cluster_rules: SlurmCeiling,
    pub cluster_global_cap: SlurmCeiling,
    pub default_ceiling: SlurmCeiling,
    pub effective: SlurmCeiling,
}

impl SlurmCeilingSource {
    /// Combine a cluster's two configured ceilings with the hard-coded
    /// default via element-wise minimum (spec.md §4.I "(a)...(b)...(c)").
    pub fn for_cluster(hpc: &HpcConfig) -> Self {
        let effective = SlurmCeiling::min_of(&[hpc.slurm_input_rules, hpc.slurm_global_cap]);
        Self {
            cluster_rules: hpc.slurm_input_rules,
            cluster_global_cap: hpc.slurm_global_cap,
            default_ceiling: slurm::DEFAULT_CEILING,
            effective,
        }
    }
}

/// Parse a job's raw `slurm: string -> string` map and validate it
/// against `hpc`'s ceiling, returning the normalized request on success
/// (spec.md §8 scenario 6: "the job never enters the queue").
pub fn validate_job_request(
    raw_slurm: &HashMap<String, String>,
    hpc: &HpcConfig,
) -> Result<slurm::SlurmRequest, SlurmValidationError> {
    let request = slurm::request_from_map(raw_slurm)?;
    let ceiling = SlurmCeilingSource::for_cluster(hpc).effective;
    slurm::validate(&request, &ceiling)?;
    Ok(request)
}

#[cfg(test)]
#[path = "slurm_validator_tests.rs"]
mod tests;
