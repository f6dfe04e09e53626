// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm resource-request validation (spec.md §4.I).
//!
//! Pure, IO-free: given a job's requested resources and the ceilings that
//! apply to it, decide whether the request is admissible and, if so, the
//! normalized (unit-parsed) values to submit with. `sup-engine` is
//! responsible for looking up the cluster's ceiling and calling into here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The hard-coded default ceiling applied to every cluster regardless of
/// its own configured rules (spec.md §4.I "(c) a hard-coded default ceiling").
pub const DEFAULT_CEILING: SlurmCeiling = SlurmCeiling {
    nodes: 50,
    tasks: 50,
    cpus_per_task: 50,
    memory_per_cpu_bytes: 10 * GIGA,
    memory_total_bytes: 50 * GIGA,
    gpus: 20,
    walltime_secs: 10 * 3600,
};

const KILO: u64 = 1_000;
const MEGA: u64 = 1_000 * KILO;
const GIGA: u64 = 1_000 * MEGA;
const TERA: u64 = 1_000 * GIGA;
const PETA: u64 = 1_000 * TERA;

/// A per-cluster (or global, or default) resource ceiling. All memory
/// fields are normalized to bytes and walltime to seconds so ceilings can
/// be compared/minimized without re-parsing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlurmCeiling {
    pub nodes: u32,
    pub tasks: u32,
    pub cpus_per_task: u32,
    pub memory_per_cpu_bytes: u64,
    pub memory_total_bytes: u64,
    pub gpus: u32,
    pub walltime_secs: u64,
}

impl SlurmCeiling {
    /// Element-wise minimum of any number of ceilings (spec.md §4.I).
    pub fn min_of(ceilings: &[SlurmCeiling]) -> SlurmCeiling {
        ceilings.iter().copied().fold(DEFAULT_CEILING, |acc, c| SlurmCeiling {
            nodes: acc.nodes.min(c.nodes),
            tasks: acc.tasks.min(c.tasks),
            cpus_per_task: acc.cpus_per_task.min(c.cpus_per_task),
            memory_per_cpu_bytes: acc.memory_per_cpu_bytes.min(c.memory_per_cpu_bytes),
            memory_total_bytes: acc.memory_total_bytes.min(c.memory_total_bytes),
            gpus: acc.gpus.min(c.gpus),
            walltime_secs: acc.walltime_secs.min(c.walltime_secs),
        })
    }
}

/// A job's requested Slurm resources, before unit parsing. Mirrors
/// spec.md §3 "Job"'s opaque `slurm: string -> string` map: callers build
/// this from that map's recognized keys (`nodes`, `tasks`, `cpus_per_task`,
/// `memory_per_cpu`, `memory_total`, `gpus`, `walltime`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlurmRequest {
    pub nodes: u32,
    pub tasks: u32,
    pub cpus_per_task: u32,
    pub memory_per_cpu_bytes: u64,
    pub memory_total_bytes: u64,
    pub gpus: u32,
    pub walltime_secs: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlurmValidationError {
    #[error("unrecognized storage unit suffix: {0}")]
    BadStorageUnit(String),
    #[error("unrecognized walltime format: {0}")]
    BadWalltime(String),
    #[error("request exceeds ceiling on {field}: requested {requested}, ceiling {ceiling}")]
    ExceedsCeiling {
        field: &'static str,
        requested: u64,
        ceiling: u64,
    },
}

/// Parse a storage-size string such as `"10G"`, `"512m"`, `"1T"`.
/// Recognized suffixes (case-insensitive): k, m, g, t, p.
pub fn parse_storage(raw: &str) -> Result<u64, SlurmValidationError> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => (&raw[..idx], &raw[idx..]),
        None => (raw, ""),
    };
    let base: u64 = digits
        .parse()
        .map_err(|_| SlurmValidationError::BadStorageUnit(raw.to_string()))?;
    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" => KILO,
        "m" => MEGA,
        "g" => GIGA,
        "t" => TERA,
        "p" => PETA,
        _ => return Err(SlurmValidationError::BadStorageUnit(raw.to_string())),
    };
    Ok(base * multiplier)
}

/// Parse a Slurm walltime string. Recognized formats:
/// `D-HH:MM:SS`, `HH:MM:SS`, `MM:SS`, `MM`.
pub fn parse_walltime(raw: &str) -> Result<u64, SlurmValidationError> {
    let raw = raw.trim();
    let err = || SlurmValidationError::BadWalltime(raw.to_string());

    let (days, rest) = match raw.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().map_err(|_| err())?, rest),
        None => (0, raw),
    };

    let parts: Vec<&str> = rest.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (
            h.parse::<u64>().map_err(|_| err())?,
            m.parse::<u64>().map_err(|_| err())?,
            s.parse::<u64>().map_err(|_| err())?,
        ),
        [m, s] => (
            0,
            m.parse::<u64>().map_err(|_| err())?,
            s.parse::<u64>().map_err(|_| err())?,
        ),
        [m] => (0, m.parse::<u64>().map_err(|_| err())?, 0),
        _ => return Err(err()),
    };

    Ok(days * 86_400 + hours * 3_600 + minutes * 60 + seconds)
}

/// Build a [`SlurmRequest`] from the job's raw `string -> string` slurm map.
/// Missing keys default to zero (an unbounded-looking request is instead an
/// empty one; callers that require resources to be specified should check
/// for missing keys before calling this).
pub fn request_from_map(
    raw: &HashMap<String, String>,
) -> Result<SlurmRequest, SlurmValidationError> {
    let get_u32 = |key: &str| -> Result<u32, SlurmValidationError> {
        match raw.get(key) {
            Some(v) => v
                .parse()
                .map_err(|_| SlurmValidationError::BadWalltime(v.clone())),
            None => Ok(0),
        }
    };

    Ok(SlurmRequest {
        nodes: get_u32("nodes")?,
        tasks: get_u32("tasks")?,
        cpus_per_task: get_u32("cpus_per_task")?,
        memory_per_cpu_bytes: match raw.get("memory_per_cpu") {
            Some(v) => parse_storage(v)?,
            None => 0,
        },
        memory_total_bytes: match raw.get("memory_total") {
            Some(v) => parse_storage(v)?,
            None => 0,
        },
        gpus: get_u32("gpus")?,
        walltime_secs: match raw.get("walltime") {
            Some(v) => parse_walltime(v)?,
            None => 0,
        },
    })
}

/// Validate `request` against `ceiling`, returning the first dimension
/// that exceeds it (spec.md §4.I "Rejects any job whose request exceeds
/// its ceiling in any dimension").
pub fn validate(
    request: &SlurmRequest,
    ceiling: &SlurmCeiling,
) -> Result<(), SlurmValidationError> {
    macro_rules! check {
        ($field:ident, $name:literal) => {
            if request.$field as u64 > ceiling.$field as u64 {
                return Err(SlurmValidationError::ExceedsCeiling {
                    field: $name,
                    requested: request.$field as u64,
                    ceiling: ceiling.$field as u64,
                });
            }
        };
    }
    check!(nodes, "nodes");
    check!(tasks, "tasks");
    check!(cpus_per_task, "cpus_per_task");
    check!(memory_per_cpu_bytes, "memory_per_cpu");
    check!(memory_total_bytes, "memory_total");
    check!(gpus, "gpus");
    check!(walltime_secs, "walltime");
    Ok(())
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
