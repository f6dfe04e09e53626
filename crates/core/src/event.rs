// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event/log streams per job (spec.md §3 "Event / Log", §7).

use crate::job::JobId;
use serde::{Deserialize, Serialize};

/// Maximum length of a [`Log`] message before truncation.
pub const LOG_MESSAGE_MAX_LEN: usize = 500;

/// Suffix appended to a log message that was truncated.
pub const LOG_TRUNCATION_SENTINEL: &str = "... [truncated]";

/// The enumerated set of event types a maintainer may emit (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    JobQueued,
    JobRegistered,
    JobInit,
    JobInitError,
    JobRetry,
    JobFailed,
    JobEnded,
    SlurmUploadExecutable,
    SlurmUploadData,
    SlurmCreateResult,
}

impl EventType {
    /// True for the two terminal event types (spec.md §4.G side effects).
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::JobEnded | EventType::JobFailed)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::JobQueued => "JOB_QUEUED",
            EventType::JobRegistered => "JOB_REGISTERED",
            EventType::JobInit => "JOB_INIT",
            EventType::JobInitError => "JOB_INIT_ERROR",
            EventType::JobRetry => "JOB_RETRY",
            EventType::JobFailed => "JOB_FAILED",
            EventType::JobEnded => "JOB_ENDED",
            EventType::SlurmUploadExecutable => "SLURM_UPLOAD_EXECUTABLE",
            EventType::SlurmUploadData => "SLURM_UPLOAD_DATA",
            EventType::SlurmCreateResult => "SLURM_CREATE_RESULT",
        };
        write!(f, "{s}")
    }
}

/// A single event in a job's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub message: String,
    pub created_at_ms: u64,
}

impl Event {
    pub fn new(job_id: JobId, kind: EventType, message: impl Into<String>, now_ms: u64) -> Self {
        Self {
            job_id,
            kind,
            message: message.into(),
            created_at_ms: now_ms,
        }
    }
}

/// A single entry in a job's free-text log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub job_id: JobId,
    pub message: String,
    pub created_at_ms: u64,
}

impl Log {
    /// Build a log entry, truncating `message` to [`LOG_MESSAGE_MAX_LEN`]
    /// characters with [`LOG_TRUNCATION_SENTINEL`] appended when longer
    /// (spec.md §3 "Event / Log").
    pub fn new(job_id: JobId, message: impl Into<String>, now_ms: u64) -> Self {
        Self {
            job_id,
            message: truncate_log_message(message.into()),
            created_at_ms: now_ms,
        }
    }
}

fn truncate_log_message(message: String) -> String {
    if message.chars().count() <= LOG_MESSAGE_MAX_LEN {
        return message;
    }
    let truncated: String = message.chars().take(LOG_MESSAGE_MAX_LEN).collect();
    format!("{truncated}{LOG_TRUNCATION_SENTINEL}")
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
