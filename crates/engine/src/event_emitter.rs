// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event/log emission (spec.md §4.G).
//!
//! `emit_event`/`emit_log` are the single entry points every other part
//! of the engine goes through to record a job's lifecycle. Per spec.md
//! §4.G and §7 category 5, persistence here is best-effort: a failed
//! write is logged and swallowed, never propagated to the caller.

use std::sync::Arc;
use sup_core::clock::Clock;
use sup_core::event::{Event, EventType, Log};
use sup_core::job::{Job, JobPhase};
use sup_storage::{EventRepository, JobRepository, LogRepository};

/// The repositories [`emit_event`]/[`emit_log`] write through to. Bundled
/// behind one trait so `sup-engine`'s maintainer and scheduler code don't
/// need three separate `Arc<dyn ...>` parameters at every call site.
pub trait EventSink: Send + Sync {
    fn events(&self) -> &Arc<dyn EventRepository>;
    fn logs(&self) -> &Arc<dyn LogRepository>;
    fn jobs(&self) -> &Arc<dyn JobRepository>;
}

/// Record `event` against `job`, applying the distinguished side effects
/// spec.md §4.G lists (`initialized_at`/`finished_at`/`is_failed`) to the
/// in-memory `job` and persisting both. The persistence writes are
/// best-effort: failures are logged, not propagated (spec.md §7 "All
/// event/log writes are best-effort").
pub fn emit_event(
    sink: &impl EventSink,
    clock: &impl Clock,
    job: &mut Job,
    kind: EventType,
    message: impl Into<String>,
) {
    let now_ms = clock.epoch_ms();
    let message = message.into();

    match kind {
        EventType::JobQueued => job.phase = JobPhase::Queued,
        EventType::JobRegistered => job.phase = JobPhase::Initializing,
        EventType::JobInit => {
            job.initialized_at_ms = Some(now_ms);
            job.phase = JobPhase::Submitted;
        }
        EventType::JobInitError => {
            job.finished_at_ms = Some(now_ms);
            job.is_failed = true;
            job.phase = JobPhase::Failed;
        }
        EventType::JobEnded | EventType::JobFailed => {
            job.finished_at_ms = Some(now_ms);
            job.is_failed = kind == EventType::JobFailed;
            job.phase = if kind == EventType::JobFailed {
                JobPhase::Failed
            } else {
                JobPhase::Ended
            };
        }
        _ => {}
    }

    let event = Event::new(job.id.clone(), kind, message, now_ms);
    if let Err(e) = sink.events().append(event) {
        tracing::warn!(job_id = %job.id, error = %e, "failed to persist event (best-effort)");
    }
    if let Err(e) = sink.jobs().update(job.clone()) {
        tracing::warn!(job_id = %job.id, error = %e, "failed to persist job after event (best-effort)");
    }
}

/// Append a free-text log line for `job`, truncated per spec.md §3
/// "Event / Log". Best-effort, same as [`emit_event`].
pub fn emit_log(sink: &impl EventSink, clock: &impl Clock, job: &Job, message: impl Into<String>) {
    let log = Log::new(job.id.clone(), message, clock.epoch_ms());
    if let Err(e) = sink.logs().append(log) {
        tracing::warn!(job_id = %job.id, error = %e, "failed to persist log (best-effort)");
    }
}

#[cfg(test)]
#[path = "event_emitter_tests.rs"]
mod tests;
