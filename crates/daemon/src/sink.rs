// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`EventSink`] bundling the three file-backed repositories
//! `sup-engine`'s event/log emission writes through (spec.md §4.G).

use std::sync::Arc;
use sup_engine::EventSink;
use sup_storage::{EventRepository, JobRepository, LogRepository};

pub struct DaemonEventSink {
    pub jobs: Arc<dyn JobRepository>,
    pub events: Arc<dyn EventRepository>,
    pub logs: Arc<dyn LogRepository>,
}

impl EventSink for DaemonEventSink {
    fn events(&self) -> &Arc<dyn EventRepository> {
        &self.events
    }

    fn logs(&self) -> &Arc<dyn LogRepository> {
        &self.logs
    }

    fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }
}
