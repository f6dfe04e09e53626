// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the supervisor.
//!
//! Per spec.md §1, the relational store backing `Job`/`Folder`/`Cache`/
//! `Event`/`Log` is "a simple CRUD" collaborator with no business logic of
//! its own — repositories here are thin in-memory stand-ins for it.
//! §1/§9 also say queues are the one piece of supervisor state that IS
//! persisted across restarts ("queues are persisted, but in-flight job
//! state is not checkpointed"), so [`queue::PerClusterQueue`] alone gets
//! a write-ahead-log treatment.

mod error;
mod file_repository;
mod kv;
mod queue;
mod repository;

pub use error::StorageError;
pub use file_repository::{
    FileCacheRepository, FileEventRepository, FileFolderRepository, FileJobRepository,
    FileLogRepository,
};
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use queue::{PerClusterQueue, QueueWal, QueueWalEntry, QueueWalError};
pub use repository::{
    CacheKey, CacheRepository, EventRepository, FolderRepository, InMemoryCacheRepository,
    InMemoryEventRepository, InMemoryFolderRepository, InMemoryJobRepository,
    InMemoryLogRepository, JobRepository, LogRepository,
};
