// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Globus Transfer adapter (spec.md §1 "Globus... black-box collaborator",
//! §4.C staging).

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from Globus operations.
#[derive(Debug, Error)]
pub enum GlobusError {
    #[error("transfer not found: {0}")]
    NotFound(String),
    #[error("request to Globus Transfer API failed: {0}")]
    Request(String),
    #[error("unexpected response from Globus Transfer API: {0}")]
    Protocol(String),
}

/// A Globus task id, opaque to `sup-engine`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferId(pub String);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The state of a submitted Globus transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Active,
    Succeeded,
    Failed,
}

/// Adapter for the Globus Transfer service. `sup-engine`'s staging
/// engine (§4.C) only ever starts a transfer and polls it to completion
/// — the transfer protocol itself is entirely Globus's concern.
#[async_trait]
pub trait GlobusAdapter: Send + Sync {
    /// Start a transfer between two Globus endpoints. Returns
    /// immediately with a task id; the transfer runs asynchronously on
    /// Globus's infrastructure.
    async fn init_transfer(
        &self,
        endpoint_src: &str,
        path_src: &str,
        endpoint_dst: &str,
        path_dst: &str,
    ) -> Result<TransferId, GlobusError>;

    /// Block (via internal polling) until the transfer reaches a
    /// terminal status, then return it.
    async fn monitor_transfer(&self, id: &TransferId) -> Result<TransferStatus, GlobusError>;

    /// A single, non-blocking status check.
    async fn query_status(&self, id: &TransferId) -> Result<TransferStatus, GlobusError>;
}

/// Real [`GlobusAdapter`] backed by the Globus Transfer REST API.
pub struct GlobusTransferAdapter {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    poll_interval: Duration,
}

impl GlobusTransferAdapter {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn parse_status(raw: &str) -> Result<TransferStatus, GlobusError> {
        match raw {
            "ACTIVE" => Ok(TransferStatus::Active),
            "SUCCEEDED" => Ok(TransferStatus::Succeeded),
            "FAILED" | "INACTIVE" => Ok(TransferStatus::Failed),
            other => Err(GlobusError::Protocol(format!(
                "unrecognized transfer status: {other}"
            ))),
        }
    }
}

#[derive(serde::Serialize)]
struct SubmissionRequest<'a> {
    submission_id: String,
    source_endpoint: &'a str,
    destination_endpoint: &'a str,
    #[serde(rename = "DATA")]
    data: Vec<TransferItem<'a>>,
}

#[derive(serde::Serialize)]
struct TransferItem<'a> {
    source_path: &'a str,
    destination_path: &'a str,
    recursive: bool,
}

#[derive(serde::Deserialize)]
struct SubmissionResponse {
    task_id: String,
}

#[derive(serde::Deserialize)]
struct TaskResponse {
    status: String,
}

#[async_trait]
impl GlobusAdapter for GlobusTransferAdapter {
    async fn init_transfer(
        &self,
        endpoint_src: &str,
        path_src: &str,
        endpoint_dst: &str,
        path_dst: &str,
    ) -> Result<TransferId, GlobusError> {
        let body = SubmissionRequest {
            submission_id: Uuid::new_v4().to_string(),
            source_endpoint: endpoint_src,
            destination_endpoint: endpoint_dst,
            data: vec![TransferItem {
                source_path: path_src,
                destination_path: path_dst,
                recursive: true,
            }],
        };

        let response = self
            .http
            .post(format!("{}/transfer", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GlobusError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| GlobusError::Request(e.to_string()))?
            .json::<SubmissionResponse>()
            .await
            .map_err(|e| GlobusError::Protocol(e.to_string()))?;

        tracing::info!(task_id = %response.task_id, endpoint_src, endpoint_dst, "globus transfer started");
        Ok(TransferId(response.task_id))
    }

    async fn monitor_transfer(&self, id: &TransferId) -> Result<TransferStatus, GlobusError> {
        loop {
            let status = self.query_status(id).await?;
            if status != TransferStatus::Active {
                return Ok(status);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn query_status(&self, id: &TransferId) -> Result<TransferStatus, GlobusError> {
        let response = self
            .http
            .get(format!("{}/task/{}", self.base_url, id.0))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| GlobusError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GlobusError::NotFound(id.0.clone()));
        }

        let task = response
            .error_for_status()
            .map_err(|e| GlobusError::Request(e.to_string()))?
            .json::<TaskResponse>()
            .await
            .map_err(|e| GlobusError::Protocol(e.to_string()))?;

        Self::parse_status(&task.status)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{GlobusAdapter, GlobusError, TransferId, TransferStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Recorded call against a [`FakeGlobusAdapter`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GlobusCall {
        InitTransfer {
            endpoint_src: String,
            endpoint_dst: String,
        },
        MonitorTransfer {
            id: TransferId,
        },
        QueryStatus {
            id: TransferId,
        },
    }

    struct FakeGlobusState {
        calls: Vec<GlobusCall>,
        statuses: HashMap<String, TransferStatus>,
        next_id: u64,
    }

    /// A [`GlobusAdapter`] that records calls and returns scripted
    /// statuses, shaped after `sup-shell`'s `FakeShell`.
    #[derive(Clone)]
    pub struct FakeGlobusAdapter {
        inner: Arc<Mutex<FakeGlobusState>>,
    }

    impl Default for FakeGlobusAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeGlobusState {
                    calls: Vec::new(),
                    statuses: HashMap::new(),
                    next_id: 0,
                })),
            }
        }
    }

    impl FakeGlobusAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<GlobusCall> {
            self.inner.lock().calls.clone()
        }

        /// Set the status that will be returned for `id` from now on.
        pub fn set_status(&self, id: &TransferId, status: TransferStatus) {
            self.inner.lock().statuses.insert(id.0.clone(), status);
        }
    }

    #[async_trait]
    impl GlobusAdapter for FakeGlobusAdapter {
        async fn init_transfer(
            &self,
            endpoint_src: &str,
            _path_src: &str,
            endpoint_dst: &str,
            _path_dst: &str,
        ) -> Result<TransferId, GlobusError> {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = TransferId(format!("fake-transfer-{}", inner.next_id));
            inner.calls.push(GlobusCall::InitTransfer {
                endpoint_src: endpoint_src.to_string(),
                endpoint_dst: endpoint_dst.to_string(),
            });
            inner.statuses.insert(id.0.clone(), TransferStatus::Active);
            Ok(id)
        }

        async fn monitor_transfer(&self, id: &TransferId) -> Result<TransferStatus, GlobusError> {
            self.inner.lock().calls.push(GlobusCall::MonitorTransfer { id: id.clone() });
            self.query_status(id).await
        }

        async fn query_status(&self, id: &TransferId) -> Result<TransferStatus, GlobusError> {
            let mut inner = self.inner.lock();
            inner.calls.push(GlobusCall::QueryStatus { id: id.clone() });
            inner
                .statuses
                .get(&id.0)
                .copied()
                .ok_or_else(|| GlobusError::NotFound(id.0.clone()))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGlobusAdapter, GlobusCall};

#[cfg(test)]
#[path = "globus_tests.rs"]
mod tests;
