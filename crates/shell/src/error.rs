// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell error taxonomy (spec.md §4.A "recoverable vs fatal", §7 category 2).

use thiserror::Error;

/// Errors from [`crate::RemoteShell`] operations.
///
/// `Transport` and `Timeout` are recoverable: callers should retry them
/// with [`crate::with_backoff`]. `NotConnected` and `Protocol` are
/// treated as fatal by convention — they indicate a programming error or
/// a session that must be re-established from scratch, not transient
/// network noise.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection timed out after {0}ms")]
    Timeout(u64),
    #[error("session is not connected")]
    NotConnected,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("local io error: {0}")]
    LocalIo(#[from] std::io::Error),
}

impl ShellError {
    /// Whether this error is transient transport noise that a bounded
    /// backoff retry should attempt to ride out (spec.md §7 category 2),
    /// as opposed to something retrying will never fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ShellError::Transport(_) | ShellError::Timeout(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
