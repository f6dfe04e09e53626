// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded exponential backoff for recoverable shell errors (spec.md §7
//! category 2: "initial delay 1 s, multiplier 2, cap 30 s, maximum
//! retries 5").

use crate::error::ShellError;
use std::future::Future;
use std::time::Duration;

/// Parameters for [`with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub cap: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// The spec.md §7 default: 1s initial, doubling, capped at 30s, up to
    /// 5 retries.
    pub const DEFAULT: BackoffPolicy = BackoffPolicy {
        initial: Duration::from_secs(1),
        multiplier: 2,
        cap: Duration::from_secs(30),
        max_retries: 5,
    };

    /// The delay before the `attempt`-th retry (0-indexed), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scale = self.multiplier.saturating_pow(attempt);
        let scaled = self.initial.saturating_mul(scale);
        scaled.min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run `op` up to `policy.max_retries + 1` times, sleeping between
/// attempts per [`BackoffPolicy::delay_for`]. Stops retrying as soon as
/// `op` returns an error for which [`ShellError::is_recoverable`] is
/// false, or after the retry budget is exhausted, returning the last
/// error either way.
pub async fn with_backoff<T, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T, ShellError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShellError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_recoverable() && attempt < policy.max_retries => {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
