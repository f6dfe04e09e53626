// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the Globus transfer service (spec.md §1, §4.C).
//!
//! Globus is treated as an external black box: `sup-engine`'s staging
//! engine only needs to start a transfer and poll it to completion, never
//! the transfer protocol itself.

pub mod globus;

pub use globus::{GlobusAdapter, GlobusError, GlobusTransferAdapter, TransferId, TransferStatus};

#[cfg(any(test, feature = "test-support"))]
pub use globus::{FakeGlobusAdapter, GlobusCall};
