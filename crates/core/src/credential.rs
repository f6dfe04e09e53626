// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral private-account credentials (spec.md §3 "Credential", §4.H).

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Opaque id under which a validated credential is stored in the
    /// secret store. Never derived from the credential itself.
    pub struct CredentialId;
}

/// `{user, password}` pair, readable only by the supervisor, with a TTL
/// matching the owning job's lifetime (spec.md §3 invariant 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
