// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Private-account credential validation and registration (spec.md §4.H).

use std::sync::Arc;
use sup_core::credential::{Credential, CredentialId};
use sup_core::id::IdGen;
use sup_shell::{RemoteShell, ShellError, SshConfig};
use sup_storage::{KeyValueStore, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialGuardError {
    #[error("unable to check credentials with {hpc}: {source}")]
    ConnectionFailed { hpc: String, source: ShellError },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Open a throwaway connection with the supplied credentials and run a
/// trivial command, proving the credentials are usable on `hpc` without
/// retaining the connection (spec.md §4.H
/// `validatePrivateAccount(hpc, user, password)`).
pub async fn validate_private_account<S: RemoteShell + Default>(
    hpc: &str,
    host: &str,
    port: u16,
    user: &str,
    password: &str,
) -> Result<(), CredentialGuardError> {
    let config = SshConfig {
        host: host.to_string(),
        port,
        user: user.to_string(),
        password: Some(password.to_string()),
        private_key_path: None,
        connect_timeout_ms: 1_000,
    };

    let mut shell = S::default();
    let connect_result = shell.connect(&config).await;
    let connect_result = match connect_result {
        Ok(()) => shell.exec("echo sup-credential-check").await.map(|_| ()),
        Err(e) => Err(e),
    };
    shell.dispose().await;

    connect_result.map_err(|source| CredentialGuardError::ConnectionFailed {
        hpc: hpc.to_string(),
        source,
    })
}

/// Generate an opaque credential id and persist `{user, password}` under
/// it in the secret store (spec.md §4.H `registerCredential`).
pub fn register_credential(
    store: &Arc<dyn KeyValueStore>,
    ids: &impl IdGen,
    user: &str,
    password: &str,
) -> Result<CredentialId, CredentialGuardError> {
    let id = CredentialId::new(ids.next());
    let credential = Credential {
        user: user.to_string(),
        password: password.to_string(),
    };
    store.set(
        &secret_key(&id),
        serde_json::to_value(&credential)?,
    )?;
    Ok(id)
}

/// Read a previously-registered credential back out of the secret store.
pub fn load_credential(
    store: &Arc<dyn KeyValueStore>,
    id: &CredentialId,
) -> Result<Option<Credential>, CredentialGuardError> {
    match store.get(&secret_key(id))? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

fn secret_key(id: &CredentialId) -> String {
    format!("credential:{id}")
}

#[cfg(test)]
#[path = "credential_guard_tests.rs"]
mod tests;
