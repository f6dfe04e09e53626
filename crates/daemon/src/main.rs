// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `supd`: the long-running admission scheduler process (spec.md §4.F).
//!
//! Loads cluster topology once at startup, wires a
//! [`sup_daemon::ProdSupervisor`], then runs its own tick loop on
//! `tick_period` until a signal asks it to stop, at which point it stops
//! admitting new jobs and waits (up to `shutdown_deadline`) for running
//! workers to finish.

use std::time::Duration;
use sup_daemon::{Config, WiringError};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Debug, Error)]
enum DaemonError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] sup_daemon::ConfigError),
    #[error("failed to wire supervisor: {0}")]
    Wiring(#[from] WiringError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    tracing::info!(state_dir = %config.state_dir.display(), clusters = config.hpc.len(), "loaded configuration");

    let wiring = sup_daemon::build(&config)?;
    let supervisor = wiring.supervisor;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let tick_period = supervisor.config().tick_period;
    let mut ticker = tokio::time::interval(tick_period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supervisor.tick().await;
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    tokio::time::timeout(
        supervisor.config().shutdown_deadline + Duration::from_secs(1),
        supervisor.shutdown(),
    )
    .await
    .ok();

    Ok(())
}
