// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Process wiring for the supervisor (spec.md §4.F/§6 "Configuration").
//!
//! This crate owns the one piece of the system spec.md explicitly treats
//! as an external collaborator but that still has to exist for the
//! workspace to run: loading cluster topology off disk and assembling a
//! `sup-engine::Supervisor` out of it. `sup-cli` depends on this crate's
//! library target for the same `Config`/wiring code, so a one-shot `sup`
//! invocation and the long-running `supd` process agree on where state
//! lives and how a cluster's configuration maps onto the engine's types.

pub mod config;
pub mod sink;
pub mod wiring;

pub use config::{Config, ConfigError};
pub use sink::DaemonEventSink;
pub use wiring::{build, ProdSupervisor, Wiring, WiringError};
