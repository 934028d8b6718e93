// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-adapters: Agent backends
//!
//! Two backends drive the external coding agent: a local CLI that emits
//! newline-delimited JSON on stdout, and a remote HTTP server that streams
//! Server-Sent Events. Both are normalized onto the same [`AgentRunner`]
//! contract and the same [`ralph_core::AgentEvent`] stream, so the engine
//! never sees the wire difference.

pub mod context;
pub mod normalize;
pub mod runner;
pub mod server;

pub use context::{context_limit, ContextTracker, DEFAULT_CONTEXT_LIMIT};
pub use normalize::Normalizer;
pub use runner::{
    build_runner, AgentRunner, BackendConfig, CliConfig, RemoteConfig, RunOutcome, Runner,
    RunnerError,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use runner::fake::{FakeRun, FakeRunner};
