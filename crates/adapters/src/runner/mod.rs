// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runners
//!
//! A runner owns one way of talking to the external coding agent. The two
//! production variants differ radically in wire format but share the same
//! outbound contract: `run`, `set_observer`, `stop`. The engine holds a
//! [`Runner`] chosen by configuration and never learns which one it got.
//!
//! Runners own the session identifier. The CLI variant resumes the last
//! thread when a session id is persisted; the remote variant creates one
//! server session per process and rotates it when context runs out.

mod cli;
mod remote;

pub use cli::CliRunner;
pub use remote::RemoteRunner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use ralph_core::EventSink;
use ralph_storage::{StateStore, StorageError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from a runner invocation
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The agent process or request failed; carries stderr or raw output.
    #[error("agent execution failed: {0}")]
    ExecFailed(String),
    /// Reading the agent's output stream failed.
    #[error("stream error: {0}")]
    Stream(#[source] std::io::Error),
    /// The remote session reported an error frame.
    #[error("session error: {0}")]
    Session(String),
    /// The remote retry cap was exceeded.
    #[error("rate limited: retry cap exceeded")]
    RateLimited,
    /// The configured per-run timeout elapsed.
    #[error("agent run timed out after {0}s")]
    Timeout(u64),
    /// The run was cancelled from outside.
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of one complete exchange with the agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutcome {
    /// The agent's canonical response text.
    pub content: String,
    /// Session identifier after this run, when one is known.
    pub session_id: Option<String>,
}

/// One way of invoking the external agent.
#[async_trait]
pub trait AgentRunner: Send + Sync + 'static {
    /// Run one full exchange, blocking until the agent is done.
    ///
    /// Normalized events stream to the observer while the call is in
    /// flight; no event is delivered after `run` returns.
    async fn run(
        &self,
        prompt: &str,
        loop_num: u64,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError>;

    /// Install the sink for normalized events.
    fn set_observer(&self, sink: EventSink);

    /// Release owned resources (remote: abort the session, terminate any
    /// managed child server). Idempotent.
    async fn stop(&self);
}

/// CLI backend configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Agent binary, e.g. `codex`.
    pub binary: String,
    pub project_dir: PathBuf,
    /// Per-run cap; `None` means unbounded.
    pub timeout: Option<Duration>,
}

/// Remote backend configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the agent server. `None` launches a managed child
    /// server in the project directory.
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub model_id: String,
    /// Per-run cap; also the timeout for synchronous HTTP calls.
    pub timeout: Option<Duration>,
    /// Command used to launch the managed server when no URL is given.
    pub server_command: String,
    /// Port the managed server listens on.
    pub port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            username: None,
            password: None,
            model_id: "gpt-5-codex".to_string(),
            timeout: Some(Duration::from_secs(1800)),
            server_command: "codexd".to_string(),
            port: 4096,
        }
    }
}

/// Which backend to use.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Cli(CliConfig),
    Remote(RemoteConfig),
}

/// The tagged runner the engine holds.
pub enum Runner {
    Cli(CliRunner),
    Remote(RemoteRunner),
}

/// Build the runner selected by configuration.
pub fn build_runner(config: BackendConfig, store: StateStore) -> Runner {
    match config {
        BackendConfig::Cli(config) => Runner::Cli(CliRunner::new(config, store)),
        BackendConfig::Remote(config) => Runner::Remote(RemoteRunner::new(config, store)),
    }
}

#[async_trait]
impl AgentRunner for Runner {
    async fn run(
        &self,
        prompt: &str,
        loop_num: u64,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunnerError> {
        match self {
            Runner::Cli(runner) => runner.run(prompt, loop_num, cancel).await,
            Runner::Remote(runner) => runner.run(prompt, loop_num, cancel).await,
        }
    }

    fn set_observer(&self, sink: EventSink) {
        match self {
            Runner::Cli(runner) => runner.set_observer(sink),
            Runner::Remote(runner) => runner.set_observer(sink),
        }
    }

    async fn stop(&self) {
        match self {
            Runner::Cli(runner) => runner.stop().await,
            Runner::Remote(runner) => runner.stop().await,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
