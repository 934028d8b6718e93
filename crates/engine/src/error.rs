// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the loop engine
//!
//! Tagged kinds so the controller can decide structurally between retry
//! and halt. Only `BreakerOpen` and `Cancelled` unwind the main loop; the
//! rest fail a single iteration.

use ralph_adapters::RunnerError;
use ralph_plan::PlanError;
use ralph_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while running the loop
#[derive(Debug, Error)]
pub enum LoopError {
    /// Project configuration is absent or invalid.
    #[error("config error: {0}")]
    Config(String),
    /// Reading or writing a plan or state file failed.
    #[error("IO error: {0}")]
    Io(String),
    /// A plan or state file exists but cannot be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The agent invocation failed (non-zero exit, stream failure, 5xx).
    #[error("agent execution failed: {0}")]
    AgentExec(String),
    /// The remote session reported an error frame.
    #[error("session error: {0}")]
    Session(String),
    /// The remote retry cap was exceeded.
    #[error("rate limited by the agent backend")]
    RateLimited,
    /// The circuit breaker is open; operator reset required.
    #[error("circuit breaker is open")]
    BreakerOpen,
    /// External cancellation.
    #[error("cancelled")]
    Cancelled,
}

impl From<StorageError> for LoopError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io { .. } => LoopError::Io(err.to_string()),
            StorageError::Decode { .. } => LoopError::Decode(err.to_string()),
        }
    }
}

impl From<PlanError> for LoopError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NoPlan(_) => LoopError::Config(err.to_string()),
            PlanError::Io { .. } => LoopError::Io(err.to_string()),
        }
    }
}

impl From<RunnerError> for LoopError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::ExecFailed(detail) => LoopError::AgentExec(detail),
            RunnerError::Stream(e) => LoopError::AgentExec(e.to_string()),
            RunnerError::Timeout(secs) => {
                LoopError::AgentExec(format!("run timed out after {secs}s"))
            }
            RunnerError::Session(message) => LoopError::Session(message),
            RunnerError::RateLimited => LoopError::RateLimited,
            RunnerError::Cancelled => LoopError::Cancelled,
            RunnerError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
