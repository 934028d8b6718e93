// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the ralph loop
//!
//! Two event families flow through the system:
//!
//! - [`AgentEvent`] is the normalized form of whatever the agent backend
//!   emitted on its wire (JSON lines or SSE frames). The two runners
//!   produce these; the controller consumes them.
//! - [`LoopEvent`] is what the controller hands to its observer callback
//!   (the dashboard). Runner events are forwarded inside it untouched.
//!
//! Serializes with `{"type": "...", ...fields}` format.

use crate::circuit::CircuitState;
use crate::mode::ProjectMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tool call progress marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Started,
    Completed,
}

/// Lifecycle subtypes the backends report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Busy,
    Retry,
    Idle,
    Error,
    Compacted,
    Started,
    Stopped,
}

/// Token accounting for the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub limit: u64,
    pub percent: f64,
    pub threshold_reached: bool,
    pub was_compacted: bool,
}

/// A normalized agent event, independent of the wire format it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    Reasoning {
        text: String,
    },
    Message {
        text: String,
    },
    ToolCall {
        name: String,
        target: String,
        status: ToolCallStatus,
    },
    ToolResult {
        name: String,
        target: String,
    },
    ContextUsage {
        #[serde(flatten)]
        usage: ContextUsage,
    },
    Lifecycle {
        subtype: LifecycleKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Unknown {
        raw_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Log severity for observer log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Preflight summary, emitted before each iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightSummary {
    pub mode: ProjectMode,
    pub plan_file: Option<String>,
    pub total_tasks: usize,
    pub remaining_count: usize,
    /// Up to the first five remaining task texts.
    pub first_remaining: Vec<String>,
    pub circuit_state: CircuitState,
    pub rate_limit_ok: bool,
    pub calls_remaining: u32,
    pub should_skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Events delivered to the observer callback.
///
/// The callback is invoked synchronously on the controller's thread (or the
/// runner's reader task for `Codex*` kinds); observers must not block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    LoopUpdate {
        loop_num: u64,
        message: String,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Preflight {
        #[serde(flatten)]
        summary: PreflightSummary,
    },
    Outcome {
        loop_num: u64,
        success: bool,
        message: String,
    },
    Analysis {
        loop_num: u64,
        confidence: f64,
        has_errors: bool,
        exit_signal: bool,
        status: String,
        tasks_completed: i64,
        files_modified: i64,
    },
    CodexOutput {
        text: String,
    },
    CodexReasoning {
        text: String,
    },
    CodexTool {
        name: String,
        target: String,
        status: ToolCallStatus,
    },
    ContextUsage {
        #[serde(flatten)]
        usage: ContextUsage,
    },
}

/// Sink for normalized agent events, owned by a runner.
pub type EventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// Sink for loop events, owned by the controller.
pub type Observer = Arc<dyn Fn(LoopEvent) + Send + Sync>;

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
