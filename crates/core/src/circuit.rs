// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker state
//!
//! The behavior lives in `ralph-engine`; this module owns the state tag and
//! the persisted snapshot shape so the storage and preflight layers can use
//! them without depending on the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

/// Persisted breaker snapshot (`.circuit_breaker_state`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub no_progress_threshold: u32,
    pub no_progress_count: u32,
    pub same_error_threshold: u32,
    pub error_history: Vec<String>,
    pub last_check: DateTime<Utc>,
}

impl BreakerSnapshot {
    /// A fresh closed breaker with the given thresholds.
    pub fn new(no_progress_threshold: u32, same_error_threshold: u32, now: DateTime<Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            no_progress_threshold,
            no_progress_count: 0,
            same_error_threshold,
            error_history: Vec::new(),
            last_check: now,
        }
    }
}

#[cfg(test)]
#[path = "circuit_tests.rs"]
mod tests;
