// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-plan: Plan file resolution and checklist parsing
//!
//! The plan file is the Markdown checklist that drives the loop. This crate
//! detects the project mode from marker files, loads and rewrites the
//! checklist, and scans for filesystem evidence that creation-style tasks
//! are already done.

mod checklist;
mod detect;
mod sync;

pub use checklist::{remaining, MarkOutcome, PlanStore};
pub use detect::detect_mode;
pub use sync::{scan_evidence, TaskEvidence, AUTO_MARK_CONFIDENCE};

use thiserror::Error;

/// Errors from plan operations
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no plan file found in {0}")]
    NoPlan(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PlanError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PlanError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
