// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project mode
//!
//! A project directory declares what kind of work the loop is doing through
//! marker files. Each mode maps to exactly one plan file (the checklist)
//! and one prompt file (free-form instructions). Detection itself lives in
//! `ralph-plan`; this module owns the tag and the file mappings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of work the loop is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMode {
    Implement,
    Refactor,
    Fix,
    Unknown,
}

impl ProjectMode {
    /// The checklist file that drives this mode, if known.
    pub fn plan_file(&self) -> Option<&'static str> {
        match self {
            ProjectMode::Implement => Some("IMPLEMENTATION_PLAN.md"),
            ProjectMode::Refactor => Some("REFACTOR_PLAN.md"),
            ProjectMode::Fix => Some("@fix_plan.md"),
            ProjectMode::Unknown => None,
        }
    }

    /// The free-form prompt file for this mode, if known.
    pub fn prompt_file(&self) -> Option<&'static str> {
        match self {
            ProjectMode::Implement => Some("PRD.md"),
            ProjectMode::Refactor => Some("REFACTOR.md"),
            ProjectMode::Fix => Some("PROMPT.md"),
            ProjectMode::Unknown => None,
        }
    }
}

impl fmt::Display for ProjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectMode::Implement => write!(f, "implement"),
            ProjectMode::Refactor => write!(f, "refactor"),
            ProjectMode::Fix => write!(f, "fix"),
            ProjectMode::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
