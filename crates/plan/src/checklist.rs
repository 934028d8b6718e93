// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan file loading and rewriting
//!
//! Rewrites are byte-preserving: marking a task complete flips exactly the
//! three checkbox bytes of the matching line and leaves every other byte of
//! the file alone. Writes go through a sibling temp file and rename.

use crate::sync::{scan_evidence, TaskEvidence, AUTO_MARK_CONFIDENCE};
use crate::{detect_mode, PlanError};
use ralph_core::{parse_task_line, ProjectMode, Task};
use std::fs;
use std::path::{Path, PathBuf};

/// Plan files probed, in order, when the mode is unknown.
const FALLBACK_PLANS: &[&str] = &["REFACTOR_PLAN.md", "IMPLEMENTATION_PLAN.md", "@fix_plan.md"];

/// Result of a mark-complete edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The matching line was flipped and the file rewritten.
    Marked,
    /// No unchecked line matched; the file was left untouched.
    NotFound,
}

/// Locates and edits the active plan file for a project.
#[derive(Debug, Clone)]
pub struct PlanStore {
    root: PathBuf,
}

impl PlanStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The detected project mode.
    pub fn mode(&self) -> ProjectMode {
        detect_mode(&self.root)
    }

    /// Resolve the active plan file.
    ///
    /// Uses the mode's plan file when the mode is known; otherwise probes
    /// the three plan names in priority order.
    pub fn resolve_plan(&self) -> Result<PathBuf, PlanError> {
        if let Some(name) = self.mode().plan_file() {
            let path = self.root.join(name);
            if path.is_file() {
                return Ok(path);
            }
        }
        for name in FALLBACK_PLANS {
            let path = self.root.join(name);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(PlanError::NoPlan(self.root.display().to_string()))
    }

    /// Load the active plan: its tasks in file order, and its path.
    pub fn load_plan(&self) -> Result<(Vec<Task>, PathBuf), PlanError> {
        let path = self.resolve_plan()?;
        let tasks = load_tasks(&path)?;
        Ok((tasks, path))
    }

    /// Flip the unchecked task whose trimmed body equals `task_text`.
    ///
    /// Only the first match is flipped. Returns [`MarkOutcome::NotFound`]
    /// without touching the file when nothing matches.
    pub fn mark_complete(
        &self,
        plan_path: &Path,
        task_text: &str,
    ) -> Result<MarkOutcome, PlanError> {
        let content =
            fs::read_to_string(plan_path).map_err(|e| PlanError::io(plan_path, e))?;
        let wanted = task_text.trim();

        let mut marked = false;
        let rewritten: Vec<String> = content
            .split('\n')
            .map(|line| {
                if marked {
                    return line.to_string();
                }
                match parse_task_line(line) {
                    Some(task) if !task.checked && task.text == wanted => {
                        marked = true;
                        task.checked_line()
                    }
                    _ => line.to_string(),
                }
            })
            .collect();

        if !marked {
            tracing::warn!(
                plan = %plan_path.display(),
                task = wanted,
                "mark-complete found no matching unchecked task"
            );
            return Ok(MarkOutcome::NotFound);
        }

        write_atomic(plan_path, rewritten.join("\n").as_bytes())?;
        Ok(MarkOutcome::Marked)
    }

    /// Scan the plan for creation-style tasks whose referenced files already
    /// exist, auto-marking those at or above [`AUTO_MARK_CONFIDENCE`].
    ///
    /// Returns the evidence for every scanned task, marked or not, so the
    /// caller can surface it.
    pub fn auto_sync(&self) -> Result<Vec<TaskEvidence>, PlanError> {
        let (tasks, path) = self.load_plan()?;
        let evidence = scan_evidence(&self.root, &tasks);

        for entry in &evidence {
            if entry.confidence >= AUTO_MARK_CONFIDENCE {
                if self.mark_complete(&path, &entry.task_text)? == MarkOutcome::Marked {
                    tracing::info!(
                        task = %entry.task_text,
                        confidence = entry.confidence,
                        "auto-marked task with filesystem evidence"
                    );
                }
            }
        }

        Ok(evidence)
    }
}

/// Parse every task line of a plan file, preserving order.
pub(crate) fn load_tasks(path: &Path) -> Result<Vec<Task>, PlanError> {
    let content = fs::read_to_string(path).map_err(|e| PlanError::io(path, e))?;
    Ok(content
        .split('\n')
        .filter_map(parse_task_line)
        .map(|line| line.task())
        .collect())
}

/// Unchecked tasks, in plan order.
pub fn remaining(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| !t.checked).cloned().collect()
}

/// Write to a sibling `.tmp` path, then rename over the target.
///
/// A failed rename removes the temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PlanError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| PlanError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PlanError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
#[path = "checklist_tests.rs"]
mod tests;
