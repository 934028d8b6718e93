// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem evidence for creation-style tasks
//!
//! A plan often contains tasks like `Add src/parser.rs with a lexer`. When
//! the referenced file already exists on disk, the task is probably done:
//! a previous loop did the work but forgot to tick the box. This scan
//! collects that evidence; only high-confidence hits are auto-marked.

use ralph_core::Task;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Confidence at or above which a task is auto-marked.
pub const AUTO_MARK_CONFIDENCE: f64 = 0.9;

/// Imperative verbs that open a creation-style task.
const CREATION_VERBS: &[&str] = &["Add", "Create", "Introduce", "Extract"];

/// Directory prefixes a referenced path must carry.
const KNOWN_PREFIXES: &[&str] = &["src/", "tests/", "test/", "lib/", "pkg/", "internal/"];

/// Extensions a referenced path must carry.
const KNOWN_EXTENSIONS: &[&str] = &[
    ".rs", ".go", ".py", ".ts", ".tsx", ".js", ".jsx", ".md", ".toml", ".json", ".yaml", ".yml",
];

/// Test-configuration filenames that score 0.9 on sight.
const TEST_CONFIG_FILES: &[&str] = &[
    "jest.config.js",
    "jest.config.ts",
    "vitest.config.ts",
    "pytest.ini",
    "tox.ini",
    "karma.conf.js",
    ".mocharc.json",
];

/// Evidence that a single task may already be done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvidence {
    pub task_text: String,
    /// Fraction of referenced paths found on disk, in `[0, 1]`.
    pub confidence: f64,
    pub referenced: Vec<String>,
    pub found: Vec<String>,
}

/// Scan unchecked creation-style tasks for files that already exist.
///
/// Tasks that reference no recognizable path produce no evidence.
pub fn scan_evidence(root: &Path, tasks: &[Task]) -> Vec<TaskEvidence> {
    tasks
        .iter()
        .filter(|t| !t.checked)
        .filter(|t| is_creation_task(&t.text))
        .filter_map(|t| evidence_for(root, &t.text))
        .collect()
}

fn is_creation_task(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    if !CREATION_VERBS.contains(&first) {
        return false;
    }
    // "Extract X to Y" is a move; bare "Extract X" is not creation.
    if first == "Extract" && !text.contains(" to ") {
        return false;
    }
    true
}

fn evidence_for(root: &Path, text: &str) -> Option<TaskEvidence> {
    let referenced = referenced_paths(text);
    if referenced.is_empty() {
        return None;
    }

    let found: Vec<String> = referenced
        .iter()
        .filter(|p| root.join(p).is_file())
        .cloned()
        .collect();

    let mut confidence = found.len() as f64 / referenced.len() as f64;

    let names_test_config = referenced.iter().any(|p| {
        let name = p.rsplit('/').next().unwrap_or(p);
        TEST_CONFIG_FILES.contains(&name)
    });
    if names_test_config {
        confidence = confidence.max(AUTO_MARK_CONFIDENCE);
    }

    Some(TaskEvidence {
        task_text: text.to_string(),
        confidence,
        referenced,
        found,
    })
}

/// Extract path-looking tokens: known prefix and known extension, or a bare
/// test-config filename.
fn referenced_paths(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(strip_punctuation)
        .filter(|token| !token.is_empty())
        .filter(|token| {
            let has_prefix = KNOWN_PREFIXES.iter().any(|p| token.starts_with(p));
            let has_extension = KNOWN_EXTENSIONS.iter().any(|e| token.ends_with(e));
            let is_test_config = TEST_CONFIG_FILES.contains(&token.as_str());
            (has_prefix && has_extension) || is_test_config
        })
        .collect()
}

/// Trim backticks, quotes, and trailing sentence punctuation off a token.
///
/// Leading dots are kept so dotfile names like `.mocharc.json` survive.
fn strip_punctuation(token: &str) -> String {
    token
        .trim_start_matches(|c: char| matches!(c, '`' | '"' | '\'' | '('))
        .trim_end_matches(|c: char| matches!(c, '`' | '"' | '\'' | ')' | '.' | ',' | ';' | ':'))
        .to_string()
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
