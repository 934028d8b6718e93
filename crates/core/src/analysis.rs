// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion analysis of agent output
//!
//! Composes the status-block parser with keyword and error-line scans to
//! score how confident the supervisor should be that the work is done.

use crate::status::{parse_status_block, AgentStatus, StatusBlock, TestsStatus};
use crate::STATUS_BLOCK_START;
use serde::{Deserialize, Serialize};

/// Gross classification of agent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Text,
}

/// Fixed lexicon of completion phrases.
const COMPLETION_KEYWORDS: &[&str] = &[
    "done",
    "complete",
    "completed",
    "finished",
    "ready",
    "success",
    "all set",
    "all done",
    "all complete",
    "finished all",
    "ready to review",
    "no more work",
    "nothing to do",
    "completed successfully",
];

/// Line prefixes that mark an error line.
const ERROR_PREFIXES: &[&str] = &[
    "Error:",
    "ERROR:",
    "error:",
    "Error occurred",
    "failed with error",
    "exception",
    "Exception",
    "Fatal",
    "FATAL",
];

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub status: StatusBlock,
    pub format: OutputFormat,
    pub keyword_hits: usize,
    pub error_lines: Vec<String>,
    /// Completion confidence in `[0, 1]`.
    pub confidence: f64,
    pub has_errors: bool,
    /// Number of exit signals recorded in previous loops.
    pub prior_exit_signals: usize,
}

/// Classify output as JSON-lines or plain text.
///
/// Output carrying the status-block delimiter is always text; the agent
/// never wraps the block in JSON.
pub fn detect_format(text: &str) -> OutputFormat {
    if text.contains(STATUS_BLOCK_START) {
        return OutputFormat::Text;
    }
    let json_like = text.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    });
    if json_like {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

/// Case-insensitive count of completion-phrase occurrences.
///
/// Each lexicon entry is counted independently, so overlapping phrases
/// ("all done" also contains "done") contribute more than once.
pub fn completion_keyword_count(text: &str) -> usize {
    let lowered = text.to_lowercase();
    COMPLETION_KEYWORDS
        .iter()
        .map(|keyword| count_occurrences(&lowered, keyword))
        .sum()
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = rest.find(needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

/// Collect lines that look like errors.
///
/// Lines carrying `"is_error": false` are wire-level tool results, not
/// failures; they are dropped before the prefix scan.
pub fn extract_errors(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| {
            !line.contains(r#""is_error": false"#) && !line.contains(r#""is_error":false"#)
        })
        .filter(|line| {
            let trimmed = line.trim_start();
            ERROR_PREFIXES.iter().any(|p| trimmed.starts_with(p)) || line.contains("] error")
        })
        .map(|line| line.to_string())
        .collect()
}

/// Score agent output for completion.
pub fn analyze(text: &str, previous_exit_signals: &[String]) -> Analysis {
    let status = parse_status_block(text);
    let format = detect_format(text);
    let keyword_hits = completion_keyword_count(text);
    let error_lines = extract_errors(text);

    let mut confidence: f64 = 0.5;
    if status.exit_signal {
        confidence += 0.4;
    }
    if status.status == AgentStatus::Complete {
        confidence += 0.3;
    }
    if keyword_hits >= 3 {
        confidence += 0.2;
    }
    if status.status == AgentStatus::Blocked {
        confidence -= 0.3;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    let has_errors = status.status == AgentStatus::Blocked
        || status.tests_status == TestsStatus::Failing
        || !error_lines.is_empty();

    Analysis {
        status,
        format,
        keyword_hits,
        error_lines,
        confidence,
        has_errors,
        prior_exit_signals: previous_exit_signals.len(),
    }
}

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod tests;
