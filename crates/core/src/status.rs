// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status block extraction
//!
//! The agent ends each response with a delimited key/value block. The block
//! is a protocol between the supervisor and the agent: the same shape is
//! reproduced verbatim in the context injection, and the parser here must
//! tolerate key reordering, unknown keys, and missing fields.

use serde::{Deserialize, Serialize};

/// Opening delimiter of the status block.
pub const STATUS_BLOCK_START: &str = "---RALPH_STATUS---";
/// Closing delimiter of the status block.
pub const STATUS_BLOCK_END: &str = "---END_RALPH_STATUS---";

/// The agent's self-reported state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Working,
    Complete,
    Blocked,
    #[default]
    Unknown,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Working => write!(f, "WORKING"),
            AgentStatus::Complete => write!(f, "COMPLETE"),
            AgentStatus::Blocked => write!(f, "BLOCKED"),
            AgentStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The agent's self-reported test state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestsStatus {
    Passing,
    Failing,
    #[default]
    Unknown,
}

/// Parsed status block. All fields are optional on the wire; defaults per
/// field are applied here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusBlock {
    pub status: AgentStatus,
    pub current_task: Option<String>,
    pub tasks_completed_this_loop: i64,
    pub files_modified: i64,
    pub tests_status: TestsStatus,
    pub work_type: Option<String>,
    pub exit_signal: bool,
    pub recommendation: Option<String>,
}

/// Extract and parse the status block from agent output.
///
/// Takes the region between the first start delimiter and the first end
/// delimiter after it. Returns the default block when no delimited region
/// exists. Within the block, each line is split once on `:`; unknown keys
/// are ignored and duplicate keys are last-writer-wins.
pub fn parse_status_block(text: &str) -> StatusBlock {
    let mut block = StatusBlock::default();

    let Some(region) = extract_region(text) else {
        return block;
    };

    for line in region.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "STATUS" => block.status = parse_agent_status(value),
            "CURRENT_TASK" => block.current_task = non_empty(value),
            "TASKS_COMPLETED_THIS_LOOP" => {
                block.tasks_completed_this_loop = parse_loose_int(value)
            }
            "FILES_MODIFIED" => block.files_modified = parse_loose_int(value),
            "TESTS_STATUS" => block.tests_status = parse_tests_status(value),
            "WORK_TYPE" => block.work_type = non_empty(value),
            "EXIT_SIGNAL" => block.exit_signal = value.eq_ignore_ascii_case("true"),
            "RECOMMENDATION" => block.recommendation = non_empty(value),
            _ => {}
        }
    }

    block
}

/// The substring between the two delimiters, shortest match.
fn extract_region(text: &str) -> Option<&str> {
    let start = text.find(STATUS_BLOCK_START)? + STATUS_BLOCK_START.len();
    let end = text[start..].find(STATUS_BLOCK_END)?;
    Some(&text[start..start + end])
}

fn parse_agent_status(value: &str) -> AgentStatus {
    match value.to_ascii_uppercase().as_str() {
        "WORKING" => AgentStatus::Working,
        "COMPLETE" => AgentStatus::Complete,
        "BLOCKED" => AgentStatus::Blocked,
        _ => AgentStatus::Unknown,
    }
}

fn parse_tests_status(value: &str) -> TestsStatus {
    match value.to_ascii_uppercase().as_str() {
        "PASSING" => TestsStatus::Passing,
        "FAILING" => TestsStatus::Failing,
        _ => TestsStatus::Unknown,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Permissive integer parse: the first run of digits (with optional leading
/// minus) anywhere in the value. Agents write things like `2 files` or
/// `~3`; those coerce to 2 and 3. No digits coerces to 0.
fn parse_loose_int(value: &str) -> i64 {
    let bytes = value.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start = Some(i);
            break;
        }
    }
    let Some(start) = start else { return 0 };

    let negative = start > 0 && bytes[start - 1] == b'-';
    let digits: String = value[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let magnitude: i64 = digits.parse().unwrap_or(0);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
