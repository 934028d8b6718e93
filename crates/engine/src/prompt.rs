// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context injection
//!
//! A deterministic text block prepended to the agent prompt each loop. Its
//! wording is fixed: the status-block template inside it is the same bytes
//! the status analyzer parses back out, and the agent relies on the
//! instructions as a contract. Do not reword casually.

use ralph_core::{CircuitState, Task};

/// Remaining tasks quoted in the injection.
const MAX_LISTED_TASKS: usize = 5;

/// The status block the agent must emit, verbatim.
pub const STATUS_BLOCK_TEMPLATE: &str = "---RALPH_STATUS---\n\
STATUS: WORKING | COMPLETE | BLOCKED\n\
CURRENT_TASK: <what you worked on>\n\
TASKS_COMPLETED_THIS_LOOP: <count>\n\
FILES_MODIFIED: <count>\n\
TESTS_STATUS: PASSING | FAILING | UNKNOWN\n\
WORK_TYPE: <implementation | refactoring | fixing | documentation>\n\
EXIT_SIGNAL: true | false\n\
RECOMMENDATION: <one line for the next loop>\n\
---END_RALPH_STATUS---";

/// Inputs to the injection block.
pub struct InjectionArgs<'a> {
    /// 1-based loop number shown to the agent.
    pub loop_num: u64,
    pub breaker_state: CircuitState,
    /// File name of the active plan, e.g. `IMPLEMENTATION_PLAN.md`.
    pub plan_file: &'a str,
    pub remaining: &'a [Task],
    /// Previous iteration's truncated summary; empty means none.
    pub last_summary: &'a str,
}

/// Render the context injection.
pub fn context_injection(args: &InjectionArgs<'_>) -> String {
    let mut block = String::new();

    block.push_str("=== RALPH LOOP CONTEXT ===\n");
    block.push_str(&format!("Loop number: {}\n", args.loop_num));
    block.push_str(&format!("Circuit breaker: {}\n", args.breaker_state));
    block.push_str(&format!("Active plan file: {}\n", args.plan_file));
    block.push_str(&format!(
        "When you finish a task, mark it complete in {} by changing \"[ ]\" to \"[x]\".\n",
        args.plan_file
    ));

    block.push_str(&format!(
        "Remaining tasks ({} total, first {} shown):\n",
        args.remaining.len(),
        args.remaining.len().min(MAX_LISTED_TASKS)
    ));
    for task in args.remaining.iter().take(MAX_LISTED_TASKS) {
        block.push_str(&format!("- {}\n", task.text));
    }

    if !args.last_summary.is_empty() {
        block.push_str("Previous iteration summary:\n");
        block.push_str(args.last_summary);
        block.push('\n');
    }

    block.push_str(
        "At the very end of your response, emit this status block with the fields filled in:\n",
    );
    block.push_str(STATUS_BLOCK_TEMPLATE);
    block.push_str("\n=== END RALPH LOOP CONTEXT ===\n");

    block
}

/// Truncate to `max` characters, rounding down at the last whitespace so a
/// word is never cut mid-way.
pub fn truncate_summary(content: &str, max: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max).collect();
    match head.rfind(char::is_whitespace) {
        Some(pos) => head[..pos].trim_end().to_string(),
        None => head,
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
