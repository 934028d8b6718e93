// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_core::{parse_status_block, CircuitState, Task, STATUS_BLOCK_END, STATUS_BLOCK_START};
use yare::parameterized;

fn task(text: &str) -> Task {
    Task {
        text: text.to_string(),
        checked: false,
    }
}

fn args<'a>(remaining: &'a [Task], summary: &'a str) -> InjectionArgs<'a> {
    InjectionArgs {
        loop_num: 3,
        breaker_state: CircuitState::Closed,
        plan_file: "IMPLEMENTATION_PLAN.md",
        remaining,
        last_summary: summary,
    }
}

#[test]
fn template_carries_both_delimiters() {
    assert!(STATUS_BLOCK_TEMPLATE.starts_with(STATUS_BLOCK_START));
    assert!(STATUS_BLOCK_TEMPLATE.ends_with(STATUS_BLOCK_END));
}

#[test]
fn template_is_parseable_by_the_analyzer() {
    // placeholder values parse to defaults rather than erroring
    let block = parse_status_block(STATUS_BLOCK_TEMPLATE);
    assert!(!block.exit_signal);
}

#[test]
fn injection_embeds_the_template_verbatim() {
    let tasks = [task("A")];
    let block = context_injection(&args(&tasks, ""));
    assert!(block.contains(STATUS_BLOCK_TEMPLATE));
}

#[test]
fn injection_is_deterministic() {
    let tasks = [task("A"), task("B")];
    let first = context_injection(&args(&tasks, "summary"));
    let second = context_injection(&args(&tasks, "summary"));
    assert_eq!(first, second);
}

#[test]
fn injection_names_loop_breaker_and_plan() {
    let tasks = [task("A")];
    let block = context_injection(&args(&tasks, ""));
    assert!(block.contains("Loop number: 3"));
    assert!(block.contains("Circuit breaker: CLOSED"));
    assert!(block.contains("Active plan file: IMPLEMENTATION_PLAN.md"));
    assert!(block.contains("mark it complete in IMPLEMENTATION_PLAN.md"));
}

#[test]
fn injection_lists_at_most_five_tasks() {
    let tasks: Vec<Task> = (0..8).map(|i| task(&format!("task-{i}"))).collect();
    let block = context_injection(&args(&tasks, ""));
    assert!(block.contains("(8 total, first 5 shown)"));
    assert!(block.contains("- task-4"));
    assert!(!block.contains("- task-5"));
}

#[test]
fn empty_summary_omits_the_summary_section() {
    let tasks = [task("A")];
    let without = context_injection(&args(&tasks, ""));
    assert!(!without.contains("Previous iteration summary"));

    let with = context_injection(&args(&tasks, "did things"));
    assert!(with.contains("Previous iteration summary:\ndid things"));
}

#[parameterized(
    short = { "short text", "short text" },
    exact_word_break = { "word ", "word" },
)]
fn truncate_keeps_short_content(input: &str, expected: &str) {
    assert_eq!(truncate_summary(input, 200), expected);
}

#[test]
fn truncate_rounds_at_the_last_whitespace() {
    let content = "alpha beta gamma delta";
    let out = truncate_summary(content, 12);
    // 12 chars in is mid-"gamma"; round back to the last full word
    assert_eq!(out, "alpha beta");
}

#[test]
fn truncate_without_whitespace_hard_cuts() {
    let content = "x".repeat(300);
    let out = truncate_summary(&content, 200);
    assert_eq!(out.chars().count(), 200);
}
