// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn wrap(body: &str) -> String {
    format!("{STATUS_BLOCK_START}\n{body}\n{STATUS_BLOCK_END}")
}

#[test]
fn parses_full_block() {
    let text = wrap(
        "STATUS: WORKING\n\
         CURRENT_TASK: Implement parser\n\
         TASKS_COMPLETED_THIS_LOOP: 1\n\
         FILES_MODIFIED: 2\n\
         TESTS_STATUS: PASSING\n\
         WORK_TYPE: implementation\n\
         EXIT_SIGNAL: false\n\
         RECOMMENDATION: keep going",
    );
    let block = parse_status_block(&text);
    assert_eq!(block.status, AgentStatus::Working);
    assert_eq!(block.current_task.as_deref(), Some("Implement parser"));
    assert_eq!(block.tasks_completed_this_loop, 1);
    assert_eq!(block.files_modified, 2);
    assert_eq!(block.tests_status, TestsStatus::Passing);
    assert_eq!(block.work_type.as_deref(), Some("implementation"));
    assert!(!block.exit_signal);
    assert_eq!(block.recommendation.as_deref(), Some("keep going"));
}

#[test]
fn missing_block_yields_defaults() {
    let block = parse_status_block("no delimiters here");
    assert_eq!(block, StatusBlock::default());
    assert_eq!(block.status, AgentStatus::Unknown);
    assert_eq!(block.tests_status, TestsStatus::Unknown);
    assert!(!block.exit_signal);
}

#[test]
fn unterminated_block_yields_defaults() {
    let text = format!("{STATUS_BLOCK_START}\nSTATUS: COMPLETE");
    assert_eq!(parse_status_block(&text), StatusBlock::default());
}

#[test]
fn block_surrounded_by_prose_is_found() {
    let text = format!(
        "I finished the work.\n\n{}\n\nSee you next loop.",
        wrap("STATUS: COMPLETE\nEXIT_SIGNAL: true")
    );
    let block = parse_status_block(&text);
    assert_eq!(block.status, AgentStatus::Complete);
    assert!(block.exit_signal);
}

#[test]
fn unknown_keys_are_ignored() {
    let block = parse_status_block(&wrap("STATUS: WORKING\nNOVELTY_FIELD: whatever"));
    assert_eq!(block.status, AgentStatus::Working);
}

#[test]
fn duplicate_keys_last_writer_wins() {
    let block = parse_status_block(&wrap("STATUS: WORKING\nSTATUS: BLOCKED"));
    assert_eq!(block.status, AgentStatus::Blocked);
}

#[test]
fn key_reordering_is_tolerated() {
    let block = parse_status_block(&wrap("EXIT_SIGNAL: true\nSTATUS: COMPLETE"));
    assert_eq!(block.status, AgentStatus::Complete);
    assert!(block.exit_signal);
}

#[parameterized(
    plain = { "3", 3 },
    suffixed = { "2 files", 2 },
    prefixed = { "~4", 4 },
    negative = { "-1", -1 },
    empty = { "", 0 },
    garbage = { "lots", 0 },
)]
fn loose_int_coercion(value: &str, expected: i64) {
    let block = parse_status_block(&wrap(&format!("FILES_MODIFIED: {value}")));
    assert_eq!(block.files_modified, expected);
}

#[parameterized(
    upper = { "TRUE", true },
    mixed = { "True", true },
    lower = { "true", true },
    no = { "false", false },
    junk = { "yes", false },
)]
fn exit_signal_coercion(value: &str, expected: bool) {
    let block = parse_status_block(&wrap(&format!("EXIT_SIGNAL: {value}")));
    assert_eq!(block.exit_signal, expected);
}

#[parameterized(
    working = { "working", AgentStatus::Working },
    complete = { "Complete", AgentStatus::Complete },
    blocked = { "BLOCKED", AgentStatus::Blocked },
    other = { "PONDERING", AgentStatus::Unknown },
)]
fn status_is_case_insensitive(value: &str, expected: AgentStatus) {
    let block = parse_status_block(&wrap(&format!("STATUS: {value}")));
    assert_eq!(block.status, expected);
}

#[test]
fn values_containing_colons_keep_their_tail() {
    let block = parse_status_block(&wrap("CURRENT_TASK: fix: the parser"));
    assert_eq!(block.current_task.as_deref(), Some("fix: the parser"));
}

#[test]
fn empty_values_stay_none() {
    let block = parse_status_block(&wrap("CURRENT_TASK:\nRECOMMENDATION:  "));
    assert_eq!(block.current_task, None);
    assert_eq!(block.recommendation, None);
}
