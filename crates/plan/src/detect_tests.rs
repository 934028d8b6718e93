// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::tempdir;
use yare::parameterized;

fn project_with(files: &[&str]) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    for name in files {
        fs::write(dir.path().join(name), "").unwrap();
    }
    dir
}

#[parameterized(
    implement = { &["PRD.md", "IMPLEMENTATION_PLAN.md"], ProjectMode::Implement },
    refactor = { &["REFACTOR_PLAN.md"], ProjectMode::Refactor },
    fix = { &["PROMPT.md", "@fix_plan.md"], ProjectMode::Fix },
    empty = { &[], ProjectMode::Unknown },
    prd_alone = { &["PRD.md"], ProjectMode::Unknown },
    prompt_alone = { &["PROMPT.md"], ProjectMode::Unknown },
    fix_plan_alone = { &["@fix_plan.md"], ProjectMode::Unknown },
)]
fn detects_mode(files: &[&str], expected: ProjectMode) {
    let dir = project_with(files);
    assert_eq!(detect_mode(dir.path()), expected);
}

#[test]
fn refactor_beats_fix_and_implement() {
    let dir = project_with(&[
        "REFACTOR_PLAN.md",
        "PROMPT.md",
        "@fix_plan.md",
        "PRD.md",
        "IMPLEMENTATION_PLAN.md",
    ]);
    assert_eq!(detect_mode(dir.path()), ProjectMode::Refactor);
}

#[test]
fn fix_beats_implement() {
    let dir = project_with(&[
        "PROMPT.md",
        "@fix_plan.md",
        "PRD.md",
        "IMPLEMENTATION_PLAN.md",
    ]);
    assert_eq!(detect_mode(dir.path()), ProjectMode::Fix);
}

#[test]
fn directories_do_not_count_as_marker_files() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("REFACTOR_PLAN.md")).unwrap();
    assert_eq!(detect_mode(dir.path()), ProjectMode::Unknown);
}
