//! Plan-file round-trip guarantees at the spec level.

use ralph_plan::{MarkOutcome, PlanStore};
use std::fs;
use tempfile::TempDir;

fn fix_project(plan: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("PROMPT.md"), "").unwrap();
    fs::write(dir.path().join("@fix_plan.md"), plan).unwrap();
    dir
}

// Loading a plan and writing nothing leaves the file byte-identical.
#[test]
fn load_without_edits_never_rewrites() {
    let plan = "# Fix plan\r\n\r\n- [ ] Windows line endings\r\n1. [x] Numbered\r\nprose\n";
    let dir = fix_project(plan);
    let store = PlanStore::new(dir.path());

    let _ = store.load_plan().unwrap();
    let after = fs::read_to_string(dir.path().join("@fix_plan.md")).unwrap();
    assert_eq!(after, plan);
}

// mark_complete flips one checkbox and leaves every other byte alone,
// across all four dialects and mixed line endings.
#[test]
fn mark_complete_is_byte_minimal_across_dialects() {
    let plan = "intro\n- [ ] dash task\n  * [ ] star task\n3. [ ] numbered task\n[ ] bare task\n";
    let dir = fix_project(plan);
    let store = PlanStore::new(dir.path());
    let path = dir.path().join("@fix_plan.md");

    assert_eq!(
        store.mark_complete(&path, "star task").unwrap(),
        MarkOutcome::Marked
    );
    let after = fs::read_to_string(&path).unwrap();
    assert_eq!(
        after,
        "intro\n- [ ] dash task\n  * [x] star task\n3. [ ] numbered task\n[ ] bare task\n"
    );

    assert_eq!(
        store.mark_complete(&path, "bare task").unwrap(),
        MarkOutcome::Marked
    );
    let after = fs::read_to_string(&path).unwrap();
    assert_eq!(
        after,
        "intro\n- [ ] dash task\n  * [x] star task\n3. [ ] numbered task\n[x] bare task\n"
    );
}

#[test]
fn unmatched_mark_reports_not_found_and_keeps_the_file() {
    let plan = "- [ ] the only task\n";
    let dir = fix_project(plan);
    let store = PlanStore::new(dir.path());
    let path = dir.path().join("@fix_plan.md");

    assert_eq!(
        store.mark_complete(&path, "a task that is not there").unwrap(),
        MarkOutcome::NotFound
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), plan);
}
