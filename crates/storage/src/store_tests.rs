// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn load_json_missing_returns_default() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let count: u32 = store.load_json(CALL_COUNT_FILE, 7).unwrap();
    assert_eq!(count, 7);
}

#[test]
fn save_and_load_json_round_trips() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    store.save_json(CALL_COUNT_FILE, &42u32).unwrap();
    assert_eq!(store.load_call_count().unwrap(), 42);
}

#[test]
fn corrupt_file_is_a_decode_error_not_a_default() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    fs::write(dir.path().join(CALL_COUNT_FILE), "not json").unwrap();

    let result = store.load_call_count();
    assert!(matches!(result, Err(StorageError::Decode { .. })));
}

#[test]
fn save_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    store.save_call_count(1).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn session_id_round_trips_without_trailing_newline_assumption() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    assert_eq!(store.load_session_id().unwrap(), None);

    store.save_session_id("thread-abc123").unwrap();
    assert_eq!(
        store.load_session_id().unwrap().as_deref(),
        Some("thread-abc123")
    );

    // a trailing newline written by hand is tolerated
    fs::write(dir.path().join(SESSION_ID_FILE), "thread-xyz\n").unwrap();
    assert_eq!(
        store.load_session_id().unwrap().as_deref(),
        Some("thread-xyz")
    );
}

#[test]
fn clear_session_id_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    store.save_session_id("s1").unwrap();
    store.clear_session_id().unwrap();
    store.clear_session_id().unwrap();
    assert_eq!(store.load_session_id().unwrap(), None);
}

#[test]
fn empty_session_file_reads_as_none() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    fs::write(dir.path().join(SESSION_ID_FILE), "").unwrap();
    assert_eq!(store.load_session_id().unwrap(), None);
}

#[test]
fn last_reset_round_trips_as_iso8601() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    assert_eq!(store.load_last_reset().unwrap(), None);

    let when = Utc::now();
    store.save_last_reset(when).unwrap();
    let loaded = store.load_last_reset().unwrap().unwrap();
    assert_eq!(loaded, when);

    // on-disk representation is a JSON string
    let raw = fs::read_to_string(dir.path().join(LAST_RESET_FILE)).unwrap();
    assert!(raw.trim_start().starts_with('"'));
}

#[test]
fn breaker_snapshot_round_trips() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    let fresh = BreakerSnapshot::new(3, 5, Utc::now());

    let loaded = store.load_breaker(fresh.clone()).unwrap();
    assert_eq!(loaded, fresh);

    let mut mutated = fresh.clone();
    mutated.no_progress_count = 2;
    mutated.error_history = vec!["boom".to_string(), "boom".to_string()];
    store.save_breaker(&mutated).unwrap();

    let back = store.load_breaker(fresh).unwrap();
    assert_eq!(back, mutated);
}

#[test]
fn exit_signals_append_preserves_order() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());

    assert!(store.load_exit_signals().unwrap().is_empty());

    store.append_exit_signal("loop_1").unwrap();
    store.append_exit_signal("loop_4").unwrap();
    assert_eq!(
        store.load_exit_signals().unwrap(),
        vec!["loop_1".to_string(), "loop_4".to_string()]
    );
}

#[test]
fn cleanup_removes_only_temp_files() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    fs::write(dir.path().join("stale.tmp"), "x").unwrap();
    fs::write(dir.path().join("other.tmp"), "y").unwrap();
    fs::write(dir.path().join("keep.json"), "{}").unwrap();

    let removed = store.cleanup().unwrap();
    assert_eq!(removed, 2);
    assert!(dir.path().join("keep.json").exists());
    assert!(!dir.path().join("stale.tmp").exists());
}

#[test]
fn cleanup_on_missing_root_is_a_noop() {
    let store = StateStore::new("/nonexistent/ralph-test-dir");
    assert_eq!(store.cleanup().unwrap(), 0);
}
