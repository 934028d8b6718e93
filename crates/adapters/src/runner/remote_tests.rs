// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_storage::StateStore;
use serde_json::json;
use tempfile::tempdir;

fn runner_with(config: RemoteConfig) -> (RemoteRunner, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = StateStore::new(dir.path());
    (RemoteRunner::new(config, store), dir)
}

#[test]
fn base_url_prefers_configured_server() {
    let (runner, _dir) = runner_with(RemoteConfig {
        server_url: Some("http://agent.example:9000/".to_string()),
        ..RemoteConfig::default()
    });
    assert_eq!(runner.base_url(), "http://agent.example:9000");
}

#[test]
fn base_url_defaults_to_local_managed_port() {
    let (runner, _dir) = runner_with(RemoteConfig {
        port: 5005,
        ..RemoteConfig::default()
    });
    assert_eq!(runner.base_url(), "http://127.0.0.1:5005");
}

#[test]
fn assistant_message_id_is_captured() {
    let mut book = Bookkeeping::default();
    let frame = json!({
        "type": "message.updated",
        "properties": {"info": {"id": "m1", "role": "assistant"}}
    });
    assert!(matches!(book.ingest(&frame), FrameAction::Continue));
    assert_eq!(book.assistant_message_id.as_deref(), Some("m1"));
}

#[test]
fn non_assistant_messages_are_ignored() {
    let mut book = Bookkeeping::default();
    let frame = json!({
        "type": "message.updated",
        "properties": {"info": {"id": "u1", "role": "user"}}
    });
    book.ingest(&frame);
    assert_eq!(book.assistant_message_id, None);
}

fn part_frame(message_id: &str, part_id: &str, text: &str) -> serde_json::Value {
    json!({
        "type": "message.part.updated",
        "properties": {"part": {"id": part_id, "messageID": message_id, "text": text}}
    })
}

#[test]
fn parts_accumulate_in_insertion_order() {
    let mut book = Bookkeeping::default();
    book.ingest(&json!({
        "type": "message.updated",
        "properties": {"info": {"id": "m1", "role": "assistant"}}
    }));
    book.ingest(&part_frame("m1", "p1", "Hello"));
    book.ingest(&part_frame("m1", "p2", " world"));
    // cumulative re-emission replaces the part text in place
    book.ingest(&part_frame("m1", "p1", "Hello!"));

    assert_eq!(book.into_exchange().content, "Hello! world");
}

#[test]
fn parts_of_other_messages_are_dropped() {
    let mut book = Bookkeeping::default();
    book.ingest(&json!({
        "type": "message.updated",
        "properties": {"info": {"id": "m1", "role": "assistant"}}
    }));
    book.ingest(&part_frame("m2", "p9", "someone else"));
    assert_eq!(book.into_exchange().content, "");
}

#[test]
fn idle_status_completes_the_exchange() {
    let mut book = Bookkeeping::default();
    let frame = json!({"type": "session.status", "properties": {"status": {"type": "idle"}}});
    assert!(matches!(book.ingest(&frame), FrameAction::Done));
}

#[test]
fn error_status_fails_with_session_error() {
    let mut book = Bookkeeping::default();
    let frame = json!({
        "type": "session.status",
        "properties": {"status": {"type": "error", "message": "model refused"}}
    });
    match book.ingest(&frame) {
        FrameAction::Fail(RunnerError::Session(message)) => {
            assert_eq!(message, "model refused");
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn retry_status_tracks_attempts_and_caps() {
    let mut book = Bookkeeping::default();
    let retry = |attempt: u32| {
        json!({
            "type": "session.status",
            "properties": {"status": {"type": "retry", "attempt": attempt}}
        })
    };
    assert!(matches!(book.ingest(&retry(5)), FrameAction::Continue));
    assert_eq!(book.retry_attempts, 5);
    assert!(matches!(book.ingest(&retry(20)), FrameAction::Continue));
    assert!(matches!(
        book.ingest(&retry(21)),
        FrameAction::Fail(RunnerError::RateLimited)
    ));
}

#[test]
fn retry_without_attempt_counts_up() {
    let mut book = Bookkeeping::default();
    let frame = json!({"type": "session.status", "properties": {"status": {"type": "retry"}}});
    book.ingest(&frame);
    book.ingest(&frame);
    assert_eq!(book.retry_attempts, 2);
}

#[test]
fn compaction_and_tokens_are_recorded() {
    let mut book = Bookkeeping::default();
    book.ingest(&json!({"type": "session.compacted"}));
    book.ingest(&json!({
        "type": "session.updated",
        "properties": {"info": {"tokens": {"prompt": 90_000, "completion": 4_000}}}
    }));

    let exchange = book.into_exchange();
    assert!(exchange.compacted);
    assert_eq!(exchange.prompt_tokens, Some(90_000));
    assert_eq!(exchange.completion_tokens, Some(4_000));
}

#[test]
fn unknown_frames_are_harmless() {
    let mut book = Bookkeeping::default();
    assert!(matches!(
        book.ingest(&json!({"type": "telemetry.other"})),
        FrameAction::Continue
    ));
}
